use crate::error::{MrError, MrResult};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One emitted key/value pair, owned by the partition it was routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// All values of one distinct key within a partition, in reducer-visible order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCluster {
    pub(crate) key: String,
    pub(crate) values: Vec<String>,
}

impl KeyCluster {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Position of the value iterator within a partition's clusters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ClusterCursor {
    pub(crate) cluster: usize,
    pub(crate) value: usize,
}

/// One slot of the partition table. Always accessed through its mutex.
#[derive(Debug, Default)]
pub struct Partition {
    pending: Vec<KvPair>,
    clusters: Vec<KeyCluster>,
    cursor: ClusterCursor,
}

impl Partition {
    pub fn pending(&self) -> &[KvPair] {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing was emitted here (or it has already been drained).
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clusters(&self) -> &[KeyCluster] {
        &self.clusters
    }

    /// Appends `pair`, reporting a failed slot reservation as [`MrError::OutOfMemory`].
    ///
    /// Only the slot in `pending` is reserved fallibly. The owned key and value strings,
    /// and the clusters built when the partition is grouped, allocate normally, so running
    /// out of memory there aborts the process instead of failing the run.
    fn push(&mut self, index: usize, pair: KvPair) -> MrResult<()> {
        self.pending
            .try_reserve(1)
            .map_err(|source| MrError::OutOfMemory { partition: index, source })?;
        self.pending.push(pair);
        Ok(())
    }

    pub(crate) fn take_pending(&mut self) -> Vec<KvPair> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn install_clusters(&mut self, clusters: Vec<KeyCluster>) {
        self.clusters = clusters;
        self.cursor = ClusterCursor::default();
    }

    /// Splits the grouped state into the read-only clusters and the iterator cursor.
    pub(crate) fn reduce_view(&mut self) -> (&[KeyCluster], &mut ClusterCursor) {
        (&self.clusters, &mut self.cursor)
    }

    pub(crate) fn release_clusters(&mut self) {
        self.clusters = Vec::new();
        self.cursor = ClusterCursor::default();
    }
}

/// Fixed-size table of independently locked partitions, created once per run.
#[derive(Debug)]
pub struct PartitionStore {
    partitions: Vec<Mutex<Partition>>,
}

impl PartitionStore {
    pub fn new(num_partitions: usize) -> Self {
        Self { partitions: (0..num_partitions).map(|_| Mutex::new(Partition::default())).collect() }
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Locks partition `index`. A lock poisoned by a panicking callback is still handed
    /// out; the panic itself is re-raised when the run joins its workers.
    ///
    /// Panics if `index` is out of range.
    pub fn lock(&self, index: usize) -> MutexGuard<'_, Partition> {
        self.partitions[index].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `pair` to partition `index` under that partition's lock only.
    pub fn insert(&self, index: usize, pair: KvPair) -> MrResult<()> {
        let num_partitions = self.len();
        let Some(slot) = self.partitions.get(index) else {
            return Err(MrError::PartitionOutOfRange { key: pair.key, index, num_partitions });
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner).push(index, pair)
    }

    pub fn pending_counts(&self) -> Vec<usize> {
        (0..self.len()).map(|i| self.lock(i).pending_len()).collect()
    }
}
