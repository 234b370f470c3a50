use crate::config::TextLimits;
use crate::coordinator::FirstFailure;
use crate::error::{MrError, MrResult, TextKind};
use crate::partitioner::Partitioner;
use crate::store::{KvPair, PartitionStore};
use std::sync::atomic::{AtomicU64, Ordering};

/// Producer-side handle a map callback deposits pairs through.
///
/// `Emitter` is `Sync`: a map callback may share it with threads of its own.
pub struct Emitter<'a> {
    store: &'a PartitionStore,
    partitioner: &'a dyn Partitioner,
    limits: TextLimits,
    failure: &'a FirstFailure,
    emitted: AtomicU64,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(
        store: &'a PartitionStore,
        partitioner: &'a dyn Partitioner,
        limits: TextLimits,
        failure: &'a FirstFailure,
    ) -> Self {
        Self { store, partitioner, limits, failure, emitted: AtomicU64::new(0) }
    }

    /// Routes `(key, value)` to its partition and stores an owned copy there.
    ///
    /// Oversized text is rejected or truncated per [`TextLimits`]. A partitioner index
    /// out of range, or a failed allocation, also marks the whole run as failed, so the
    /// run errors even if the callback ignores this result.
    pub fn emit(&self, key: &str, value: &str) -> MrResult<()> {
        let stored = self.route_and_store(key, value);
        match &stored {
            Ok(()) => {
                self.emitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) if err.is_fatal() => self.failure.record(anyhow::Error::new(err.clone())),
            Err(_) => {}
        }
        stored
    }

    pub fn num_partitions(&self) -> usize {
        self.store.len()
    }

    /// Pairs successfully stored through this handle.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    fn route_and_store(&self, key: &str, value: &str) -> MrResult<()> {
        let key = self.limits.apply(TextKind::Key, key)?;
        let value = self.limits.apply(TextKind::Value, value)?;
        let num_partitions = self.store.len();
        let index = self.partitioner.partition(key, num_partitions);
        if index >= num_partitions {
            return Err(MrError::PartitionOutOfRange { key: key.to_owned(), index, num_partitions });
        }
        self.store.insert(index, KvPair::new(key, value))
    }
}
