use crate::error::{MrError, MrResult};
use crate::store::{ClusterCursor, KeyCluster};
use std::cmp::Ordering;
use tracing::{error, warn};

/// Pull-based access to the grouped values of the partition being reduced.
///
/// The cursor lives on the partition, not on this handle: it only moves forward, and
/// keys must be requested in the ascending order the reduce loop visits them. Asking
/// for a key that the cursor has already passed is reported as
/// [`MrError::KeyOutOfOrder`] rather than answered.
///
/// As an [`Iterator`], `Values` yields the values of the key the current reduce
/// invocation was called with.
pub struct Values<'a> {
    clusters: &'a [KeyCluster],
    cursor: &'a mut ClusterCursor,
    key: &'a str,
    partition: usize,
}

impl<'a> Values<'a> {
    pub(crate) fn new(clusters: &'a [KeyCluster], cursor: &'a mut ClusterCursor, key: &'a str, partition: usize) -> Self {
        Self { clusters, cursor, key, partition }
    }

    /// The key of the current reduce invocation.
    pub fn key(&self) -> &'a str {
        self.key
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Next unread value for `key`, or `None` once its values are exhausted.
    ///
    /// Lookup failures are logged and reported as exhaustion; use
    /// [`Values::try_next_value`] to observe them.
    pub fn next_value(&mut self, key: &str) -> Option<&'a str> {
        match self.try_next_value(key) {
            Ok(value) => value,
            Err(err @ MrError::KeyOutOfOrder { .. }) => {
                error!(partition = self.partition, error = %err, "value iterator used out of order");
                None
            }
            Err(err) => {
                warn!(partition = self.partition, error = %err, "value iterator lookup failed");
                None
            }
        }
    }

    /// Like [`Values::next_value`], with lookup failures surfaced as errors.
    ///
    /// The cursor only moves when `key` is found; a failed lookup leaves it in place.
    pub fn try_next_value(&mut self, key: &str) -> MrResult<Option<&'a str>> {
        let clusters = self.clusters;
        let mut index = self.cursor.cluster;
        while let Some(cluster) = clusters.get(index) {
            match key.as_bytes().cmp(cluster.key.as_bytes()) {
                Ordering::Equal => {
                    if index != self.cursor.cluster {
                        *self.cursor = ClusterCursor { cluster: index, value: 0 };
                    }
                    let value = cluster.values.get(self.cursor.value).map(String::as_str);
                    if value.is_some() {
                        self.cursor.value += 1;
                    }
                    return Ok(value);
                }
                Ordering::Greater => index += 1,
                Ordering::Less => break,
            }
        }
        Err(self.lookup_failure(key))
    }

    fn lookup_failure(&self, key: &str) -> MrError {
        let passed = &self.clusters[..self.cursor.cluster.min(self.clusters.len())];
        if passed.binary_search_by(|c| c.key.as_bytes().cmp(key.as_bytes())).is_ok() {
            MrError::KeyOutOfOrder { key: key.to_owned(), partition: self.partition }
        } else {
            MrError::KeyNotFound { key: key.to_owned(), partition: self.partition }
        }
    }
}

impl<'a> Iterator for Values<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let key = self.key;
        self.next_value(key)
    }
}
