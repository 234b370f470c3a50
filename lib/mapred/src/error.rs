use std::collections::TryReserveError;
use std::fmt;
use thiserror::Error;

/// Which half of a pair a length check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Key,
    Value,
}

impl fmt::Display for TextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextKind::Key => f.write_str("key"),
            TextKind::Value => f.write_str("value"),
        }
    }
}

/// Engine error taxonomy.
///
/// Callback failures are not represented here: map and reduce callbacks return
/// `anyhow::Result` and their errors reach the caller of the run with context attached.
/// [`MrError::PartitionOutOfRange`] and [`MrError::OutOfMemory`] abort the run even when
/// the map callback ignores them; the others are reported to whoever made the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MrError {
    /// Pool sizes, partition count or text limits that cannot drive a run.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The partitioner produced an index outside `[0, num_partitions)`.
    #[error("partitioner returned index {index} for key {key:?}, expected a value below {num_partitions}")]
    PartitionOutOfRange {
        key: String,
        index: usize,
        num_partitions: usize,
    },

    /// A key or value exceeded its configured byte limit under [`crate::OverflowPolicy::Reject`].
    #[error("{kind} of {len} bytes exceeds the limit of {limit} bytes")]
    TextTooLong {
        kind: TextKind,
        len: usize,
        limit: usize,
    },

    /// Growing a partition's pending list failed.
    #[error("out of memory while storing a pair in partition {partition}")]
    OutOfMemory {
        partition: usize,
        #[source]
        source: TryReserveError,
    },

    /// A reduce callback asked for a key the value iterator has already moved past.
    #[error("key {key:?} requested after the value iterator moved past it in partition {partition}")]
    KeyOutOfOrder { key: String, partition: usize },

    /// A reduce callback asked for a key that has no cluster in its partition.
    #[error("key {key:?} not found in partition {partition}")]
    KeyNotFound { key: String, partition: usize },
}

impl MrError {
    /// Errors that must stop the run even when a callback swallows them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MrError::PartitionOutOfRange { .. } | MrError::OutOfMemory { .. })
    }
}

pub type MrResult<T> = std::result::Result<T, MrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_routing_and_allocation_errors_are_fatal() {
        let not_found = MrError::KeyNotFound { key: "a".into(), partition: 0 };
        let out_of_order = MrError::KeyOutOfOrder { key: "a".into(), partition: 0 };
        let too_long = MrError::TextTooLong { kind: TextKind::Key, len: 9, limit: 8 };
        assert!(!not_found.is_fatal());
        assert!(!out_of_order.is_fatal());
        assert!(!too_long.is_fatal());
        assert!(MrError::PartitionOutOfRange { key: "a".into(), index: 3, num_partitions: 2 }.is_fatal());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let err = MrError::PartitionOutOfRange { key: "cat".into(), index: 9, num_partitions: 4 };
        assert_eq!(
            err.to_string(),
            "partitioner returned index 9 for key \"cat\", expected a value below 4"
        );
        let err = MrError::TextTooLong { kind: TextKind::Value, len: 20, limit: 15 };
        assert_eq!(err.to_string(), "value of 20 bytes exceeds the limit of 15 bytes");
    }
}
