use serde::Serialize;

/// What one mapper thread did during the map phase.
#[derive(Clone, Debug, Default)]
pub struct MapTaskStats {
    pub files: u64,
    pub emits: u64,
    pub wall_ms: u64,
}

/// What one reducer thread did during the reduce phase.
#[derive(Clone, Debug, Default)]
pub struct ReduceTaskStats {
    pub partitions: u64,
    pub empty_partitions: u64,
    pub pairs: u64,
    pub groups: u64,
    pub sort_ms: u64,
    pub reduce_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MapStats {
    pub workers: usize,
    pub files: u64,
    pub total_emits: u64,
    pub min_worker_ms: u64,
    pub max_worker_ms: u64,
    pub wall_ms: u64,
}

#[derive(Default, Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReduceStats {
    pub workers: usize,
    pub partitions_reduced: u64,
    pub empty_partitions: u64,
    pub total_pairs: u64,
    pub total_groups: u64,
    pub total_sort_ms: u64,
    /// Time spent inside reduce callbacks, summed over workers.
    pub total_reduce_ms: u64,
    pub min_worker_ms: u64,
    pub max_worker_ms: u64,
    pub wall_ms: u64,
}

/// Aggregated counters for one run, returned on success.
#[derive(Default, Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RunStats {
    pub map: MapStats,
    pub reduce: ReduceStats,
}

impl RunStats {
    pub fn record_map(&mut self, per_task: &[MapTaskStats], wall_ms: u64) {
        self.map = MapStats {
            workers: per_task.len(),
            files: per_task.iter().map(|t| t.files).sum(),
            total_emits: per_task.iter().map(|t| t.emits).sum(),
            min_worker_ms: per_task.iter().map(|t| t.wall_ms).min().unwrap_or(0),
            max_worker_ms: per_task.iter().map(|t| t.wall_ms).max().unwrap_or(0),
            wall_ms,
        };
    }

    pub fn record_reduce(&mut self, per_task: &[ReduceTaskStats], wall_ms: u64) {
        self.reduce = ReduceStats {
            workers: per_task.len(),
            partitions_reduced: per_task.iter().map(|t| t.partitions).sum(),
            empty_partitions: per_task.iter().map(|t| t.empty_partitions).sum(),
            total_pairs: per_task.iter().map(|t| t.pairs).sum(),
            total_groups: per_task.iter().map(|t| t.groups).sum(),
            total_sort_ms: per_task.iter().map(|t| t.sort_ms).sum(),
            total_reduce_ms: per_task.iter().map(|t| t.reduce_ms).sum(),
            min_worker_ms: per_task.iter().map(|t| t.wall_ms).min().unwrap_or(0),
            max_worker_ms: per_task.iter().map(|t| t.wall_ms).max().unwrap_or(0),
            wall_ms,
        };
    }
}
