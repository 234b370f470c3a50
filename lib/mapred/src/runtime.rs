use crate::api::{Mapper, Reducer};
use crate::config::EngineConfig;
use crate::coordinator::{FileQueue, FirstFailure, JobCursor};
use crate::emit::Emitter;
use crate::io::input_files;
use crate::partitioner::Partitioner;
use crate::sort::group_partition;
use crate::stats::{MapTaskStats, ReduceTaskStats, RunStats};
use crate::store::PartitionStore;
use crate::utils::elapsed_ms;
use crate::values::Values;
use anyhow::{Context, Result};
use std::path::Path;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info};

/// State of a single run: the partition table, both work queues and the failure latch.
///
/// An engine is built for one run and consumed by it; nothing is shared between runs.
pub struct Engine {
    config: EngineConfig,
    store: PartitionStore,
    files: FileQueue,
    jobs: JobCursor,
    failure: FirstFailure,
}

impl Engine {
    pub fn new<I, S>(config: EngineConfig, inputs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.validate()?;
        let num_partitions = config.num_partitions;
        Ok(Self {
            store: PartitionStore::new(num_partitions),
            files: FileQueue::new(inputs),
            jobs: JobCursor::new(num_partitions),
            failure: FirstFailure::default(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    /// Map phase then reduce phase; returns once every partition has been reduced.
    pub fn run<M, R, P>(self, mapper: &M, reducer: &R, partitioner: &P) -> Result<RunStats>
    where
        M: Mapper + ?Sized,
        R: Reducer + ?Sized,
        P: Partitioner + ?Sized,
    {
        info!(
            inputs = self.files.remaining(),
            mappers = self.config.num_mappers,
            reducers = self.config.num_reducers,
            partitions = self.config.num_partitions,
            "mapred starting map phase"
        );
        let mut stats = RunStats::default();
        self.map_phase(mapper, partitioner, &mut stats)?;
        self.reduce_phase(reducer, &mut stats)?;
        Ok(stats)
    }

    /// Runs the mapper pool until the file queue is drained, then joins it.
    ///
    /// Every pair emitted by a successful call is in its partition when this returns.
    pub fn map_phase<M, P>(&self, mapper: &M, partitioner: &P, stats: &mut RunStats) -> Result<()>
    where
        M: Mapper + ?Sized,
        P: Partitioner + ?Sized,
    {
        partitioner.prepare(self.config.num_partitions)?;
        let partitioner = DynPartitioner(partitioner);
        let partitioner: &dyn Partitioner = &partitioner;
        let phase_start = Instant::now();
        let per_task = self.run_pool("map", self.config.num_mappers, |worker| {
            self.map_worker(worker, mapper, partitioner)
        })?;
        let wall_ms = elapsed_ms(phase_start);
        stats.record_map(&per_task, wall_ms);
        if let Some(err) = self.failure.take() {
            return Err(err.context("map phase failed"));
        }
        info!(phase = "map",
              workers = stats.map.workers,
              files = stats.map.files,
              total_emits = stats.map.total_emits,
              min_worker_ms = stats.map.min_worker_ms, max_worker_ms = stats.map.max_worker_ms,
              wall_ms,
              "Map phase complete");
        Ok(())
    }

    /// Runs the reducer pool until the job cursor reaches the partition count.
    pub fn reduce_phase<R>(&self, reducer: &R, stats: &mut RunStats) -> Result<()>
    where
        R: Reducer + ?Sized,
    {
        let phase_start = Instant::now();
        let per_task = self.run_pool("reduce", self.config.num_reducers, |worker| {
            self.reduce_worker(worker, reducer)
        })?;
        let wall_ms = elapsed_ms(phase_start);
        stats.record_reduce(&per_task, wall_ms);
        if let Some(err) = self.failure.take() {
            return Err(err.context("reduce phase failed"));
        }
        info!(phase = "reduce",
              workers = stats.reduce.workers,
              partitions = stats.reduce.partitions_reduced,
              empty_partitions = stats.reduce.empty_partitions,
              total_pairs = stats.reduce.total_pairs,
              total_groups = stats.reduce.total_groups,
              total_sort_ms = stats.reduce.total_sort_ms,
              total_reduce_ms = stats.reduce.total_reduce_ms,
              min_worker_ms = stats.reduce.min_worker_ms, max_worker_ms = stats.reduce.max_worker_ms,
              wall_ms,
              "Reduce phase complete");
        Ok(())
    }

    /// Spawns `size` named threads running `work` and joins all of them.
    ///
    /// A panicking worker's panic is resumed on the calling thread after the join.
    fn run_pool<T, F>(&self, phase: &str, size: usize, work: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        let work = &work;
        thread::scope(|s| {
            let mut handles = Vec::with_capacity(size);
            let mut spawn_failed = false;
            for worker in 0..size {
                let spawned = thread::Builder::new()
                    .name(format!("mapred-{phase}-{worker}"))
                    .spawn_scoped(s, move || work(worker));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        error!(phase, worker, error = %e, "failed to spawn worker thread");
                        self.failure.record(anyhow::Error::new(e).context(format!("spawn {phase} worker {worker}")));
                        spawn_failed = true;
                        break;
                    }
                }
            }
            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.join() {
                    Ok(r) => results.push(r),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }
            if spawn_failed {
                return Err(self.failure.take().unwrap_or_else(|| anyhow::anyhow!("failed to spawn {phase} pool")));
            }
            Ok(results)
        })
    }

    fn map_worker<M: Mapper + ?Sized>(&self, worker: usize, mapper: &M, partitioner: &dyn Partitioner) -> MapTaskStats {
        let start = Instant::now();
        let emitter = Emitter::new(&self.store, partitioner, self.config.limits, &self.failure);
        let mut files = 0u64;
        while !self.failure.is_set() {
            let Some(input) = self.files.claim_next_file() else { break };
            debug!(worker, input = %input, "map task starting");
            if let Err(e) = mapper.map(&input, &emitter) {
                error!(worker, input = %input, error = %e, "map callback failed");
                self.failure.record(e.context(format!("map callback failed on input {input}")));
                break;
            }
            files += 1;
        }
        MapTaskStats { files, emits: emitter.emitted(), wall_ms: elapsed_ms(start) }
    }

    fn reduce_worker<R: Reducer + ?Sized>(&self, worker: usize, reducer: &R) -> ReduceTaskStats {
        let start = Instant::now();
        let mut stats = ReduceTaskStats::default();
        while !self.failure.is_set() {
            let Some(job) = self.jobs.claim_next() else { break };
            let mut partition = self.store.lock(job);
            if partition.is_empty() {
                stats.empty_partitions += 1;
                continue;
            }

            let outcome = group_partition(&mut partition, self.config.value_order, self.config.parallel_sort_threshold);
            debug!(worker, partition = job, pairs = outcome.pairs, groups = outcome.groups, sort_ms = outcome.sort_ms, "partition grouped");
            stats.partitions += 1;
            stats.pairs += outcome.pairs;
            stats.groups += outcome.groups;
            stats.sort_ms += outcome.sort_ms;

            let reduce_start = Instant::now();
            let (clusters, cursor) = partition.reduce_view();
            for cluster in clusters {
                let mut values = Values::new(clusters, &mut *cursor, cluster.key(), job);
                if let Err(e) = reducer.reduce(cluster.key(), &mut values, job) {
                    error!(worker, partition = job, key = cluster.key(), error = %e, "reduce callback failed");
                    self.failure.record(e.context(format!("reduce callback failed for key {:?} in partition {job}", cluster.key())));
                    break;
                }
            }
            stats.reduce_ms += elapsed_ms(reduce_start);
            partition.release_clusters();
        }
        stats.wall_ms = elapsed_ms(start);
        stats
    }
}

/// Erases the partitioner's type so [`Emitter`] can hold it as a trait object.
struct DynPartitioner<'p, P: ?Sized>(&'p P);

impl<P: Partitioner + ?Sized> Partitioner for DynPartitioner<'_, P> {
    fn partition(&self, key: &str, num_partitions: usize) -> usize {
        self.0.partition(key, num_partitions)
    }
}

/// Builder for a run: inputs plus engine configuration.
pub struct Pipeline {
    inputs: Vec<String>,
    config: EngineConfig,
}

impl Pipeline {
    pub fn new(config: EngineConfig) -> Self {
        Self { inputs: vec![], config }
    }

    pub fn add_input(&mut self, input: impl Into<String>) -> &mut Self {
        self.inputs.push(input.into());
        self
    }

    pub fn add_inputs<I, S>(&mut self, inputs: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Adds every regular file under `dir`, in path order.
    pub fn add_input_dir(&mut self, dir: impl AsRef<Path>) -> Result<&mut Self> {
        let dir = dir.as_ref();
        let files = input_files(dir).with_context(|| format!("list inputs under {}", dir.display()))?;
        self.inputs.extend(files.into_iter().map(|p| p.to_string_lossy().into_owned()));
        Ok(self)
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn map_reduce<M, R, P>(&self, mapper: &M, reducer: &R, partitioner: &P) -> Result<RunStats>
    where
        M: Mapper + ?Sized,
        R: Reducer + ?Sized,
        P: Partitioner + ?Sized,
    {
        Engine::new(self.config.clone(), self.inputs.iter().cloned())?.run(mapper, reducer, partitioner)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// One blocking map/reduce run over `inputs`.
pub fn run<I, S, M, R, P>(inputs: I, mapper: &M, reducer: &R, partitioner: &P, config: EngineConfig) -> Result<RunStats>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    M: Mapper + ?Sized,
    R: Reducer + ?Sized,
    P: Partitioner + ?Sized,
{
    Engine::new(config, inputs)?.run(mapper, reducer, partitioner)
}
