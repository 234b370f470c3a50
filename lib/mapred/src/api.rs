use crate::emit::Emitter;
use crate::values::Values;
use anyhow::Result;

// ========== Core MapReduce callbacks ==========

/// Map callback: invoked once per input name, depositing pairs through `emit`.
///
/// Called concurrently from every mapper thread, with no engine lock held.
pub trait Mapper: Sync {
    fn map(&self, input: &str, emit: &Emitter<'_>) -> Result<()>;
}

impl<F> Mapper for F
where
    F: Fn(&str, &Emitter<'_>) -> Result<()> + Sync,
{
    fn map(&self, input: &str, emit: &Emitter<'_>) -> Result<()> {
        self(input, emit)
    }
}

/// Reduce callback: invoked once per distinct key of a partition, in ascending key order.
///
/// The partition's lock is held for the duration of the call, so invocations for one
/// partition are serialized while different partitions reduce in parallel.
pub trait Reducer: Sync {
    fn reduce(&self, key: &str, values: &mut Values<'_>, partition: usize) -> Result<()>;
}

impl<F> Reducer for F
where
    F: Fn(&str, &mut Values<'_>, usize) -> Result<()> + Sync,
{
    fn reduce(&self, key: &str, values: &mut Values<'_>, partition: usize) -> Result<()> {
        self(key, values, partition)
    }
}
