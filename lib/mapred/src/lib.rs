//! Multi-threaded, in-process MapReduce.
//!
//! A run hands its input names to a pool of mapper threads. Each map callback emits
//! key/value pairs, which land in one of a fixed number of independently locked
//! partitions. Once every mapper has joined, a pool of reducer threads claims the
//! partitions one by one, sorts and groups each by key, and calls the reduce callback
//! once per distinct key with a forward-only [`Values`] iterator.

pub mod api;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod emit;
pub mod error;
pub mod io;
pub mod partitioner;
pub mod runtime;
pub mod sort;
pub mod stats;
pub mod store;
pub mod utils;
pub mod values;

pub use api::{Mapper, Reducer};
pub use config::{EngineConfig, OverflowPolicy, TextLimits, ValueOrder};
pub use emit::Emitter;
pub use error::{MrError, MrResult, TextKind};
pub use partitioner::{HashPartitioner, Partitioner, SortedPartitioner};
pub use runtime::{run, Engine, Pipeline};
pub use stats::RunStats;
pub use values::Values;
