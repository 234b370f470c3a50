//! Centralized environment variable names and default values for engine tuning.

// Environment variable names
pub const ENV_NUM_MAPPERS: &str = "MAPRED_NUM_MAPPERS";
pub const ENV_NUM_REDUCERS: &str = "MAPRED_NUM_REDUCERS";
pub const ENV_NUM_PARTITIONS: &str = "MAPRED_NUM_PARTITIONS";
pub const ENV_MAX_KEY_BYTES: &str = "MAPRED_MAX_KEY_BYTES";
pub const ENV_MAX_VALUE_BYTES: &str = "MAPRED_MAX_VALUE_BYTES";
/// Truthy value switches oversized keys/values from rejection to truncation.
pub const ENV_TRUNCATE_TEXT: &str = "MAPRED_TRUNCATE_TEXT";
/// `emission` or `reverse_emission`
pub const ENV_VALUE_ORDER: &str = "MAPRED_VALUE_ORDER";
pub const ENV_PARALLEL_SORT_THRESHOLD: &str = "MAPRED_PARALLEL_SORT_THRESHOLD";

// Defaults
pub const DEFAULT_NUM_PARTITIONS: usize = 16;
pub const DEFAULT_MAX_KEY_BYTES: usize = 256;
pub const DEFAULT_MAX_VALUE_BYTES: usize = 4096;
/// Text capacity of a 16-byte buffer that keeps one byte for a terminator.
pub const FIXED_BUFFER_TEXT_BYTES: usize = 15;
// Below this many pairs a partition sorts on the reducer thread alone
pub const DEFAULT_PARALLEL_SORT_THRESHOLD: usize = 64 * 1024;
