use crate::constants::*;
use crate::error::{MrError, MrResult, TextKind};
use crate::utils::{env_parse, env_var_truthy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// What happens to a key or value longer than its limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// `emit` fails with [`MrError::TextTooLong`].
    #[default]
    Reject,
    /// The text is cut at the last UTF-8 character boundary that fits.
    Truncate,
}

/// Order in which a reducer sees the values of one key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueOrder {
    /// Values come back in the order they were stored in the partition.
    #[default]
    Emission,
    /// Last stored value first, as produced by a partition that prepends each pair.
    ReverseEmission,
}

impl FromStr for ValueOrder {
    type Err = MrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emission" => Ok(ValueOrder::Emission),
            "reverse_emission" | "reverse" => Ok(ValueOrder::ReverseEmission),
            other => Err(MrError::InvalidConfig(format!("unknown value order {other:?}"))),
        }
    }
}

/// Byte limits on emitted keys and values.
///
/// Lengths are measured in UTF-8 bytes and exclude any terminator. Nothing is ever
/// truncated unless `overflow` is [`OverflowPolicy::Truncate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLimits {
    pub max_key_bytes: usize,
    pub max_value_bytes: usize,
    pub overflow: OverflowPolicy,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            max_key_bytes: DEFAULT_MAX_KEY_BYTES,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            overflow: OverflowPolicy::Reject,
        }
    }
}

impl TextLimits {
    pub fn new(max_key_bytes: usize, max_value_bytes: usize, overflow: OverflowPolicy) -> Self {
        Self { max_key_bytes, max_value_bytes, overflow }
    }

    /// Limits matching 16-byte fixed buffers: 15 bytes of text, truncated beyond that.
    pub fn fixed_buffer() -> Self {
        Self::new(FIXED_BUFFER_TEXT_BYTES, FIXED_BUFFER_TEXT_BYTES, OverflowPolicy::Truncate)
    }

    pub fn limit(&self, kind: TextKind) -> usize {
        match kind {
            TextKind::Key => self.max_key_bytes,
            TextKind::Value => self.max_value_bytes,
        }
    }

    /// Returns the text that will be stored for `text`, or the rejection.
    pub fn apply<'t>(&self, kind: TextKind, text: &'t str) -> MrResult<&'t str> {
        let limit = self.limit(kind);
        if text.len() <= limit {
            return Ok(text);
        }
        match self.overflow {
            OverflowPolicy::Reject => Err(MrError::TextTooLong { kind, len: text.len(), limit }),
            OverflowPolicy::Truncate => Ok(truncate_at_boundary(text, limit)),
        }
    }
}

fn truncate_at_boundary(text: &str, limit: usize) -> &str {
    let mut end = limit.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Everything one run needs besides its inputs and callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub num_mappers: usize,
    pub num_reducers: usize,
    pub num_partitions: usize,
    pub limits: TextLimits,
    pub value_order: ValueOrder,
    /// Partitions with at least this many pairs are sorted on the rayon pool.
    pub parallel_sort_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            num_mappers: cpus,
            num_reducers: cpus,
            num_partitions: DEFAULT_NUM_PARTITIONS,
            limits: TextLimits::default(),
            value_order: ValueOrder::default(),
            parallel_sort_threshold: DEFAULT_PARALLEL_SORT_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn new(num_mappers: usize, num_reducers: usize, num_partitions: usize) -> Self {
        Self { num_mappers, num_reducers, num_partitions, ..Self::default() }
    }

    /// Defaults overridden by `MAPRED_*` environment variables.
    pub fn from_env() -> MrResult<Self> {
        let mut config = Self::default();
        if let Some(n) = env_parse(ENV_NUM_MAPPERS) { config.num_mappers = n; }
        if let Some(n) = env_parse(ENV_NUM_REDUCERS) { config.num_reducers = n; }
        if let Some(n) = env_parse(ENV_NUM_PARTITIONS) { config.num_partitions = n; }
        if let Some(n) = env_parse(ENV_MAX_KEY_BYTES) { config.limits.max_key_bytes = n; }
        if let Some(n) = env_parse(ENV_MAX_VALUE_BYTES) { config.limits.max_value_bytes = n; }
        if env_var_truthy(ENV_TRUNCATE_TEXT) { config.limits.overflow = OverflowPolicy::Truncate; }
        if let Ok(order) = std::env::var(ENV_VALUE_ORDER) { config.value_order = order.parse()?; }
        if let Some(n) = env_parse(ENV_PARALLEL_SORT_THRESHOLD) { config.parallel_sort_threshold = n; }
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON config file; absent fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: EngineConfig = serde_json::from_str(&contents)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_limits(mut self, limits: TextLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_value_order(mut self, value_order: ValueOrder) -> Self {
        self.value_order = value_order;
        self
    }

    pub fn with_parallel_sort_threshold(mut self, threshold: usize) -> Self {
        self.parallel_sort_threshold = threshold;
        self
    }

    pub fn validate(&self) -> MrResult<()> {
        let checks = [
            (self.num_mappers, "num_mappers"),
            (self.num_reducers, "num_reducers"),
            (self.num_partitions, "num_partitions"),
            (self.limits.max_key_bytes, "limits.max_key_bytes"),
            (self.limits.max_value_bytes, "limits.max_value_bytes"),
        ];
        for (value, name) in checks {
            if value == 0 {
                return Err(MrError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_policy_reports_length() {
        let limits = TextLimits::new(3, 5, OverflowPolicy::Reject);
        assert_eq!(limits.apply(TextKind::Key, "abc"), Ok("abc"));
        assert_eq!(
            limits.apply(TextKind::Key, "abcd"),
            Err(MrError::TextTooLong { kind: TextKind::Key, len: 4, limit: 3 })
        );
        assert_eq!(limits.apply(TextKind::Value, "abcd"), Ok("abcd"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let limits = TextLimits::new(4, 4, OverflowPolicy::Truncate);
        assert_eq!(limits.apply(TextKind::Key, "abcdef"), Ok("abcd"));
        // "é" is two bytes; cutting at byte 4 would split the second one
        assert_eq!(limits.apply(TextKind::Key, "aéé"), Ok("aé"));
    }

    #[test]
    fn fixed_buffer_keeps_fifteen_bytes() {
        let limits = TextLimits::fixed_buffer();
        let long = "0123456789abcdefXYZ";
        assert_eq!(limits.apply(TextKind::Value, long), Ok("0123456789abcde"));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(EngineConfig::new(1, 1, 1).validate().is_ok());
        let err = EngineConfig::new(1, 0, 4).validate().unwrap_err();
        assert_eq!(err, MrError::InvalidConfig("num_reducers must be at least 1".into()));
        let config = EngineConfig::new(1, 1, 1).with_limits(TextLimits::new(0, 1, OverflowPolicy::Reject));
        assert!(config.validate().is_err());
    }

    #[test]
    fn value_order_parses() {
        assert_eq!("Emission".parse::<ValueOrder>(), Ok(ValueOrder::Emission));
        assert_eq!("reverse_emission".parse::<ValueOrder>(), Ok(ValueOrder::ReverseEmission));
        assert!("sideways".parse::<ValueOrder>().is_err());
    }

    #[test]
    fn from_env_applies_overrides_and_rejects_bad_ones() {
        let vars = [
            (ENV_NUM_MAPPERS, "3"),
            (ENV_NUM_REDUCERS, "2"),
            (ENV_NUM_PARTITIONS, "8"),
            (ENV_MAX_KEY_BYTES, "32"),
            (ENV_MAX_VALUE_BYTES, "64"),
            (ENV_TRUNCATE_TEXT, "yes"),
            (ENV_VALUE_ORDER, "reverse"),
            (ENV_PARALLEL_SORT_THRESHOLD, "100"),
        ];
        for (name, value) in vars {
            std::env::set_var(name, value);
        }
        let config = EngineConfig::from_env().unwrap();
        assert_eq!((config.num_mappers, config.num_reducers, config.num_partitions), (3, 2, 8));
        assert_eq!(config.limits, TextLimits::new(32, 64, OverflowPolicy::Truncate));
        assert_eq!(config.value_order, ValueOrder::ReverseEmission);
        assert_eq!(config.parallel_sort_threshold, 100);

        std::env::set_var(ENV_VALUE_ORDER, "sideways");
        assert_eq!(
            EngineConfig::from_env(),
            Err(MrError::InvalidConfig("unknown value order \"sideways\"".into()))
        );

        std::env::set_var(ENV_VALUE_ORDER, "emission");
        std::env::set_var(ENV_NUM_PARTITIONS, "0");
        assert_eq!(
            EngineConfig::from_env(),
            Err(MrError::InvalidConfig("num_partitions must be at least 1".into()))
        );

        // unparsable numbers fall back to defaults
        std::env::set_var(ENV_NUM_PARTITIONS, "many");
        assert_eq!(EngineConfig::from_env().unwrap().num_partitions, DEFAULT_NUM_PARTITIONS);

        for (name, _) in vars {
            std::env::remove_var(name);
        }
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(
            &path,
            r#"{"num_mappers": 3, "num_partitions": 8, "value_order": "reverse_emission", "limits": {"overflow": "truncate"}}"#,
        )
        .unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.num_mappers, 3);
        assert_eq!(config.num_partitions, 8);
        assert_eq!(config.value_order, ValueOrder::ReverseEmission);
        assert_eq!(config.limits.overflow, OverflowPolicy::Truncate);
        assert_eq!(config.limits.max_key_bytes, DEFAULT_MAX_KEY_BYTES);
        assert_eq!(config.num_reducers, EngineConfig::default().num_reducers);
    }

    #[test]
    fn load_rejects_zero_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"num_partitions": 0}"#).unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<MrError>(), Some(MrError::InvalidConfig(_))));
    }
}
