use std::str::FromStr;
use tracing::warn;

pub fn env_var_truthy(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.to_ascii_lowercase();
            v == "1" || v == "true" || v == "yes" || v == "on"
        }
        Err(_) => false,
    }
}

/// Parses an environment variable, ignoring it (with a warning) when it does not parse.
pub fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

pub fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        std::env::set_var("MAPRED_TEST_TRUTHY_A", "Yes");
        std::env::set_var("MAPRED_TEST_TRUTHY_B", "0");
        assert!(env_var_truthy("MAPRED_TEST_TRUTHY_A"));
        assert!(!env_var_truthy("MAPRED_TEST_TRUTHY_B"));
        assert!(!env_var_truthy("MAPRED_TEST_TRUTHY_UNSET"));
    }

    #[test]
    fn parse_ignores_garbage() {
        std::env::set_var("MAPRED_TEST_PARSE_OK", " 12 ");
        std::env::set_var("MAPRED_TEST_PARSE_BAD", "twelve");
        assert_eq!(env_parse::<usize>("MAPRED_TEST_PARSE_OK"), Some(12));
        assert_eq!(env_parse::<usize>("MAPRED_TEST_PARSE_BAD"), None);
        assert_eq!(env_parse::<usize>("MAPRED_TEST_PARSE_UNSET"), None);
    }
}
