// Rendering configuration. Defaults match the behaviour callers expect from a
// terminal; `from_env` lets CI or scripted runs adjust them without code.

use std::time::Duration;

use crate::screenbuf::DEFAULT_WIDTH;
use crate::spinner::TICK_INTERVAL;

/// Milliseconds between spinner frames.
pub const TICK_ENV: &str = "CWS_TICK_MS";
/// Any non-empty value disables wrapping.
pub const NO_WRAP_ENV: &str = "CWS_NO_WRAP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tick_interval: Duration,
    pub fallback_width: u16,
    pub wrap: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_interval: TICK_INTERVAL,
            fallback_width: DEFAULT_WIDTH,
            wrap: true,
        }
    }
}

impl Config {
    /// Build a config from the process environment, falling back to the
    /// defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let tick_interval = lookup(TICK_ENV)
            .and_then(|ms| ms.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick_interval);
        let wrap = lookup(NO_WRAP_ENV).map_or(defaults.wrap, |value| value.is_empty());
        Config {
            tick_interval,
            wrap,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(config(&[]), Config::default());
        assert_eq!(Config::default().tick_interval, Duration::from_millis(25));
    }

    #[test]
    fn reads_tick_and_wrap() {
        let config = config(&[(TICK_ENV, "100"), (NO_WRAP_ENV, "1")]);
        assert_eq!(config.tick_interval, Duration::from_millis(100));
        assert!(!config.wrap);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config(&[(TICK_ENV, "soon"), (NO_WRAP_ENV, "")]);
        assert_eq!(config.tick_interval, TICK_INTERVAL);
        assert!(config.wrap);
        assert_eq!(self::config(&[(TICK_ENV, "0")]).tick_interval, TICK_INTERVAL);
    }
}
