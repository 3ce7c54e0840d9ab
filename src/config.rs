//! JIT configuration.
//!
//! The configuration is read once when the engine is initialized and never
//! changes afterwards. It can be built in code, read from `OTTER_JIT_*`
//! environment variables, or (with the `toml-config` feature) loaded from a
//! TOML file.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CALL_THRESHOLD: u32 = 10_000;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;
pub const MAX_VERBOSITY: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitConfig {
    pub enabled: bool,
    /// Number of calls before a method is compiled.
    pub call_threshold: u32,
    /// Maximum number of resident compiled methods; 0 means unbounded.
    pub max_cache_size: usize,
    /// Compile on the calling thread and block until done. For testing.
    pub wait: bool,
    /// Start paused until `resume` is called.
    pub pause: bool,
    /// 0 = quiet, 1 = compile events, 2 = every state transition.
    pub verbose: u8,
    /// Collect compile and VM usage counters.
    pub stats: bool,
    /// Keep the artifact directory after shutdown.
    pub save_temps: bool,
    /// Ask the generator for unoptimized code with debug info.
    pub debug: bool,
    /// Extra flags forwarded verbatim to the generator.
    pub debug_flags: Option<String>,
    /// Use the registered custom compiler instead of the default one.
    pub custom: bool,
    pub dump_disasm: bool,
    /// Parent directory for the artifact directory; system temp if unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            call_threshold: DEFAULT_CALL_THRESHOLD,
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            wait: false,
            pause: false,
            verbose: 0,
            stats: false,
            save_temps: false,
            debug: false,
            debug_flags: None,
            custom: false,
            dump_disasm: false,
            temp_dir: None,
        }
    }
}

impl JitConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from `OTTER_JIT_*` keys resolved by `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        read_into(&lookup, "OTTER_JIT_ENABLED", &mut config.enabled, parse_bool)?;
        read_into(
            &lookup,
            "OTTER_JIT_CALL_THRESHOLD",
            &mut config.call_threshold,
            parse_number,
        )?;
        read_into(
            &lookup,
            "OTTER_JIT_MAX_CACHE_SIZE",
            &mut config.max_cache_size,
            parse_number,
        )?;
        read_into(&lookup, "OTTER_JIT_WAIT", &mut config.wait, parse_bool)?;
        read_into(&lookup, "OTTER_JIT_PAUSE", &mut config.pause, parse_bool)?;
        read_into(&lookup, "OTTER_JIT_VERBOSE", &mut config.verbose, parse_number)?;
        read_into(&lookup, "OTTER_JIT_STATS", &mut config.stats, parse_bool)?;
        read_into(&lookup, "OTTER_JIT_SAVE_TEMPS", &mut config.save_temps, parse_bool)?;
        read_into(&lookup, "OTTER_JIT_DEBUG", &mut config.debug, parse_bool)?;
        read_into(&lookup, "OTTER_JIT_CUSTOM", &mut config.custom, parse_bool)?;
        read_into(
            &lookup,
            "OTTER_JIT_DUMP_DISASM",
            &mut config.dump_disasm,
            parse_bool,
        )?;
        if let Some(flags) = lookup("OTTER_JIT_DEBUG_FLAGS") {
            config.debug_flags = Some(flags);
        }
        if let Some(dir) = lookup("OTTER_JIT_TEMP_DIR") {
            config.temp_dir = Some(PathBuf::from(dir));
        }
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let config: Self = toml::from_str(source).context("failed to parse JIT configuration")?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml-config")]
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_threshold == 0 {
            return Err(ConfigError::ZeroCallThreshold);
        }
        if self.verbose > MAX_VERBOSITY {
            return Err(ConfigError::InvalidVerbosity(self.verbose));
        }
        Ok(())
    }

    pub fn cache_is_bounded(&self) -> bool {
        self.max_cache_size > 0
    }
}

fn read_into<F, T>(
    lookup: &F,
    key: &'static str,
    slot: &mut T,
    parse: fn(&str) -> Option<T>,
) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(());
    };
    *slot = parse(raw.trim()).ok_or(ConfigError::InvalidValue { key, value: raw })?;
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number<T: FromStr>(raw: &str) -> Option<T> {
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = JitConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.call_threshold, DEFAULT_CALL_THRESHOLD);
        assert!(config.cache_is_bounded());
    }

    #[test]
    fn reads_environment_overrides() {
        let config = JitConfig::from_lookup(lookup_from(&[
            ("OTTER_JIT_CALL_THRESHOLD", "5"),
            ("OTTER_JIT_MAX_CACHE_SIZE", "0"),
            ("OTTER_JIT_WAIT", "true"),
            ("OTTER_JIT_VERBOSE", "2"),
            ("OTTER_JIT_DEBUG_FLAGS", "-g3"),
        ]))
        .unwrap();

        assert_eq!(config.call_threshold, 5);
        assert!(!config.cache_is_bounded());
        assert!(config.wait);
        assert_eq!(config.verbose, 2);
        assert_eq!(config.debug_flags.as_deref(), Some("-g3"));
    }

    #[test]
    fn rejects_bad_values() {
        let err = JitConfig::from_lookup(lookup_from(&[("OTTER_JIT_WAIT", "maybe")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "OTTER_JIT_WAIT",
                value: "maybe".into()
            }
        );

        let err =
            JitConfig::from_lookup(lookup_from(&[("OTTER_JIT_CALL_THRESHOLD", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroCallThreshold);

        let err = JitConfig::from_lookup(lookup_from(&[("OTTER_JIT_VERBOSE", "3")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidVerbosity(3));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn parses_toml() {
        let config = JitConfig::from_toml_str("call_threshold = 3\nstats = true\n").unwrap();
        assert_eq!(config.call_threshold, 3);
        assert!(config.stats);
        assert_eq!(config.max_cache_size, DEFAULT_MAX_CACHE_SIZE);
    }
}
