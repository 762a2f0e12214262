//! Configuration management for DictStore
//!
//! Provides deployment-profile presets for different hardware classes,
//! the property sources the override flags are read from, and the
//! interning table tuning knobs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DictError, DictResult};
use crate::factory::Strategy;

/// Force key/value compression on (`true`) or off (`false`)
pub const KEY_COMPRESS: &str = "dictstore.compress";
/// Select a strategy by name: `plain`, `value-compact` or `compressed`
pub const KEY_STRATEGY: &str = "dictstore.strategy";
/// Deployment profile: `standard` or `memory-optimized`
pub const KEY_PROFILE: &str = "dictstore.profile";
/// Number of interning table shards (power of two)
pub const KEY_INTERN_SHARDS: &str = "dictstore.intern.shards";
/// Insertions between full sweeps of the interning table
pub const KEY_INTERN_SWEEP_INTERVAL: &str = "dictstore.intern.sweep_interval";

/// Largest accepted interning table shard count
pub const MAX_SHARDS: usize = 1024;

/// Deployment profile used when no explicit override is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Plenty of memory: favour lookup speed
    #[default]
    Standard,
    /// Memory-constrained deployment: favour footprint
    MemoryOptimized,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "server" => Ok(Profile::Standard),
            "memory-optimized" | "memory_optimized" | "low-memory" | "phone" | "budget" => {
                Ok(Profile::MemoryOptimized)
            }
            other => Err(format!("unknown profile `{}`", other)),
        }
    }
}

/// Interning table tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternerConfig {
    /// Independently locked shards
    pub shards: usize,
    /// Run a full sweep of dead entries after this many insertions
    pub sweep_interval: u64,
}

impl Default for InternerConfig {
    fn default() -> Self {
        Self { shards: 16, sweep_interval: 64 * 1024 }
    }
}

/// DictStore configuration with deployment profile presets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Profile deciding the default strategy
    pub profile: Profile,
    /// Explicit compression override; wins over the profile
    pub compress: Option<bool>,
    /// Explicit strategy; wins over `compress` and the profile
    pub strategy: Option<Strategy>,
    /// Interning table tuning for tables built from this config
    pub interner: InternerConfig,
}

impl Config {
    /// Server-class: memory is plentiful, keep everything as plain text
    pub fn server() -> Self {
        Self {
            profile: Profile::Standard,
            compress: None,
            strategy: None,
            interner: InternerConfig { shards: 32, sweep_interval: 256 * 1024 },
        }
    }

    /// Phone-class: compress keys and values
    pub fn phone() -> Self {
        Self {
            profile: Profile::MemoryOptimized,
            compress: None,
            strategy: None,
            interner: InternerConfig { shards: 8, sweep_interval: 32 * 1024 },
        }
    }

    /// Budget-class: compress, and expunge dead interned nodes eagerly
    pub fn budget() -> Self {
        Self {
            profile: Profile::MemoryOptimized,
            compress: None,
            strategy: None,
            interner: InternerConfig { shards: 4, sweep_interval: 8 * 1024 },
        }
    }

    /// Preset for a profile.
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Standard => Self::server(),
            Profile::MemoryOptimized => Self::phone(),
        }
    }

    /// Read configuration from a property source.
    ///
    /// Missing keys keep the profile preset. Values that do not parse are
    /// logged and ignored; this never fails.
    pub fn from_source(source: &dyn PropertySource) -> Self {
        let profile = parse_property(source, KEY_PROFILE, |v| v.parse::<Profile>()).unwrap_or_default();
        let mut config = Self::for_profile(profile);

        config.compress = parse_property(source, KEY_COMPRESS, parse_bool);
        config.strategy = parse_property(source, KEY_STRATEGY, |v| v.parse::<Strategy>());
        if let Some(shards) = parse_property(source, KEY_INTERN_SHARDS, parse_shards) {
            config.interner.shards = shards;
        }
        if let Some(interval) = parse_property(source, KEY_INTERN_SWEEP_INTERVAL, parse_sweep_interval) {
            config.interner.sweep_interval = interval;
        }
        config
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> DictResult<()> {
        let shards = self.interner.shards;
        if !valid_shards(shards) {
            return Err(DictError::InvalidConfig {
                key: KEY_INTERN_SHARDS,
                reason: format!("{} is not a power of two in [1, {}]", shards, MAX_SHARDS),
            });
        }
        if self.interner.sweep_interval == 0 {
            return Err(DictError::InvalidConfig {
                key: KEY_INTERN_SWEEP_INTERVAL,
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::server()
    }
}

fn valid_shards(shards: usize) -> bool {
    shards.is_power_of_two() && shards <= MAX_SHARDS
}

fn parse_shards(value: &str) -> Result<usize, String> {
    let shards = value.parse::<usize>().map_err(|e| e.to_string())?;
    if valid_shards(shards) {
        Ok(shards)
    } else {
        Err(format!("{} is not a power of two in [1, {}]", shards, MAX_SHARDS))
    }
}

fn parse_sweep_interval(value: &str) -> Result<u64, String> {
    match value.parse::<u64>().map_err(|e| e.to_string())? {
        0 => Err("must be > 0".into()),
        interval => Ok(interval),
    }
}

/// Strict boolean: `true` or `false`, case-insensitive.
fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("`{}` is not a boolean", other)),
    }
}

fn parse_property<T, E: std::fmt::Display>(
    source: &dyn PropertySource,
    key: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Option<T> {
    let raw = source.get(key)?;
    match parse(raw.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable property: {}", e);
            None
        }
    }
}

/// Somewhere configuration properties can be read from.
pub trait PropertySource {
    /// Raw value for `key`, if set.
    fn get(&self, key: &str) -> Option<String>;
}

impl PropertySource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Process environment. `dictstore.intern.shards` is read from
/// `DICTSTORE_INTERN_SHARDS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl EnvSource {
    /// Environment variable name for a property key.
    pub fn var_name(key: &str) -> String {
        key.to_ascii_uppercase().replace('.', "_")
    }
}

impl PropertySource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(Self::var_name(key)).ok()
    }
}

/// A parsed `.properties` file.
///
/// Supports `key=value` and `key: value` lines; lines starting with
/// `#` or `!` are comments.
#[derive(Debug, Clone, Default)]
pub struct PropertiesFile {
    path: Option<PathBuf>,
    entries: HashMap<String, String>,
}

impl PropertiesFile {
    /// Read and parse a properties file.
    pub fn open<P: AsRef<Path>>(path: P) -> DictResult<Self> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path).map_err(|source| DictError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loading dictstore properties");
        let mut file = Self::parse(&text);
        file.path = Some(path);
        Ok(file)
    }

    /// Parse properties text.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                let split = line.find(|c: char| c == '=' || c == ':')?;
                let (key, value) = line.split_at(split);
                Some((key.trim().to_string(), value[1..].trim().to_string()))
            })
            .collect();
        Self { path: None, entries }
    }

    /// File this was read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no properties were found.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PropertySource for PropertiesFile {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}
