//! Runtime configuration types.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::vm::Heap;

/// Runtime configuration for the VM. Loadable from a TOML file; every field
/// has a default, so a partial file is fine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Whether GC is enabled (default: true)
    pub gc_enabled: bool,
    /// Print GC statistics after a run
    pub gc_stats: bool,
    /// Hard limit on heap size in bytes (None = unlimited)
    pub heap_limit: Option<usize>,
    /// Bytes allocated before the first collection; doubles with the live
    /// set after each cycle, never dropping below this floor
    pub gc_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gc_enabled: true,
            gc_stats: false,
            heap_limit: None,
            gc_threshold: Heap::DEFAULT_GC_THRESHOLD,
        }
    }
}

impl RuntimeConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&text).map_err(ConfigError::Parse)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}
