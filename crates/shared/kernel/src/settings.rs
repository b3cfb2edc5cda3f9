use fv_vault::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level settings of a FileVault host.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub vault: VaultSettings,
    pub logging: LoggingSettings,
}

/// Engine tunables as they appear in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub iterations: u32,
    pub chunk_size: usize,
    pub max_memory_pages: u32,
}

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level directive (`error`, `warn`, `info`, `debug`, `trace`).
    pub level: String,
    /// Rolling log directory; console only when absent.
    pub directory: Option<PathBuf>,
    /// JSON lines instead of plain text in the log files.
    pub json: bool,
}

impl VaultSettings {
    /// Engine configuration with these values applied over the engine defaults.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from(*self)
    }
}

impl From<VaultSettings> for EngineConfig {
    fn from(settings: VaultSettings) -> Self {
        let defaults = Self::default();
        Self {
            iterations: settings.iterations,
            chunk_size: settings.chunk_size,
            initial_memory_pages: defaults.initial_memory_pages.min(settings.max_memory_pages),
            max_memory_pages: settings.max_memory_pages,
        }
    }
}

// --- Default ---

impl Default for VaultSettings {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            iterations: engine.iterations,
            chunk_size: engine.chunk_size,
            max_memory_pages: engine.max_memory_pages,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_owned(), directory: None, json: false }
    }
}
