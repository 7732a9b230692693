use std::path::PathBuf;

use crate::domain::{EngineConfig, EngineError};

/// Configuration store port for loading and persisting engine configuration.
pub trait ConfigStore: Send + Sync {
    /// Load configuration from persistent storage.
    /// Creates default config if none exists.
    fn load(&self) -> Result<EngineConfig, EngineError>;

    /// Save configuration to persistent storage.
    fn save(&self, config: &EngineConfig) -> Result<(), EngineError>;

    /// Get the path to the configuration file.
    fn config_path(&self) -> PathBuf;

    /// Get the path to the engine data directory.
    fn data_dir(&self) -> PathBuf;

    /// Get the path to the logs directory.
    fn logs_dir(&self) -> PathBuf;
}
