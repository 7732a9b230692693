use std::path::PathBuf;
use std::{fs, io};

use tracing::{debug, info, warn};

use crate::domain::{EngineConfig, EngineError};
use crate::ports::ConfigStore;

/// Levels the logging filter accepts.
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// TOML-based configuration store with OS-specific paths.
pub struct TomlConfigStore {
    data_dir: PathBuf,
}

impl TomlConfigStore {
    /// Create a store rooted in the OS application data directory.
    pub fn new() -> Result<Self, EngineError> {
        let data_dir = Self::resolve_data_dir()?;
        fs::create_dir_all(&data_dir)?;

        info!(data_dir = ?data_dir, "ConfigStore initialized");
        Ok(Self { data_dir })
    }

    fn resolve_data_dir() -> Result<PathBuf, EngineError> {
        #[cfg(target_os = "macos")]
        let base = dirs::data_dir().map(|p| p.join("Unheard"));

        #[cfg(not(target_os = "macos"))]
        let base = dirs::config_dir().map(|p| p.join("unheard"));

        base.ok_or_else(|| {
            EngineError::Config("Could not find application data directory".to_string())
        })
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<EngineConfig, EngineError> {
        let path = self.config_path();

        let mut config: EngineConfig = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = ?path, "No configuration on disk, bootstrapping defaults");
                let defaults = EngineConfig::new();
                self.save(&defaults)?;
                return Ok(defaults);
            }
            Err(e) => return Err(e.into()),
        };

        // An unrecognized level would end up inside the tracing filter
        // string and silence the engine's own diagnostics; fall back
        // instead of propagating it.
        if !LEVELS.contains(&config.logging.level.as_str()) {
            warn!(
                level = %config.logging.level,
                "Unknown log level in configuration, using \"info\""
            );
            config.logging.level = "info".to_string();
        }

        debug!(path = ?path, device = ?config.output.device, "Configuration loaded");
        Ok(config)
    }

    fn save(&self, config: &EngineConfig) -> Result<(), EngineError> {
        // data_dir exists from construction; the file sits directly in it.
        let body = toml::to_string_pretty(config)?;
        let content = format!("# unheard engine configuration\n{body}");
        fs::write(self.config_path(), content)?;

        debug!(path = ?self.config_path(), "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
