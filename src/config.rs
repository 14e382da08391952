use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{FidlyGridError, Result};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TIMER_TICK_MILLIS: u64 = 1000;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub theme_path: String,
    pub timer_tick_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::convention_defaults()
    }
}

impl Config {
    pub fn convention_defaults() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db_path: crate::runtime_paths::default_db_path(),
            theme_path: crate::runtime_paths::default_theme_path(),
            timer_tick_millis: DEFAULT_TIMER_TICK_MILLIS,
        }
    }

    /// Reads a JSON config file. Missing keys fall back to convention defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            FidlyGridError::Config(format!("failed to read {}: {e}", path.to_string_lossy()))
        })?;
        let config: Config =
            serde_json::from_str(&raw).map_err(|e| FidlyGridError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self> {
        if self.host.trim().is_empty() {
            return Err(FidlyGridError::Config("host cannot be empty".to_string()));
        }
        if self.db_path.trim().is_empty() {
            return Err(FidlyGridError::Config("db_path cannot be empty".to_string()));
        }
        if self.theme_path.trim().is_empty() {
            return Err(FidlyGridError::Config(
                "theme_path cannot be empty".to_string(),
            ));
        }
        if self.timer_tick_millis == 0 {
            return Err(FidlyGridError::Config(
                "timer_tick_millis must be positive".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
