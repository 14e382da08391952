//! `theme.json` on disk. Only `appearance` is managed here; every other key in
//! the document is carried through untouched.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use crate::error::{FidlyGridError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Light,
    Dark,
}

impl FromStr for Appearance {
    type Err = FidlyGridError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(FidlyGridError::InvalidInput(
                "Invalid theme value".to_string(),
            )),
        }
    }
}

impl fmt::Display for Appearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Dark => "dark",
        })
    }
}

pub fn default_theme() -> Value {
    json!({
        "variant": "professional",
        "primary": "hsl(222.2 47.4% 11.2%)",
        "appearance": "light",
        "radius": 0.5
    })
}

pub struct ThemeStore {
    path: PathBuf,
    // Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn load(&self) -> Result<Value> {
        let _guard = self.lock.lock().await;
        read_document(&self.path)
    }

    pub async fn set_appearance(&self, appearance: Appearance) -> Result<Value> {
        let _guard = self.lock.lock().await;
        let mut document = match read_document(&self.path)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        document.insert(
            "appearance".to_string(),
            Value::String(appearance.to_string()),
        );
        let document = Value::Object(document);
        write_document(&self.path, &document)?;
        tracing::info!(appearance = %appearance, "Updated theme");
        Ok(document)
    }
}

fn read_document(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(default_theme());
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        FidlyGridError::Runtime(format!("failed to read {}: {e}", path.to_string_lossy()))
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_document(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| FidlyGridError::Runtime(e.to_string()))?;
    }
    let pretty = serde_json::to_string_pretty(document)?;
    fs::write(path, pretty).map_err(|e| {
        FidlyGridError::Runtime(format!("failed to write {}: {e}", path.to_string_lossy()))
    })
}
