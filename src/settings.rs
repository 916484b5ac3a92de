use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{FiscoError, Result};

/// Conventional file names inside the data directory, matching the ETL
/// output layout.
pub const FEDERAL_DB: &str = "tributos.db";
pub const ENTITIES_XLSX: &str = "arrecadacao_cnae.xlsx";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fisco")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("base_de_dados")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FiscoError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

/// Data directory for this invocation: the `--data-dir` flag wins over the
/// settings file.
pub fn resolve_data_dir(flag: &Option<String>) -> PathBuf {
    match flag {
        Some(dir) => PathBuf::from(shellexpand_path(dir)),
        None => PathBuf::from(&load_settings().data_dir),
    }
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/dados".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/dados");
    }

    #[test]
    fn test_default_points_at_home() {
        let s = Settings::default();
        assert!(s.data_dir.ends_with("base_de_dados"));
    }

    #[test]
    fn test_flag_overrides_settings() {
        let resolved = resolve_data_dir(&Some("/tmp/override".to_string()));
        assert_eq!(resolved, PathBuf::from("/tmp/override"));
    }
}
