use anyhow::{Context, Result};
use infisweep_core::CELL_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "infisweep.toml";

pub const TILES_FILE: &str = "revealed.jsonl";
pub const SESSION_FILE: &str = "session.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the revealed tiles and the session config live.
    pub data_dir: PathBuf,
    pub cell_size: f64,
    /// Screen size in pixels used by `click` and `view`.
    pub view_width: f64,
    pub view_height: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".infisweep"),
            cell_size: CELL_SIZE,
            view_width: 640.0,
            view_height: 320.0,
        }
    }
}

impl Settings {
    /// Reads `path`, or the default config file if it exists, or falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings from {}", path.display()))?;
        let settings = Self::from_toml(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        log::debug!("Loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)?;
        anyhow::ensure!(
            settings.cell_size.is_finite() && settings.cell_size > 0.0,
            "cell_size must be a positive number, got {}",
            settings.cell_size
        );
        Ok(settings)
    }

    pub fn tiles_path(&self) -> PathBuf {
        self.data_dir.join(TILES_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let settings = Settings::from_toml("view_width = 800.0").unwrap();

        assert_eq!(settings.view_width, 800.0);
        assert_eq!(settings.cell_size, CELL_SIZE);
        assert_eq!(settings.data_dir, PathBuf::from(".infisweep"));
    }

    #[test]
    fn full_file() {
        let settings = Settings::from_toml(
            r#"
            data_dir = "/tmp/sweep"
            cell_size = 24.0
            view_width = 480.0
            view_height = 240.0
            "#,
        )
        .unwrap();

        assert_eq!(settings.tiles_path(), PathBuf::from("/tmp/sweep/revealed.jsonl"));
        assert_eq!(settings.session_path(), PathBuf::from("/tmp/sweep/session.json"));
        assert_eq!(settings.cell_size, 24.0);
    }

    #[test]
    fn rejects_bad_cell_size() {
        assert!(Settings::from_toml("cell_size = 0.0").is_err());
        assert!(Settings::from_toml("cell_size = -3.0").is_err());
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();

        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn loads_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infisweep.toml");
        fs::write(&path, "view_height = 100.0\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();

        assert_eq!(settings.view_height, 100.0);
    }
}
