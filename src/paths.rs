//! Filesystem locations of config, data and the media store.
//!
//! Resolution order for both directories:
//! 1. `--config-dir` CLI argument
//! 2. `FRAMECUT_CONFIG_DIR` environment variable
//! 3. current directory, if it already holds a `framecut.json` or `framecut.log`
//! 4. platform directories from dirs-next
//!    - config: `~/.config/framecut` (Linux), `~/Library/Application Support/framecut`, `%APPDATA%\framecut`
//!    - data: `~/.local/share/framecut` (Linux), same as config elsewhere
//!
//! The media store lives in `<data>/media`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const APP_NAME: &str = "framecut";
pub const CONFIG_FILE: &str = "framecut.json";
pub const LOG_FILE: &str = "framecut.log";
pub const ENV_CONFIG_DIR: &str = "FRAMECUT_CONFIG_DIR";
const MEDIA_DIR: &str = "media";

/// Resolved application directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Resolve from an optional CLI override, the environment and the platform.
    pub fn resolve(cli_dir: Option<PathBuf>) -> Self {
        let custom = cli_dir.or_else(|| std::env::var_os(ENV_CONFIG_DIR).map(PathBuf::from));
        if let Some(dir) = custom {
            return Self::in_dir(dir);
        }

        if let Ok(cwd) = std::env::current_dir() {
            if has_local_files(&cwd) {
                return Self::in_dir(cwd);
            }
        }

        let config_dir = dirs_next::config_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| PathBuf::from("."));
        let data_dir = dirs_next::data_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| config_dir.clone());
        Self { config_dir, data_dir }
    }

    /// Everything in one directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self { config_dir: dir.clone(), data_dir: dir }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join(MEDIA_DIR)
    }

    /// Create the config and data directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create config directory: {}", self.config_dir.display()))?;
        if self.data_dir != self.config_dir {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {}", self.data_dir.display()))?;
        }
        Ok(())
    }
}

fn has_local_files(dir: &Path) -> bool {
    [CONFIG_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}
