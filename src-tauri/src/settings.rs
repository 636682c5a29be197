//! Shell settings from `settings.yaml` in the user config directory.
//!
//! Every field is optional; a missing or invalid file means defaults.

use cliky_core::IpcConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

static SETTINGS: OnceLock<Settings> = OnceLock::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the engine process listens.
    pub engine_addr: SocketAddr,
    pub request_timeout_ms: u64,
    /// Overrides `<data dir>/cliky/store.json`.
    pub store_file: Option<PathBuf>,
    /// Global shortcut that swaps the main window and the overlay.
    pub visibility_hotkey: String,
}

impl Default for Settings {
    fn default() -> Self {
        let ipc = IpcConfig::default();
        Self {
            engine_addr: ipc.addr,
            request_timeout_ms: ipc.request_timeout.as_millis() as u64,
            store_file: None,
            visibility_hotkey: "Insert".to_string(),
        }
    }
}

impl Settings {
    pub fn ipc_config(&self) -> IpcConfig {
        IpcConfig {
            addr: self.engine_addr,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_file
            .clone()
            .unwrap_or_else(cliky_core::JsonFileStore::default_path)
    }
}

/// Load settings once. Later calls return the same instance.
pub fn init() -> &'static Settings {
    SETTINGS.get_or_init(|| load_from(&settings_file_path()))
}

pub fn config_dir() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cliky")
}

pub fn log_dir() -> PathBuf {
    config_dir().join("logs")
}

pub fn settings_file_path() -> PathBuf {
    config_dir().join("settings.yaml")
}

fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

fn load_from(path: &Path) -> Settings {
    if !path.exists() {
        tracing::debug!("No settings.yaml found, using defaults");
        return Settings::default();
    }

    match load_yaml::<Settings>(path) {
        Ok(settings) => {
            tracing::info!("Loaded settings from {:?}", path);
            settings
        }
        Err(e) => {
            tracing::warn!("Failed to parse {:?}: {}, using defaults", path, e);
            Settings::default()
        }
    }
}
