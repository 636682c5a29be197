//! Application state for the Tauri backend.

use crate::overlay_window::{TauriOverlayWindow, OVERLAY_LABEL};
use crate::settings::Settings;
use cliky_core::{
    BindingRecorder, ConfigStore, CoordinateCapture, EngineClient, InputDispatcher,
    IpcEngineClient, JsonFileStore, KeyValueStore, MemoryStore, OverlayHitController,
    StateChannel,
};
use cliky_platform::{start_input_hook, InputHookHandle};
use serde::Serialize;
use std::sync::Arc;
use tauri::{AppHandle, Manager};

/// What this machine lets the app do, for the status line in the UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub binding_capture: bool,
    pub status: Option<String>,
}

pub struct AppState {
    pub engine: Arc<dyn EngineClient>,
    pub config: Arc<ConfigStore>,
    pub recorder: BindingRecorder,
    pub capture: CoordinateCapture,
    pub state_channel: StateChannel,
    pub overlay: OverlayHitController<TauriOverlayWindow>,
    hook: InputHookHandle,
}

impl AppState {
    /// Wire every component. Must run inside the async runtime context
    /// because the state mirror spawns its tasks on mount.
    pub fn init(app: &AppHandle, settings: &Settings) -> Result<Self, Box<dyn std::error::Error>> {
        let store = open_store(settings);
        let engine: Arc<dyn EngineClient> = Arc::new(IpcEngineClient::new(settings.ipc_config()));
        let config = Arc::new(ConfigStore::load(store.clone(), engine.clone()));

        let dispatcher = InputDispatcher::new();
        let hook = start_input_hook(dispatcher.clone());
        let recorder = BindingRecorder::new(dispatcher);
        let capture = CoordinateCapture::new(engine.clone(), config.clone());

        let window = app
            .get_webview_window(OVERLAY_LABEL)
            .ok_or("overlay window is not configured")?;
        let overlay = OverlayHitController::new(TauriOverlayWindow::new(window), store);
        if let Err(e) = overlay.restore() {
            tracing::warn!("Failed to restore overlay: {}", e);
        }

        let state_channel = StateChannel::mount(engine.clone());

        Ok(Self {
            engine,
            config,
            recorder,
            capture,
            state_channel,
            overlay,
            hook,
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        match self.hook.failure() {
            Some(e) => Capabilities {
                binding_capture: false,
                status: Some(format!(
                    "Key capture unavailable ({e}). Grant input monitoring / accessibility permission and restart."
                )),
            },
            None => Capabilities {
                binding_capture: true,
                status: None,
            },
        }
    }
}

fn open_store(settings: &Settings) -> Arc<dyn KeyValueStore> {
    let path = settings.store_path();
    match JsonFileStore::open(&path) {
        Ok(store) => {
            tracing::info!("Using settings store {:?}", store.path());
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!("Cannot open store {:?}: {}; settings will not persist", path, e);
            Arc::new(MemoryStore::new())
        }
    }
}
