use cliky_core::{EngineState, STATE_CHANGED_TOPIC};
use tauri::{AppHandle, Emitter};
use tokio::sync::watch;

/// Forward every engine mirror change to both webviews.
pub fn start_state_forwarder(app: AppHandle, mut rx: watch::Receiver<EngineState>) {
    tauri::async_runtime::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            if let Err(e) = app.emit(STATE_CHANGED_TOPIC, &state) {
                tracing::warn!("Failed to emit {}: {}", STATE_CHANGED_TOPIC, e);
            }
        }
        tracing::info!("Engine state mirror dropped, stopping forwarder");
    });
}
