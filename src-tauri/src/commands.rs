use crate::error::{api_err, CommandResult};
use crate::state::{AppState, Capabilities};
use cliky_core::{
    Binding, BindingRole, CaptureOutcome, ClickMode, ClickerConfig, Coordinate, CoordinateTarget,
    EngineState, HitState, MacroConfig, Point,
};
use serde::Serialize;
use tauri::State;

// ====== Clicker Config Commands ======

#[tauri::command]
pub fn get_clicker_config(state: State<'_, AppState>) -> ClickerConfig {
    state.config.clicker()
}

#[tauri::command]
pub async fn set_target_rate(state: State<'_, AppState>, rate: u32) -> CommandResult<ClickerConfig> {
    state.config.set_target_rate(rate).await.map_err(api_err)?;
    Ok(state.config.clicker())
}

#[tauri::command]
pub async fn set_jitter_magnitude(
    state: State<'_, AppState>,
    jitter_ms: u32,
) -> CommandResult<ClickerConfig> {
    state
        .config
        .set_jitter_magnitude(jitter_ms)
        .await
        .map_err(api_err)?;
    Ok(state.config.clicker())
}

#[tauri::command]
pub async fn set_humanization_enabled(
    state: State<'_, AppState>,
    enabled: bool,
) -> CommandResult<ClickerConfig> {
    state
        .config
        .set_humanization_enabled(enabled)
        .await
        .map_err(api_err)?;
    Ok(state.config.clicker())
}

#[tauri::command]
pub async fn set_click_mode(
    state: State<'_, AppState>,
    mode: ClickMode,
) -> CommandResult<ClickerConfig> {
    state.config.set_click_mode(mode).await.map_err(api_err)?;
    Ok(state.config.clicker())
}

// ====== Macro Config Commands ======

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroConfigView {
    #[serde(flatten)]
    pub config: MacroConfig,
    /// Both drag endpoints are set ("OPERATIONAL" vs "NEEDS CONFIG").
    pub ready: bool,
}

impl From<MacroConfig> for MacroConfigView {
    fn from(config: MacroConfig) -> Self {
        let ready = config.is_ready();
        Self { config, ready }
    }
}

#[tauri::command]
pub fn get_macro_config(state: State<'_, AppState>) -> MacroConfigView {
    state.config.macro_config().into()
}

#[tauri::command]
pub async fn set_step_delay(
    state: State<'_, AppState>,
    delay_ms: u32,
) -> CommandResult<MacroConfigView> {
    state.config.set_step_delay(delay_ms).await.map_err(api_err)?;
    Ok(state.config.macro_config().into())
}

/// Direct numeric edit of a drag endpoint.
#[tauri::command]
pub async fn set_coordinate(
    state: State<'_, AppState>,
    target: CoordinateTarget,
    x: i32,
    y: i32,
) -> CommandResult<MacroConfigView> {
    state
        .config
        .set_coordinate(target, Coordinate::new(x, y))
        .await
        .map_err(api_err)?;
    Ok(state.config.macro_config().into())
}

// ====== Binding Capture Commands ======

/// Record the next key or side button for `role` and assign it.
///
/// Resolves to `None` when another capture is already open or this one is
/// cancelled.
#[tauri::command]
pub async fn begin_binding_capture(
    state: State<'_, AppState>,
    role: BindingRole,
) -> CommandResult<Option<Binding>> {
    let capabilities = state.capabilities();
    if !capabilities.binding_capture {
        return Err(capabilities
            .status
            .unwrap_or_else(|| "key capture unavailable".to_string()));
    }

    let Some(pending) = state.recorder.begin_capture(role) else {
        return Ok(None);
    };
    let binding = match pending.await {
        Ok(binding) => binding,
        Err(e) => {
            tracing::debug!("Binding capture for {} ended: {}", role, e);
            return Ok(None);
        }
    };

    state
        .config
        .set_binding(role, binding.clone())
        .await
        .map_err(api_err)?;
    Ok(Some(binding))
}

#[tauri::command]
pub fn cancel_binding_capture(state: State<'_, AppState>) -> bool {
    state.recorder.cancel()
}

#[tauri::command]
pub fn get_recording_role(state: State<'_, AppState>) -> Option<BindingRole> {
    state.recorder.recording_role()
}

// ====== Coordinate Capture Commands ======

/// Wait for the engine to sample the cursor and store it in `target`.
///
/// `None` means nothing changed: a capture was already in flight or the
/// engine could not deliver a position.
#[tauri::command]
pub async fn capture_coordinate(
    state: State<'_, AppState>,
    target: CoordinateTarget,
) -> CommandResult<Option<Coordinate>> {
    match state.capture.capture(target).await {
        CaptureOutcome::Captured(coordinate) => Ok(Some(coordinate)),
        CaptureOutcome::Rejected | CaptureOutcome::Failed => Ok(None),
    }
}

#[tauri::command]
pub fn get_capturing_target(state: State<'_, AppState>) -> Option<CoordinateTarget> {
    state.capture.capturing()
}

// ====== Engine Commands ======

#[tauri::command]
pub fn get_engine_state(state: State<'_, AppState>) -> EngineState {
    state.state_channel.current()
}

#[tauri::command]
pub async fn toggle_clicker(state: State<'_, AppState>) -> CommandResult<()> {
    state.engine.toggle_clicker().await.map_err(api_err)
}

#[tauri::command]
pub fn get_capabilities(state: State<'_, AppState>) -> Capabilities {
    state.capabilities()
}

// ====== Overlay Commands ======

#[tauri::command]
pub fn overlay_pointer_enter(state: State<'_, AppState>) -> CommandResult<()> {
    state.overlay.pointer_enter_handle().map_err(api_err)
}

#[tauri::command]
pub fn overlay_pointer_leave(state: State<'_, AppState>) -> CommandResult<()> {
    state.overlay.pointer_leave_handle().map_err(api_err)
}

#[tauri::command]
pub fn overlay_pointer_down(state: State<'_, AppState>, x: f64, y: f64) -> CommandResult<bool> {
    let pointer = state.overlay.window().to_physical(x, y);
    state.overlay.pointer_down(pointer).map_err(api_err)
}

#[tauri::command]
pub fn overlay_pointer_move(state: State<'_, AppState>, x: f64, y: f64) -> CommandResult<()> {
    let pointer = state.overlay.window().to_physical(x, y);
    state.overlay.pointer_move(pointer).map_err(api_err)
}

#[tauri::command]
pub fn overlay_pointer_up(state: State<'_, AppState>) -> CommandResult<Point> {
    state.overlay.pointer_up().map_err(api_err)
}

#[tauri::command]
pub fn get_overlay_dragging(state: State<'_, AppState>) -> bool {
    matches!(state.overlay.state(), HitState::Dragging(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_macro_view_carries_ready_flag() {
        let view = MacroConfigView::from(MacroConfig::default());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["ready"], false);
        assert_eq!(json["dodgeBinding"], "AltLeft");
        assert_eq!(json["stepDelayMs"], 50);

        let ready = MacroConfigView::from(MacroConfig {
            safe_pocket: Coordinate::new(50, 50),
            quick_use: Coordinate::new(120, 340),
            ..MacroConfig::default()
        });
        assert!(ready.ready);
    }

    #[test]
    fn test_coordinate_edit_targets_use_ui_names() {
        let target: CoordinateTarget = serde_json::from_value(serde_json::json!("quick_use")).unwrap();
        assert_eq!(target, CoordinateTarget::QuickUse);
        let target: CoordinateTarget = serde_json::from_value(serde_json::json!("safe_pocket")).unwrap();
        assert_eq!(target, CoordinateTarget::SafePocket);
    }

    #[test]
    fn test_api_error_message_round_trip() {
        let message: String = ApiError::new("engine busy").into();
        assert_eq!(message, "engine busy");
    }
}
