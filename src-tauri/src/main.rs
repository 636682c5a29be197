#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod commands;
mod error;
mod events;
mod hotkey;
mod logging;
mod overlay_window;
mod settings;
mod state;

use state::AppState;
use std::sync::Arc;
use tauri::{Manager, WindowEvent};

fn main() {
    logging::setup(!cfg!(debug_assertions));
    let settings = settings::init();

    tauri::Builder::default()
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .on_window_event(|window, event| {
            if let WindowEvent::CloseRequested { .. } = event {
                if overlay_window::closing_ends_app(window.label()) {
                    tracing::info!("Main window closed, exiting");
                    window.app_handle().exit(0);
                }
            }
        })
        .setup(move |app| {
            let handle = app.handle().clone();

            // The state mirror spawns onto the runtime as it mounts.
            let state = tauri::async_runtime::block_on(async { AppState::init(&handle, settings) })?;
            if let Some(status) = state.capabilities().status {
                tracing::warn!("{}", status);
            }

            events::start_state_forwarder(handle.clone(), state.state_channel.watch());

            // Bring the engine up to date with what was persisted.
            let config = Arc::clone(&state.config);
            tauri::async_runtime::spawn(async move { config.resync().await });

            app.manage(state);

            if let Err(e) = hotkey::register(&handle, &settings.visibility_hotkey) {
                tracing::warn!("Visibility hotkey disabled: {}", e);
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Clicker config
            commands::get_clicker_config,
            commands::set_target_rate,
            commands::set_jitter_magnitude,
            commands::set_humanization_enabled,
            commands::set_click_mode,
            // Macro config
            commands::get_macro_config,
            commands::set_step_delay,
            commands::set_coordinate,
            // Binding capture
            commands::begin_binding_capture,
            commands::cancel_binding_capture,
            commands::get_recording_role,
            // Coordinate capture
            commands::capture_coordinate,
            commands::get_capturing_target,
            // Engine
            commands::get_engine_state,
            commands::toggle_clicker,
            commands::get_capabilities,
            // Overlay
            commands::overlay_pointer_enter,
            commands::overlay_pointer_leave,
            commands::overlay_pointer_down,
            commands::overlay_pointer_move,
            commands::overlay_pointer_up,
            commands::get_overlay_dragging,
        ])
        .run(tauri::generate_context!())
        .expect("error while running cliky");
}
