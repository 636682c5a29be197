//! Global visibility hotkey: swaps the main window and the overlay.

use crate::overlay_window::{MAIN_LABEL, OVERLAY_LABEL};
use std::str::FromStr;
use tauri::{AppHandle, Manager};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

/// Which windows should be visible after a toggle, as (main, overlay).
fn next_visibility(main_visible: bool) -> (bool, bool) {
    if main_visible {
        (false, true)
    } else {
        (true, false)
    }
}

pub fn register(app: &AppHandle, hotkey: &str) -> Result<(), String> {
    let shortcut =
        Shortcut::from_str(hotkey).map_err(|e| format!("Invalid hotkey '{hotkey}': {e}"))?;

    app.global_shortcut()
        .on_shortcut(shortcut, |app, _shortcut, event| {
            if event.state == ShortcutState::Pressed {
                toggle_windows(app);
            }
        })
        .map_err(|e| e.to_string())?;

    tracing::info!("Visibility hotkey registered: {}", hotkey);
    Ok(())
}

fn toggle_windows(app: &AppHandle) {
    let (Some(main), Some(overlay)) = (
        app.get_webview_window(MAIN_LABEL),
        app.get_webview_window(OVERLAY_LABEL),
    ) else {
        tracing::warn!("Visibility toggle: window missing");
        return;
    };

    let main_visible = main.is_visible().unwrap_or(true);
    let (show_main, show_overlay) = next_visibility(main_visible);

    let result = if show_main {
        overlay
            .hide()
            .and_then(|_| main.show())
            .and_then(|_| main.set_focus())
    } else {
        main.hide().and_then(|_| overlay.show())
    };
    match result {
        Ok(()) => tracing::debug!(show_main, show_overlay, "Window visibility toggled"),
        Err(e) => tracing::warn!("Failed to toggle window visibility: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_swaps_windows() {
        assert_eq!(next_visibility(true), (false, true));
        assert_eq!(next_visibility(false), (true, false));
    }

    #[test]
    fn test_default_hotkey_parses() {
        assert!(Shortcut::from_str("Insert").is_ok());
        assert!(Shortcut::from_str("Ctrl+NotAKey").is_err());
    }
}
