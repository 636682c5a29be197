//! Tauri webview window as an [`OverlayWindow`].

use cliky_core::{OverlayError, OverlayWindow, Point};
use tauri::{PhysicalPosition, WebviewWindow};

pub const OVERLAY_LABEL: &str = "overlay";
pub const MAIN_LABEL: &str = "main";

/// Closing the control panel ends the app: the overlay and the input hook
/// have no use without it.
pub fn closing_ends_app(label: &str) -> bool {
    label == MAIN_LABEL
}

pub struct TauriOverlayWindow {
    window: WebviewWindow,
}

impl TauriOverlayWindow {
    pub fn new(window: WebviewWindow) -> Self {
        Self { window }
    }

    /// Convert webview screen coordinates (CSS pixels) to physical pixels.
    pub fn to_physical(&self, x: f64, y: f64) -> Point {
        let scale = self.window.scale_factor().unwrap_or(1.0);
        scale_point(x, y, scale)
    }
}

fn scale_point(x: f64, y: f64, scale: f64) -> Point {
    Point::new((x * scale).round() as i32, (y * scale).round() as i32)
}

fn window_error(err: tauri::Error) -> OverlayError {
    OverlayError::Window(err.to_string())
}

impl OverlayWindow for TauriOverlayWindow {
    fn set_click_through(&self, enabled: bool) -> Result<(), OverlayError> {
        self.window
            .set_ignore_cursor_events(enabled)
            .map_err(window_error)
    }

    fn outer_position(&self) -> Result<Point, OverlayError> {
        let position = self.window.outer_position().map_err(window_error)?;
        Ok(Point::new(position.x, position.y))
    }

    fn set_position(&self, position: Point) -> Result<(), OverlayError> {
        self.window
            .set_position(PhysicalPosition::new(position.x, position.y))
            .map_err(window_error)
    }
}
