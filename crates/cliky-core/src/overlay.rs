//! Click-through overlay with a draggable handle.
//!
//! The overlay ignores the pointer everywhere except while the pointer is
//! over its drag handle or a drag is in progress. Pointer positions are
//! screen coordinates in physical pixels, the same space as the window
//! position.

use crate::storage::{keys, load_or_default, save_value, KeyValueStore};
use crate::Point;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("overlay window operation failed: {0}")]
    Window(String),
    #[error("no drag in progress")]
    NotDragging,
}

/// Window operations the controller needs from the host toolkit.
pub trait OverlayWindow: Send + Sync {
    /// `true` lets pointer input pass through to windows underneath.
    fn set_click_through(&self, enabled: bool) -> Result<(), OverlayError>;
    fn outer_position(&self) -> Result<Point, OverlayError>;
    fn set_position(&self, position: Point) -> Result<(), OverlayError>;
}

/// Pointer and window positions recorded when a drag starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragOrigin {
    pub pointer: Point,
    pub window: Point,
}

impl DragOrigin {
    fn window_at(&self, pointer: Point) -> Point {
        Point::new(
            self.window.x + (pointer.x - self.pointer.x),
            self.window.y + (pointer.y - self.pointer.y),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HitState {
    #[default]
    PassThrough,
    Interactive,
    Dragging(DragOrigin),
}

struct Inner {
    state: HitState,
    last_position: Option<Point>,
}

pub struct OverlayHitController<W: OverlayWindow> {
    window: W,
    store: Arc<dyn KeyValueStore>,
    inner: Mutex<Inner>,
}

impl<W: OverlayWindow> OverlayHitController<W> {
    pub fn new(window: W, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            window,
            store,
            inner: Mutex::new(Inner {
                state: HitState::PassThrough,
                last_position: None,
            }),
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn state(&self) -> HitState {
        self.inner.lock().unwrap().state
    }

    /// Apply the saved position (if any) and enable click-through. Call
    /// before the overlay is first shown.
    ///
    /// A saved position the window rejects is dropped and the platform
    /// default placement kept; click-through is enabled either way.
    pub fn restore(&self) -> Result<Option<Point>, OverlayError> {
        let mut saved: Option<Point> =
            load_or_default(self.store.as_ref(), keys::OVERLAY_POSITION, None);
        if let Some(position) = saved {
            match self.window.set_position(position) {
                Ok(()) => info!(?position, "Overlay position restored"),
                Err(e) => {
                    warn!(?position, "Cannot restore overlay position: {}", e);
                    saved = None;
                }
            }
        }

        self.window.set_click_through(true)?;
        let mut inner = self.inner.lock().unwrap();
        inner.state = HitState::PassThrough;
        inner.last_position = saved;
        Ok(saved)
    }

    pub fn pointer_enter_handle(&self) -> Result<(), OverlayError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == HitState::PassThrough {
            self.window.set_click_through(false)?;
            inner.state = HitState::Interactive;
            debug!("Overlay handle hovered");
        }
        Ok(())
    }

    /// Ignored while dragging: the pointer routinely outruns the handle.
    pub fn pointer_leave_handle(&self) -> Result<(), OverlayError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == HitState::Interactive {
            self.window.set_click_through(true)?;
            inner.state = HitState::PassThrough;
            debug!("Overlay handle left");
        }
        Ok(())
    }

    /// Start a drag if the handle is currently interactive.
    pub fn pointer_down(&self, pointer: Point) -> Result<bool, OverlayError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != HitState::Interactive {
            return Ok(false);
        }

        let window = self.window.outer_position()?;
        inner.state = HitState::Dragging(DragOrigin { pointer, window });
        inner.last_position = Some(window);
        debug!(?pointer, ?window, "Overlay drag started");
        Ok(true)
    }

    /// Move the window along with the pointer. Tracked anywhere on screen.
    pub fn pointer_move(&self, pointer: Point) -> Result<(), OverlayError> {
        let mut inner = self.inner.lock().unwrap();
        let HitState::Dragging(origin) = inner.state else {
            return Ok(());
        };

        let position = origin.window_at(pointer);
        self.window.set_position(position)?;
        inner.last_position = Some(position);
        Ok(())
    }

    /// Finish the drag: persist where the window ended up and go back to
    /// click-through. Tracked anywhere on screen.
    pub fn pointer_up(&self) -> Result<Point, OverlayError> {
        let mut inner = self.inner.lock().unwrap();
        let HitState::Dragging(origin) = inner.state else {
            return Err(OverlayError::NotDragging);
        };

        let position = match self.window.outer_position() {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "Could not read overlay position, using last computed");
                inner.last_position.unwrap_or(origin.window)
            }
        };

        if let Err(e) = save_value(self.store.as_ref(), keys::OVERLAY_POSITION, &position) {
            warn!(error = %e, "Failed to persist overlay position");
        }

        inner.state = HitState::PassThrough;
        inner.last_position = Some(position);
        self.window.set_click_through(true)?;
        info!(?position, "Overlay drag finished");
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[derive(Default)]
    struct FakeWindow {
        position: Mutex<Point>,
        click_through: Mutex<Option<bool>>,
        moves: Mutex<Vec<Point>>,
        fail_reads: Mutex<bool>,
        fail_moves: Mutex<bool>,
    }

    impl FakeWindow {
        fn at(x: i32, y: i32) -> Self {
            let window = Self::default();
            *window.position.lock().unwrap() = Point::new(x, y);
            window
        }

        fn click_through(&self) -> Option<bool> {
            *self.click_through.lock().unwrap()
        }
    }

    impl OverlayWindow for FakeWindow {
        fn set_click_through(&self, enabled: bool) -> Result<(), OverlayError> {
            *self.click_through.lock().unwrap() = Some(enabled);
            Ok(())
        }

        fn outer_position(&self) -> Result<Point, OverlayError> {
            if *self.fail_reads.lock().unwrap() {
                return Err(OverlayError::Window("window gone".into()));
            }
            Ok(*self.position.lock().unwrap())
        }

        fn set_position(&self, position: Point) -> Result<(), OverlayError> {
            if *self.fail_moves.lock().unwrap() {
                return Err(OverlayError::Window("position off screen".into()));
            }
            *self.position.lock().unwrap() = position;
            self.moves.lock().unwrap().push(position);
            Ok(())
        }
    }

    fn controller(window: FakeWindow) -> (Arc<MemoryStore>, OverlayHitController<FakeWindow>) {
        let store = Arc::new(MemoryStore::new());
        let controller = OverlayHitController::new(window, store.clone());
        (store, controller)
    }

    #[test]
    fn test_restore_applies_saved_position() {
        let (store, overlay) = controller(FakeWindow::at(0, 0));
        save_value(store.as_ref(), keys::OVERLAY_POSITION, &Point::new(300, 40)).unwrap();

        assert_eq!(overlay.restore().unwrap(), Some(Point::new(300, 40)));
        assert_eq!(overlay.window().outer_position().unwrap(), Point::new(300, 40));
        assert_eq!(overlay.window().click_through(), Some(true));
        assert_eq!(overlay.state(), HitState::PassThrough);
    }

    #[test]
    fn test_restore_without_or_with_corrupt_position_keeps_default() {
        let (store, overlay) = controller(FakeWindow::at(8, 8));
        assert_eq!(overlay.restore().unwrap(), None);

        store.set(keys::OVERLAY_POSITION, "{\"x\":".into()).unwrap();
        assert_eq!(overlay.restore().unwrap(), None);
        assert!(overlay.window().moves.lock().unwrap().is_empty());
        assert_eq!(overlay.window().click_through(), Some(true));
    }

    #[test]
    fn test_restore_rejected_position_still_enables_click_through() {
        let window = FakeWindow::at(8, 8);
        *window.fail_moves.lock().unwrap() = true;
        let (store, overlay) = controller(window);
        save_value(store.as_ref(), keys::OVERLAY_POSITION, &Point::new(5000, 40)).unwrap();

        assert_eq!(overlay.restore().unwrap(), None);
        assert_eq!(overlay.window().click_through(), Some(true));
        assert_eq!(overlay.window().outer_position().unwrap(), Point::new(8, 8));
        assert_eq!(overlay.state(), HitState::PassThrough);
    }

    #[test]
    fn test_hover_toggles_click_through() {
        let (_, overlay) = controller(FakeWindow::at(0, 0));
        overlay.restore().unwrap();

        overlay.pointer_enter_handle().unwrap();
        assert_eq!(overlay.state(), HitState::Interactive);
        assert_eq!(overlay.window().click_through(), Some(false));

        overlay.pointer_leave_handle().unwrap();
        assert_eq!(overlay.state(), HitState::PassThrough);
        assert_eq!(overlay.window().click_through(), Some(true));
    }

    #[test]
    fn test_pointer_down_outside_handle_does_nothing() {
        let (_, overlay) = controller(FakeWindow::at(0, 0));
        assert!(!overlay.pointer_down(Point::new(5, 5)).unwrap());
        assert_eq!(overlay.state(), HitState::PassThrough);
        assert!(matches!(overlay.pointer_up(), Err(OverlayError::NotDragging)));
    }

    #[test]
    fn test_drag_released_outside_handle_persists() {
        let (store, overlay) = controller(FakeWindow::at(100, 100));
        overlay.restore().unwrap();

        overlay.pointer_enter_handle().unwrap();
        assert!(overlay.pointer_down(Point::new(110, 105)).unwrap());
        assert!(matches!(overlay.state(), HitState::Dragging(_)));

        // Leaving the handle mid-drag changes nothing.
        overlay.pointer_leave_handle().unwrap();
        assert!(matches!(overlay.state(), HitState::Dragging(_)));
        assert_eq!(overlay.window().click_through(), Some(false));

        overlay.pointer_move(Point::new(160, 125)).unwrap();
        assert_eq!(overlay.window().outer_position().unwrap(), Point::new(150, 120));
        overlay.pointer_move(Point::new(410, 305)).unwrap();

        let final_position = overlay.pointer_up().unwrap();
        assert_eq!(final_position, Point::new(400, 300));
        assert_eq!(store.value(keys::OVERLAY_POSITION), Some(json!({ "x": 400, "y": 300 })));
        assert_eq!(overlay.state(), HitState::PassThrough);
        assert_eq!(overlay.window().click_through(), Some(true));
    }

    #[test]
    fn test_pointer_up_falls_back_to_last_computed_position() {
        let (store, overlay) = controller(FakeWindow::at(0, 0));
        overlay.pointer_enter_handle().unwrap();
        overlay.pointer_down(Point::new(10, 10)).unwrap();
        overlay.pointer_move(Point::new(30, 50)).unwrap();

        *overlay.window().fail_reads.lock().unwrap() = true;
        assert_eq!(overlay.pointer_up().unwrap(), Point::new(20, 40));
        assert_eq!(store.value(keys::OVERLAY_POSITION), Some(json!({ "x": 20, "y": 40 })));
    }

    #[test]
    fn test_moves_ignored_when_not_dragging() {
        let (_, overlay) = controller(FakeWindow::at(0, 0));
        overlay.pointer_move(Point::new(500, 500)).unwrap();
        assert!(overlay.window().moves.lock().unwrap().is_empty());
    }
}
