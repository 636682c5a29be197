//! Coordinate capture: ask the engine for the next cursor position and
//! store it in a macro coordinate.

use crate::config_store::ConfigStore;
use crate::engine::EngineClient;
use crate::{Coordinate, CoordinateTarget};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Captured(Coordinate),
    /// Another capture was already in flight; nothing was requested.
    Rejected,
    /// The engine call failed; the previous value is untouched.
    Failed,
}

/// Holds the single capture slot. Dropping it frees the slot, whichever way
/// the capture future ends.
struct InFlight {
    target: Arc<Mutex<Option<CoordinateTarget>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        *self.target.lock().unwrap() = None;
    }
}

pub struct CoordinateCapture {
    engine: Arc<dyn EngineClient>,
    config: Arc<ConfigStore>,
    slot: Arc<Semaphore>,
    target: Arc<Mutex<Option<CoordinateTarget>>>,
}

impl CoordinateCapture {
    pub fn new(engine: Arc<dyn EngineClient>, config: Arc<ConfigStore>) -> Self {
        Self {
            engine,
            config,
            slot: Arc::new(Semaphore::new(1)),
            target: Arc::new(Mutex::new(None)),
        }
    }

    /// Target of the capture in flight, if any.
    pub fn capturing(&self) -> Option<CoordinateTarget> {
        *self.target.lock().unwrap()
    }

    /// Capture the next cursor position into `target`.
    ///
    /// At most one capture runs at a time; a call made while one is in
    /// flight returns [`CaptureOutcome::Rejected`] right away.
    pub async fn capture(&self, target: CoordinateTarget) -> CaptureOutcome {
        let permit = match self.slot.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                debug!(?target, in_flight = ?self.capturing(), "Coordinate capture rejected");
                return CaptureOutcome::Rejected;
            }
        };
        *self.target.lock().unwrap() = Some(target);
        let in_flight = InFlight {
            target: self.target.clone(),
            _permit: permit,
        };

        info!(?target, "Waiting for engine to sample cursor");
        let result = self.engine.capture_position().await;
        drop(in_flight);

        match result {
            Ok(coordinate) => {
                info!(?target, ?coordinate, "Coordinate captured");
                if let Err(e) = self.config.set_coordinate(target, coordinate).await {
                    warn!(?target, error = %e, "Captured coordinate not persisted");
                }
                CaptureOutcome::Captured(coordinate)
            }
            Err(e) => {
                warn!(?target, error = %e, "Coordinate capture failed");
                CaptureOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, MockEngine};
    use crate::storage::MemoryStore;

    fn setup() -> (Arc<MockEngine>, Arc<ConfigStore>, Arc<CoordinateCapture>) {
        let engine = Arc::new(MockEngine::new());
        let config = Arc::new(ConfigStore::load(Arc::new(MemoryStore::new()), engine.clone()));
        let capture = Arc::new(CoordinateCapture::new(engine.clone(), config.clone()));
        (engine, config, capture)
    }

    async fn wait_until_capturing(capture: &CoordinateCapture) {
        while capture.capturing().is_none() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_second_capture_is_rejected_while_first_in_flight() {
        let (engine, config, capture) = setup();
        let reply = engine.expect_capture();

        let first = {
            let capture = capture.clone();
            tokio::spawn(async move { capture.capture(CoordinateTarget::SafePocket).await })
        };
        wait_until_capturing(&capture).await;
        assert_eq!(capture.capturing(), Some(CoordinateTarget::SafePocket));

        let second = capture.capture(CoordinateTarget::QuickUse).await;
        assert_eq!(second, CaptureOutcome::Rejected);

        reply.send(Ok(Coordinate::new(50, 50))).unwrap();
        let first = first.await.unwrap();
        assert_eq!(first, CaptureOutcome::Captured(Coordinate::new(50, 50)));

        let macros = config.macro_config();
        assert_eq!(macros.safe_pocket, Coordinate::new(50, 50));
        assert_eq!(macros.quick_use, Coordinate::UNSET);
        assert_eq!(engine.pushed_macro_configs().len(), 1);
        assert_eq!(capture.capturing(), None);
    }

    #[tokio::test]
    async fn test_failure_leaves_prior_value() {
        let (engine, config, capture) = setup();
        config
            .set_coordinate(CoordinateTarget::QuickUse, Coordinate::new(120, 340))
            .await
            .unwrap();

        let reply = engine.expect_capture();
        reply.send(Err(EngineError::Unavailable("hook down".into()))).unwrap();

        let outcome = capture.capture(CoordinateTarget::QuickUse).await;
        assert_eq!(outcome, CaptureOutcome::Failed);
        assert_eq!(config.macro_config().quick_use, Coordinate::new(120, 340));
        assert_eq!(capture.capturing(), None);
    }

    #[tokio::test]
    async fn test_slot_released_after_failure() {
        let (engine, _, capture) = setup();
        drop(engine.expect_capture());
        assert_eq!(capture.capture(CoordinateTarget::SafePocket).await, CaptureOutcome::Failed);

        let reply = engine.expect_capture();
        reply.send(Ok(Coordinate::new(3, 4))).unwrap();
        assert_eq!(
            capture.capture(CoordinateTarget::SafePocket).await,
            CaptureOutcome::Captured(Coordinate::new(3, 4))
        );
    }

    #[tokio::test]
    async fn test_slot_released_when_caller_gives_up() {
        let (engine, _, capture) = setup();
        let _reply = engine.expect_capture();

        let first = {
            let capture = capture.clone();
            tokio::spawn(async move { capture.capture(CoordinateTarget::QuickUse).await })
        };
        wait_until_capturing(&capture).await;
        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(capture.capturing(), None);

        let reply = engine.expect_capture();
        reply.send(Ok(Coordinate::new(7, 7))).unwrap();
        assert_eq!(
            capture.capture(CoordinateTarget::QuickUse).await,
            CaptureOutcome::Captured(Coordinate::new(7, 7))
        );
    }
}
