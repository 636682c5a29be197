//! Binding capture: turns the next physical key or side-button press into a
//! [`Binding`] for one role.

use crate::input::{InputDispatcher, InputEvent, ListenerGuard, ListenerOutcome, BUTTON_SECONDARY};
use crate::{Binding, BindingRole};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("binding capture was cancelled")]
    Cancelled,
}

/// Result of a capture that is still waiting for its resolving input.
///
/// Dropping it abandons the capture and releases the listener set at once.
pub struct PendingBinding {
    role: BindingRole,
    session: u64,
    slot: Weak<Mutex<Slot>>,
    rx: oneshot::Receiver<Binding>,
}

impl PendingBinding {
    pub fn role(&self) -> BindingRole {
        self.role
    }

    /// Non-blocking check, for callers that are not async.
    pub fn try_resolved(&mut self) -> Option<Result<Binding, CaptureError>> {
        match self.rx.try_recv() {
            Ok(binding) => Some(Ok(binding)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(CaptureError::Cancelled)),
        }
    }
}

impl Drop for PendingBinding {
    fn drop(&mut self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let taken = {
            let mut slot = slot.lock().unwrap();
            match slot.active.as_ref() {
                Some(current) if current.session == self.session => slot.active.take(),
                _ => None,
            }
        };
        if let Some(current) = taken {
            if current.listeners.is_active() {
                info!(role = %current.role, "Binding capture abandoned");
            }
        }
    }
}

impl Future for PendingBinding {
    type Output = Result<Binding, CaptureError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| CaptureError::Cancelled))
    }
}

struct ActiveCapture {
    session: u64,
    role: BindingRole,
    listeners: ListenerGuard,
}

#[derive(Default)]
struct Slot {
    next_session: u64,
    active: Option<ActiveCapture>,
}

/// Arbitrates capture sessions: at most one at a time, no queueing.
pub struct BindingRecorder {
    dispatcher: InputDispatcher,
    slot: Arc<Mutex<Slot>>,
}

impl BindingRecorder {
    pub fn new(dispatcher: InputDispatcher) -> Self {
        Self {
            dispatcher,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Start capturing a binding for `role`.
    ///
    /// Returns `None` if another capture is still open. There is no timeout:
    /// the session stays open until a qualifying input arrives or
    /// [`cancel`](Self::cancel) is called.
    pub fn begin_capture(&self, role: BindingRole) -> Option<PendingBinding> {
        let mut slot = self.slot.lock().unwrap();
        if let Some(current) = slot.active.as_ref() {
            if current.listeners.is_active() {
                debug!(requested = %role, recording = %current.role, "Capture already in progress");
                return None;
            }
        }

        slot.next_session += 1;
        let session = slot.next_session;
        let (tx, rx) = oneshot::channel();
        let listeners = self.dispatcher.register(capture_listener(role, tx));
        // Replacing a resolved session drops its spent guard.
        slot.active = Some(ActiveCapture {
            session,
            role,
            listeners,
        });

        info!(%role, "Binding capture started");
        Some(PendingBinding {
            role,
            session,
            slot: Arc::downgrade(&self.slot),
            rx,
        })
    }

    /// Role currently being recorded, for the "press a key" indicator.
    pub fn recording_role(&self) -> Option<BindingRole> {
        let slot = self.slot.lock().unwrap();
        slot.active
            .as_ref()
            .filter(|current| current.listeners.is_active())
            .map(|current| current.role)
    }

    /// End the open capture without assigning anything.
    ///
    /// Returns false if nothing was being recorded.
    pub fn cancel(&self) -> bool {
        let taken = self.slot.lock().unwrap().active.take();
        match taken {
            Some(current) if current.listeners.is_active() => {
                info!(role = %current.role, "Binding capture cancelled");
                true
            }
            _ => false,
        }
    }
}

/// The four capture handlers, folded into one listener so they are
/// installed and removed together.
fn capture_listener(
    role: BindingRole,
    tx: oneshot::Sender<Binding>,
) -> impl FnMut(&InputEvent) -> ListenerOutcome + Send + 'static {
    let mut tx = Some(tx);

    move |event| {
        if tx.as_ref().map_or(true, |tx| tx.is_closed()) {
            debug!(%role, "Capture result dropped, releasing listeners");
            return ListenerOutcome::Detach;
        }

        let binding = match event {
            InputEvent::KeyDown { .. } => return ListenerOutcome::Swallow,
            InputEvent::KeyUp { code } => Binding::key(code.as_str()),
            InputEvent::MouseDown { button } => {
                return if *button > BUTTON_SECONDARY {
                    ListenerOutcome::Swallow
                } else {
                    ListenerOutcome::Pass
                };
            }
            InputEvent::MouseUp { button } => match Binding::from_mouse_button(*button) {
                Some(binding) => binding,
                None => return ListenerOutcome::Pass,
            },
        };

        info!(%role, %binding, "Binding captured");
        if let Some(tx) = tx.take() {
            let _ = tx.send(binding);
        }
        ListenerOutcome::Resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Propagation, BUTTON_MIDDLE, BUTTON_PRIMARY, BUTTON_SIDE_1, BUTTON_SIDE_2};

    fn setup() -> (InputDispatcher, BindingRecorder) {
        let dispatcher = InputDispatcher::new();
        let recorder = BindingRecorder::new(dispatcher.clone());
        (dispatcher, recorder)
    }

    #[test]
    fn test_key_up_resolves_with_key_code() {
        let (dispatcher, recorder) = setup();
        let mut pending = recorder.begin_capture(BindingRole::Toggle).unwrap();
        assert_eq!(recorder.recording_role(), Some(BindingRole::Toggle));

        let down = InputEvent::KeyDown { code: "KeyG".into() };
        assert_eq!(dispatcher.dispatch(&down), Propagation::Swallow);
        assert!(pending.try_resolved().is_none());

        let up = InputEvent::KeyUp { code: "KeyG".into() };
        assert_eq!(dispatcher.dispatch(&up), Propagation::Swallow);
        assert_eq!(pending.try_resolved(), Some(Ok(Binding::key("KeyG"))));
        assert_eq!(dispatcher.listener_count(), 0);
        assert_eq!(recorder.recording_role(), None);
    }

    #[test]
    fn test_key_resolution_also_removes_mouse_handlers() {
        let (dispatcher, recorder) = setup();
        let mut pending = recorder.begin_capture(BindingRole::MacroPart1).unwrap();

        dispatcher.dispatch(&InputEvent::KeyUp { code: "F9".into() });
        assert_eq!(pending.try_resolved(), Some(Ok(Binding::key("F9"))));

        // A side button after resolution reaches nobody.
        let side = InputEvent::MouseDown { button: BUTTON_SIDE_1 };
        assert_eq!(dispatcher.dispatch(&side), Propagation::Continue);
        let side = InputEvent::MouseUp { button: BUTTON_SIDE_1 };
        assert_eq!(dispatcher.dispatch(&side), Propagation::Continue);
    }

    #[test]
    fn test_primary_and_secondary_buttons_keep_session_open() {
        let (dispatcher, recorder) = setup();
        let mut pending = recorder.begin_capture(BindingRole::Dodge).unwrap();

        for button in [BUTTON_PRIMARY, BUTTON_SECONDARY] {
            let down = InputEvent::MouseDown { button };
            assert_eq!(dispatcher.dispatch(&down), Propagation::Continue);
            dispatcher.dispatch(&InputEvent::MouseUp { button });
        }
        assert!(pending.try_resolved().is_none());
        assert_eq!(recorder.recording_role(), Some(BindingRole::Dodge));

        let down = InputEvent::MouseDown { button: BUTTON_SIDE_2 };
        assert_eq!(dispatcher.dispatch(&down), Propagation::Swallow);
        dispatcher.dispatch(&InputEvent::MouseUp { button: BUTTON_SIDE_2 });
        assert_eq!(pending.try_resolved(), Some(Ok(Binding::key("Mouse5"))));
        assert_eq!(dispatcher.listener_count(), 0);
    }

    #[test]
    fn test_middle_button_is_bindable() {
        let (dispatcher, recorder) = setup();
        let mut pending = recorder.begin_capture(BindingRole::MacroPart2).unwrap();

        let down = InputEvent::MouseDown { button: BUTTON_MIDDLE };
        assert_eq!(dispatcher.dispatch(&down), Propagation::Continue);
        dispatcher.dispatch(&InputEvent::MouseUp { button: BUTTON_MIDDLE });
        assert_eq!(pending.try_resolved(), Some(Ok(Binding::key("Mouse3"))));
    }

    #[test]
    fn test_second_capture_rejected_while_active() {
        let (dispatcher, recorder) = setup();
        let _pending = recorder.begin_capture(BindingRole::MacroPart1).unwrap();
        assert!(recorder.begin_capture(BindingRole::MacroPart2).is_none());
        assert_eq!(dispatcher.listener_count(), 1);
        assert_eq!(recorder.recording_role(), Some(BindingRole::MacroPart1));
    }

    #[test]
    fn test_new_capture_allowed_after_resolution() {
        let (dispatcher, recorder) = setup();
        let _first = recorder.begin_capture(BindingRole::Toggle).unwrap();
        dispatcher.dispatch(&InputEvent::KeyUp { code: "F6".into() });

        let mut second = recorder.begin_capture(BindingRole::Dodge).unwrap();
        dispatcher.dispatch(&InputEvent::KeyUp { code: "Space".into() });
        assert_eq!(second.try_resolved(), Some(Ok(Binding::key("Space"))));
    }

    #[test]
    fn test_cancel_releases_listeners() {
        let (dispatcher, recorder) = setup();
        let mut pending = recorder.begin_capture(BindingRole::Toggle).unwrap();

        assert!(recorder.cancel());
        assert_eq!(dispatcher.listener_count(), 0);
        assert_eq!(pending.try_resolved(), Some(Err(CaptureError::Cancelled)));
        assert!(!recorder.cancel());

        let key = InputEvent::KeyUp { code: "KeyA".into() };
        assert_eq!(dispatcher.dispatch(&key), Propagation::Continue);
    }

    #[test]
    fn test_dropped_pending_releases_listeners_immediately() {
        let (dispatcher, recorder) = setup();
        let pending = recorder.begin_capture(BindingRole::Toggle).unwrap();
        drop(pending);

        assert_eq!(dispatcher.listener_count(), 0);
        assert_eq!(recorder.recording_role(), None);
        let mut next = recorder.begin_capture(BindingRole::Dodge).unwrap();

        let key = InputEvent::KeyDown { code: "KeyA".into() };
        assert_eq!(dispatcher.dispatch(&key), Propagation::Swallow);
        dispatcher.dispatch(&InputEvent::KeyUp { code: "KeyA".into() });
        assert_eq!(next.try_resolved(), Some(Ok(Binding::key("KeyA"))));
    }

    #[test]
    fn test_stale_pending_drop_leaves_newer_session_alone() {
        let (dispatcher, recorder) = setup();
        let mut first = recorder.begin_capture(BindingRole::Toggle).unwrap();
        dispatcher.dispatch(&InputEvent::KeyUp { code: "F6".into() });
        assert_eq!(first.try_resolved(), Some(Ok(Binding::key("F6"))));

        let _second = recorder.begin_capture(BindingRole::Dodge).unwrap();
        drop(first);
        assert_eq!(recorder.recording_role(), Some(BindingRole::Dodge));
        assert_eq!(dispatcher.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_await_releases_capture() {
        let (dispatcher, recorder) = setup();
        let pending = recorder.begin_capture(BindingRole::MacroPart1).unwrap();

        let task = tokio::spawn(pending);
        task.abort();
        let _ = task.await;

        assert_eq!(dispatcher.listener_count(), 0);
        assert!(recorder.begin_capture(BindingRole::MacroPart2).is_some());
    }

    #[tokio::test]
    async fn test_pending_binding_is_awaitable() {
        let (dispatcher, recorder) = setup();
        let pending = recorder.begin_capture(BindingRole::Toggle).unwrap();
        assert_eq!(pending.role(), BindingRole::Toggle);

        dispatcher.dispatch(&InputEvent::KeyUp { code: "KeyZ".into() });
        assert_eq!(pending.await, Ok(Binding::key("KeyZ")));
    }
}
