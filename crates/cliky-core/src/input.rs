//! Input event dispatch.
//!
//! Platform hooks push every key/button transition through an
//! [`InputDispatcher`]. Consumers register a listener and get back a
//! [`ListenerGuard`]; the registration lives exactly as long as the guard,
//! or until the listener itself reports [`ListenerOutcome::Resolved`].

use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace};

pub const BUTTON_PRIMARY: u8 = 0;
pub const BUTTON_MIDDLE: u8 = 1;
pub const BUTTON_SECONDARY: u8 = 2;
pub const BUTTON_SIDE_1: u8 = 3;
pub const BUTTON_SIDE_2: u8 = 4;

/// A physical key or mouse button transition.
///
/// Keys carry a key-code identifier (`"KeyA"`, `"F6"`), buttons carry the
/// conventional button index (see the `BUTTON_*` constants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown { code: String },
    KeyUp { code: String },
    MouseDown { button: u8 },
    MouseUp { button: u8 },
}

/// What a listener did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOutcome {
    /// Not interested; let the event through.
    Pass,
    /// Consume the event (suppress its default action).
    Swallow,
    /// Consume the event and remove this listener in the same step.
    Resolved,
    /// Let the event through and remove this listener.
    Detach,
}

/// Aggregate result of a dispatch, reported back to the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Swallow,
}

type Listener = Box<dyn FnMut(&InputEvent) -> ListenerOutcome + Send>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Listener registry shared between the platform hook and its consumers.
#[derive(Clone, Default)]
pub struct InputDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl InputDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays installed until the returned guard is
    /// dropped or the listener resolves/detaches itself.
    pub fn register<F>(&self, listener: F) -> ListenerGuard
    where
        F: FnMut(&InputEvent) -> ListenerOutcome + Send + 'static,
    {
        let mut registry = self.registry.lock().unwrap();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Box::new(listener)));
        debug!(id, total = registry.listeners.len(), "Input listener registered");

        ListenerGuard {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver one event to every registered listener.
    ///
    /// Listeners that resolve or detach are removed before this returns, so
    /// no later event can reach them.
    pub fn dispatch(&self, event: &InputEvent) -> Propagation {
        let mut registry = self.registry.lock().unwrap();
        let mut propagation = Propagation::Continue;

        registry.listeners.retain_mut(|(id, listener)| match listener(event) {
            ListenerOutcome::Pass => true,
            ListenerOutcome::Swallow => {
                propagation = Propagation::Swallow;
                true
            }
            ListenerOutcome::Resolved => {
                propagation = Propagation::Swallow;
                debug!(id = *id, "Input listener resolved");
                false
            }
            ListenerOutcome::Detach => {
                debug!(id = *id, "Input listener detached");
                false
            }
        });

        trace!(?event, ?propagation, "Dispatched input event");
        propagation
    }

    /// Number of currently installed listeners.
    pub fn listener_count(&self) -> usize {
        self.registry.lock().unwrap().listeners.len()
    }
}

/// Owned registration handle. Dropping it removes the listener.
pub struct ListenerGuard {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl ListenerGuard {
    /// Whether the listener is still installed.
    pub fn is_active(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry
                .lock()
                .unwrap()
                .listeners
                .iter()
                .any(|(id, _)| *id == self.id),
            None => false,
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap();
            let before = registry.listeners.len();
            registry.listeners.retain(|(id, _)| *id != self.id);
            if registry.listeners.len() != before {
                debug!(id = self.id, "Input listener released");
            }
        }
    }
}
