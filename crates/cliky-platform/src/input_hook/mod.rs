//! Global input hook.
//!
//! Two threads: the rdev hook (blocks inside the OS event loop for the life
//! of the process) and a pump that hands each translated event to the
//! dispatcher.
//!
//! With the `unstable_grab` feature the hook first tries `rdev::grab`, which
//! dispatches inline and drops every event the dispatcher swallows. If the
//! grab cannot be installed (no permission, no evdev access) it falls back to
//! `rdev::listen`, where events are observed only and swallowing is logical.

mod keymap;

pub use keymap::{button_index, key_code};

use crate::error::PlatformError;
#[cfg(any(feature = "unstable_grab", test))]
use cliky_core::Propagation;
use cliky_core::{InputDispatcher, InputEvent};
use crossbeam_channel::{bounded, select, Receiver, Sender};
#[cfg(feature = "unstable_grab")]
use rdev::grab;
use rdev::{listen, Event, EventType};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

/// Handle to the running hook.
pub struct InputHookHandle {
    stop_tx: Sender<()>,
    pump: Option<JoinHandle<()>>,
    failure: Arc<Mutex<Option<PlatformError>>>,
}

impl InputHookHandle {
    /// Stop delivering events to the dispatcher.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.failure().is_none() && self.pump.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Why the OS hook could not be installed, if it failed.
    pub fn failure(&self) -> Option<PlatformError> {
        self.failure.lock().unwrap().clone()
    }
}

impl Drop for InputHookHandle {
    fn drop(&mut self) {
        self.stop();
        // The pump exits on the stop signal; the listener thread cannot be
        // interrupted and stays parked in the OS loop.
        let _ = self.pump.take();
    }
}

/// Install the global hook and start feeding `dispatcher`.
///
/// Installation failures surface asynchronously through
/// [`InputHookHandle::failure`].
pub fn start_input_hook(dispatcher: InputDispatcher) -> InputHookHandle {
    let (event_tx, event_rx) = bounded(1024);
    let (stop_tx, stop_rx) = bounded(1);
    let failure = Arc::new(Mutex::new(None));

    let listener = {
        let failure = failure.clone();
        #[cfg(feature = "unstable_grab")]
        let grabbing = dispatcher.clone();
        thread::Builder::new()
            .name("cliky-input-hook".into())
            .spawn(move || {
                #[cfg(feature = "unstable_grab")]
                {
                    if run_grab(grabbing) {
                        return;
                    }
                }
                run_listener(event_tx, failure)
            })
    };
    if let Err(e) = listener {
        error!(error = %e, "Failed to spawn input hook thread");
        *failure.lock().unwrap() = Some(PlatformError::HookUnavailable(e.to_string()));
    }

    let pump = thread::Builder::new()
        .name("cliky-input-pump".into())
        .spawn(move || pump_events(event_rx, stop_rx, dispatcher));
    let pump = match pump {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(error = %e, "Failed to spawn input pump");
            *failure.lock().unwrap() = Some(PlatformError::HookUnavailable(e.to_string()));
            None
        }
    };

    InputHookHandle {
        stop_tx,
        pump,
        failure,
    }
}

/// Returns false if the grab could not be installed.
#[cfg(feature = "unstable_grab")]
fn run_grab(dispatcher: InputDispatcher) -> bool {
    info!("Input hook thread started (rdev grab)");

    let callback = move |event: Event| -> Option<Event> {
        if suppresses(&dispatcher, &event.event_type) {
            None
        } else {
            Some(event)
        }
    };

    match grab(callback) {
        Ok(()) => {
            info!("Input grab exiting");
            true
        }
        Err(e) => {
            warn!(error = ?e, "Failed to grab input, falling back to listening");
            false
        }
    }
}

/// Dispatch inline and report whether the OS event must be dropped.
#[cfg(any(feature = "unstable_grab", test))]
fn suppresses(dispatcher: &InputDispatcher, event_type: &EventType) -> bool {
    match translate(event_type) {
        Some(input) => {
            let propagation = dispatcher.dispatch(&input);
            trace!(?input, ?propagation, "Input event grabbed");
            propagation == Propagation::Swallow
        }
        None => false,
    }
}

fn run_listener(event_tx: Sender<InputEvent>, failure: Arc<Mutex<Option<PlatformError>>>) {
    info!("Input hook thread started (rdev listen)");

    let callback = move |event: Event| {
        if let Some(input) = translate(&event.event_type) {
            if let Err(e) = event_tx.try_send(input) {
                warn!("Failed to queue input event: {}", e);
            }
        }
    };

    if let Err(e) = listen(callback) {
        error!(error = ?e, "Input hook error");
        *failure.lock().unwrap() = Some(PlatformError::HookUnavailable(format!("{e:?}")));
    }

    info!("Input hook thread exiting");
}

/// Key and button transitions only; motion and wheel are not bindable.
fn translate(event_type: &EventType) -> Option<InputEvent> {
    match event_type {
        EventType::KeyPress(key) => key_code(*key).map(|code| InputEvent::KeyDown {
            code: code.to_string(),
        }),
        EventType::KeyRelease(key) => key_code(*key).map(|code| InputEvent::KeyUp {
            code: code.to_string(),
        }),
        EventType::ButtonPress(button) => {
            button_index(*button).map(|button| InputEvent::MouseDown { button })
        }
        EventType::ButtonRelease(button) => {
            button_index(*button).map(|button| InputEvent::MouseUp { button })
        }
        EventType::MouseMove { .. } | EventType::Wheel { .. } => None,
    }
}

fn pump_events(event_rx: Receiver<InputEvent>, stop_rx: Receiver<()>, dispatcher: InputDispatcher) {
    debug!("Input pump started");
    loop {
        select! {
            recv(event_rx) -> event => match event {
                Ok(event) => {
                    let propagation = dispatcher.dispatch(&event);
                    trace!(?event, ?propagation, "Input event delivered");
                }
                Err(_) => break,
            },
            recv(stop_rx) -> _ => break,
        }
    }
    debug!("Input pump stopped");
}
