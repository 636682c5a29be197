//! Scriptable in-process engine for tests and UI development.
//!
//! Records every call, lets tests decide when `capture_position` and
//! `get_clicker_state` settle, and publishes state events on demand.

use super::{ClickerStateReply, EngineClient, EngineError, EngineResult};
use crate::{ClickerConfig, Coordinate, EngineState, MacroConfig};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::{broadcast, oneshot};

/// One recorded call into the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    UpdateConfig(ClickerConfig),
    UpdateMacroConfig(MacroConfig),
    GetClickerState,
    ToggleClicker,
    CapturePosition,
}

pub struct MockEngine {
    calls: Mutex<Vec<EngineCall>>,
    state: Mutex<ClickerStateReply>,
    events: broadcast::Sender<EngineState>,
    fail_requests: AtomicBool,
    captures: Mutex<VecDeque<oneshot::Receiver<EngineResult<Coordinate>>>>,
    state_queries: Mutex<VecDeque<oneshot::Receiver<ClickerStateReply>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(ClickerStateReply::default()),
            events,
            fail_requests: AtomicBool::new(false),
            captures: Mutex::new(VecDeque::new()),
            state_queries: Mutex::new(VecDeque::new()),
        }
    }

    /// Make every request fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail_requests.store(unavailable, Ordering::SeqCst);
    }

    /// Script the next `capture_position`; it settles when the returned
    /// sender is used (or dropped, which reads as a closed connection).
    pub fn expect_capture(&self) -> oneshot::Sender<EngineResult<Coordinate>> {
        let (tx, rx) = oneshot::channel();
        self.captures.lock().unwrap().push_back(rx);
        tx
    }

    /// Hold the next `get_clicker_state` until the returned sender is used.
    pub fn hold_state_query(&self) -> oneshot::Sender<ClickerStateReply> {
        let (tx, rx) = oneshot::channel();
        self.state_queries.lock().unwrap().push_back(rx);
        tx
    }

    /// Reply used by unscripted `get_clicker_state` calls.
    pub fn set_state(&self, reply: ClickerStateReply) {
        *self.state.lock().unwrap() = reply;
    }

    /// Publish a `clicker-state-changed` event.
    pub fn emit_state(&self, state: EngineState) {
        let _ = self.events.send(state);
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every clicker snapshot pushed so far, oldest first.
    pub fn pushed_configs(&self) -> Vec<ClickerConfig> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::UpdateConfig(config) => Some(config),
                _ => None,
            })
            .collect()
    }

    /// Every macro snapshot pushed so far, oldest first.
    pub fn pushed_macro_configs(&self) -> Vec<MacroConfig> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::UpdateMacroConfig(config) => Some(config),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) -> EngineResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("mock engine offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn update_config(&self, config: &ClickerConfig) -> EngineResult<()> {
        self.record(EngineCall::UpdateConfig(config.clone()))
    }

    async fn update_macro_config(&self, config: &MacroConfig) -> EngineResult<()> {
        self.record(EngineCall::UpdateMacroConfig(config.clone()))
    }

    async fn get_clicker_state(&self) -> EngineResult<ClickerStateReply> {
        self.record(EngineCall::GetClickerState)?;
        let held = self.state_queries.lock().unwrap().pop_front();
        match held {
            Some(rx) => rx.await.map_err(|_| EngineError::Closed),
            None => Ok(self.state.lock().unwrap().clone()),
        }
    }

    async fn toggle_clicker(&self) -> EngineResult<()> {
        self.record(EngineCall::ToggleClicker)?;
        let state = {
            let mut state = self.state.lock().unwrap();
            state.running = !state.running;
            EngineState::from(state.clone())
        };
        self.emit_state(state);
        Ok(())
    }

    async fn capture_position(&self) -> EngineResult<Coordinate> {
        self.record(EngineCall::CapturePosition)?;
        let scripted = self.captures.lock().unwrap().pop_front();
        match scripted {
            Some(rx) => rx.await.map_err(|_| EngineError::Closed)?,
            None => Err(EngineError::Unavailable("no capture scripted".into())),
        }
    }

    fn subscribe_state(&self) -> broadcast::Receiver<EngineState> {
        self.events.subscribe()
    }
}
