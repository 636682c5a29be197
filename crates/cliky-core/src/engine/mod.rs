//! Boundary to the privileged engine process.
//!
//! The engine owns input synthesis and the authoritative running state.
//! Everything here is request/response plus one event topic.

mod ipc;
mod mock;

pub use ipc::{IpcConfig, IpcEngineClient};
pub use mock::{EngineCall, MockEngine};

use crate::{ClickerConfig, Coordinate, EngineState, MacroConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Topic of the engine's state-change events.
pub const STATE_CHANGED_TOPIC: &str = "clicker-state-changed";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine rejected {method}: {message}")]
    Rejected { method: &'static str, message: String },
    #[error("engine did not answer {0} in time")]
    Timeout(&'static str),
    #[error("engine connection closed")]
    Closed,
    #[error("malformed engine message: {0}")]
    Protocol(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Reply to `get_clicker_state`.
///
/// On the wire this is a positional tuple:
/// `(running, targetRate, liveRate, humanizationEnabled, toggleBinding, clickMode)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StateTuple", into = "StateTuple")]
pub struct ClickerStateReply {
    pub running: bool,
    pub target_rate: f64,
    pub live_rate: f64,
    pub humanization_enabled: bool,
    pub toggle_binding: String,
    pub click_mode: String,
}

type StateTuple = (bool, f64, f64, bool, String, String);

impl From<StateTuple> for ClickerStateReply {
    fn from(t: StateTuple) -> Self {
        Self {
            running: t.0,
            target_rate: t.1,
            live_rate: t.2,
            humanization_enabled: t.3,
            toggle_binding: t.4,
            click_mode: t.5,
        }
    }
}

impl From<ClickerStateReply> for StateTuple {
    fn from(r: ClickerStateReply) -> Self {
        (
            r.running,
            r.target_rate,
            r.live_rate,
            r.humanization_enabled,
            r.toggle_binding,
            r.click_mode,
        )
    }
}

impl From<ClickerStateReply> for EngineState {
    fn from(reply: ClickerStateReply) -> Self {
        EngineState {
            running: reply.running,
            live_rate: reply.live_rate,
            active_click_mode: reply.click_mode,
        }
    }
}

impl Default for ClickerStateReply {
    fn default() -> Self {
        let config = ClickerConfig::default();
        Self {
            running: false,
            target_rate: config.target_rate as f64,
            live_rate: 0.0,
            humanization_enabled: config.humanization_enabled,
            toggle_binding: config.toggle_binding.to_string(),
            click_mode: config.click_mode.to_string(),
        }
    }
}

/// Client side of the engine boundary.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Push the full clicker snapshot.
    async fn update_config(&self, config: &ClickerConfig) -> EngineResult<()>;

    /// Push the full macro snapshot.
    async fn update_macro_config(&self, config: &MacroConfig) -> EngineResult<()>;

    async fn get_clicker_state(&self) -> EngineResult<ClickerStateReply>;

    async fn toggle_clicker(&self) -> EngineResult<()>;

    /// Resolves once the engine sees the next qualifying input and samples
    /// the cursor. There is no client-side timeout.
    async fn capture_position(&self) -> EngineResult<Coordinate>;

    /// Subscribe to `clicker-state-changed`. Events published after this
    /// call returns are delivered to the receiver.
    fn subscribe_state(&self) -> broadcast::Receiver<EngineState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_reply_decodes_from_tuple() {
        let reply: ClickerStateReply =
            serde_json::from_str(r#"[true, 12, 11.5, false, "F6", "double"]"#).unwrap();
        assert!(reply.running);
        assert_eq!(reply.live_rate, 11.5);
        assert_eq!(reply.click_mode, "double");

        let state = EngineState::from(reply);
        assert_eq!(state.active_click_mode, "double");
        assert_eq!(state.live_rate, 11.5);
    }

    #[test]
    fn test_state_payload_field_names() {
        let state: EngineState =
            serde_json::from_str(r#"{"running":true,"liveRate":9.0,"activeClickMode":"right"}"#)
                .unwrap();
        assert!(state.running);
        assert_eq!(state.active_click_mode, "right");
    }
}
