//! cliky-core: configuration model + capture/synchronization primitives.
//!
//! Design goal: keep this crate UI-agnostic and platform-agnostic.
//! Global input hooks live in `cliky-platform`, window handles and the
//! Tauri command surface live in the desktop shell.
//!
//! The engine that actually synthesizes input is a separate process; this
//! crate only talks to it through [`EngineClient`].

mod binding;
mod capture;
mod config_store;
mod engine;
mod input;
mod overlay;
mod recorder;
mod state_channel;
mod storage;

pub use binding::{AuxMouseButton, Binding};
pub use capture::{CaptureOutcome, CoordinateCapture};
pub use config_store::ConfigStore;
pub use engine::{
    ClickerStateReply, EngineCall, EngineClient, EngineError, EngineResult, IpcConfig,
    IpcEngineClient, MockEngine, STATE_CHANGED_TOPIC,
};
pub use input::{
    InputDispatcher, InputEvent, ListenerGuard, ListenerOutcome, Propagation, BUTTON_MIDDLE,
    BUTTON_PRIMARY, BUTTON_SECONDARY, BUTTON_SIDE_1, BUTTON_SIDE_2,
};
pub use overlay::{DragOrigin, HitState, OverlayError, OverlayHitController, OverlayWindow};
pub use recorder::{BindingRecorder, CaptureError, PendingBinding};
pub use state_channel::StateChannel;
pub use storage::{
    get_app_data_dir, keys, load_or_default, save_value, JsonFileStore, KeyValueStore,
    MemoryStore, StorageError, StorageResult,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest click rate the engine accepts (clicks per second).
pub const MIN_TARGET_RATE: u32 = 1;
/// Highest click rate the engine accepts (clicks per second).
pub const MAX_TARGET_RATE: u32 = 23;
/// Upper bound for humanization jitter (ms).
pub const MAX_JITTER_MS: u32 = 50;
/// Upper bound for the delay between macro steps (ms).
pub const MAX_STEP_DELAY_MS: u32 = 500;
/// Macro step delay granularity (ms).
pub const STEP_DELAY_INCREMENT_MS: u32 = 10;

/// An integer screen position used by macro steps.
///
/// `(0, 0)` is the "unset" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const UNSET: Coordinate = Coordinate { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// A coordinate counts as configured only when both components are non-zero.
    pub fn is_configured(&self) -> bool {
        self.x != 0 && self.y != 0
    }
}

/// A window or pointer position in physical screen pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Which mouse action the engine performs per click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickMode {
    #[default]
    Left,
    Right,
    Double,
}

impl ClickMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickMode::Left => "left",
            ClickMode::Right => "right",
            ClickMode::Double => "double",
        }
    }
}

impl fmt::Display for ClickMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auto-clicker settings pushed to the engine with `update_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickerConfig {
    /// Clicks per second, within `[MIN_TARGET_RATE, MAX_TARGET_RATE]`.
    pub target_rate: u32,
    /// Random timing jitter in ms. Ignored by the engine while
    /// `humanization_enabled` is false, but still stored and sent.
    pub jitter_magnitude: u32,
    pub humanization_enabled: bool,
    pub toggle_binding: Binding,
    pub click_mode: ClickMode,
}

impl Default for ClickerConfig {
    fn default() -> Self {
        Self {
            target_rate: 10,
            jitter_magnitude: 0,
            humanization_enabled: true,
            toggle_binding: Binding::key("F6"),
            click_mode: ClickMode::Left,
        }
    }
}

impl ClickerConfig {
    pub fn clamp_rate(rate: u32) -> u32 {
        rate.clamp(MIN_TARGET_RATE, MAX_TARGET_RATE)
    }

    pub fn clamp_jitter(jitter_ms: u32) -> u32 {
        jitter_ms.min(MAX_JITTER_MS)
    }
}

/// Two-part item macro settings pushed to the engine with `update_macro_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroConfig {
    pub part1_binding: Binding,
    pub part2_binding: Binding,
    pub dodge_binding: Binding,
    pub safe_pocket: Coordinate,
    pub quick_use: Coordinate,
    pub step_delay_ms: u32,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            part1_binding: Binding::key("F7"),
            part2_binding: Binding::key("F8"),
            dodge_binding: Binding::key("AltLeft"),
            safe_pocket: Coordinate::UNSET,
            quick_use: Coordinate::UNSET,
            step_delay_ms: 50,
        }
    }
}

impl MacroConfig {
    /// The engine refuses to run the macro until both drag endpoints are set.
    pub fn is_ready(&self) -> bool {
        self.safe_pocket.is_configured() && self.quick_use.is_configured()
    }

    /// Clamp to `[0, MAX_STEP_DELAY_MS]` and snap to the nearest increment.
    pub fn snap_step_delay(delay_ms: u32) -> u32 {
        let clamped = delay_ms.min(MAX_STEP_DELAY_MS);
        let half = STEP_DELAY_INCREMENT_MS / 2;
        ((clamped + half) / STEP_DELAY_INCREMENT_MS * STEP_DELAY_INCREMENT_MS).min(MAX_STEP_DELAY_MS)
    }

    pub fn coordinate(&self, target: CoordinateTarget) -> Coordinate {
        match target {
            CoordinateTarget::SafePocket => self.safe_pocket,
            CoordinateTarget::QuickUse => self.quick_use,
        }
    }
}

/// Logical roles that each own exactly one [`Binding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRole {
    Toggle,
    #[serde(rename = "part1")]
    MacroPart1,
    #[serde(rename = "part2")]
    MacroPart2,
    Dodge,
}

impl fmt::Display for BindingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BindingRole::Toggle => "toggle",
            BindingRole::MacroPart1 => "part1",
            BindingRole::MacroPart2 => "part2",
            BindingRole::Dodge => "dodge",
        };
        f.write_str(name)
    }
}

/// Macro coordinates that can be captured from the live cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateTarget {
    SafePocket,
    QuickUse,
}

/// Local mirror of the engine's running state. Only [`StateChannel`] writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub running: bool,
    pub live_rate: f64,
    pub active_click_mode: String,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            running: false,
            live_rate: 0.0,
            active_click_mode: ClickMode::Left.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_configured_requires_both_axes() {
        assert!(!Coordinate::UNSET.is_configured());
        assert!(!Coordinate::new(120, 0).is_configured());
        assert!(!Coordinate::new(0, 340).is_configured());
        assert!(Coordinate::new(-5, 340).is_configured());
    }

    #[test]
    fn test_macro_ready_flag() {
        let mut config = MacroConfig {
            quick_use: Coordinate::new(120, 340),
            ..MacroConfig::default()
        };
        assert!(!config.is_ready());

        config.safe_pocket = Coordinate::new(50, 50);
        assert!(config.is_ready());
    }

    #[test]
    fn test_step_delay_snaps_to_increment() {
        assert_eq!(MacroConfig::snap_step_delay(0), 0);
        assert_eq!(MacroConfig::snap_step_delay(44), 40);
        assert_eq!(MacroConfig::snap_step_delay(45), 50);
        assert_eq!(MacroConfig::snap_step_delay(499), 500);
        assert_eq!(MacroConfig::snap_step_delay(9000), 500);
    }

    #[test]
    fn test_rate_and_jitter_bounds() {
        assert_eq!(ClickerConfig::clamp_rate(0), 1);
        assert_eq!(ClickerConfig::clamp_rate(15), 15);
        assert_eq!(ClickerConfig::clamp_rate(100), 23);
        assert_eq!(ClickerConfig::clamp_jitter(75), 50);
    }

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&BindingRole::MacroPart2).unwrap();
        assert_eq!(json, "\"part2\"");
        let role: BindingRole = serde_json::from_str("\"dodge\"").unwrap();
        assert_eq!(role, BindingRole::Dodge);
    }

    #[test]
    fn test_clicker_config_wire_shape() {
        let value = serde_json::to_value(ClickerConfig::default()).unwrap();
        assert_eq!(value["targetRate"], 10);
        assert_eq!(value["toggleBinding"], "F6");
        assert_eq!(value["clickMode"], "left");
    }
}
