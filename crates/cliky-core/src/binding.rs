//! Symbolic tokens for physical keys and auxiliary mouse buttons.

use crate::input::{BUTTON_MIDDLE, BUTTON_SIDE_1, BUTTON_SIDE_2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mouse buttons that may be bound. Primary and secondary are reserved for
/// normal interaction and never produce a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxMouseButton {
    Middle,
    Side1,
    Side2,
}

impl AuxMouseButton {
    /// Map a conventional button index (0 primary, 1 middle, 2 secondary,
    /// 3/4 side buttons) to a bindable button.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            BUTTON_MIDDLE => Some(AuxMouseButton::Middle),
            BUTTON_SIDE_1 => Some(AuxMouseButton::Side1),
            BUTTON_SIDE_2 => Some(AuxMouseButton::Side2),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            AuxMouseButton::Middle => "Mouse3",
            AuxMouseButton::Side1 => "Mouse4",
            AuxMouseButton::Side2 => "Mouse5",
        }
    }
}

/// Canonical token identifying one physical control.
///
/// Keyboard bindings use key-code identifiers (`"F6"`, `"KeyA"`,
/// `"AltLeft"`), never the printable character. Mouse bindings use the
/// tokens of [`AuxMouseButton`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binding(String);

impl Binding {
    pub fn key(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn mouse(button: AuxMouseButton) -> Self {
        Self(button.token().to_string())
    }

    /// Binding for a button index, if that button is bindable at all.
    pub fn from_mouse_button(index: u8) -> Option<Self> {
        AuxMouseButton::from_index(index).map(Self::mouse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_mouse(&self) -> bool {
        matches!(self.0.as_str(), "Mouse3" | "Mouse4" | "Mouse5")
    }

    /// Whether the engine can detect this control as a trigger.
    ///
    /// Unsupported bindings are still stored; they simply never fire.
    pub fn is_engine_supported(&self) -> bool {
        let code = self.0.as_str();
        if self.is_mouse() {
            return true;
        }
        if let Some(rest) = code.strip_prefix("Key") {
            return rest.len() == 1 && rest.bytes().all(|c| c.is_ascii_uppercase());
        }
        if let Some(rest) = code.strip_prefix("Digit") {
            return rest.len() == 1 && rest.bytes().all(|c| c.is_ascii_digit());
        }
        if let Some(rest) = code.strip_prefix('F') {
            return matches!(rest.parse::<u8>(), Ok(1..=12));
        }
        matches!(
            code,
            "ShiftLeft"
                | "ShiftRight"
                | "ControlLeft"
                | "ControlRight"
                | "AltLeft"
                | "AltRight"
                | "Space"
                | "Enter"
                | "Escape"
                | "Backspace"
                | "Tab"
                | "CapsLock"
        )
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Binding {
    fn from(code: &str) -> Self {
        Self::key(code)
    }
}
