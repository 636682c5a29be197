//! rdev keys and buttons to key-code identifiers and button indices.

use cliky_core::{BUTTON_MIDDLE, BUTTON_PRIMARY, BUTTON_SECONDARY, BUTTON_SIDE_1, BUTTON_SIDE_2};
use rdev::{Button, Key};

/// Key-code identifier (`"KeyA"`, `"Digit1"`, `"AltLeft"`) for an rdev key.
///
/// Layout-independent: names the physical key, never the character it
/// produces. Keys rdev cannot identify yield `None`.
pub fn key_code(key: Key) -> Option<&'static str> {
    let code = match key {
        Key::Alt => "AltLeft",
        Key::AltGr => "AltRight",
        Key::Backspace => "Backspace",
        Key::CapsLock => "CapsLock",
        Key::ControlLeft => "ControlLeft",
        Key::ControlRight => "ControlRight",
        Key::Delete => "Delete",
        Key::DownArrow => "ArrowDown",
        Key::End => "End",
        Key::Escape => "Escape",
        Key::F1 => "F1",
        Key::F2 => "F2",
        Key::F3 => "F3",
        Key::F4 => "F4",
        Key::F5 => "F5",
        Key::F6 => "F6",
        Key::F7 => "F7",
        Key::F8 => "F8",
        Key::F9 => "F9",
        Key::F10 => "F10",
        Key::F11 => "F11",
        Key::F12 => "F12",
        Key::Home => "Home",
        Key::LeftArrow => "ArrowLeft",
        Key::MetaLeft => "MetaLeft",
        Key::MetaRight => "MetaRight",
        Key::PageDown => "PageDown",
        Key::PageUp => "PageUp",
        Key::Return => "Enter",
        Key::RightArrow => "ArrowRight",
        Key::ShiftLeft => "ShiftLeft",
        Key::ShiftRight => "ShiftRight",
        Key::Space => "Space",
        Key::Tab => "Tab",
        Key::UpArrow => "ArrowUp",
        Key::PrintScreen => "PrintScreen",
        Key::ScrollLock => "ScrollLock",
        Key::Pause => "Pause",
        Key::NumLock => "NumLock",
        Key::BackQuote => "Backquote",
        Key::Num1 => "Digit1",
        Key::Num2 => "Digit2",
        Key::Num3 => "Digit3",
        Key::Num4 => "Digit4",
        Key::Num5 => "Digit5",
        Key::Num6 => "Digit6",
        Key::Num7 => "Digit7",
        Key::Num8 => "Digit8",
        Key::Num9 => "Digit9",
        Key::Num0 => "Digit0",
        Key::Minus => "Minus",
        Key::Equal => "Equal",
        Key::KeyQ => "KeyQ",
        Key::KeyW => "KeyW",
        Key::KeyE => "KeyE",
        Key::KeyR => "KeyR",
        Key::KeyT => "KeyT",
        Key::KeyY => "KeyY",
        Key::KeyU => "KeyU",
        Key::KeyI => "KeyI",
        Key::KeyO => "KeyO",
        Key::KeyP => "KeyP",
        Key::LeftBracket => "BracketLeft",
        Key::RightBracket => "BracketRight",
        Key::KeyA => "KeyA",
        Key::KeyS => "KeyS",
        Key::KeyD => "KeyD",
        Key::KeyF => "KeyF",
        Key::KeyG => "KeyG",
        Key::KeyH => "KeyH",
        Key::KeyJ => "KeyJ",
        Key::KeyK => "KeyK",
        Key::KeyL => "KeyL",
        Key::SemiColon => "Semicolon",
        Key::Quote => "Quote",
        Key::BackSlash => "Backslash",
        Key::IntlBackslash => "IntlBackslash",
        Key::KeyZ => "KeyZ",
        Key::KeyX => "KeyX",
        Key::KeyC => "KeyC",
        Key::KeyV => "KeyV",
        Key::KeyB => "KeyB",
        Key::KeyN => "KeyN",
        Key::KeyM => "KeyM",
        Key::Comma => "Comma",
        Key::Dot => "Period",
        Key::Slash => "Slash",
        Key::Insert => "Insert",
        Key::KpReturn => "NumpadEnter",
        Key::KpMinus => "NumpadSubtract",
        Key::KpPlus => "NumpadAdd",
        Key::KpMultiply => "NumpadMultiply",
        Key::KpDivide => "NumpadDivide",
        Key::Kp0 => "Numpad0",
        Key::Kp1 => "Numpad1",
        Key::Kp2 => "Numpad2",
        Key::Kp3 => "Numpad3",
        Key::Kp4 => "Numpad4",
        Key::Kp5 => "Numpad5",
        Key::Kp6 => "Numpad6",
        Key::Kp7 => "Numpad7",
        Key::Kp8 => "Numpad8",
        Key::Kp9 => "Numpad9",
        Key::KpDelete => "NumpadDecimal",
        Key::Function => "Fn",
        Key::Unknown(_) => return None,
    };
    Some(code)
}

/// Conventional button index (0 primary, 1 middle, 2 secondary, 3/4 side).
///
/// Side buttons arrive as `Button::Unknown` with a platform-specific code.
pub fn button_index(button: Button) -> Option<u8> {
    match button {
        Button::Left => Some(BUTTON_PRIMARY),
        Button::Middle => Some(BUTTON_MIDDLE),
        Button::Right => Some(BUTTON_SECONDARY),
        Button::Unknown(code) => side_button_index(code),
    }
}

// XBUTTON1/XBUTTON2
#[cfg(target_os = "windows")]
fn side_button_index(code: u8) -> Option<u8> {
    match code {
        1 => Some(BUTTON_SIDE_1),
        2 => Some(BUTTON_SIDE_2),
        _ => None,
    }
}

// X11 buttons 8/9; 4-7 are wheel steps.
#[cfg(target_os = "linux")]
fn side_button_index(code: u8) -> Option<u8> {
    match code {
        8 => Some(BUTTON_SIDE_1),
        9 => Some(BUTTON_SIDE_2),
        _ => None,
    }
}

// Core Graphics numbers buttons from 0; 3/4 are the side buttons.
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn side_button_index(code: u8) -> Option<u8> {
    match code {
        3 => Some(BUTTON_SIDE_1),
        4 => Some(BUTTON_SIDE_2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cliky_core::Binding;

    #[test]
    fn test_key_codes_are_physical() {
        assert_eq!(key_code(Key::KeyA), Some("KeyA"));
        assert_eq!(key_code(Key::Num7), Some("Digit7"));
        assert_eq!(key_code(Key::Alt), Some("AltLeft"));
        assert_eq!(key_code(Key::Return), Some("Enter"));
        assert_eq!(key_code(Key::Unknown(0xdead)), None);
    }

    #[test]
    fn test_default_bindings_are_reachable() {
        for key in [Key::F6, Key::F7, Key::F8, Key::Alt] {
            let code = key_code(key).unwrap();
            assert!(Binding::key(code).is_engine_supported(), "{code}");
        }
    }

    #[test]
    fn test_standard_buttons() {
        assert_eq!(button_index(Button::Left), Some(BUTTON_PRIMARY));
        assert_eq!(button_index(Button::Middle), Some(BUTTON_MIDDLE));
        assert_eq!(button_index(Button::Right), Some(BUTTON_SECONDARY));
        assert_eq!(button_index(Button::Unknown(200)), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_x11_side_buttons() {
        assert_eq!(button_index(Button::Unknown(8)), Some(BUTTON_SIDE_1));
        assert_eq!(button_index(Button::Unknown(9)), Some(BUTTON_SIDE_2));
        assert_eq!(button_index(Button::Unknown(4)), None);
    }
}
