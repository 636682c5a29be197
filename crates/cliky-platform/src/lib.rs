//! cliky-platform: OS input hook feeding the core input dispatcher.
//!
//! The hook observes global keyboard and mouse button transitions through
//! `rdev`, translates them to key-code identifiers and button indices, and
//! delivers them to a [`cliky_core::InputDispatcher`] on a dedicated thread.
//!
//! `rdev::listen` only observes input; it cannot suppress it. A swallowed
//! event is therefore consumed by the capture logic but still reaches the
//! focused application.

mod error;
mod input_hook;

pub use error::{PlatformError, PlatformResult};
pub use input_hook::{button_index, key_code, start_input_hook, InputHookHandle};
