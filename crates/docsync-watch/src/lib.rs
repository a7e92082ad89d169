//! Filesystem change capture: glob-filtered notify subscriptions feeding a
//! trailing-edge debounce buffer.

pub mod capture;
pub mod pattern;

pub use capture::ChangeCapture;
pub use pattern::{build_ignore_set, compile, literal_prefix, watch_target};
