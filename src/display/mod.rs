//! Presentation helpers: result formatting and resolution audit traces.
pub mod format;
pub mod trace;

pub use trace::format_trace;
