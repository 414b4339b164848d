//! Registry-level analysis: reference topology and pre-save linting.
pub mod topology;
pub mod validation;

pub use topology::{DependencyGraph, TopologyError};
pub use validation::{lint, Diagnostic, DiagnosticKind};
