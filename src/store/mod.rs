//! Caller-owned variable sources and the per-call formula index.
pub mod registry;
pub mod types;

pub use registry::FormulaRegistry;
pub use types::{DetailVariable, FormulaDefinition, FormulaId, Overrides, ResultKind, Snapshot, TaxRate};
