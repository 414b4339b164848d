//! Sandboxed formula evaluation for dashboard metrics.
//!
//! Variables come from project details, tax-rate rows, caller overrides, and
//! other custom formulas. Each call borrows an immutable [`Snapshot`] of those
//! sources; nothing is cached between calls.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod store;

#[cfg(feature = "python")]
mod bindings {
    pub mod python;
}

pub use compute::{evaluate, evaluate_snapshot, extract, resolve, EvaluationResult, FormulaEngine, FormulaError, VariableTable, Visited};
pub use config::EngineConfig;
pub use store::{DetailVariable, FormulaDefinition, FormulaId, Overrides, ResultKind, Snapshot, TaxRate};

// --- Module Definition ---
/// Defines the `_core` Python extension module. The name `_core` marks it as
/// the compiled component behind the dashboard's Python package.
#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    use pyo3::prelude::*;
    use bindings::python;

    m.add_function(wrap_pyfunction!(python::evaluate, m)?)?;
    m.add_function(wrap_pyfunction!(python::evaluate_formula, m)?)?;
    m.add_function(wrap_pyfunction!(python::evaluate_all, m)?)?;
    m.add_function(wrap_pyfunction!(python::lint, m)?)?;
    m.add_function(wrap_pyfunction!(python::audit_trace, m)?)?;
    Ok(())
}
