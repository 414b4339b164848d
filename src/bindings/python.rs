//! Thin Python facade. Snapshots cross the boundary as JSON so the dashboard
//! can hand over its store payload unchanged.

use crate::analysis::validation;
use crate::compute::FormulaEngine;
use crate::config::EngineConfig;
use crate::display::trace;
use crate::store::Snapshot;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn load(snapshot_json: &str, config_json: Option<&str>) -> PyResult<(Snapshot, EngineConfig)> {
    let snapshot = Snapshot::from_json(snapshot_json)
        .map_err(|e| PyValueError::new_err(format!("Invalid snapshot: {}", e)))?;
    let config = match config_json {
        Some(json) => EngineConfig::from_json(json).map_err(|e| PyValueError::new_err(e.to_string()))?,
        None => EngineConfig::default(),
    };
    Ok((snapshot, config))
}

/// Evaluates `expression`; raises `ValueError` carrying the classified error.
#[pyfunction]
#[pyo3(signature = (snapshot_json, expression, config_json=None))]
pub fn evaluate(snapshot_json: &str, expression: &str, config_json: Option<&str>) -> PyResult<f64> {
    let (snapshot, config) = load(snapshot_json, config_json)?;
    FormulaEngine::new(&snapshot, &config)
        .evaluate_expression(expression)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Evaluates the formula called `name` as a standalone metric.
#[pyfunction]
#[pyo3(signature = (snapshot_json, name, config_json=None))]
pub fn evaluate_formula(snapshot_json: &str, name: &str, config_json: Option<&str>) -> PyResult<f64> {
    let (snapshot, config) = load(snapshot_json, config_json)?;
    FormulaEngine::new(&snapshot, &config)
        .evaluate_formula_by_name(name)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Evaluates every formula; returns a JSON array of `{id, value, error}`.
#[pyfunction]
#[pyo3(signature = (snapshot_json, config_json=None))]
pub fn evaluate_all(snapshot_json: &str, config_json: Option<&str>) -> PyResult<String> {
    let (snapshot, config) = load(snapshot_json, config_json)?;
    let rows = FormulaEngine::new(&snapshot, &config).report_all();
    serde_json::to_string(&rows).map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Returns lint diagnostics as a JSON array.
#[pyfunction]
#[pyo3(signature = (snapshot_json, config_json=None))]
pub fn lint(snapshot_json: &str, config_json: Option<&str>) -> PyResult<String> {
    let (snapshot, config) = load(snapshot_json, config_json)?;
    serde_json::to_string(&validation::lint(&snapshot, &config)).map_err(|e| PyValueError::new_err(e.to_string()))
}

#[pyfunction]
#[pyo3(signature = (snapshot_json, expression, config_json=None))]
pub fn audit_trace(snapshot_json: &str, expression: &str, config_json: Option<&str>) -> PyResult<String> {
    let (snapshot, config) = load(snapshot_json, config_json)?;
    Ok(trace::format_trace(&FormulaEngine::new(&snapshot, &config), expression))
}
