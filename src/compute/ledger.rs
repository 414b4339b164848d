//! ledger.rs
//! The flat name -> number table handed to the evaluator, and the error taxonomy.

use crate::store::FormulaId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use self::error::{FormulaError, ParseError};
mod error {
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    /// A syntax error in an arithmetic expression. `position` is a byte offset
    /// into the substituted expression text.
    #[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[error("{message} at position {position}")]
    pub struct ParseError {
        pub position: usize,
        pub message: String,
    }

    impl ParseError {
        pub fn new(position: usize, message: impl Into<String>) -> Self {
            Self { position, message: message.into() }
        }
    }

    #[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", content = "detail")]
    pub enum FormulaError {
        #[error("Variable not found: {0}")]
        VariableNotFound(String),
        #[error("Expression contains characters outside the arithmetic sandbox")]
        InvalidCharacters,
        #[error("Evaluation error: {0}")]
        EvaluationError(ParseError),
        #[error("Result is not a finite number")]
        InvalidResult,
    }
}

/// Outcome of one evaluation. Every failure is a value, never a panic.
pub type EvaluationResult = Result<f64, FormulaError>;

/// Serializable `{value, error}` view of an `EvaluationResult` for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub value: Option<f64>,
    pub error: Option<FormulaError>,
}

impl From<&EvaluationResult> for EvaluationReport {
    fn from(result: &EvaluationResult) -> Self {
        match result {
            Ok(value) => Self { value: Some(*value), error: None },
            Err(e) => Self { value: None, error: Some(e.clone()) },
        }
    }
}

/// One formula's report, serialized flat as `{id, value, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaReport {
    pub id: FormulaId,
    #[serde(flatten)]
    pub report: EvaluationReport,
}

/// Where a table entry came from. Later sources shadow earlier ones in the
/// order tax rate < detail < formula < override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableSource {
    TaxRate,
    Detail,
    Formula(FormulaId),
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableEntry {
    pub value: f64,
    pub source: VariableSource,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    entries: HashMap<String, TableEntry>,
}

impl VariableTable {
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.get(name).map(|e| e.value)
    }

    pub fn entry(&self, name: &str) -> Option<&TableEntry> {
        self.entries.get(name)
    }

    /// Inserts or overwrites `name`. Callers insert in precedence order.
    pub fn insert(&mut self, name: impl Into<String>, value: f64, source: VariableSource) {
        self.entries.insert(name.into(), TableEntry { value, source });
    }

    pub fn contains(&self, name: &str) -> bool { self.entries.contains_key(name) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<S: Into<String>> FromIterator<(S, f64)> for VariableTable {
    /// Builds a table of override-sourced entries; mostly useful in tests
    /// and for evaluating against a caller-built table.
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, value) in iter {
            table.insert(name, value, VariableSource::Override);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_overwrites_with_newer_source() {
        let mut table = VariableTable::new();
        table.insert("Rate", 2.0, VariableSource::Detail);
        table.insert("Rate", 3.5, VariableSource::Override);

        assert_eq!(table.get("Rate"), Some(3.5));
        assert_eq!(table.entry("Rate").map(|e| e.source), Some(VariableSource::Override));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_error_serializes_as_tagged_json() {
        let err = FormulaError::VariableNotFound("Rehab Cost".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"kind":"VariableNotFound","detail":"Rehab Cost"}"#);

        let report = EvaluationReport::from(&Err(FormulaError::InvalidResult));
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"value":null,"error":{"kind":"InvalidResult"}}"#);
    }

    #[test]
    fn test_parse_error_display() {
        let err = FormulaError::EvaluationError(ParseError::new(4, "unexpected end of expression"));
        assert_eq!(err.to_string(), "Evaluation error: unexpected end of expression at position 4");
    }
}
