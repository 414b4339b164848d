//! Static checks over a snapshot's formulas, run by the dashboard before a
//! formula is saved. Nothing here changes evaluation; a formula with
//! diagnostics still evaluates (and fails) exactly as it would otherwise.

use super::topology::DependencyGraph;
use crate::compute::evaluator::evaluate_with;
use crate::compute::extract::distinct;
use crate::compute::ledger::{FormulaError, VariableTable};
use crate::config::EngineConfig;
use crate::store::{FormulaId, FormulaRegistry, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The specific category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Two or more formulas share a name; only one is reachable.
    DuplicateName,
    /// A token names nothing in any source.
    UnknownVariable,
    /// A token names a detail whose value is not a number.
    NonNumericDetail,
    /// The formula is part of a reference cycle and can never resolve.
    Cycle,
    /// The expression contains characters outside the arithmetic sandbox.
    InvalidCharacters,
    /// The expression is not valid arithmetic.
    Syntax,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// `None` for registry-wide findings such as duplicate names.
    pub formula: Option<FormulaId>,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Lints every formula in the snapshot. Diagnostics are grouped by formula in
/// snapshot order, duplicate-name findings first.
pub fn lint(snapshot: &Snapshot, config: &EngineConfig) -> Vec<Diagnostic> {
    let registry = FormulaRegistry::build(&snapshot.formulas, config.duplicate_names);
    let mut diagnostics = Vec::new();

    for name in registry.duplicate_names() {
        diagnostics.push(Diagnostic {
            formula: None,
            kind: DiagnosticKind::DuplicateName,
            message: format!("Formula name '{}' is defined more than once", name),
        });
    }

    let known: HashSet<String> = snapshot
        .details
        .iter()
        .filter(|d| config.parse_detail(&d.raw_value).is_some())
        .map(|d| d.name.clone())
        .chain(snapshot.tax_rates.iter().map(|t| t.variable_name()))
        .chain(snapshot.overrides.keys().cloned())
        .collect();
    let non_numeric: HashSet<&str> = snapshot
        .details
        .iter()
        .filter(|d| !known.contains(&d.name))
        .map(|d| d.name.as_str())
        .collect();

    let graph = DependencyGraph::build(&registry);
    let cyclic: HashSet<FormulaId> = graph.cycles().into_iter().flatten().collect();

    for formula in registry.all() {
        let mut found = |kind, message: String| {
            diagnostics.push(Diagnostic { formula: Some(formula.id), kind, message });
        };

        for name in distinct(&formula.expression) {
            if known.contains(name) || registry.contains(name) {
                continue;
            }
            if non_numeric.contains(name) {
                found(DiagnosticKind::NonNumericDetail, format!("Detail '{}' does not hold a number", name));
            } else {
                found(DiagnosticKind::UnknownVariable, format!("Unknown variable '{}'", name));
            }
        }

        if cyclic.contains(&formula.id) {
            found(DiagnosticKind::Cycle, format!("Formula '{}' is part of a reference cycle", formula.name));
        }

        // Shape check: every token stands in as 1.
        let placeholders: VariableTable = distinct(&formula.expression).into_iter().map(|n| (n, 1.0)).collect();
        match evaluate_with(&formula.expression, &placeholders, config) {
            Err(FormulaError::InvalidCharacters) => found(
                DiagnosticKind::InvalidCharacters,
                "Only numbers, + - * / % ( ) and {Variable} references are allowed".to_string(),
            ),
            Err(FormulaError::EvaluationError(e)) => found(DiagnosticKind::Syntax, e.to_string()),
            _ => {}
        }
    }

    diagnostics
}
