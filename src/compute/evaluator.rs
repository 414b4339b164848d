//! Substitutes resolved values into formula text and evaluates it inside the
//! arithmetic sandbox.

use super::bytecode::Program;
use super::extract::extract;
use super::kernel;
use super::ledger::{EvaluationResult, FormulaError, ParseError, VariableTable};
use crate::config::EngineConfig;
use tracing::trace;

/// Evaluates `expression` against `table` with the default nesting bound.
pub fn evaluate(expression: &str, table: &VariableTable) -> EvaluationResult {
    evaluate_with(expression, table, &EngineConfig::default())
}

pub fn evaluate_with(expression: &str, table: &VariableTable, config: &EngineConfig) -> EvaluationResult {
    let substituted = substitute(expression, table)?;

    if !within_sandbox(&substituted) {
        return Err(FormulaError::InvalidCharacters);
    }

    let program = Program::compile(&substituted, config.max_nesting_depth)
        .map_err(FormulaError::EvaluationError)?;
    let value = kernel::execute(&program)
        .ok_or_else(|| FormulaError::EvaluationError(ParseError::new(0, "malformed program")))?;

    if !value.is_finite() {
        return Err(FormulaError::InvalidResult);
    }
    Ok(value)
}

/// Replaces each `{Name}` occurrence, left to right, with its value written as
/// a plain decimal. The first name missing from `table` aborts the whole
/// substitution.
pub fn substitute(expression: &str, table: &VariableTable) -> Result<String, FormulaError> {
    let mut working = expression.to_owned();

    for name in extract(expression) {
        let value = table
            .get(name)
            .ok_or_else(|| FormulaError::VariableNotFound(name.to_owned()))?;
        let token = format!("{{{}}}", name);
        // `Display` for f64 never uses exponent notation.
        working = working.replacen(&token, &value.to_string(), 1);
        trace!(variable = name, value, "substituted");
    }
    Ok(working)
}

/// Whether every character is a digit, a decimal point, one of `+ - * / ( ) %`,
/// or whitespace.
pub fn within_sandbox(text: &str) -> bool {
    text.chars().all(|c| {
        c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '*' | '/' | '(' | ')' | '%') || c.is_whitespace()
    })
}
