//! Variable extraction, resolution, and sandboxed evaluation.
pub mod bytecode;
pub mod engine;
pub mod evaluator;
pub mod extract;
pub mod kernel;
pub mod ledger;
pub mod resolver;

pub use engine::{evaluate_snapshot, FormulaEngine};
pub use evaluator::evaluate;
pub use extract::extract;
pub use ledger::{EvaluationReport, EvaluationResult, FormulaReport, FormulaError, ParseError, VariableSource, VariableTable};
pub use resolver::{resolve, Resolver, Visited};
