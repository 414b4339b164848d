//! Builds the flat variable table for one expression.
//!
//! Details and tax rates are parsed once per resolver. Formulas are resolved
//! on demand: only those whose name appears as a token in the expression being
//! resolved, each by recursively resolving and evaluating its own expression.
//! The path of formulas entered so far is threaded explicitly as [`Visited`];
//! a formula already on the path is skipped, so its name stays absent and the
//! formula that needed it fails with `VariableNotFound`.

use super::evaluator::evaluate_with;
use super::extract::distinct;
use super::ledger::{EvaluationResult, VariableSource, VariableTable};
use crate::config::EngineConfig;
use crate::store::{FormulaDefinition, FormulaId, FormulaRegistry, Overrides, Snapshot};
use smallvec::SmallVec;
use tracing::{debug, trace};

// Formula chains can be thousands deep; nested resolution grows the stack on
// the heap once less than the red zone remains.
const RESOLVE_STACK_RED_ZONE: usize = 64 * 1024;
const RESOLVE_STACK_GROW: usize = 1024 * 1024;

/// The formula ids entered on the current resolution path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visited(SmallVec<[FormulaId; 8]>);

impl Visited {
    pub fn new() -> Self { Self::default() }

    /// A path that already contains `id`, used when evaluating a formula's own
    /// expression so it cannot resolve itself.
    pub fn starting_at(id: FormulaId) -> Self {
        let mut path = Self::new();
        path.0.push(id);
        path
    }

    pub fn contains(&self, id: FormulaId) -> bool { self.0.contains(&id) }

    pub fn depth(&self) -> usize { self.0.len() }

    pub(crate) fn push(&mut self, id: FormulaId) { self.0.push(id); }

    pub(crate) fn pop(&mut self) { self.0.pop(); }
}

#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    registry: FormulaRegistry<'a>,
    config: &'a EngineConfig,
    /// Tax rates overlaid by numeric details.
    base: VariableTable,
}

impl<'a> Resolver<'a> {
    pub fn new(snapshot: &'a Snapshot, config: &'a EngineConfig) -> Self {
        let mut base = VariableTable::new();

        for rate in &snapshot.tax_rates {
            base.insert(rate.variable_name(), rate.rate, VariableSource::TaxRate);
        }
        for detail in &snapshot.details {
            match config.parse_detail(&detail.raw_value) {
                Some(value) => base.insert(detail.name.clone(), value, VariableSource::Detail),
                None => trace!(detail = %detail.name, raw = %detail.raw_value, "dropping non-numeric detail"),
            }
        }

        Self {
            registry: FormulaRegistry::build(&snapshot.formulas, config.duplicate_names),
            config,
            base,
        }
    }

    pub fn registry(&self) -> &FormulaRegistry<'a> { &self.registry }

    pub fn config(&self) -> &EngineConfig { self.config }

    /// The name -> number table for `expression`, in precedence order
    /// overrides > resolved formulas > details > tax rates.
    pub fn resolve(&self, expression: &str, overrides: &Overrides, visited: &mut Visited) -> VariableTable {
        let mut table = self.base.clone();

        for name in distinct(expression) {
            // Overrides shadow the formula anyway; skip the work.
            if overrides.contains_key(name) {
                continue;
            }
            let Some(formula) = self.registry.get(name) else { continue };
            if visited.contains(formula.id) {
                debug!(formula = name, id = formula.id.0, depth = visited.depth(), "cycle guard: formula already on path");
                continue;
            }

            match self.evaluate_nested(formula, overrides, visited) {
                Ok(value) => table.insert(name, value, VariableSource::Formula(formula.id)),
                Err(e) => debug!(formula = name, id = formula.id.0, error = %e, "nested formula failed; leaving it unresolved"),
            }
        }

        for (name, &value) in overrides {
            table.insert(name.as_str(), value, VariableSource::Override);
        }
        table
    }

    /// Resolves and evaluates `expression` on the given path.
    pub fn evaluate(&self, expression: &str, overrides: &Overrides, visited: &mut Visited) -> EvaluationResult {
        let table = self.resolve(expression, overrides, visited);
        evaluate_with(expression, &table, self.config)
    }

    fn evaluate_nested(&self, formula: &FormulaDefinition, overrides: &Overrides, visited: &mut Visited) -> EvaluationResult {
        visited.push(formula.id);
        let result = stacker::maybe_grow(RESOLVE_STACK_RED_ZONE, RESOLVE_STACK_GROW, || {
            self.evaluate(&formula.expression, overrides, visited)
        });
        visited.pop();
        result
    }
}

/// One-shot resolution with the default configuration.
pub fn resolve(expression: &str, snapshot: &Snapshot, visited: &mut Visited) -> VariableTable {
    let config = EngineConfig::default();
    Resolver::new(snapshot, &config).resolve(expression, &snapshot.overrides, visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ledger::FormulaError;
    use crate::config::DuplicateNamePolicy;
    use crate::store::{FormulaDefinition, TaxRate};

    fn formula(id: u64, name: &str, expr: &str) -> FormulaDefinition {
        FormulaDefinition::new(id, name, expr)
    }

    #[test]
    fn test_detail_values_parse_or_vanish() {
        let snapshot = Snapshot::new()
            .with_detail("Units", "12")
            .with_detail("Notes", "corner lot")
            .with_detail("Empty", "");
        let table = resolve("{Units} + {Notes}", &snapshot, &mut Visited::new());

        assert_eq!(table.get("Units"), Some(12.0));
        assert!(!table.contains("Notes"));
        assert!(!table.contains("Empty"));
    }

    #[test]
    fn test_exponent_detail_is_a_number() {
        let snapshot = Snapshot::new().with_detail("Big", "1e5");
        let table = resolve("{Big}", &snapshot, &mut Visited::new());
        assert_eq!(table.get("Big"), Some(100000.0));
        assert_eq!(evaluate_with("{Big} / 4", &table, &EngineConfig::default()), Ok(25000.0));
    }

    #[test]
    fn test_precedence_override_formula_detail_tax() {
        let snapshot = Snapshot::new()
            .with_tax_rate(TaxRate::new("Shared", None, 1.0))
            .with_detail("Shared Tax Rate", "2")
            .with_detail("Price", "5")
            .with_formula(formula(1, "Price", "40 + 2"))
            .with_detail("Rent", "7")
            .with_override("Rent", 9.0);
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);
        let table = resolver.resolve("{Shared Tax Rate} {Price} {Rent}", &snapshot.overrides, &mut Visited::new());

        assert_eq!(table.entry("Shared Tax Rate").map(|e| (e.value, e.source)), Some((2.0, VariableSource::Detail)));
        assert_eq!(table.entry("Price").map(|e| (e.value, e.source)), Some((42.0, VariableSource::Formula(FormulaId(1)))));
        assert_eq!(table.entry("Rent").map(|e| (e.value, e.source)), Some((9.0, VariableSource::Override)));
    }

    #[test]
    fn test_only_referenced_formulas_are_resolved() {
        let snapshot = Snapshot::new()
            .with_formula(formula(1, "Used", "1 + 1"))
            .with_formula(formula(2, "Unused", "2 + 2"));
        let table = resolve("{Used} * 3", &snapshot, &mut Visited::new());

        assert_eq!(table.get("Used"), Some(2.0));
        assert!(!table.contains("Unused"));
    }

    #[test]
    fn test_failed_formula_is_absent_and_detail_survives() {
        let snapshot = Snapshot::new()
            .with_detail("Margin", "0.25")
            .with_formula(formula(1, "Margin", "{Profit} / {Revenue}"))
            .with_formula(formula(2, "Broken", "1 / 0"));
        let table = resolve("{Margin} + {Broken}", &snapshot, &mut Visited::new());

        assert_eq!(table.entry("Margin").map(|e| e.source), Some(VariableSource::Detail));
        assert!(!table.contains("Broken"));
    }

    #[test]
    fn test_two_formula_cycle() {
        let snapshot = Snapshot::new()
            .with_formula(formula(1, "A", "{B}+1"))
            .with_formula(formula(2, "B", "{A}+1"));
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);

        let result = resolver.evaluate("{A}", &snapshot.overrides, &mut Visited::new());
        assert_eq!(result, Err(FormulaError::VariableNotFound("A".into())));
    }

    #[test]
    fn test_self_reference_fails_on_itself() {
        let snapshot = Snapshot::new().with_formula(formula(1, "Loop", "{Loop} * 2"));
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);

        let mut visited = Visited::starting_at(FormulaId(1));
        let result = resolver.evaluate("{Loop} * 2", &snapshot.overrides, &mut visited);
        assert_eq!(result, Err(FormulaError::VariableNotFound("Loop".into())));
        assert_eq!(visited, Visited::starting_at(FormulaId(1)), "path is restored after resolution");
    }

    #[test]
    fn test_long_cycle_terminates() {
        let n = 40;
        let mut snapshot = Snapshot::new();
        for i in 0..n {
            let next = (i + 1) % n;
            snapshot = snapshot.with_formula(formula(i, &format!("F{}", i), &format!("{{F{}}} + 1", next)));
        }
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);

        for i in [0, 17, n - 1] {
            let result = resolver.evaluate(&format!("{{F{}}}", i), &snapshot.overrides, &mut Visited::new());
            assert!(matches!(result, Err(FormulaError::VariableNotFound(_))), "F{} gave {:?}", i, result);
        }
    }

    #[test]
    fn test_cycle_of_thousands_of_formulas_terminates() {
        let n = 5000;
        let mut snapshot = Snapshot::new();
        for i in 0..n {
            let next = (i + 1) % n;
            snapshot = snapshot.with_formula(formula(i, &format!("F{}", i), &format!("{{F{}}} + 1", next)));
        }
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);

        let mut visited = Visited::new();
        let result = resolver.evaluate("{F0}", &snapshot.overrides, &mut visited);
        assert_eq!(result, Err(FormulaError::VariableNotFound("F0".into())));
        assert_eq!(visited.depth(), 0);
    }

    #[test]
    fn test_long_chain_resolves_to_the_end() {
        let n = 3000;
        let mut snapshot = Snapshot::new().with_detail("Seed", "1");
        for i in 0..n {
            let expr = if i + 1 == n { "{Seed}".to_string() } else { format!("{{C{}}} + 1", i + 1) };
            snapshot = snapshot.with_formula(formula(i, &format!("C{}", i), &expr));
        }
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);

        assert_eq!(resolver.evaluate("{C0}", &snapshot.overrides, &mut Visited::new()), Ok(n as f64));
    }

    #[test]
    fn test_override_breaks_a_cycle() {
        let snapshot = Snapshot::new()
            .with_formula(formula(1, "A", "{B}+1"))
            .with_formula(formula(2, "B", "{A}+1"))
            .with_override("B", 10.0);
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);

        assert_eq!(resolver.evaluate("{A}", &snapshot.overrides, &mut Visited::new()), Ok(11.0));
    }

    #[test]
    fn test_chained_formulas_resolve_through_details() {
        let snapshot = Snapshot::new()
            .with_detail("Rent", "3000")
            .with_detail("Expenses", "1000")
            .with_detail("Price", "240000")
            .with_formula(formula(1, "NOI", "({Rent} - {Expenses}) * 12"))
            .with_formula(formula(2, "Cap Rate", "{NOI} * 100 / {Price}"));
        let config = EngineConfig::default();
        let resolver = Resolver::new(&snapshot, &config);

        assert_eq!(resolver.evaluate("{Cap Rate}", &snapshot.overrides, &mut Visited::new()), Ok(10.0));
    }

    #[test]
    fn test_duplicate_names_follow_policy() {
        let snapshot = Snapshot::new()
            .with_formula(formula(1, "Dup", "1"))
            .with_formula(formula(2, "Dup", "2"));

        let first = EngineConfig::default();
        let last = EngineConfig { duplicate_names: DuplicateNamePolicy::LastWins, ..Default::default() };

        let eval = |config: &EngineConfig| Resolver::new(&snapshot, config).evaluate("{Dup}", &snapshot.overrides, &mut Visited::new());
        assert_eq!(eval(&first), Ok(1.0));
        assert_eq!(eval(&last), Ok(2.0));
    }
}
