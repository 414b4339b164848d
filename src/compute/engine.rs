use crate::compute::ledger::{EvaluationResult, FormulaError, FormulaReport, VariableTable};
use crate::compute::resolver::{Resolver, Visited};
use crate::config::EngineConfig;
use crate::store::{FormulaDefinition, FormulaId, Overrides, Snapshot};
use rayon::prelude::*;
use tracing::debug;

/// Entry point for one dashboard request.
///
/// Borrows a snapshot of every variable source and indexes it once; the engine
/// holds no other state, so independent engines (or threads sharing one) never
/// need to coordinate.
pub struct FormulaEngine<'a> {
    snapshot: &'a Snapshot,
    resolver: Resolver<'a>,
}

impl<'a> FormulaEngine<'a> {
    pub fn new(snapshot: &'a Snapshot, config: &'a EngineConfig) -> Self {
        Self { snapshot, resolver: Resolver::new(snapshot, config) }
    }

    pub fn snapshot(&self) -> &'a Snapshot { self.snapshot }

    pub fn resolver(&self) -> &Resolver<'a> { &self.resolver }

    /// Evaluates free-form formula text (e.g. a KPI cell) against the snapshot.
    pub fn evaluate_expression(&self, expression: &str) -> EvaluationResult {
        self.resolver.evaluate(expression, &self.snapshot.overrides, &mut Visited::new())
    }

    /// Evaluates a formula's own expression. The formula is on the path from
    /// the start, so a self reference fails instead of recursing.
    pub fn evaluate_formula(&self, formula: &FormulaDefinition) -> EvaluationResult {
        let mut visited = Visited::starting_at(formula.id);
        self.resolver.evaluate(&formula.expression, &self.snapshot.overrides, &mut visited)
    }

    /// Evaluates `{name}` - the value a reference to `name` would see.
    pub fn evaluate_named(&self, name: &str) -> EvaluationResult {
        self.evaluate_expression(&format!("{{{}}}", name))
    }

    /// The resolved table an evaluation of `expression` would substitute from.
    pub fn variable_table(&self, expression: &str) -> VariableTable {
        self.resolver.resolve(expression, &self.snapshot.overrides, &mut Visited::new())
    }

    /// Every formula in the snapshot, evaluated in parallel. Results keep
    /// snapshot order.
    pub fn evaluate_all(&self) -> Vec<(FormulaId, EvaluationResult)> {
        let formulas = self.resolver.registry().all();
        debug!(count = formulas.len(), "evaluating all formulas");
        formulas
            .par_iter()
            .map(|f| (f.id, self.evaluate_formula(f)))
            .collect()
    }

    /// `evaluate_all` in the serializable shape the dashboard consumes.
    pub fn report_all(&self) -> Vec<FormulaReport> {
        self.evaluate_all()
            .iter()
            .map(|(id, result)| FormulaReport { id: *id, report: result.into() })
            .collect()
    }

    /// One expression under several override sets (e.g. KPI sensitivity
    /// inputs), evaluated in parallel. Scenario overrides are layered on top
    /// of the snapshot's own overrides.
    pub fn evaluate_scenarios(&self, expression: &str, scenarios: &[Overrides]) -> Vec<EvaluationResult> {
        debug!(count = scenarios.len(), "evaluating scenarios");
        scenarios
            .par_iter()
            .map(|scenario| {
                let mut overrides = self.snapshot.overrides.clone();
                overrides.extend(scenario.iter().map(|(k, v)| (k.clone(), *v)));
                self.resolver.evaluate(expression, &overrides, &mut Visited::new())
            })
            .collect()
    }

    /// Looks up a formula by name (per the duplicate-name policy) and
    /// evaluates it.
    pub fn evaluate_formula_by_name(&self, name: &str) -> EvaluationResult {
        match self.resolver.registry().get(name) {
            Some(formula) => self.evaluate_formula(formula),
            None => Err(FormulaError::VariableNotFound(name.to_owned())),
        }
    }
}

/// Resolves and evaluates `expression` against `snapshot` with the default
/// configuration.
pub fn evaluate_snapshot(expression: &str, snapshot: &Snapshot) -> EvaluationResult {
    let config = EngineConfig::default();
    FormulaEngine::new(snapshot, &config).evaluate_expression(expression)
}
