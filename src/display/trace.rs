use crate::compute::extract::distinct;
use crate::compute::ledger::{EvaluationResult, VariableSource};
use crate::compute::resolver::Visited;
use crate::compute::FormulaEngine;
use std::fmt::Write;

const TRACE_STACK_RED_ZONE: usize = 64 * 1024;
const TRACE_STACK_GROW: usize = 1024 * 1024;

/// Renders how every variable of `expression` was resolved, recursing into
/// formula dependencies, followed by the final result.
pub fn format_trace(engine: &FormulaEngine, expression: &str) -> String {
    let mut tracer = Tracer { engine, output: String::new() };

    let result = engine.evaluate_expression(expression);
    let _ = writeln!(tracer.output, "AUDIT TRACE for '{}':", expression);
    let _ = writeln!(tracer.output, "--------------------------------------------------");
    let _ = writeln!(tracer.output, "Result: {}", format_result(&result));

    tracer.trace_expression(expression, &mut Visited::new(), 1, "");
    tracer.output
}

fn format_result(result: &EvaluationResult) -> String {
    match result {
        Ok(v) => format!("{}", v),
        Err(e) => format!("ERROR: {}", e),
    }
}

struct Tracer<'e, 'a> {
    engine: &'e FormulaEngine<'a>,
    output: String,
}

impl<'e, 'a> Tracer<'e, 'a> {
    fn trace_expression(&mut self, expression: &str, visited: &mut Visited, level: usize, prefix: &str) {
        stacker::maybe_grow(TRACE_STACK_RED_ZONE, TRACE_STACK_GROW, || {
            self.trace_level(expression, visited, level, prefix)
        })
    }

    fn trace_level(&mut self, expression: &str, visited: &mut Visited, level: usize, prefix: &str) {
        let engine = self.engine;
        let resolver = engine.resolver();
        let overrides = &engine.snapshot().overrides;
        let table = resolver.resolve(expression, overrides, visited);
        let names = distinct(expression);
        let stem = build_child_stem(prefix);

        for (i, &name) in names.iter().enumerate() {
            let connector = if i == names.len() - 1 { "`--" } else { "|--" };
            let line = format!("{}{}", stem, connector);

            match table.entry(name) {
                Some(entry) => match entry.source {
                    VariableSource::Formula(id) => {
                        let expr = resolver.registry().get(name).map(|f| f.expression.as_str()).unwrap_or("?");
                        let _ = writeln!(self.output, "{}[L{}] {} = {} (formula #{}: {})", line, level, name, entry.value, id.0, expr);
                        visited.push(id);
                        self.trace_expression(expr, visited, level + 1, &line);
                        visited.pop();
                    }
                    source => {
                        let _ = writeln!(self.output, "{}[L{}] {} = {} ({})", line, level, name, entry.value, source_label(source));
                    }
                },
                None => match resolver.registry().get(name) {
                    Some(formula) if visited.contains(formula.id) => {
                        let _ = writeln!(self.output, "{}[L{}] {} -> (Cycle: formula #{} already on path)", line, level, name, formula.id.0);
                    }
                    Some(formula) => {
                        visited.push(formula.id);
                        let failure = resolver.evaluate(&formula.expression, overrides, visited);
                        let _ = writeln!(
                            self.output,
                            "{}[L{}] {} -> {} (formula #{}: {})",
                            line, level, name, format_result(&failure), formula.id.0, formula.expression
                        );
                        self.trace_expression(&formula.expression, visited, level + 1, &line);
                        visited.pop();
                    }
                    None => {
                        let _ = writeln!(self.output, "{}[L{}] {} -> MISSING", line, level, name);
                    }
                },
            }
        }
    }
}

fn source_label(source: VariableSource) -> &'static str {
    match source {
        VariableSource::TaxRate => "tax rate",
        VariableSource::Detail => "detail",
        VariableSource::Formula(_) => "formula",
        VariableSource::Override => "override",
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}
