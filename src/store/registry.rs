use super::types::*;
use crate::config::DuplicateNamePolicy;
use std::collections::HashMap;
use tracing::warn;

/// Per-call name index over the snapshot's formulas.
///
/// Built once per engine and never cached across calls. Each name maps to
/// exactly one definition, chosen by the configured `DuplicateNamePolicy`.
#[derive(Debug, Clone, Default)]
pub struct FormulaRegistry<'a> {
    formulas: &'a [FormulaDefinition],
    by_name: HashMap<&'a str, usize>,
    duplicates: Vec<&'a str>,
}

impl<'a> FormulaRegistry<'a> {
    pub fn build(formulas: &'a [FormulaDefinition], policy: DuplicateNamePolicy) -> Self {
        let mut by_name: HashMap<&'a str, usize> = HashMap::with_capacity(formulas.len());
        let mut duplicates = Vec::new();

        for (idx, formula) in formulas.iter().enumerate() {
            let name = formula.name.as_str();
            match by_name.get(name) {
                None => {
                    by_name.insert(name, idx);
                }
                Some(&kept) => {
                    warn!(formula = name, kept_id = formulas[kept].id.0, other_id = formula.id.0, "duplicate formula name");
                    if !duplicates.contains(&name) {
                        duplicates.push(name);
                    }
                    if policy == DuplicateNamePolicy::LastWins {
                        by_name.insert(name, idx);
                    }
                }
            }
        }

        Self { formulas, by_name, duplicates }
    }

    pub fn count(&self) -> usize { self.formulas.len() }

    pub fn get(&self, name: &str) -> Option<&'a FormulaDefinition> {
        self.by_name.get(name).map(|&idx| &self.formulas[idx])
    }

    pub fn contains(&self, name: &str) -> bool { self.by_name.contains_key(name) }

    /// Every definition, in snapshot order (shadowed duplicates included).
    pub fn all(&self) -> &'a [FormulaDefinition] { self.formulas }

    /// Definitions reachable by name, in snapshot order.
    pub fn active(&self) -> impl Iterator<Item = &'a FormulaDefinition> + '_ {
        self.formulas
            .iter()
            .enumerate()
            .filter(move |(idx, f)| self.by_name.get(f.name.as_str()) == Some(idx))
            .map(|(_, f)| f)
    }

    /// Names defined by more than one formula, in order of first clash.
    pub fn duplicate_names(&self) -> &[&'a str] { &self.duplicates }
}
