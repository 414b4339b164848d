use crate::compute::extract::distinct;
use crate::store::{FormulaDefinition, FormulaId, FormulaRegistry};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("Cycle detected involving formula '{name}'")]
    Cycle { id: FormulaId, name: String },
}

/// Formula-to-formula reference graph of a registry.
///
/// Edges point from a dependency to the formula that references it. Only
/// formulas reachable by name take part; detail, tax-rate, and override
/// names are leaves and are not represented.
pub struct DependencyGraph<'a> {
    graph: DiGraph<&'a FormulaDefinition, ()>,
    nodes: HashMap<FormulaId, NodeIndex>,
}

impl<'a> DependencyGraph<'a> {
    pub fn build(registry: &FormulaRegistry<'a>) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for formula in registry.active() {
            let idx = graph.add_node(formula);
            nodes.insert(formula.id, idx);
        }

        for formula in registry.active() {
            let dependent = nodes[&formula.id];
            for name in distinct(&formula.expression) {
                if let Some(dep) = registry.get(name) {
                    graph.update_edge(nodes[&dep.id], dependent, ());
                }
            }
        }

        Self { graph, nodes }
    }

    pub fn formula_count(&self) -> usize { self.graph.node_count() }

    /// Formulas referenced directly by `id`, in snapshot order.
    pub fn dependencies_of(&self, id: FormulaId) -> Vec<FormulaId> {
        self.neighbours(id, Direction::Incoming)
    }

    /// Formulas that reference `id` directly, in snapshot order.
    pub fn dependents_of(&self, id: FormulaId) -> Vec<FormulaId> {
        self.neighbours(id, Direction::Outgoing)
    }

    fn neighbours(&self, id: FormulaId, dir: Direction) -> Vec<FormulaId> {
        let Some(&idx) = self.nodes.get(&id) else { return Vec::new() };
        let mut found: Vec<NodeIndex> = self.graph.neighbors_directed(idx, dir).collect();
        found.sort();
        found.into_iter().map(|n| self.graph[n].id).collect()
    }

    /// Every reference cycle: strongly connected components with more than
    /// one formula, plus formulas that reference themselves. Members and
    /// cycles are listed in snapshot order.
    pub fn cycles(&self) -> Vec<Vec<FormulaId>> {
        let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect();
        cycles.sort();
        cycles
            .into_iter()
            .map(|scc| scc.into_iter().map(|n| self.graph[n].id).collect())
            .collect()
    }

    /// An order in which every formula comes after the formulas it references.
    pub fn evaluation_order(&self) -> Result<Vec<FormulaId>, TopologyError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n].id).collect())
            .map_err(|cycle| {
                let formula = self.graph[cycle.node_id()];
                TopologyError::Cycle { id: formula.id, name: formula.name.clone() }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicateNamePolicy;

    fn f(id: u64, name: &str, expr: &str) -> FormulaDefinition {
        FormulaDefinition::new(id, name, expr)
    }

    #[test]
    fn test_order_diamond_dependency() {
        // Base -> Left, Base -> Right, Left + Right -> Top
        let formulas = vec![
            f(4, "Top", "{Left} + {Right}"),
            f(2, "Left", "{Base} * 2"),
            f(3, "Right", "{Base} + {Some Detail}"),
            f(1, "Base", "10"),
        ];
        let reg = FormulaRegistry::build(&formulas, DuplicateNamePolicy::FirstWins);
        let graph = DependencyGraph::build(&reg);

        let order = graph.evaluation_order().expect("acyclic");
        let pos = |id: u64| order.iter().position(|&x| x == FormulaId(id)).unwrap();
        assert!(pos(1) < pos(2));
        assert!(pos(1) < pos(3));
        assert!(pos(2) < pos(4));
        assert!(pos(3) < pos(4));

        assert_eq!(graph.dependencies_of(FormulaId(4)), vec![FormulaId(2), FormulaId(3)]);
        assert_eq!(graph.dependents_of(FormulaId(1)), vec![FormulaId(2), FormulaId(3)]);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let formulas = vec![
            f(1, "A", "{B} + 1"),
            f(2, "B", "{C} + 1"),
            f(3, "C", "{A} + 1"),
            f(4, "Self", "{Self} * 2"),
            f(5, "Free", "{A} + 1"),
        ];
        let reg = FormulaRegistry::build(&formulas, DuplicateNamePolicy::FirstWins);
        let graph = DependencyGraph::build(&reg);

        assert_eq!(
            graph.cycles(),
            vec![vec![FormulaId(1), FormulaId(2), FormulaId(3)], vec![FormulaId(4)]]
        );
        let err = graph.evaluation_order().unwrap_err();
        assert!(err.to_string().contains("Cycle detected"), "Msg: {}", err);
    }

    #[test]
    fn test_shadowed_duplicates_are_not_nodes() {
        let formulas = vec![f(1, "X", "1"), f(2, "X", "{Y}"), f(3, "Y", "{X}")];
        let reg = FormulaRegistry::build(&formulas, DuplicateNamePolicy::FirstWins);
        let graph = DependencyGraph::build(&reg);

        assert_eq!(graph.formula_count(), 2);
        assert!(graph.cycles().is_empty());

        let reg = FormulaRegistry::build(&formulas, DuplicateNamePolicy::LastWins);
        assert_eq!(DependencyGraph::build(&reg).cycles(), vec![vec![FormulaId(2), FormulaId(3)]]);
    }
}
