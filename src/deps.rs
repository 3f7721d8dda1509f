//! Component dependency graph built from announced integration points.
//!
//! An edge `A -> B` means component A depends on B.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

use crate::store::IntegrationPoint;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DepsError {
    #[error("Dependency cycle involving '{0}'")]
    Cycle(String),
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    /// Names that have been declared as components (not just depended upon)
    components: BTreeSet<String>,
}

/// Summary of a dependency check, suitable for `--json` output
#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyReport {
    pub components: usize,
    pub edges: usize,
    pub cycles: Vec<Vec<String>>,
    pub unregistered: Vec<String>,
    pub ok: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edges from every announced component to each name in its
    /// `interface.dependencies`
    pub fn from_integration_points(points: &[IntegrationPoint]) -> Self {
        let mut deps = Self::new();
        for point in points {
            deps.add_component(&point.component);
            for dep in point.dependencies() {
                deps.declare(&point.component, dep);
            }
        }
        deps
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn add_component(&mut self, component: &str) {
        self.node(component);
        self.components.insert(component.to_string());
    }

    /// Record that `component` depends on `depends_on`. Repeats are ignored.
    pub fn declare(&mut self, component: &str, depends_on: &str) {
        self.add_component(component);
        let from = self.node(component);
        let to = self.node(depends_on);
        self.graph.update_edge(from, to, ());
    }

    fn neighbors(&self, name: &str, dir: Direction) -> Vec<String> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n].clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// What `component` depends on, sorted
    pub fn dependencies(&self, component: &str) -> Vec<String> {
        self.neighbors(component, Direction::Outgoing)
    }

    /// What depends on `component`, sorted
    pub fn dependents(&self, component: &str) -> Vec<String> {
        self.neighbors(component, Direction::Incoming)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every group of mutually dependent components, including self loops.
    /// Members of each cycle are sorted, and the cycles themselves are sorted.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut names: Vec<String> =
                    scc.into_iter().map(|n| self.graph[n].clone()).collect();
                names.sort();
                names
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Dependencies first. Fails on the first cycle found.
    pub fn build_order(&self) -> Result<Vec<String>, DepsError> {
        let order = toposort(&self.graph, None)
            .map_err(|cycle| DepsError::Cycle(self.graph[cycle.node_id()].clone()))?;
        Ok(order
            .into_iter()
            .rev()
            .map(|n| self.graph[n].clone())
            .collect())
    }

    /// Names depended upon that were never announced as a component
    pub fn unregistered(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .index
            .keys()
            .filter(|name| !self.components.contains(*name))
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn report(&self) -> DependencyReport {
        let cycles = self.cycles();
        let unregistered = self.unregistered();
        DependencyReport {
            components: self.components.len(),
            edges: self.edge_count(),
            ok: cycles.is_empty(),
            cycles,
            unregistered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(component: &str, deps: &[&str]) -> IntegrationPoint {
        IntegrationPoint {
            timestamp: crate::store::now(),
            agent: "tester".to_string(),
            component: component.to_string(),
            interface: json!({ "dependencies": deps }),
        }
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_declare_and_query() {
        let mut deps = DependencyGraph::new();
        deps.declare("FrontendUI", "APIService");
        deps.declare("GameLogic", "APIService");
        deps.declare("GameLogic", "StateManagement");
        deps.declare("GameLogic", "StateManagement");

        assert_eq!(
            deps.dependencies("GameLogic"),
            vec!["APIService", "StateManagement"]
        );
        assert_eq!(deps.dependents("APIService"), vec!["FrontendUI", "GameLogic"]);
        assert!(deps.dependencies("Unknown").is_empty());
        assert_eq!(deps.edge_count(), 3);
    }

    #[test]
    fn test_build_order_puts_dependencies_first() {
        let mut deps = DependencyGraph::new();
        deps.declare("Renderer", "GameLogic");
        deps.declare("Renderer", "FrontendUI");
        deps.declare("GameLogic", "APIService");
        deps.declare("FrontendUI", "APIService");
        deps.declare("APIService", "Database");

        let order = deps.build_order().unwrap();
        assert_eq!(order.len(), 5);
        assert!(position(&order, "Database") < position(&order, "APIService"));
        assert!(position(&order, "APIService") < position(&order, "GameLogic"));
        assert!(position(&order, "GameLogic") < position(&order, "Renderer"));
        assert!(position(&order, "FrontendUI") < position(&order, "Renderer"));
        assert!(deps.cycles().is_empty());
    }

    #[test]
    fn test_cycles_detected() {
        let mut deps = DependencyGraph::new();
        deps.declare("A", "B");
        deps.declare("B", "C");
        deps.declare("C", "A");
        deps.declare("D", "D");
        deps.declare("E", "A");

        let cycles = deps.cycles();
        assert_eq!(
            cycles,
            vec![
                vec!["A".to_string(), "B".to_string(), "C".to_string()],
                vec!["D".to_string()],
            ]
        );
        assert!(matches!(deps.build_order(), Err(DepsError::Cycle(_))));
    }

    #[test]
    fn test_from_integration_points() {
        let points = vec![
            point("MainWindow", &["GameEngine", "ResourceManager"]),
            point("GameEngine", &["ResourceManager"]),
            point("ResourceManager", &[]),
        ];
        let deps = DependencyGraph::from_integration_points(&points);

        assert_eq!(deps.len(), 3);
        assert_eq!(deps.dependents("ResourceManager"), vec!["GameEngine", "MainWindow"]);
        assert!(deps.unregistered().is_empty());

        let report = deps.report();
        assert!(report.ok);
        assert_eq!(report.components, 3);
        assert_eq!(report.edges, 3);
    }

    #[test]
    fn test_unregistered_dependencies() {
        let points = vec![point("MainWindow", &["ThemeManager", "GameEngine"])];
        let deps = DependencyGraph::from_integration_points(&points);
        assert_eq!(deps.unregistered(), vec!["GameEngine", "ThemeManager"]);
    }

    #[test]
    fn test_empty_graph() {
        let deps = DependencyGraph::new();
        assert!(deps.is_empty());
        assert!(deps.build_order().unwrap().is_empty());
        assert!(deps.report().ok);
    }
}
