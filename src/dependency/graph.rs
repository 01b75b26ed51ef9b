use crate::config::{serde_duration, ServiceDefinition, ServiceDependency};
use crate::error::Error;
use crate::registry::ServiceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::time::Duration;

/// Per-node data the resolver and orchestrator need without touching the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: ServiceId,
    pub name: String,
    pub order: i32,
    pub enabled: bool,
    pub startup_delay: Duration,
}

/// A dependency edge whose target is not a registered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEdge {
    pub from: String,
    pub dependency: ServiceDependency,
}

/// A dependency cycle, listed from its lexicographically smallest member.
///
/// Renders closed, e.g. `a -> b -> a`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cycle(pub Vec<String>);

impl Cycle {
    /// Rotate so the smallest name comes first; equal cycles compare equal.
    fn canonical(mut path: Vec<String>) -> Self {
        if let Some((min_pos, _)) = path.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)) {
            path.rotate_left(min_pos);
        }
        Cycle(path)
    }

    pub fn nodes(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.first() {
            Some(first) => write!(f, "{} -> {}", self.0.join(" -> "), first),
            None => Ok(()),
        }
    }
}

/// Dependency view of one service, as returned by `GET /dependencies`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyInfo {
    pub dependencies: Vec<ServiceDependency>,
    pub dependent_on: Vec<String>,
    #[serde(with = "serde_duration")]
    pub startup_delay: Duration,
}

/// Dependency graph derived from service definitions.
///
/// Rebuilt on every request; nothing here is cached across registry changes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<String, NodeInfo>,
    /// `edges[A]` = A's declared dependencies whose targets exist
    edges: BTreeMap<String, Vec<ServiceDependency>>,
    /// `reverse[A]` = services that depend on A
    reverse: BTreeMap<String, BTreeSet<String>>,
    unresolved: Vec<UnresolvedEdge>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Build the graph from a snapshot of definitions.
///
/// Never fails fast: duplicate names and hard, required references to
/// unknown services are collected and returned next to the graph, which
/// keeps every resolvable edge.
pub fn build_graph(services: &[ServiceDefinition]) -> (Graph, Vec<Error>) {
    let mut graph = Graph::default();
    let mut errors = Vec::new();
    let mut owners = Vec::with_capacity(services.len());

    for def in services {
        if graph.nodes.contains_key(&def.name) {
            errors.push(Error::DuplicateService(def.name.clone()));
            continue;
        }
        graph.nodes.insert(
            def.name.clone(),
            NodeInfo {
                id: def.id,
                name: def.name.clone(),
                order: def.order,
                enabled: def.enabled,
                startup_delay: def.startup_delay,
            },
        );
        graph.edges.insert(def.name.clone(), Vec::new());
        graph.reverse.insert(def.name.clone(), BTreeSet::new());
        owners.push(def);
    }

    // Only the first definition of a duplicated name contributes edges
    for def in owners {
        for dep in &def.dependencies {
            if graph.nodes.contains_key(&dep.service_name) {
                graph
                    .edges
                    .entry(def.name.clone())
                    .or_default()
                    .push(dep.clone());
                graph
                    .reverse
                    .entry(dep.service_name.clone())
                    .or_default()
                    .insert(def.name.clone());
            } else {
                if dep.is_blocking_when_missing() {
                    errors.push(Error::MissingDependency {
                        service: def.name.clone(),
                        dependency: dep.service_name.clone(),
                    });
                }
                graph.unresolved.push(UnresolvedEdge {
                    from: def.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    (graph, errors)
}

impl Graph {
    pub fn node(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.get(name)
    }

    /// Nodes sorted by name.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Resolved dependencies declared by `name`, in declaration order.
    pub fn dependencies_of(&self, name: &str) -> &[ServiceDependency] {
        self.edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct targets `name` depends on, sorted.
    pub fn targets_of(&self, name: &str) -> BTreeSet<&str> {
        self.dependencies_of(name)
            .iter()
            .map(|d| d.service_name.as_str())
            .collect()
    }

    /// Services that declare a dependency on `name`, sorted.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.reverse
            .get(name)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn unresolved(&self) -> &[UnresolvedEdge] {
        &self.unresolved
    }

    /// Every service reachable from `name` over hard edges, excluding `name`.
    pub fn hard_closure(&self, name: &str) -> BTreeSet<String> {
        let mut closure = BTreeSet::new();
        let mut queue = VecDeque::from([name.to_string()]);

        while let Some(current) = queue.pop_front() {
            for dep in self.dependencies_of(&current) {
                if dep.dependency_type.is_hard()
                    && dep.service_name != name
                    && closure.insert(dep.service_name.clone())
                {
                    queue.push_back(dep.service_name.clone());
                }
            }
        }

        closure
    }

    /// The graph restricted to `names`.
    ///
    /// Edges leaving the set are dropped; unresolved edges of members are kept
    /// so validation still reports them.
    pub fn subgraph(&self, names: &BTreeSet<String>) -> Graph {
        let mut sub = Graph::default();
        for name in names {
            if let Some(node) = self.nodes.get(name) {
                sub.nodes.insert(name.clone(), node.clone());
                sub.edges.insert(name.clone(), Vec::new());
                sub.reverse.insert(name.clone(), BTreeSet::new());
            }
        }
        for name in sub.nodes.keys().cloned().collect::<Vec<_>>() {
            for dep in self.dependencies_of(&name) {
                if sub.nodes.contains_key(&dep.service_name) {
                    sub.edges.entry(name.clone()).or_default().push(dep.clone());
                    sub.reverse
                        .entry(dep.service_name.clone())
                        .or_default()
                        .insert(name.clone());
                }
            }
        }
        sub.unresolved = self
            .unresolved
            .iter()
            .filter(|u| sub.nodes.contains_key(&u.from))
            .cloned()
            .collect();
        sub
    }

    /// Find every distinct cycle reachable by depth-first search.
    ///
    /// Nodes and edges are visited in sorted order, so the result is stable.
    pub fn detect_cycles(&self) -> Vec<Cycle> {
        let mut state: BTreeMap<&str, Visit> = BTreeMap::new();
        let mut path: Vec<&str> = Vec::new();
        let mut found: BTreeSet<Cycle> = BTreeSet::new();

        for name in self.nodes.keys() {
            if !state.contains_key(name.as_str()) {
                self.visit(name, &mut state, &mut path, &mut found);
            }
        }

        found.into_iter().collect()
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        state: &mut BTreeMap<&'a str, Visit>,
        path: &mut Vec<&'a str>,
        found: &mut BTreeSet<Cycle>,
    ) {
        state.insert(node, Visit::InProgress);
        path.push(node);

        for target in self.targets_of(node) {
            match state.get(target) {
                None => self.visit(target, state, path, found),
                Some(Visit::InProgress) => {
                    // Back-edge: unwind the active path to the target
                    if let Some(start) = path.iter().position(|n| *n == target) {
                        let cycle = path[start..].iter().map(|s| s.to_string()).collect();
                        found.insert(Cycle::canonical(cycle));
                    }
                }
                Some(Visit::Done) => {}
            }
        }

        path.pop();
        state.insert(node, Visit::Done);
    }

    pub fn has_cycle(&self) -> bool {
        !self.detect_cycles().is_empty()
    }

    /// Map of service name to its dependency view.
    pub fn overview(&self) -> BTreeMap<String, DependencyInfo> {
        self.nodes
            .iter()
            .map(|(name, node)| {
                let mut dependencies = self.dependencies_of(name).to_vec();
                dependencies.extend(
                    self.unresolved
                        .iter()
                        .filter(|u| &u.from == name)
                        .map(|u| u.dependency.clone()),
                );
                (
                    name.clone(),
                    DependencyInfo {
                        dependencies,
                        dependent_on: self.dependents_of(name),
                        startup_delay: node.startup_delay,
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, deps: Vec<ServiceDependency>) -> ServiceDefinition {
        let mut d = ServiceDefinition::new(name, ".");
        d.dependencies = deps;
        d
    }

    #[test]
    fn test_build_collects_missing_hard_edges() {
        let services = vec![
            def("gateway", vec![ServiceDependency::hard("auth")]),
            def("orders", vec![ServiceDependency::soft("metrics")]),
        ];
        let (graph, errors) = build_graph(&services);

        assert_eq!(graph.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            Error::MissingDependency { service, dependency }
                if service == "gateway" && dependency == "auth"
        ));
        assert_eq!(graph.unresolved().len(), 2);
        assert!(graph.dependencies_of("gateway").is_empty());
    }

    #[test]
    fn test_duplicate_names_reported() {
        let services = vec![def("a", vec![]), def("a", vec![])];
        let (graph, errors) = build_graph(&services);
        assert_eq!(graph.len(), 1);
        assert!(matches!(&errors[0], Error::DuplicateService(n) if n == "a"));
    }

    #[test]
    fn test_dependents_are_derived() {
        let services = vec![
            def("eureka", vec![]),
            def("config", vec![ServiceDependency::hard("eureka")]),
            def("gateway", vec![ServiceDependency::soft("eureka")]),
        ];
        let (graph, _) = build_graph(&services);
        assert_eq!(graph.dependents_of("eureka"), vec!["config", "gateway"]);
        assert!(graph.dependents_of("gateway").is_empty());

        let overview = graph.overview();
        assert_eq!(overview["eureka"].dependent_on, vec!["config", "gateway"]);
        assert_eq!(overview["config"].dependencies.len(), 1);
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let (graph, _) = build_graph(&[def("a", vec![ServiceDependency::hard("a")])]);
        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].to_string(), "a -> a");
    }

    #[test]
    fn test_reports_every_distinct_cycle() {
        let services = vec![
            def("a", vec![ServiceDependency::hard("b")]),
            def("b", vec![ServiceDependency::hard("a")]),
            def("c", vec![ServiceDependency::hard("d")]),
            def("d", vec![ServiceDependency::soft("c")]),
            def("e", vec![ServiceDependency::hard("a")]),
        ];
        let (graph, _) = build_graph(&services);
        let cycles: Vec<String> = graph.detect_cycles().iter().map(|c| c.to_string()).collect();
        assert_eq!(cycles, vec!["a -> b -> a", "c -> d -> c"]);
        assert!(graph.has_cycle());
    }

    #[test]
    fn test_cycle_rotation_is_canonical() {
        let services = vec![
            def("x", vec![ServiceDependency::hard("y")]),
            def("y", vec![ServiceDependency::hard("z")]),
            def("z", vec![ServiceDependency::hard("x")]),
        ];
        let (graph, _) = build_graph(&services);
        let cycles = graph.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].nodes()[0], "x");
    }

    #[test]
    fn test_hard_closure_skips_soft_edges() {
        let services = vec![
            def("db", vec![]),
            def("cache", vec![]),
            def("eureka", vec![]),
            def("orders", vec![
                ServiceDependency::hard("db"),
                ServiceDependency::soft("cache"),
            ]),
            def("gateway", vec![
                ServiceDependency::hard("orders"),
                ServiceDependency::optional("eureka"),
            ]),
        ];
        let (graph, _) = build_graph(&services);
        let closure = graph.hard_closure("gateway");
        assert_eq!(
            closure.into_iter().collect::<Vec<_>>(),
            vec!["db".to_string(), "orders".to_string()]
        );
    }

    #[test]
    fn test_subgraph_drops_outside_edges() {
        let services = vec![
            def("db", vec![]),
            def("cache", vec![]),
            def("orders", vec![
                ServiceDependency::hard("db"),
                ServiceDependency::soft("cache"),
                ServiceDependency::hard("ghost"),
            ]),
        ];
        let (graph, _) = build_graph(&services);
        let names: BTreeSet<String> = ["db", "orders"].iter().map(|s| s.to_string()).collect();
        let sub = graph.subgraph(&names);

        assert_eq!(sub.len(), 2);
        assert_eq!(sub.targets_of("orders").into_iter().collect::<Vec<_>>(), vec!["db"]);
        assert_eq!(sub.unresolved().len(), 1);
        assert!(!sub.contains("cache"));
    }
}
