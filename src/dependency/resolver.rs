use super::Graph;
use crate::error::CycleError;
use crate::registry::ServiceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

/// Startup sequence as returned by `POST /dependencies/startup-order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupOrder {
    pub startup_order: Vec<String>,
    pub services: usize,
    pub generated: DateTime<Utc>,
}

impl StartupOrder {
    pub fn generate(graph: &Graph) -> Result<Self, CycleError> {
        let startup_order = resolve_names(graph)?;
        Ok(Self {
            services: startup_order.len(),
            startup_order,
            generated: Utc::now(),
        })
    }
}

/// Topologically order the graph by service id, dependencies first.
pub fn resolve(graph: &Graph) -> Result<Vec<ServiceId>, CycleError> {
    let names = resolve_names(graph)?;
    Ok(names
        .iter()
        .filter_map(|name| graph.node(name).map(|n| n.id))
        .collect())
}

/// Topologically order the graph by name, dependencies first.
///
/// Kahn's algorithm over every resolved edge. Among services that are ready
/// at the same time, lower `order` goes first, then the smaller name. A cyclic
/// graph yields a [`CycleError`] and no partial order.
pub fn resolve_names(graph: &Graph) -> Result<Vec<String>, CycleError> {
    let mut in_degree: BTreeMap<&str, usize> = graph
        .nodes()
        .map(|n| (n.name.as_str(), graph.targets_of(&n.name).len()))
        .collect();

    let mut ready: BinaryHeap<Reverse<(i32, &str)>> = graph
        .nodes()
        .filter(|n| in_degree.get(n.name.as_str()) == Some(&0))
        .map(|n| Reverse((n.order, n.name.as_str())))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(Reverse((_, name))) = ready.pop() {
        order.push(name.to_string());

        for dependent in graph.dependents_of(name) {
            let Some(degree) = in_degree.get_mut(dependent.as_str()) else {
                continue;
            };
            *degree -= 1;
            if *degree == 0 {
                if let Some(node) = graph.node(&dependent) {
                    ready.push(Reverse((node.order, node.name.as_str())));
                }
            }
        }
    }

    if order.len() != graph.len() {
        let mut nodes: BTreeSet<String> = graph
            .detect_cycles()
            .into_iter()
            .flat_map(|c| c.0)
            .collect();
        if nodes.is_empty() {
            nodes = in_degree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(n, _)| n.to_string())
                .collect();
        }
        return Err(CycleError { nodes });
    }

    Ok(order)
}
