use super::Graph;
use crate::config::DependencyType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of checking a dependency graph.
///
/// `valid` is true iff `errors` is empty; warnings never invalidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub checked: DateTime<Utc>,
}

/// Report structural problems in the graph without changing anything.
///
/// Errors: hard, required edges to unknown services, and every cycle.
/// Warnings: every other edge to an unknown service, soft or optional edges
/// to disabled services, and hard edges to disabled services.
pub fn validate(graph: &Graph) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for edge in graph.unresolved() {
        let dep = &edge.dependency;
        if dep.is_blocking_when_missing() {
            errors.push(format!(
                "Service '{}' has a required hard dependency on '{}', which does not exist",
                edge.from, dep.service_name
            ));
        } else {
            warnings.push(format!(
                "Service '{}' has a {} dependency on '{}', which does not exist",
                edge.from, dep.dependency_type, dep.service_name
            ));
        }
    }

    for node in graph.nodes() {
        for dep in graph.dependencies_of(&node.name) {
            let target_enabled = graph
                .node(&dep.service_name)
                .map(|n| n.enabled)
                .unwrap_or(true);
            if target_enabled {
                continue;
            }
            match dep.dependency_type {
                DependencyType::Hard => warnings.push(format!(
                    "Service '{}' has a hard dependency on disabled service '{}'; it will not start until '{}' is running",
                    node.name, dep.service_name, dep.service_name
                )),
                DependencyType::Soft | DependencyType::Optional => warnings.push(format!(
                    "Service '{}' has a {} dependency on disabled service '{}'",
                    node.name, dep.dependency_type, dep.service_name
                )),
            }
        }
    }

    for cycle in graph.detect_cycles() {
        errors.push(format!("Circular dependency detected: {}", cycle));
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
        checked: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServiceDefinition, ServiceDependency};
    use crate::dependency::build_graph;

    fn graph(defs: Vec<ServiceDefinition>) -> Graph {
        build_graph(&defs).0
    }

    #[test]
    fn missing_hard_required_is_error() {
        let g = graph(vec![ServiceDefinition::new("gateway", ".")
            .with_dependency(ServiceDependency::hard("auth"))]);
        let result = validate(&g);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("'gateway'"));
        assert!(result.errors[0].contains("'auth'"));
    }

    #[test]
    fn missing_soft_is_warning() {
        let g = graph(vec![ServiceDefinition::new("gateway", ".")
            .with_dependency(ServiceDependency::soft("auth"))]);
        let result = validate(&g);
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("soft"));
    }

    #[test]
    fn missing_hard_not_required_is_warning() {
        let g = graph(vec![ServiceDefinition::new("gateway", ".")
            .with_dependency(ServiceDependency::hard("auth").with_required(false))]);
        let result = validate(&g);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn disabled_targets_warn() {
        let g = graph(vec![
            ServiceDefinition::new("mail", ".").with_enabled(false),
            ServiceDefinition::new("orders", ".")
                .with_dependency(ServiceDependency::optional("mail"))
                .with_dependency(ServiceDependency::hard("mail")),
        ]);
        let result = validate(&g);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("optional")));
        assert!(result.warnings.iter().any(|w| w.contains("will not start")));
    }

    #[test]
    fn cycle_is_error() {
        let g = graph(vec![
            ServiceDefinition::new("a", ".").with_dependency(ServiceDependency::hard("b")),
            ServiceDefinition::new("b", ".").with_dependency(ServiceDependency::optional("a")),
        ]);
        let result = validate(&g);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Circular dependency detected: a -> b -> a"]);
    }
}
