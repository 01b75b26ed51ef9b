/// Property-based tests for startup ordering
///
/// Random acyclic fleets must always resolve to an order where every
/// dependency precedes its dependents, independent of declaration order.
/// Closing any path into a cycle must yield a cycle error and no order.
use devdeck::config::{ServiceDefinition, ServiceDependency};
use devdeck::dependency::{build_graph, resolve, resolve_names, validate};
use proptest::prelude::*;

/// `(order, dependency indices)` per service; edges only point to lower indices.
fn fleet_strategy() -> impl Strategy<Value = Vec<(i32, Vec<usize>)>> {
    (1usize..10).prop_flat_map(|n| {
        (0..n)
            .map(|i| {
                let deps = if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    prop::collection::vec(0..i, 0..3).boxed()
                };
                (-2i32..3, deps)
            })
            .collect::<Vec<_>>()
    })
}

fn definitions(fleet: &[(i32, Vec<usize>)]) -> Vec<ServiceDefinition> {
    fleet
        .iter()
        .enumerate()
        .map(|(i, (order, deps))| {
            deps.iter().fold(
                ServiceDefinition::new(format!("svc-{}", i), "/tmp").with_order(*order),
                |def, dep| {
                    let dependency = if dep % 2 == 0 {
                        ServiceDependency::hard(format!("svc-{}", dep))
                    } else {
                        ServiceDependency::soft(format!("svc-{}", dep))
                    };
                    def.with_dependency(dependency)
                },
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn dependencies_precede_dependents(fleet in fleet_strategy()) {
        let defs = definitions(&fleet);
        let (graph, errors) = build_graph(&defs);
        prop_assert!(errors.is_empty());

        let order = resolve_names(&graph).unwrap();
        prop_assert_eq!(order.len(), defs.len());

        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        for def in &defs {
            for dep in &def.dependencies {
                prop_assert!(position(&dep.service_name) < position(&def.name));
            }
        }
    }

    #[test]
    fn order_ignores_declaration_order(fleet in fleet_strategy()) {
        let defs = definitions(&fleet);
        let mut reversed = defs.clone();
        reversed.reverse();

        let forward = resolve_names(&build_graph(&defs).0).unwrap();
        let backward = resolve_names(&build_graph(&reversed).0).unwrap();
        prop_assert_eq!(forward, backward);
    }

    #[test]
    fn closing_a_path_is_a_cycle(fleet in fleet_strategy()) {
        let mut defs = definitions(&fleet);
        // Pick the last service that has a dependency and point its target back at it
        let Some(from) = defs.iter().rposition(|d| !d.dependencies.is_empty()) else {
            return Ok(());
        };
        let target = defs[from].dependencies[0].service_name.clone();
        let back = ServiceDependency::hard(defs[from].name.clone());
        let target_def = defs.iter_mut().find(|d| d.name == target).unwrap();
        target_def.dependencies.push(back);

        let (graph, _) = build_graph(&defs);
        let err = resolve(&graph).unwrap_err();
        prop_assert!(err.nodes.contains(&target));
        prop_assert!(!validate(&graph).valid);
    }
}

#[test]
fn spring_cloud_fleet_order() {
    let defs = vec![
        ServiceDefinition::new("gateway", "/srv/gateway")
            .with_dependency(ServiceDependency::hard("eureka"))
            .with_dependency(ServiceDependency::hard("config-server")),
        ServiceDefinition::new("orders", "/srv/orders")
            .with_dependency(ServiceDependency::hard("config-server"))
            .with_dependency(ServiceDependency::soft("gateway")),
        ServiceDefinition::new("eureka", "/srv/eureka")
            .with_dependency(ServiceDependency::hard("config-server")),
        ServiceDefinition::new("config-server", "/srv/config"),
    ];

    let (graph, errors) = build_graph(&defs);
    assert!(errors.is_empty());
    assert_eq!(
        resolve_names(&graph).unwrap(),
        vec!["config-server", "eureka", "gateway", "orders"]
    );
}

#[test]
fn ties_break_by_order_then_name() {
    let defs = vec![
        ServiceDefinition::new("b", "/tmp").with_order(1),
        ServiceDefinition::new("a", "/tmp").with_order(1),
        ServiceDefinition::new("z", "/tmp").with_order(0),
    ];
    let (graph, _) = build_graph(&defs);
    assert_eq!(resolve_names(&graph).unwrap(), vec!["z", "a", "b"]);
}

#[test]
fn validation_distinguishes_hard_and_soft_missing_targets() {
    let defs = vec![
        ServiceDefinition::new("gateway", "/srv/gateway")
            .with_dependency(ServiceDependency::hard("eureka"))
            .with_dependency(ServiceDependency::soft("zipkin")),
        ServiceDefinition::new("orders", "/srv/orders")
            .with_dependency(ServiceDependency::hard("vault").with_required(false)),
    ];
    let (graph, errors) = build_graph(&defs);
    assert_eq!(errors.len(), 1);

    let result = validate(&graph);
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("'eureka'"));
    assert_eq!(result.warnings.len(), 2);

    // Unresolved edges never constrain ordering
    assert_eq!(resolve_names(&graph).unwrap(), vec!["gateway", "orders"]);
}
