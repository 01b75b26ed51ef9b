//! Gating a service's start on its dependencies.

use crate::config::{DependencyType, ServiceDependency};
use crate::dependency::Graph;
use crate::error::Error;
use crate::healthcheck::{HealthMonitor, Readiness};
use std::collections::BTreeSet;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of waiting on every edge of one service.
#[derive(Debug)]
pub(super) enum Gate {
    Open { warnings: Vec<String> },
    Blocked(Error),
    Cancelled,
}

/// Wait until `service`'s dependencies are ready.
///
/// Hard edges are waited on before soft ones; optional edges never block.
/// Targets outside `graph` are skipped. A hard edge into `failed` blocks
/// without waiting, a soft one only warns.
pub(super) async fn wait_for_dependencies(
    monitor: &HealthMonitor,
    graph: &Graph,
    service: &str,
    failed: &BTreeSet<String>,
    cancel: &CancellationToken,
) -> Gate {
    let deps = graph.dependencies_of(service);
    let hard = deps
        .iter()
        .filter(|d| d.dependency_type == DependencyType::Hard);
    let soft = deps
        .iter()
        .filter(|d| d.dependency_type == DependencyType::Soft);

    if let Some(dep) = deps
        .iter()
        .find(|d| d.dependency_type.is_hard() && failed.contains(&d.service_name))
    {
        return Gate::Blocked(Error::DependencyFailed {
            service: service.to_string(),
            dependency: dep.service_name.clone(),
        });
    }

    let mut warnings = Vec::new();
    for dep in hard.chain(soft) {
        let Some(target) = graph.node(&dep.service_name) else {
            continue;
        };

        if failed.contains(&dep.service_name) {
            let message = format!(
                "Soft dependency '{}' of '{}' failed to start; continuing",
                dep.service_name, service
            );
            tracing::warn!("{}", message);
            warnings.push(message);
            continue;
        }

        let started = Instant::now();
        match wait_for_edge(monitor, target.id, dep, cancel).await {
            Ok(()) => {
                tracing::debug!("Dependency '{}' of '{}' is ready", dep.service_name, service);
            }
            Err(Error::Cancelled(_)) => return Gate::Cancelled,
            Err(e) if dep.dependency_type.is_hard() => {
                tracing::error!(
                    "Service '{}' gave up waiting for '{}': {}",
                    service,
                    dep.service_name,
                    e
                );
                return Gate::Blocked(Error::DependencyTimeout {
                    service: service.to_string(),
                    dependency: dep.service_name.clone(),
                    waited: started.elapsed(),
                });
            }
            Err(e) => {
                let message = format!(
                    "Soft dependency '{}' of '{}' not ready ({}); continuing",
                    dep.service_name, service, e
                );
                tracing::warn!("{}", message);
                warnings.push(message);
            }
        }
    }

    Gate::Open { warnings }
}

async fn wait_for_edge(
    monitor: &HealthMonitor,
    target: crate::registry::ServiceId,
    dep: &ServiceDependency,
    cancel: &CancellationToken,
) -> crate::error::Result<()> {
    let readiness = if dep.health_check {
        Readiness::Healthy
    } else {
        Readiness::Running
    };
    monitor
        .wait_until(target, readiness, dep.timeout, dep.retry_interval, cancel)
        .await
}
