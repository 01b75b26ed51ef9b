//! Periodic health checks of active services.
//!
//! The monitor only observes: it refreshes health status, latency metrics and
//! resource samples. It never restarts anything.

use super::Orchestrator;
use crate::healthcheck::{HealthMonitor, MIN_RETRY_INTERVAL};
use crate::registry::{Registry, ServiceId};
use crate::service::{HealthStatus, ProcessSupervisor, Status};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub(super) struct MonitorTask {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl MonitorTask {
    pub(super) fn abort(self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

impl Orchestrator {
    /// Probe every `starting` or `running` service each `interval`.
    ///
    /// Replaces a monitor that is already running. The task ends on
    /// [`shutdown`](Self::shutdown) or [`cancel_operations`](Self::cancel_operations).
    pub fn spawn_health_monitor(&self, interval: Duration) {
        let shutdown = self.child_token();
        let handle = tokio::spawn(run_health_monitor(
            self.registry().clone(),
            self.health_monitor().clone(),
            self.supervisor().clone(),
            interval.max(MIN_RETRY_INTERVAL),
            shutdown.clone(),
        ));

        if let Some(previous) = self
            .monitoring_task
            .lock()
            .replace(MonitorTask { shutdown, handle })
        {
            previous.abort();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Stop the health monitor and wait for it to finish.
    pub async fn shutdown(&self) {
        let task = self.monitoring_task.lock().take();
        if let Some(task) = task {
            task.shutdown.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!("Health monitor ended abnormally: {}", e);
            }
        }
    }
}

async fn run_health_monitor(
    registry: Arc<Registry>,
    monitor: Arc<HealthMonitor>,
    supervisor: Arc<ProcessSupervisor>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::debug!("Health monitor running every {:?}", interval);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let active = active_services(&registry);
        let checks = active
            .iter()
            .map(|(id, name, before)| check_service(&monitor, &supervisor, *id, name, *before));

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = futures::future::join_all(checks) => {}
        }
    }

    tracing::debug!("Health monitor stopped");
}

fn active_services(registry: &Registry) -> Vec<(ServiceId, String, HealthStatus)> {
    registry
        .handles()
        .iter()
        .filter_map(|handle| {
            let service = handle.read();
            matches!(service.status, Status::Starting | Status::Running).then(|| {
                (
                    service.id(),
                    service.name().to_string(),
                    service.health_status,
                )
            })
        })
        .collect()
}

async fn check_service(
    monitor: &HealthMonitor,
    supervisor: &ProcessSupervisor,
    id: ServiceId,
    name: &str,
    before: HealthStatus,
) {
    match monitor.check(id).await {
        Ok(result) if result.status != before => match result.status {
            HealthStatus::Unhealthy => tracing::warn!(
                "Service '{}' became unhealthy{}",
                name,
                result.error.map(|e| format!(": {}", e)).unwrap_or_default()
            ),
            status => tracing::info!("Service '{}' is now {}", name, status),
        },
        Ok(_) => {}
        // Removed from the registry between listing and probing
        Err(e) => tracing::debug!("Skipping health check of '{}': {}", name, e),
    }

    if let Err(e) = supervisor.sample_resources(id).await {
        tracing::debug!("Could not sample resources of '{}': {}", name, e);
    }
}
