//! Health classification and readiness waits.

use super::HealthProbe;
use crate::config::{serde_duration, Settings};
use crate::error::{Error, Result};
use crate::registry::{Registry, ServiceId};
use crate::service::{HealthStatus, Service, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Floor for poll intervals so a zero `retryInterval` never spins.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResult {
    pub status: HealthStatus,
    #[serde(with = "serde_duration")]
    pub latency: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthResult {
    fn unprobed(status: HealthStatus, error: Option<String>) -> Self {
        Self {
            status,
            latency: Duration::ZERO,
            http_status: None,
            error,
            checked_at: Utc::now(),
        }
    }
}

/// What a dependency wait is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Process status is `running`.
    Running,
    /// Health status is `healthy`.
    Healthy,
}

impl Readiness {
    fn is_met(&self, status: Status, health: HealthStatus) -> bool {
        match self {
            Readiness::Running => status == Status::Running,
            Readiness::Healthy => health == HealthStatus::Healthy,
        }
    }
}

pub struct HealthMonitor {
    registry: Arc<Registry>,
    probe: Arc<dyn HealthProbe>,
    settings: Settings,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>, probe: Arc<dyn HealthProbe>, settings: Settings) -> Self {
        Self {
            registry,
            probe,
            settings,
        }
    }

    /// Probe one service and record the result on it.
    ///
    /// Only fails with `ServiceNotFound`; probe failures become `unhealthy`
    /// (or `starting` inside the startup window).
    pub async fn check(&self, id: ServiceId) -> Result<HealthResult> {
        let handle = self.registry.require(id)?;

        let (name, status, url) = {
            let service = handle.read();
            (
                service.definition.name.clone(),
                service.status,
                service.definition.effective_health_url(),
            )
        };

        match status {
            Status::Stopped => {
                handle.write().health_status = HealthStatus::Unknown;
                return Ok(HealthResult::unprobed(HealthStatus::Unknown, None));
            }
            Status::Error | Status::Stopping => {
                handle.write().health_status = HealthStatus::Unhealthy;
                return Ok(HealthResult::unprobed(
                    HealthStatus::Unhealthy,
                    Some(format!("service is {}", status)),
                ));
            }
            Status::Starting | Status::Running => {}
        }

        let Some(url) = url else {
            // No endpoint: liveness is health
            let health = if status == Status::Running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Starting
            };
            handle.write().health_status = health;
            return Ok(HealthResult::unprobed(health, None));
        };

        let started = Instant::now();
        let outcome = self.probe.probe(&url, self.settings.health_timeout).await;
        let latency = started.elapsed();
        let success = outcome.is_success();

        let health = {
            let mut service = handle.write();
            service.metrics.record_check(latency, success);

            let health = if success {
                HealthStatus::Healthy
            } else if self.in_startup_window(&service) {
                HealthStatus::Starting
            } else {
                HealthStatus::Unhealthy
            };

            // The process may have exited while the probe was in flight
            if matches!(service.status, Status::Starting | Status::Running) {
                if success && service.status == Status::Starting {
                    service.transition(Status::Running);
                }
                service.health_status = health;
            }
            health
        };

        tracing::debug!(
            "Health check for '{}': {} ({:?}, {:?})",
            name,
            health,
            outcome.http_status,
            latency
        );

        Ok(HealthResult {
            status: health,
            latency,
            http_status: outcome.http_status,
            error: outcome.error,
            checked_at: Utc::now(),
        })
    }

    fn in_startup_window(&self, service: &Service) -> bool {
        if service.health_status != HealthStatus::Starting {
            return false;
        }
        let Some(started) = service.last_started else {
            return false;
        };
        match (Utc::now() - started).to_std() {
            Ok(age) => age < self.settings.health_startup_grace,
            // Clock skew: a start in the future is certainly recent
            Err(_) => true,
        }
    }

    /// Poll until the service reports `healthy`.
    ///
    /// A zero `timeout` checks exactly once.
    pub async fn wait_until_healthy(
        &self,
        id: ServiceId,
        timeout: Duration,
        retry_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.wait_until(id, Readiness::Healthy, timeout, retry_interval, cancel)
            .await
    }

    /// Poll `check` until `readiness` holds, the service dies, the deadline
    /// passes or `cancel` fires. No lock is held between polls.
    pub async fn wait_until(
        &self,
        id: ServiceId,
        readiness: Readiness,
        timeout: Duration,
        retry_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = self
            .registry
            .require(id)?
            .read()
            .definition
            .name
            .clone();
        let deadline = Instant::now() + timeout;
        let interval = retry_interval.max(MIN_RETRY_INTERVAL);

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled(name)),
                result = self.check(id) => result?,
            };

            let handle = self.registry.require(id)?;
            let (status, health) = {
                let service = handle.read();
                (service.status, service.health_status)
            };

            if readiness.is_met(status, health) {
                return Ok(());
            }

            if matches!(status, Status::Error | Status::Stopped) {
                return Err(Error::HealthCheck {
                    service: name,
                    reason: format!(
                        "service is {}{}",
                        status,
                        result
                            .error
                            .map(|e| format!(" ({})", e))
                            .unwrap_or_default()
                    ),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout(name));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled(name)),
                _ = tokio::time::sleep(interval.min(deadline - now)) => {}
            }
        }
    }
}
