//! The service entity: static definition plus runtime state.

use super::{HealthStatus, LogBuffer, LogEntry, LogLevel, ServiceMetrics, Status};
use crate::config::ServiceDefinition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A registered service.
///
/// Runtime fields are written only by the process supervisor and the health
/// monitor, under the service's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(flatten)]
    pub definition: ServiceDefinition,
    pub status: Status,
    pub health_status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub logs: LogBuffer,
    pub metrics: ServiceMetrics,
}

impl Service {
    pub fn new(definition: ServiceDefinition, log_capacity: usize) -> Self {
        Self {
            definition,
            status: Status::Stopped,
            health_status: HealthStatus::Unknown,
            pid: None,
            last_started: None,
            last_error: None,
            logs: LogBuffer::with_capacity(log_capacity),
            metrics: ServiceMetrics::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Time since the last start, while a process is starting or running.
    pub fn uptime(&self) -> Option<Duration> {
        if !matches!(self.status, Status::Starting | Status::Running) {
            return None;
        }
        let started = self.last_started?;
        (Utc::now() - started).to_std().ok()
    }

    /// Move to `to`, logging transitions the state machine does not allow.
    pub fn transition(&mut self, to: Status) {
        if !self.status.is_valid_transition(to) {
            tracing::warn!(
                "Service '{}': unexpected transition {} -> {}",
                self.definition.name,
                self.status,
                to
            );
        }
        self.status = to;
    }

    /// Append a captured or synthetic log entry.
    pub fn append_log(&mut self, entry: LogEntry) {
        if self.logs.push(entry) {
            tracing::warn!(
                "Log buffer for service '{}' is at {}/{} lines. Oldest logs will be dropped.",
                self.definition.name,
                self.logs.len(),
                self.logs.capacity()
            );
        }
    }

    /// Record a failure: an ERROR log entry plus `last_error`.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.append_log(LogEntry::new(LogLevel::Error, message.clone()));
        self.last_error = Some(message);
    }

    pub fn summary(&self) -> ServiceSummary {
        ServiceSummary {
            id: self.definition.id,
            name: self.definition.name.clone(),
            status: self.status,
            health_status: self.health_status,
            pid: self.pid,
            port: self.definition.port,
            uptime_secs: self.uptime().map(|d| d.as_secs()),
            last_started: self.last_started,
            last_error: self.last_error.clone(),
        }
    }
}

/// Compact, log-free view of a service for API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    pub id: Uuid,
    pub name: String,
    pub status: Status,
    pub health_status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Service {
        Service::new(ServiceDefinition::new("orders", "/srv/orders"), 10)
    }

    #[test]
    fn uptime_only_while_active() {
        let mut svc = service();
        svc.last_started = Some(Utc::now() - chrono::Duration::seconds(5));
        assert!(svc.uptime().is_none());

        svc.status = Status::Running;
        let up = svc.uptime().unwrap();
        assert!(up >= Duration::from_secs(4));

        svc.status = Status::Error;
        assert!(svc.uptime().is_none());
    }

    #[test]
    fn record_error_logs_and_sets_last_error() {
        let mut svc = service();
        svc.record_error("boom");
        assert_eq!(svc.last_error.as_deref(), Some("boom"));
        let entry = svc.logs.tail(1).pop().unwrap();
        assert_eq!(entry.level, LogLevel::Error);
    }

    #[test]
    fn serializes_flat_camel_case() {
        let svc = service();
        let json = serde_json::to_value(&svc).unwrap();
        assert_eq!(json["name"], "orders");
        assert_eq!(json["status"], "stopped");
        assert_eq!(json["healthStatus"], "unknown");
        assert!(json.get("pid").is_none());

        let summary = serde_json::to_value(svc.summary()).unwrap();
        assert_eq!(summary["name"], "orders");
        assert!(summary.get("logs").is_none());
    }
}
