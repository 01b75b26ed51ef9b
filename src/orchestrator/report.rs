//! Per-service outcomes of fleet-wide operations.

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};

/// What happened to one service during `start_all`, `start_one` or `stop_all`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ServiceOutcome {
    Started,
    Stopped,
    AlreadyRunning,
    Skipped {
        reason: String,
    },
    Failed {
        #[serde(serialize_with = "error_message")]
        error: Error,
    },
    Cancelled,
}

impl ServiceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ServiceOutcome::Failed { .. } | ServiceOutcome::Cancelled)
    }
}

fn error_message<S: Serializer>(
    error: &Error,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReport {
    pub service: String,
    pub outcome: ServiceOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Outcomes in the order the services were visited.
///
/// Partial success is a normal result: one failed service never hides what
/// happened to the others.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetReport {
    pub services: Vec<ServiceReport>,
}

pub type StartReport = FleetReport;
pub type StopReport = FleetReport;

impl FleetReport {
    pub(crate) fn push(&mut self, service: impl Into<String>, outcome: ServiceOutcome) {
        self.push_with_warnings(service, outcome, Vec::new());
    }

    pub(crate) fn push_with_warnings(
        &mut self,
        service: impl Into<String>,
        outcome: ServiceOutcome,
        warnings: Vec<String>,
    ) {
        self.services.push(ServiceReport {
            service: service.into(),
            outcome,
            warnings,
        });
    }

    /// Outcome recorded for `service`, if it was visited.
    pub fn outcome(&self, service: &str) -> Option<&ServiceOutcome> {
        self.services
            .iter()
            .find(|r| r.service == service)
            .map(|r| &r.outcome)
    }

    pub(crate) fn take_outcome(&mut self, service: &str) -> Option<ServiceOutcome> {
        let idx = self.services.iter().position(|r| r.service == service)?;
        Some(self.services.remove(idx).outcome)
    }

    /// Names in visiting order.
    pub fn order(&self) -> Vec<&str> {
        self.services.iter().map(|r| r.service.as_str()).collect()
    }

    /// Names whose outcome matches `predicate`.
    pub fn filter(&self, predicate: impl Fn(&ServiceOutcome) -> bool) -> Vec<&str> {
        self.services
            .iter()
            .filter(|r| predicate(&r.outcome))
            .map(|r| r.service.as_str())
            .collect()
    }

    pub fn failed(&self) -> Vec<&str> {
        self.filter(ServiceOutcome::is_failure)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.services
            .iter()
            .flat_map(|r| r.warnings.iter().map(String::as_str))
    }

    pub fn is_success(&self) -> bool {
        self.services.iter().all(|r| !r.outcome.is_failure())
    }

    /// Collapse failures into an error: one failure is returned as is,
    /// several become [`Error::Multiple`].
    pub fn into_result(self) -> Result<()> {
        let mut errors: Vec<Error> = self
            .services
            .into_iter()
            .filter_map(|r| match r.outcome {
                ServiceOutcome::Failed { error } => Some(error),
                ServiceOutcome::Cancelled => Some(Error::Cancelled(r.service)),
                _ => None,
            })
            .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}
