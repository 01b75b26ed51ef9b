//! Dependency configuration types.
//!
//! A [`ServiceDependency`] is a directed edge from the declaring service to the
//! service named in `serviceName`. Names, not ids, are used so the fleet file
//! stays readable; they are resolved when the dependency graph is built.

use super::serde_duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default wait bound for a single dependency edge.
pub const DEFAULT_DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(60);

/// Default poll interval while waiting on a dependency edge.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// How strictly a dependency gates the startup of its dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Startup blocks on the dependency and fails if it is not satisfied in time.
    #[default]
    Hard,
    /// Startup waits on the dependency but proceeds with a warning on timeout.
    Soft,
    /// Informational edge only. Orders startup but is never waited on.
    Optional,
}

impl DependencyType {
    pub fn is_hard(&self) -> bool {
        matches!(self, DependencyType::Hard)
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Hard => write!(f, "hard"),
            DependencyType::Soft => write!(f, "soft"),
            DependencyType::Optional => write!(f, "optional"),
        }
    }
}

/// A declared dependency of one service on another.
///
/// ```yaml
/// dependencies:
///   - serviceName: config-server
///     type: hard
///     healthCheck: true
///     timeout: 90s
///     retryInterval: 3s
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDependency {
    /// Name of the service depended upon.
    #[serde(alias = "service")]
    pub service_name: String,

    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,

    /// Whether a missing target is an error (hard) rather than a warning.
    #[serde(default = "default_true")]
    pub required: bool,

    /// When true the dependency must report `healthy`, not merely `running`.
    #[serde(default)]
    pub health_check: bool,

    #[serde(default = "default_timeout", with = "serde_duration")]
    pub timeout: Duration,

    #[serde(default = "default_retry_interval", with = "serde_duration")]
    pub retry_interval: Duration,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> Duration {
    DEFAULT_DEPENDENCY_TIMEOUT
}

fn default_retry_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

impl ServiceDependency {
    /// A required hard dependency with default timing.
    pub fn hard(service_name: impl Into<String>) -> Self {
        Self::new(service_name, DependencyType::Hard)
    }

    /// A required soft dependency with default timing.
    pub fn soft(service_name: impl Into<String>) -> Self {
        Self::new(service_name, DependencyType::Soft)
    }

    /// An optional dependency with default timing.
    pub fn optional(service_name: impl Into<String>) -> Self {
        Self::new(service_name, DependencyType::Optional)
    }

    fn new(service_name: impl Into<String>, dependency_type: DependencyType) -> Self {
        Self {
            service_name: service_name.into(),
            dependency_type,
            required: true,
            health_check: false,
            timeout: DEFAULT_DEPENDENCY_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_health_check(mut self, health_check: bool) -> Self {
        self.health_check = health_check;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Whether a missing target makes the fleet invalid.
    pub fn is_blocking_when_missing(&self) -> bool {
        self.dependency_type.is_hard() && self.required
    }

    /// The state the dependency must reach to count as satisfied.
    pub fn required_state(&self) -> &'static str {
        if self.health_check {
            "healthy"
        } else {
            "running"
        }
    }
}
