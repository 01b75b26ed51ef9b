use serde::{Deserialize, Serialize};
use std::fmt;

/// Process lifecycle status of a service.
///
/// # State Transitions
///
/// ```text
/// Stopped ──► Starting ──► Running ──► Stopping ──► Stopped
///               │  ▲          │
///               ▼  │          │
///              Error ◄────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No process
    Stopped,
    /// Process spawned, not yet settled
    Starting,
    /// Process alive past the settle period, or reported healthy
    Running,
    /// Termination requested, waiting for exit
    Stopping,
    /// Spawn failed or the process exited without being asked to
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Stopped => write!(f, "stopped"),
            Status::Starting => write!(f, "starting"),
            Status::Running => write!(f, "running"),
            Status::Stopping => write!(f, "stopping"),
            Status::Error => write!(f, "error"),
        }
    }
}

impl Status {
    /// Check if a status transition is valid according to the state machine.
    ///
    /// # Examples
    ///
    /// ```
    /// use devdeck::service::Status;
    ///
    /// assert!(Status::Stopped.is_valid_transition(Status::Starting));
    /// assert!(Status::Error.is_valid_transition(Status::Starting));
    /// assert!(!Status::Stopped.is_valid_transition(Status::Running));
    /// ```
    pub fn is_valid_transition(&self, to: Status) -> bool {
        use Status::*;
        match (self, to) {
            (Stopped, Starting) | (Error, Starting) => true,

            (Starting, Running) | (Starting, Error) | (Starting, Stopping) => true,

            (Running, Stopping) | (Running, Error) => true,

            // Stopping ends in Stopped; Error only if the process escaped SIGKILL
            (Stopping, Stopped) | (Stopping, Error) => true,

            (s1, s2) if *s1 == s2 => true,

            _ => false,
        }
    }

    /// Whether a process is (or is about to be) alive.
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Starting | Status::Running | Status::Stopping)
    }

    /// Whether `start` may be called from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Status::Stopped | Status::Error)
    }
}

/// Result of the most recent health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Never probed, or the service is stopped
    #[default]
    Unknown,
    /// Inside the startup window; failures are not yet held against it
    Starting,
    Healthy,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Starting => write!(f, "starting"),
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}
