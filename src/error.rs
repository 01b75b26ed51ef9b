// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::collections::BTreeSet;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// The dependency graph is not a DAG.
///
/// Carries every node that takes part in a detected cycle. The resolver never
/// produces a partial order when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Circular dependency between services: {}", .nodes.iter().cloned().collect::<Vec<_>>().join(", "))]
pub struct CycleError {
    pub nodes: BTreeSet<String>,
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(devdeck::config::error),
        help("Check devdeck.yaml for typos, or run `devdeck validate`")
    )]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Service not found: {0}")]
    #[diagnostic(
        code(devdeck::service::not_found),
        help("List configured services with `devdeck deps`")
    )]
    ServiceNotFound(String),

    #[error("Service name '{0}' is already registered")]
    #[diagnostic(code(devdeck::service::duplicate))]
    DuplicateService(String),

    #[error("Service '{0}' is still active; stop it before removing it")]
    ServiceActive(String),

    #[error("Service '{service}' depends on unknown service '{dependency}'")]
    #[diagnostic(
        code(devdeck::dependency::missing),
        help("Add '{dependency}' to the fleet or mark the dependency `required: false`")
    )]
    MissingDependency { service: String, dependency: String },

    #[error(transparent)]
    #[diagnostic(
        code(devdeck::dependency::circular),
        help("Services cannot depend on each other in a cycle. Review the dependencies fields")
    )]
    Cycle(#[from] CycleError),

    #[error("Dependency validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    #[diagnostic(
        code(devdeck::dependency::invalid),
        help("Run `devdeck validate` for errors and warnings")
    )]
    Validation(Vec<String>),

    #[error("Service '{service}' timed out after {waited:?} waiting for dependency '{dependency}'")]
    #[diagnostic(
        code(devdeck::dependency::timeout),
        help("Check the logs of '{dependency}' or raise the dependency timeout")
    )]
    DependencyTimeout {
        service: String,
        dependency: String,
        waited: Duration,
    },

    #[error("Service '{service}' was not started because dependency '{dependency}' failed")]
    DependencyFailed { service: String, dependency: String },

    #[error("Service '{service}' is already {status}")]
    #[diagnostic(code(devdeck::service::already_running))]
    AlreadyRunning { service: String, status: String },

    #[error("Service '{0}' is not running")]
    #[diagnostic(code(devdeck::service::not_running))]
    NotRunning(String),

    #[error("Service '{service}' is currently {status}")]
    TransitionInProgress { service: String, status: String },

    #[error("Service '{service}' failed to start: {reason}")]
    #[diagnostic(
        code(devdeck::process::spawn),
        help("Verify the service directory and that mvn/gradle (or the wrapper) is available")
    )]
    ProcessSpawn { service: String, reason: String },

    #[error("Service '{service}' (pid {pid}) exited unexpectedly ({status})")]
    ProcessExit {
        service: String,
        pid: u32,
        status: String,
    },

    #[error("Service '{service}' health check failed: {reason}")]
    #[diagnostic(
        code(devdeck::health::failed),
        help("Verify the healthUrl of '{service}' and check its logs")
    )]
    HealthCheck { service: String, reason: String },

    #[error("Timeout waiting for service '{0}'")]
    Timeout(String),

    #[error("Operation cancelled for service '{0}'")]
    Cancelled(String),

    #[error("Invalid PID {pid}: {reason}")]
    InvalidPid { pid: u32, reason: String },

    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::ServiceNotFound(name) => Some(format!(
                "No service named or identified by '{}'. Check `devdeck deps` for configured services.",
                name
            )),
            Error::MissingDependency { dependency, .. } => Some(format!(
                "Add a service named '{}' to devdeck.yaml, or set `required: false` on the dependency.",
                dependency
            )),
            Error::Cycle(cycle) => Some(format!(
                "Services cannot depend on each other in a cycle. Review the dependencies of: {}",
                cycle.nodes.iter().cloned().collect::<Vec<_>>().join(", ")
            )),
            Error::Validation(_) => Some("Validate your fleet with: devdeck validate".to_string()),
            Error::DependencyTimeout { dependency, .. } => Some(format!(
                "'{}' did not become ready in time. Inspect its logs or increase `timeout` on the dependency.",
                dependency
            )),
            Error::AlreadyRunning { .. } => {
                Some("Stop the service first, or use restart.".to_string())
            }
            Error::ProcessSpawn { .. } => Some(
                "Check that the service directory exists and that mvn/gradle or a wrapper script is available"
                    .to_string(),
            ),
            Error::HealthCheck { service, .. } => Some(format!(
                "Check the healthUrl configured for '{}' and the service logs.",
                service
            )),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

/// Validates and converts a u32 PID to nix::unistd::Pid safely.
/// Returns Err for PID 0 (process group), PID 1 (init), or values > i32::MAX.
pub fn validate_pid(pid: u32, service_name: &str) -> Result<nix::unistd::Pid> {
    if pid == 0 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "PID 0 is invalid for service '{}' (refers to process group, not a process)",
                service_name
            ),
        });
    }
    if pid == 1 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "refusing to operate on PID 1 (init) for service '{}'",
                service_name
            ),
        });
    }
    if pid > i32::MAX as u32 {
        return Err(Error::InvalidPid {
            pid,
            reason: format!(
                "PID {} exceeds i32::MAX for service '{}', cannot convert safely",
                pid, service_name
            ),
        });
    }
    Ok(nix::unistd::Pid::from_raw(pid as i32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_reserved_pids() {
        assert!(validate_pid(0, "svc").is_err());
        assert!(validate_pid(1, "svc").is_err());
        assert!(validate_pid(u32::MAX, "svc").is_err());
        assert_eq!(validate_pid(4242, "svc").unwrap().as_raw(), 4242);
    }

    #[test]
    fn process_exit_names_service_and_status() {
        let err = Error::ProcessExit {
            service: "orders".to_string(),
            pid: 4242,
            status: "exit code 3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Service 'orders' (pid 4242) exited unexpectedly (exit code 3)"
        );
    }

    #[test]
    fn cycle_error_lists_nodes_sorted() {
        let err = CycleError {
            nodes: ["b", "a"].iter().map(|s| s.to_string()).collect(),
        };
        assert_eq!(err.to_string(), "Circular dependency between services: a, b");
    }

    #[test]
    fn dependency_timeout_names_both_sides() {
        let err = Error::DependencyTimeout {
            service: "gateway".to_string(),
            dependency: "eureka".to_string(),
            waited: Duration::from_secs(3),
        };
        let msg = err.to_string();
        assert!(msg.contains("gateway"));
        assert!(msg.contains("eureka"));
        assert!(err.suggestion().unwrap().contains("eureka"));
    }

    #[test]
    fn with_suggestion_appends_hint() {
        let err = Error::Validation(vec!["missing thing".to_string()]);
        let rendered = err.with_suggestion();
        assert!(rendered.contains("missing thing"));
        assert!(rendered.contains("Hint: Validate your fleet"));
    }
}
