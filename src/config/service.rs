//! Service definition types.
//!
//! A [`ServiceDefinition`] is the static, serializable half of a service: what
//! to launch, where, and what it depends on. Runtime state lives on
//! [`crate::service::Service`].

use super::{serde_duration, ServiceDependency};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Spring Boot actuator endpoint used when only a port is declared.
pub const DEFAULT_HEALTH_PATH: &str = "/actuator/health";

/// How a service is built and launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Maven,
    Gradle,
    /// Detected from the project files in the service directory.
    #[default]
    Auto,
}

impl BuildSystem {
    /// Detect the build system from the files in `dir`.
    ///
    /// Returns `None` when neither a `pom.xml` nor a Gradle build script exists.
    pub fn detect(dir: &Path) -> Option<BuildSystem> {
        if dir.join("pom.xml").exists() {
            Some(BuildSystem::Maven)
        } else if dir.join("build.gradle").exists() || dir.join("build.gradle.kts").exists() {
            Some(BuildSystem::Gradle)
        } else {
            None
        }
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildSystem::Maven => write!(f, "maven"),
            BuildSystem::Gradle => write!(f, "gradle"),
            BuildSystem::Auto => write!(f, "auto"),
        }
    }
}

/// Static configuration of a single service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDefinition {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name: String,

    #[serde(default)]
    pub directory: PathBuf,

    #[serde(default)]
    pub build_system: BuildSystem,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jvm_options: Vec<String>,

    /// Launch with `--debug` so Spring Boot logs its auto-configuration report.
    #[serde(default)]
    pub verbose: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,

    /// Shell command that replaces the build-system launcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub dependencies: Vec<ServiceDependency>,

    #[serde(default, with = "serde_duration")]
    pub startup_delay: Duration,

    /// Tie-breaker among services whose dependencies are all satisfied.
    #[serde(default)]
    pub order: i32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            directory: directory.into(),
            build_system: BuildSystem::Auto,
            jvm_options: Vec::new(),
            verbose: false,
            port: None,
            health_url: None,
            command: None,
            env: BTreeMap::new(),
            dependencies: Vec::new(),
            startup_delay: Duration::ZERO,
            order: 0,
            enabled: true,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = Some(url.into());
        self
    }

    pub fn with_dependency(mut self, dependency: ServiceDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The URL probed for health: `healthUrl`, else the actuator endpoint on `port`.
    pub fn effective_health_url(&self) -> Option<String> {
        if let Some(url) = &self.health_url {
            return Some(url.clone());
        }
        self.port
            .map(|port| format!("http://localhost:{}{}", port, DEFAULT_HEALTH_PATH))
    }
}
