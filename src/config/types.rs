//! Core configuration types.
//!
//! This module contains the root [`FleetConfig`] struct loaded from
//! `devdeck.yaml`, along with fleet-wide [`Settings`] and named [`Profile`]s.

use super::{serde_duration, ConfigStore, MemoryStore, ServiceDefinition};
use crate::error::Result;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration structure for devdeck.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetConfig {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub services: Vec<ServiceDefinition>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub profiles: BTreeMap<String, Profile>,
}

/// Fleet-wide tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Per-service log ring capacity.
    pub log_buffer_size: usize,

    /// Time between SIGTERM and SIGKILL when stopping.
    #[serde(with = "serde_duration")]
    pub grace_period: Duration,

    /// A process alive this long after spawn is promoted to `running`.
    #[serde(with = "serde_duration")]
    pub settle_period: Duration,

    /// Per-request timeout for HTTP health probes.
    #[serde(with = "serde_duration")]
    pub health_timeout: Duration,

    /// Window after start during which failed probes read as `starting`.
    #[serde(with = "serde_duration")]
    pub health_startup_grace: Duration,

    /// Period of the background health monitor.
    #[serde(with = "serde_duration")]
    pub monitor_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_buffer_size: 1000,
            grace_period: Duration::from_secs(10),
            settle_period: Duration::from_millis(500),
            health_timeout: Duration::from_secs(5),
            health_startup_grace: Duration::from_secs(120),
            monitor_interval: Duration::from_secs(15),
        }
    }
}

/// A named subset of the fleet, optionally with extra environment per service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub services: Vec<String>,

    /// Environment overrides keyed by service name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, BTreeMap<String, String>>,
}

impl FleetConfig {
    /// Register every service definition in a fresh registry.
    pub fn to_registry(&self) -> Result<Registry> {
        let registry = Registry::new(self.settings.log_buffer_size);
        for definition in &self.services {
            registry.insert(definition.clone())?;
        }
        Ok(registry)
    }

    /// Build the key-value store the orchestrator reads profiles and env from.
    ///
    /// Profile env entries are merged over each other in profile-name order.
    pub fn to_store(&self) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        for (name, profile) in &self.profiles {
            store.set_profile(name, profile.services.clone());
            for (service, env) in &profile.env {
                let mut merged = store.env(service)?.unwrap_or_default();
                merged.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
                store.set_env(service, &merged)?;
            }
        }
        Ok(store)
    }
}
