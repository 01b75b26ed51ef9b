//! Read-only key-value access to persisted fleet state.
//!
//! The orchestrator never owns persistence. Profiles and per-service
//! environment overrides are read through a [`ConfigStore`]; environment maps
//! are stored as JSON-encoded `{"KEY": "value"}` objects.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

const PROFILE_PREFIX: &str = "profile.";
const ENV_PREFIX: &str = "env.";

pub trait ConfigStore: Send + Sync {
    /// Names of all stored profiles, sorted.
    fn profiles(&self) -> Vec<String>;

    /// Service names belonging to `profile`, or `None` if it does not exist.
    fn profile_services(&self, profile: &str) -> Option<Vec<String>>;

    /// Raw JSON of the environment overrides for `service`.
    fn env_json(&self, service: &str) -> Option<String>;

    /// Decoded environment overrides for `service`.
    fn env(&self, service: &str) -> Result<Option<BTreeMap<String, String>>> {
        self.env_json(service).map(|json| decode_env(&json)).transpose()
    }
}

/// Parse a JSON object of string values into an environment map.
pub fn decode_env(json: &str) -> Result<BTreeMap<String, String>> {
    let trimmed = json.trim();
    if trimmed.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(trimmed).map_err(|e| {
        Error::Config(format!("Invalid environment JSON: {}", e))
    })
}

/// In-memory [`ConfigStore`] backed by a string key-value map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn set_profile(&self, profile: &str, services: Vec<String>) {
        // A Vec<String> always serializes.
        let json = serde_json::Value::from(services).to_string();
        self.set(format!("{}{}", PROFILE_PREFIX, profile), json);
    }

    pub fn set_env(&self, service: &str, env: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string(env)?;
        self.set(format!("{}{}", ENV_PREFIX, service), json);
        Ok(())
    }
}

impl ConfigStore for MemoryStore {
    fn profiles(&self) -> Vec<String> {
        self.entries
            .read()
            .keys()
            .filter_map(|k| k.strip_prefix(PROFILE_PREFIX))
            .map(str::to_string)
            .collect()
    }

    fn profile_services(&self, profile: &str) -> Option<Vec<String>> {
        let raw = self.get(&format!("{}{}", PROFILE_PREFIX, profile))?;
        match serde_json::from_str(&raw) {
            Ok(services) => Some(services),
            Err(e) => {
                tracing::warn!("Ignoring malformed profile '{}': {}", profile, e);
                None
            }
        }
    }

    fn env_json(&self, service: &str) -> Option<String> {
        self.get(&format!("{}{}", ENV_PREFIX, service))
    }
}
