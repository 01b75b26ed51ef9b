//! Shared, id-keyed store of services.
//!
//! The registry map has its own lock, separate from the per-service locks.
//! Lookups clone `Arc` handles and release the registry lock before any
//! service lock is taken. Only `insert` and `remove` read a service while
//! holding the registry lock, so the order is always registry, then service.
//! Never call those two while holding a service guard.

use crate::config::{ServiceDefinition, ServiceDependency};
use crate::error::{Error, Result};
use crate::service::{Service, ServiceSummary};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

pub type ServiceId = Uuid;

/// Shared handle to one service. Never hold its guard across an `.await`.
pub type ServiceHandle = Arc<RwLock<Service>>;

#[derive(Debug)]
pub struct Registry {
    services: RwLock<HashMap<ServiceId, ServiceHandle>>,
    log_capacity: usize,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(crate::service::DEFAULT_MAX_LOG_LINES)
    }
}

impl Registry {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            log_capacity,
        }
    }

    /// Register a service. Names and ids must be unique.
    pub fn insert(&self, definition: ServiceDefinition) -> Result<ServiceHandle> {
        let mut services = self.services.write();
        if services.contains_key(&definition.id) {
            return Err(Error::DuplicateService(definition.id.to_string()));
        }
        if services
            .values()
            .any(|s| s.read().definition.name == definition.name)
        {
            return Err(Error::DuplicateService(definition.name));
        }

        let id = definition.id;
        let handle = Arc::new(RwLock::new(Service::new(definition, self.log_capacity)));
        services.insert(id, handle.clone());
        Ok(handle)
    }

    /// Remove a service that has no live process.
    pub fn remove(&self, id: ServiceId) -> Result<Service> {
        let mut services = self.services.write();
        let handle = services
            .get(&id)
            .ok_or_else(|| Error::ServiceNotFound(id.to_string()))?;
        {
            let service = handle.read();
            if service.status.is_active() {
                return Err(Error::ServiceActive(service.definition.name.clone()));
            }
        }
        let handle = services
            .remove(&id)
            .ok_or_else(|| Error::ServiceNotFound(id.to_string()))?;
        let service = handle.read().clone();
        Ok(service)
    }

    pub fn get(&self, id: ServiceId) -> Option<ServiceHandle> {
        self.services.read().get(&id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<ServiceHandle> {
        self.handles()
            .into_iter()
            .find(|s| s.read().definition.name == name)
    }

    /// Look a service up by id, or by name when `key` is not a UUID.
    pub fn resolve(&self, key: &str) -> Result<ServiceHandle> {
        let found = match Uuid::parse_str(key) {
            Ok(id) => self.get(id),
            Err(_) => self.find_by_name(key),
        };
        found.ok_or_else(|| Error::ServiceNotFound(key.to_string()))
    }

    pub fn require(&self, id: ServiceId) -> Result<ServiceHandle> {
        self.get(id)
            .ok_or_else(|| Error::ServiceNotFound(id.to_string()))
    }

    pub fn id_of(&self, name: &str) -> Option<ServiceId> {
        self.find_by_name(name).map(|s| s.read().definition.id)
    }

    /// Snapshot of every definition, sorted by name.
    pub fn definitions(&self) -> Vec<ServiceDefinition> {
        let handles: Vec<ServiceHandle> = self.services.read().values().cloned().collect();
        let mut defs: Vec<ServiceDefinition> =
            handles.iter().map(|s| s.read().definition.clone()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Summaries of every service keyed by name.
    pub fn summaries(&self) -> BTreeMap<String, ServiceSummary> {
        let handles: Vec<ServiceHandle> = self.services.read().values().cloned().collect();
        handles
            .iter()
            .map(|s| {
                let s = s.read();
                (s.definition.name.clone(), s.summary())
            })
            .collect()
    }

    pub fn handles(&self) -> Vec<ServiceHandle> {
        self.services.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Replace a service's declared dependencies. Takes effect on the next graph build.
    pub fn set_dependencies(
        &self,
        id: ServiceId,
        dependencies: Vec<ServiceDependency>,
    ) -> Result<()> {
        let handle = self.require(id)?;
        handle.write().definition.dependencies = dependencies;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Status;

    #[test]
    fn insert_rejects_duplicate_names() {
        let registry = Registry::default();
        registry.insert(ServiceDefinition::new("a", ".")).unwrap();
        let err = registry.insert(ServiceDefinition::new("a", ".")).unwrap_err();
        assert!(matches!(err, Error::DuplicateService(name) if name == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn name_lookup_does_not_hold_the_registry_lock() {
        let registry = Arc::new(Registry::default());
        let busy = registry.insert(ServiceDefinition::new("busy", ".")).unwrap();
        let idle = registry.insert(ServiceDefinition::new("idle", ".")).unwrap();
        let idle_id = idle.read().id();

        let guard = busy.write();
        let lookup = std::thread::spawn({
            let registry = registry.clone();
            move || registry.find_by_name("busy").is_some()
        });
        std::thread::sleep(std::time::Duration::from_millis(50));

        // The blocked lookup must not keep writers out of the registry
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn({
            let registry = registry.clone();
            move || {
                let _ = tx.send(registry.remove(idle_id).is_ok());
            }
        });
        let removed = rx.recv_timeout(std::time::Duration::from_secs(2));
        drop(guard);

        assert_eq!(removed, Ok(true));
        assert!(lookup.join().unwrap());
    }

    #[test]
    fn resolve_accepts_id_or_name() {
        let registry = Registry::default();
        let def = ServiceDefinition::new("orders", ".");
        let id = def.id;
        registry.insert(def).unwrap();

        assert_eq!(registry.resolve("orders").unwrap().read().id(), id);
        assert_eq!(registry.resolve(&id.to_string()).unwrap().read().id(), id);
        assert!(matches!(
            registry.resolve("nope"),
            Err(Error::ServiceNotFound(_))
        ));
    }

    #[test]
    fn remove_refuses_active_service() {
        let registry = Registry::default();
        let handle = registry.insert(ServiceDefinition::new("a", ".")).unwrap();
        let id = handle.read().id();

        handle.write().status = Status::Running;
        assert!(matches!(registry.remove(id), Err(Error::ServiceActive(_))));

        handle.write().status = Status::Error;
        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.name(), "a");
        assert!(registry.is_empty());
    }

    #[test]
    fn definitions_sorted_by_name() {
        let registry = Registry::default();
        for name in ["zuul", "auth", "mail"] {
            registry.insert(ServiceDefinition::new(name, ".")).unwrap();
        }
        let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["auth", "mail", "zuul"]);
    }
}
