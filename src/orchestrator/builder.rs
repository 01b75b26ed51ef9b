use super::Orchestrator;
use crate::config::{ConfigStore, Settings};
use crate::healthcheck::{HealthMonitor, HealthProbe, HttpProbe};
use crate::registry::Registry;
use crate::service::ProcessSupervisor;
use std::sync::Arc;

/// Builder for constructing an `Orchestrator` with a fluent API.
///
/// Everything is optional: an empty registry, default [`Settings`], the
/// HTTP probe and no config store are used for whatever is not set.
///
/// # Example
///
/// ```no_run
/// use devdeck::config::{MemoryStore, Settings};
/// use devdeck::registry::Registry;
/// use devdeck::Orchestrator;
/// use std::sync::Arc;
///
/// let orchestrator = Orchestrator::builder()
///     .registry(Arc::new(Registry::default()))
///     .settings(Settings::default())
///     .config_store(Arc::new(MemoryStore::new()))
///     .build();
/// ```
#[derive(Default)]
pub struct OrchestratorBuilder {
    registry: Option<Arc<Registry>>,
    settings: Settings,
    probe: Option<Arc<dyn HealthProbe>>,
    config_store: Option<Arc<dyn ConfigStore>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the registry of services to manage.
    ///
    /// If not set, a fresh registry sized by `settings.log_buffer_size` is used.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the HTTP health probe, e.g. with a scripted one in tests.
    pub fn probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Attach the store profiles and per-service environment are read from.
    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    pub fn build(self) -> Orchestrator {
        let settings = self.settings;
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(Registry::new(settings.log_buffer_size)));
        let probe = self.probe.unwrap_or_else(|| Arc::new(HttpProbe) as Arc<dyn HealthProbe>);

        let supervisor = Arc::new(ProcessSupervisor::new(
            registry.clone(),
            settings.clone(),
            self.config_store.clone(),
        ));
        let monitor = Arc::new(HealthMonitor::new(registry.clone(), probe, settings.clone()));

        Orchestrator::new(registry, supervisor, monitor, settings, self.config_store)
    }
}
