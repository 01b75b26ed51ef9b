use super::monitoring::MonitorTask;
use super::report::{ServiceOutcome, StartReport, StopReport};
use super::responses::ServiceActionResponse;
use super::waiter::{wait_for_dependencies, Gate};
use super::OrchestratorBuilder;
use crate::config::{ConfigStore, Settings};
use crate::dependency::{
    build_graph, resolve_names, validate, DependencyInfo, Graph, StartupOrder, ValidationResult,
};
use crate::error::{Error, Result};
use crate::healthcheck::HealthMonitor;
use crate::registry::{Registry, ServiceId};
use crate::service::{ProcessSupervisor, Status};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Coordinates dependency-ordered startup and shutdown of the fleet.
///
/// # Concurrency Model
///
/// - Every method takes `&self`; state lives in the shared [`Registry`]
/// - `fleet_lock` serializes fleet-wide operations: `start_all` and
///   `stop_all` take it exclusively, single-service operations share it
/// - Each operation runs under a child of the current `CancellationToken`;
///   [`cancel_operations`](Self::cancel_operations) aborts all of them
///
/// # Lock Ordering
///
/// 1. `fleet_lock` (async, held across awaits)
/// 2. the registry map
/// 3. a single service's lock (never held across an await)
///
/// # Example
///
/// ```no_run
/// use devdeck::{Orchestrator, Parser};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Parser::new().load_config("devdeck.yaml")?;
/// let orchestrator = Orchestrator::builder()
///     .registry(Arc::new(config.to_registry()?))
///     .settings(config.settings.clone())
///     .config_store(Arc::new(config.to_store()?))
///     .build();
///
/// let report = orchestrator.start_all().await?;
/// println!("failed: {:?}", report.failed());
/// orchestrator.stop_all().await?;
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    registry: Arc<Registry>,
    supervisor: Arc<ProcessSupervisor>,
    monitor: Arc<HealthMonitor>,
    settings: Settings,
    store: Option<Arc<dyn ConfigStore>>,
    fleet_lock: tokio::sync::RwLock<()>,
    /// Parent of every in-flight operation's token. Replaced on cancel.
    cancellation_token: Mutex<CancellationToken>,
    pub(super) monitoring_task: Mutex<Option<MonitorTask>>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub(super) fn new(
        registry: Arc<Registry>,
        supervisor: Arc<ProcessSupervisor>,
        monitor: Arc<HealthMonitor>,
        settings: Settings,
        store: Option<Arc<dyn ConfigStore>>,
    ) -> Self {
        Self {
            registry,
            supervisor,
            monitor,
            settings,
            store,
            fleet_lock: tokio::sync::RwLock::new(()),
            cancellation_token: Mutex::new(CancellationToken::new()),
            monitoring_task: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_store(&self) -> Option<&Arc<dyn ConfigStore>> {
        self.store.as_ref()
    }

    /// Cancel every in-flight operation.
    ///
    /// Operations started afterwards get a fresh token and are unaffected.
    pub fn cancel_operations(&self) {
        let mut token = self.cancellation_token.lock();
        token.cancel();
        *token = CancellationToken::new();
    }

    /// A token that fires when `cancel_operations` is called.
    pub fn child_token(&self) -> CancellationToken {
        self.cancellation_token.lock().child_token()
    }

    /// Token for one operation, also cancelled when `external` fires.
    ///
    /// The guard cancels the token when the operation ends, which also
    /// retires the linking task.
    fn operation_token(
        &self,
        external: Option<&CancellationToken>,
    ) -> (CancellationToken, DropGuard) {
        let token = self.child_token();
        if let Some(external) = external {
            if external.is_cancelled() {
                token.cancel();
            } else {
                let linked = token.clone();
                let external = external.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = external.cancelled() => linked.cancel(),
                        _ = linked.cancelled() => {}
                    }
                });
            }
        }
        let guard = token.clone().drop_guard();
        (token, guard)
    }

    fn current_graph(&self) -> Graph {
        build_graph(&self.registry.definitions()).0
    }

    /// Validate `graph` and order it, refusing to produce anything partial.
    fn plan(graph: &Graph) -> Result<Vec<String>> {
        let validation = validate(graph);
        for warning in &validation.warnings {
            tracing::warn!("{}", warning);
        }
        if !validation.valid {
            return Err(Error::Validation(validation.errors));
        }
        Ok(resolve_names(graph)?)
    }

    /// Start every enabled service in dependency order.
    ///
    /// Structural problems abort before anything is spawned. Per-service
    /// failures are recorded in the report and propagate to hard dependents.
    pub async fn start_all(&self) -> Result<StartReport> {
        self.start_all_inner(None).await
    }

    /// [`start_all`](Self::start_all), also aborted when `cancel` fires.
    pub async fn start_all_with(&self, cancel: &CancellationToken) -> Result<StartReport> {
        self.start_all_inner(Some(cancel)).await
    }

    #[tracing::instrument(skip_all)]
    async fn start_all_inner(&self, external: Option<&CancellationToken>) -> Result<StartReport> {
        let _fleet = self.fleet_lock.write().await;
        let (token, _guard) = self.operation_token(external);

        let graph = self.current_graph();
        let order = Self::plan(&graph)?;
        tracing::info!("Starting {} services: {}", order.len(), order.join(", "));

        Ok(self.start_in_order(&graph, &order, &token).await)
    }

    /// Start the named services and their hard dependencies, nothing else.
    pub async fn start_services(&self, names: &[String]) -> Result<StartReport> {
        self.start_services_with(names, &CancellationToken::new()).await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn start_services_with(
        &self,
        names: &[String],
        cancel: &CancellationToken,
    ) -> Result<StartReport> {
        let _fleet = self.fleet_lock.read().await;
        let (token, _guard) = self.operation_token(Some(cancel));

        let full = self.current_graph();
        let mut members = BTreeSet::new();
        for name in names {
            if !full.contains(name) {
                return Err(Error::ServiceNotFound(name.clone()));
            }
            members.extend(full.hard_closure(name));
            members.insert(name.clone());
        }

        let graph = full.subgraph(&members);
        let order = Self::plan(&graph)?;
        Ok(self.start_in_order(&graph, &order, &token).await)
    }

    /// Start the members of a stored profile with their hard dependencies.
    pub async fn start_profile(&self, profile: &str) -> Result<StartReport> {
        self.start_profile_with(profile, &CancellationToken::new()).await
    }

    pub async fn start_profile_with(
        &self,
        profile: &str,
        cancel: &CancellationToken,
    ) -> Result<StartReport> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| {
                Error::Config("No config store is attached; profiles are unavailable".to_string())
            })?;
        let members = store
            .profile_services(profile)
            .ok_or_else(|| Error::Config(format!("Unknown profile '{}'", profile)))?;

        tracing::info!("Starting profile '{}': {}", profile, members.join(", "));
        self.start_services_with(&members, cancel).await
    }

    /// Start one service after its hard dependency closure.
    ///
    /// Dependencies already running count as satisfied. Services outside
    /// the closure are never started.
    pub async fn start_one(&self, id: ServiceId) -> Result<ServiceActionResponse> {
        self.start_one_with(id, &CancellationToken::new()).await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn start_one_with(
        &self,
        id: ServiceId,
        cancel: &CancellationToken,
    ) -> Result<ServiceActionResponse> {
        let _fleet = self.fleet_lock.read().await;
        let (token, _guard) = self.operation_token(Some(cancel));

        let handle = self.registry.require(id)?;
        let (name, status) = {
            let service = handle.read();
            (service.definition.name.clone(), service.status)
        };
        if matches!(status, Status::Starting | Status::Running) {
            return Err(Error::AlreadyRunning {
                service: name,
                status: status.to_string(),
            });
        }

        let full = self.current_graph();
        let mut members = full.hard_closure(&name);
        members.insert(name.clone());
        let graph = full.subgraph(&members);
        let order = Self::plan(&graph)?;

        let mut report = self.start_in_order(&graph, &order, &token).await;
        for failed in report.failed() {
            if failed != name {
                tracing::warn!("Dependency '{}' of '{}' did not start", failed, name);
            }
        }

        match report.take_outcome(&name) {
            Some(ServiceOutcome::Started) => Ok(ServiceActionResponse::new(
                handle.read().summary(),
                format!("Service '{}' started", name),
            )),
            Some(ServiceOutcome::Failed { error }) => Err(error),
            Some(ServiceOutcome::Skipped { reason }) => Err(Error::Config(format!(
                "Service '{}' was not started: {}",
                name, reason
            ))),
            Some(ServiceOutcome::AlreadyRunning) => Err(Error::AlreadyRunning {
                service: name,
                status: handle.read().status.to_string(),
            }),
            Some(ServiceOutcome::Cancelled) | Some(ServiceOutcome::Stopped) | None => {
                Err(Error::Cancelled(name))
            }
        }
    }

    /// Visit `order`, gating each service on its dependencies.
    async fn start_in_order(
        &self,
        graph: &Graph,
        order: &[String],
        token: &CancellationToken,
    ) -> StartReport {
        let mut report = StartReport::default();
        let mut failed: BTreeSet<String> = BTreeSet::new();

        for (idx, name) in order.iter().enumerate() {
            if token.is_cancelled() {
                tracing::warn!("Startup cancelled before '{}'", name);
                for rest in &order[idx..] {
                    report.push(rest.clone(), ServiceOutcome::Cancelled);
                }
                break;
            }

            let Some(node) = graph.node(name) else {
                continue;
            };

            if !node.enabled {
                tracing::info!("Skipping disabled service '{}'", name);
                report.push(
                    name.clone(),
                    ServiceOutcome::Skipped {
                        reason: "disabled".to_string(),
                    },
                );
                continue;
            }

            let Some(handle) = self.registry.get(node.id) else {
                failed.insert(name.clone());
                report.push(
                    name.clone(),
                    ServiceOutcome::Failed {
                        error: Error::ServiceNotFound(name.clone()),
                    },
                );
                continue;
            };

            let status = handle.read().status;
            if matches!(status, Status::Starting | Status::Running) {
                report.push(name.clone(), ServiceOutcome::AlreadyRunning);
                continue;
            }

            let warnings =
                match wait_for_dependencies(&self.monitor, graph, name, &failed, token).await {
                    Gate::Open { warnings } => warnings,
                    Gate::Blocked(error) => {
                        tracing::error!("Not starting '{}': {}", name, error);
                        failed.insert(name.clone());
                        report.push(name.clone(), ServiceOutcome::Failed { error });
                        continue;
                    }
                    Gate::Cancelled => {
                        report.push(name.clone(), ServiceOutcome::Cancelled);
                        continue;
                    }
                };

            if !node.startup_delay.is_zero() {
                tracing::debug!("Delaying '{}' by {:?}", name, node.startup_delay);
                let cancelled = tokio::select! {
                    biased;
                    _ = token.cancelled() => true,
                    _ = tokio::time::sleep(node.startup_delay) => false,
                };
                if cancelled {
                    report.push_with_warnings(name.clone(), ServiceOutcome::Cancelled, warnings);
                    continue;
                }
            }

            match self.supervisor.start(node.id).await {
                Ok(()) => {
                    report.push_with_warnings(name.clone(), ServiceOutcome::Started, warnings)
                }
                Err(error) => {
                    tracing::error!("Failed to start '{}': {}", name, error);
                    failed.insert(name.clone());
                    report.push_with_warnings(
                        name.clone(),
                        ServiceOutcome::Failed { error },
                        warnings,
                    );
                }
            }
        }

        report
    }

    /// Stop every active service in reverse startup order.
    ///
    /// Cancels in-flight operations first so a concurrent `start_all`
    /// releases the fleet lock.
    #[tracing::instrument(skip(self))]
    pub async fn stop_all(&self) -> Result<StopReport> {
        self.cancel_operations();
        let _fleet = self.fleet_lock.write().await;

        let graph = self.current_graph();
        let mut order = match resolve_names(&graph) {
            Ok(order) => order,
            Err(cycle) => {
                tracing::warn!("{}; stopping in reverse declaration order instead", cycle);
                let mut nodes: Vec<_> = graph.nodes().collect();
                nodes.sort_by(|a, b| (a.order, &a.name).cmp(&(b.order, &b.name)));
                nodes.into_iter().map(|n| n.name.clone()).collect()
            }
        };
        order.reverse();

        let mut report = StopReport::default();
        for name in order {
            let Some(node) = graph.node(&name) else {
                continue;
            };
            let Some(handle) = self.registry.get(node.id) else {
                continue;
            };

            let status = handle.read().status;
            if matches!(status, Status::Stopped | Status::Error) {
                report.push(
                    name,
                    ServiceOutcome::Skipped {
                        reason: status.to_string(),
                    },
                );
                continue;
            }

            match self.supervisor.stop(node.id).await {
                Ok(()) => report.push(name, ServiceOutcome::Stopped),
                Err(Error::NotRunning(_)) => report.push(
                    name,
                    ServiceOutcome::Skipped {
                        reason: Status::Stopped.to_string(),
                    },
                ),
                Err(error) => report.push(name, ServiceOutcome::Failed { error }),
            }
        }

        Ok(report)
    }

    /// Stop one service. Dependents keep running.
    #[tracing::instrument(skip(self))]
    pub async fn stop_one(&self, id: ServiceId) -> Result<ServiceActionResponse> {
        let _fleet = self.fleet_lock.read().await;
        self.supervisor.stop(id).await?;
        let service = self.registry.require(id)?.read().summary();
        let message = format!("Service '{}' stopped", service.name);
        Ok(ServiceActionResponse::new(service, message))
    }

    #[tracing::instrument(skip(self))]
    pub async fn restart(&self, id: ServiceId) -> Result<ServiceActionResponse> {
        let _fleet = self.fleet_lock.read().await;
        self.supervisor.restart(id).await?;
        let service = self.registry.require(id)?.read().summary();
        let message = format!("Service '{}' restarted", service.name);
        Ok(ServiceActionResponse::new(service, message))
    }

    /// Probe one service now and return its refreshed state.
    pub async fn check_health(&self, id: ServiceId) -> Result<ServiceActionResponse> {
        let result = self.monitor.check(id).await?;
        let service = self.registry.require(id)?.read().summary();
        let message = match &result.error {
            Some(error) => format!("Service '{}' is {} ({})", service.name, result.status, error),
            None => format!("Service '{}' is {}", service.name, result.status),
        };
        Ok(ServiceActionResponse::new(service, message))
    }

    pub fn validate(&self) -> ValidationResult {
        validate(&self.current_graph())
    }

    pub fn startup_order(&self) -> Result<StartupOrder> {
        Ok(StartupOrder::generate(&self.current_graph())?)
    }

    pub fn dependency_overview(&self) -> BTreeMap<String, DependencyInfo> {
        self.current_graph().overview()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancellation_token.get_mut().cancel();
        if let Some(task) = self.monitoring_task.get_mut().take() {
            task.abort();
        }
    }
}
