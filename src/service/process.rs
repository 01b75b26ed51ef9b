//! OS process supervision.
//!
//! The supervisor owns every live child process. Handles sit in a side-table
//! keyed by service id; the [`Service`](super::Service) entity only carries
//! the serializable projection (status, pid, logs).

use super::{
    build_launch_command, spawn_log_pump, HealthStatus, LogEntry, LogLevel, ResourceUsage, Status,
};
use crate::config::{ConfigStore, Settings};
use crate::error::{validate_pid, Error, Result};
use crate::registry::{Registry, ServiceHandle, ServiceId};
use chrono::Utc;
use nix::sys::signal::{self, killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long to wait for exit after SIGKILL.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// How long the exit watcher waits for log pumps to reach EOF.
const LOG_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    fn from_status(status: std::io::Result<ExitStatus>) -> Self {
        match status {
            Ok(status) => Self {
                code: status.code(),
                signal: status.signal(),
            },
            Err(_) => Self {
                code: None,
                signal: None,
            },
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Live handle of a running process. Never leaves the supervisor.
struct ProcessHandle {
    pid: u32,
    generation: u64,
    exited: watch::Receiver<Option<ExitInfo>>,
}

type ProcessTable = Arc<Mutex<HashMap<ServiceId, ProcessHandle>>>;

pub struct ProcessSupervisor {
    registry: Arc<Registry>,
    settings: Settings,
    store: Option<Arc<dyn ConfigStore>>,
    processes: ProcessTable,
    generation: AtomicU64,
}

impl ProcessSupervisor {
    pub fn new(
        registry: Arc<Registry>,
        settings: Settings,
        store: Option<Arc<dyn ConfigStore>>,
    ) -> Self {
        Self {
            registry,
            settings,
            store,
            processes: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Spawn the service's process and return without waiting for readiness.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self, id: ServiceId) -> Result<()> {
        let handle = self.registry.require(id)?;

        let definition = {
            let mut service = handle.write();
            if !service.status.can_start() {
                return Err(Error::AlreadyRunning {
                    service: service.definition.name.clone(),
                    status: service.status.to_string(),
                });
            }
            service.transition(Status::Starting);
            service.health_status = HealthStatus::Starting;
            service.last_error = None;
            service.definition.clone()
        };
        let name = definition.name.clone();

        let extra_env = match &self.store {
            Some(store) => match store.env(&name) {
                Ok(env) => env.unwrap_or_default(),
                Err(e) => return Err(fail_start(&handle, &name, e)),
            },
            None => BTreeMap::new(),
        };

        let launch = match build_launch_command(&definition, &extra_env) {
            Ok(launch) => launch,
            Err(e) => return Err(fail_start(&handle, &name, e)),
        };

        tracing::info!("Starting '{}': {}", name, launch.display());

        let mut child = match launch.to_command().spawn() {
            Ok(child) => child,
            Err(e) => return Err(fail_start(&handle, &name, e.into())),
        };
        let Some(pid) = child.id() else {
            return Err(fail_start(
                &handle,
                &name,
                Error::Config("process exited before its pid could be read".to_string()),
            ));
        };

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (exit_tx, exit_rx) = watch::channel(None);
        {
            let mut service = handle.write();
            // A stop may have raced the spawn
            if service.status != Status::Starting {
                let status = service.status.to_string();
                drop(service);
                tracing::warn!("'{}' is no longer starting, killing pid {}", name, pid);
                if let Ok(pgid) = validate_pid(pid, &name) {
                    send_signal(pgid, Signal::SIGKILL);
                }
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
                return Err(Error::TransitionInProgress {
                    service: name,
                    status,
                });
            }
            service.pid = Some(pid);
            service.last_started = Some(Utc::now());
            service.metrics.uptime.starts += 1;
            service.append_log(LogEntry::new(
                LogLevel::Info,
                format!("Started `{}` (pid {})", launch.display(), pid),
            ));
            // Tracked under the service lock so `stop` never sees `starting` without it
            self.processes.lock().insert(
                id,
                ProcessHandle {
                    pid,
                    generation,
                    exited: exit_rx,
                },
            );
        }

        let log_shutdown = CancellationToken::new();
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(spawn_log_pump(stdout, handle.clone(), log_shutdown.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(spawn_log_pump(stderr, handle.clone(), log_shutdown.clone()));
        }

        tokio::spawn(watch_exit(ExitWatch {
            child,
            service: handle,
            id,
            pid,
            generation,
            settle_period: self.settings.settle_period,
            processes: self.processes.clone(),
            exit_tx,
            pumps,
            log_shutdown,
        }));

        Ok(())
    }

    /// SIGTERM the process group, then SIGKILL after the grace period.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self, id: ServiceId) -> Result<()> {
        let handle = self.registry.require(id)?;

        let (name, started, tracked) = {
            let mut service = handle.write();
            let name = service.definition.name.clone();
            match service.status {
                Status::Stopped | Status::Error => return Err(Error::NotRunning(name)),
                Status::Stopping => {
                    return Err(Error::TransitionInProgress {
                        service: name,
                        status: service.status.to_string(),
                    })
                }
                Status::Starting | Status::Running => {}
            }
            let tracked = self
                .processes
                .lock()
                .get(&id)
                .map(|p| (p.pid, p.exited.clone()));
            // `start` is still resolving env or spawning
            if tracked.is_none() && service.status == Status::Starting {
                return Err(Error::TransitionInProgress {
                    service: name,
                    status: service.status.to_string(),
                });
            }
            service.transition(Status::Stopping);
            (name, service.last_started, tracked)
        };

        let outcome = match tracked {
            Some((pid, mut exited)) => self.terminate(&name, pid, &mut exited).await,
            None => Ok(()),
        };

        {
            let mut service = handle.write();
            match &outcome {
                Ok(()) => {
                    service.transition(Status::Stopped);
                    service.append_log(LogEntry::new(LogLevel::Info, "Stopped"));
                }
                Err(e) => {
                    service.transition(Status::Error);
                    service.record_error(format!("Failed to stop: {}", e));
                }
            }
            service.pid = None;
            service.health_status = HealthStatus::Unknown;
            if let Some(session) = started.and_then(|t| (Utc::now() - t).to_std().ok()) {
                service.metrics.uptime.record_session(session);
            }
        }

        match &outcome {
            Ok(()) => tracing::info!("Stopped '{}'", name),
            Err(e) => tracing::error!("Failed to stop '{}': {}", name, e),
        }
        outcome
    }

    async fn terminate(
        &self,
        name: &str,
        pid: u32,
        exited: &mut watch::Receiver<Option<ExitInfo>>,
    ) -> Result<()> {
        if exited.borrow().is_some() {
            return Ok(());
        }
        let pid = validate_pid(pid, name)?;

        send_signal(pid, Signal::SIGTERM);
        if wait_for_exit(exited, self.settings.grace_period).await {
            return Ok(());
        }

        tracing::warn!(
            "Process {} of '{}' did not exit after SIGTERM (grace period: {:?}), sending SIGKILL",
            pid,
            name,
            self.settings.grace_period
        );
        send_signal(pid, Signal::SIGKILL);
        if wait_for_exit(exited, KILL_WAIT).await {
            return Ok(());
        }

        Err(Error::Timeout(name.to_string()))
    }

    /// Stop (tolerating an already stopped service), then start.
    #[tracing::instrument(skip(self))]
    pub async fn restart(&self, id: ServiceId) -> Result<()> {
        match self.stop(id).await {
            Ok(()) | Err(Error::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        self.start(id).await
    }

    /// Sample resource usage of the service's process and store it in its metrics.
    pub async fn sample_resources(&self, id: ServiceId) -> Result<Option<ResourceUsage>> {
        let handle = self.registry.require(id)?;
        let Some(pid) = handle.read().pid else {
            return Ok(None);
        };

        let usage = ResourceUsage::query(pid).await;

        let mut service = handle.write();
        // Skip if the process was replaced while sampling
        if service.pid != Some(pid) {
            return Ok(None);
        }
        service.metrics.resources = Some(usage.clone());
        Ok(Some(usage))
    }

    /// Whether a live process is tracked for `id`.
    pub fn is_supervising(&self, id: ServiceId) -> bool {
        self.processes.lock().contains_key(&id)
    }

    /// Ids of every tracked process.
    pub fn supervised(&self) -> Vec<ServiceId> {
        self.processes.lock().keys().copied().collect()
    }
}

/// Mark a start attempt failed and convert the cause into a spawn error.
fn fail_start(handle: &ServiceHandle, name: &str, cause: Error) -> Error {
    let err = match cause {
        err @ Error::ProcessSpawn { .. } => err,
        other => Error::ProcessSpawn {
            service: name.to_string(),
            reason: other.to_string(),
        },
    };

    let mut service = handle.write();
    service.transition(Status::Error);
    service.health_status = HealthStatus::Unhealthy;
    service.pid = None;
    service.record_error(err.to_string());
    tracing::error!("{}", err);
    err
}

fn send_signal(pid: Pid, sig: Signal) {
    // The child leads its own process group; fall back to the single process
    if let Err(e) = killpg(pid, sig).or_else(|_| signal::kill(pid, sig)) {
        tracing::debug!("Failed to send {} to {}: {}", sig, pid, e);
    }
}

/// True once the exit watcher reported an exit (or went away) within `limit`.
async fn wait_for_exit(exited: &mut watch::Receiver<Option<ExitInfo>>, limit: Duration) -> bool {
    tokio::time::timeout(limit, exited.wait_for(|e| e.is_some()))
        .await
        .is_ok()
}

struct ExitWatch {
    child: Child,
    service: ServiceHandle,
    id: ServiceId,
    pid: u32,
    generation: u64,
    settle_period: Duration,
    processes: ProcessTable,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    pumps: Vec<JoinHandle<()>>,
    log_shutdown: CancellationToken,
}

/// Owns the child until it exits: promotes a settled start to `running` and
/// turns an unrequested exit into `error`.
async fn watch_exit(exit_watch: ExitWatch) {
    let ExitWatch {
        mut child,
        service,
        id,
        pid,
        generation,
        settle_period,
        processes,
        exit_tx,
        pumps,
        log_shutdown,
    } = exit_watch;

    let status = match tokio::time::timeout(settle_period, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            {
                let mut svc = service.write();
                if svc.status == Status::Starting && svc.pid == Some(pid) {
                    svc.transition(Status::Running);
                }
            }
            child.wait().await
        }
    };
    let info = ExitInfo::from_status(status);

    // Let the pumps flush the last lines; a forked JVM may keep the pipes open
    for pump in pumps {
        let _ = tokio::time::timeout(LOG_DRAIN_TIMEOUT, pump).await;
    }
    log_shutdown.cancel();

    {
        let mut svc = service.write();
        if svc.pid == Some(pid) && svc.status != Status::Stopping {
            let name = svc.definition.name.clone();
            if let Some(session) = svc
                .last_started
                .and_then(|t| (Utc::now() - t).to_std().ok())
            {
                svc.metrics.uptime.record_session(session);
            }
            svc.metrics.uptime.unexpected_exits += 1;
            svc.transition(Status::Error);
            svc.health_status = HealthStatus::Unhealthy;
            svc.pid = None;
            let err = Error::ProcessExit {
                service: name,
                pid,
                status: info.to_string(),
            };
            svc.record_error(err.to_string());
            tracing::error!("{}", err);
        }
    }

    {
        let mut table = processes.lock();
        if table.get(&id).map(|p| p.generation) == Some(generation) {
            table.remove(&id);
        }
    }

    let _ = exit_tx.send(Some(info));
}
