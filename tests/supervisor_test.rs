/// Process supervision tests against real `sh` processes
///
/// Each service runs a custom shell command in a temp directory, so no JVM
/// or build tool is needed.
use devdeck::config::{ConfigStore, ServiceDefinition, Settings};
use devdeck::registry::{Registry, ServiceHandle, ServiceId};
use devdeck::service::{HealthStatus, LogLevel, ProcessSupervisor, Status};
use devdeck::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn fast_settings() -> Settings {
    Settings {
        grace_period: Duration::from_millis(500),
        settle_period: Duration::from_millis(100),
        ..Settings::default()
    }
}

struct Fixture {
    _dir: TempDir,
    registry: Arc<Registry>,
    supervisor: ProcessSupervisor,
}

impl Fixture {
    fn new() -> Self {
        let registry = Arc::new(Registry::default());
        let supervisor = ProcessSupervisor::new(registry.clone(), fast_settings(), None);
        Self {
            _dir: tempfile::tempdir().expect("Failed to create temp dir"),
            registry,
            supervisor,
        }
    }

    fn add(&self, name: &str, command: &str) -> (ServiceId, ServiceHandle) {
        let handle = self
            .registry
            .insert(ServiceDefinition::new(name, self._dir.path()).with_command(command))
            .expect("Failed to register service");
        let id = handle.read().id();
        (id, handle)
    }
}

/// Poll `predicate` on the service until it holds or `limit` passes.
async fn wait_for(
    handle: &ServiceHandle,
    limit: Duration,
    predicate: impl Fn(&devdeck::service::Service) -> bool,
) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if predicate(&handle.read()) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    predicate(&handle.read())
}

#[tokio::test]
async fn test_start_and_stop_lifecycle() {
    let fx = Fixture::new();
    let (id, handle) = fx.add("sleeper", "sleep 30");

    fx.supervisor.start(id).await.unwrap();
    {
        let service = handle.read();
        assert!(matches!(service.status, Status::Starting | Status::Running));
        assert!(service.pid.is_some());
        assert!(service.last_started.is_some());
        assert_eq!(service.metrics.uptime.starts, 1);
    }
    assert!(fx.supervisor.is_supervising(id));

    // Settles into running
    assert!(wait_for(&handle, Duration::from_secs(3), |s| s.status == Status::Running).await);

    let before = {
        let service = handle.read();
        (service.status, service.pid, service.metrics.uptime.starts)
    };
    let err = fx.supervisor.start(id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning { .. }));
    {
        let service = handle.read();
        assert_eq!(
            (service.status, service.pid, service.metrics.uptime.starts),
            before
        );
    }

    fx.supervisor.stop(id).await.unwrap();
    {
        let service = handle.read();
        assert_eq!(service.status, Status::Stopped);
        assert_eq!(service.pid, None);
        assert_eq!(service.health_status, HealthStatus::Unknown);
    }

    let err = fx.supervisor.stop(id).await.unwrap_err();
    assert!(matches!(err, Error::NotRunning(name) if name == "sleeper"));
}

#[tokio::test]
async fn test_restart_starts_a_stopped_service() {
    let fx = Fixture::new();
    let (id, handle) = fx.add("sleeper", "sleep 30");

    fx.supervisor.restart(id).await.unwrap();
    assert!(handle.read().pid.is_some());

    let first_pid = handle.read().pid;
    fx.supervisor.restart(id).await.unwrap();
    let second_pid = handle.read().pid;
    assert!(second_pid.is_some());
    assert_ne!(first_pid, second_pid);
    assert_eq!(handle.read().metrics.uptime.starts, 2);

    fx.supervisor.stop(id).await.unwrap();
}

#[tokio::test]
async fn test_unexpected_exit_marks_service_error() {
    let fx = Fixture::new();
    let (id, handle) = fx.add("crasher", "sleep 0.3; exit 3");

    fx.supervisor.start(id).await.unwrap();
    assert!(wait_for(&handle, Duration::from_secs(5), |s| s.status == Status::Error).await);

    let service = handle.read();
    assert_eq!(service.pid, None);
    assert_eq!(service.health_status, HealthStatus::Unhealthy);
    assert_eq!(service.metrics.uptime.unexpected_exits, 1);
    let last_error = service.last_error.clone().unwrap();
    assert!(last_error.contains("exited unexpectedly"), "{}", last_error);
    assert!(last_error.contains("exit code 3"), "{}", last_error);
    assert!(service
        .logs
        .iter()
        .any(|e| e.level == LogLevel::Error && e.message.contains("exited unexpectedly")));
    drop(service);

    // The table entry is gone and the service can be started again
    assert!(!fx.supervisor.is_supervising(id));
    fx.supervisor.start(id).await.unwrap();
}

#[tokio::test]
async fn test_stop_escalates_to_sigkill() {
    let fx = Fixture::new();
    let (id, handle) = fx.add("stubborn", "trap '' TERM; sleep 30");

    fx.supervisor.start(id).await.unwrap();
    assert!(wait_for(&handle, Duration::from_secs(3), |s| s.status == Status::Running).await);

    let started = Instant::now();
    fx.supervisor.stop(id).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(handle.read().status, Status::Stopped);
    assert!(!fx.supervisor.is_supervising(id));
}

#[tokio::test]
async fn test_output_is_captured() {
    let fx = Fixture::new();
    let (id, handle) = fx.add(
        "chatty",
        "echo hello from stdout; echo ERROR on stderr >&2; sleep 30",
    );

    fx.supervisor.start(id).await.unwrap();
    assert!(
        wait_for(&handle, Duration::from_secs(3), |s| {
            s.logs.iter().any(|e| e.message == "hello from stdout")
                && s.logs.iter().any(|e| e.message == "ERROR on stderr")
        })
        .await
    );

    {
        let service = handle.read();
        let stderr_line = service
            .logs
            .iter()
            .find(|e| e.message == "ERROR on stderr")
            .unwrap();
        assert_eq!(stderr_line.level, LogLevel::Error);
    }

    fx.supervisor.stop(id).await.unwrap();
}

#[tokio::test]
async fn test_missing_directory_fails_to_spawn() {
    let registry = Arc::new(Registry::default());
    let supervisor = ProcessSupervisor::new(registry.clone(), fast_settings(), None);
    let handle = registry
        .insert(
            ServiceDefinition::new("ghost", "/nonexistent/devdeck/ghost").with_command("sleep 1"),
        )
        .unwrap();
    let id = handle.read().id();

    let err = supervisor.start(id).await.unwrap_err();
    assert!(matches!(err, Error::ProcessSpawn { ref service, .. } if service == "ghost"));

    let service = handle.read();
    assert_eq!(service.status, Status::Error);
    assert!(service.last_error.is_some());
}

#[tokio::test]
async fn test_non_utf8_output_keeps_capturing() {
    let fx = Fixture::new();
    let (id, handle) = fx.add(
        "latin1",
        "echo before; printf 'caf\\351\\n'; echo after; sleep 30",
    );

    fx.supervisor.start(id).await.unwrap();
    assert!(
        wait_for(&handle, Duration::from_secs(3), |s| {
            s.logs.iter().any(|e| e.message == "after")
        })
        .await
    );

    {
        let service = handle.read();
        assert!(service.logs.iter().any(|e| e.message == "before"));
        assert!(service.logs.iter().any(|e| e.message == "caf\u{FFFD}"));
    }

    fx.supervisor.stop(id).await.unwrap();
}

/// Store whose env lookup blocks, holding `start` between `starting` and spawn.
struct SlowStore {
    delay: Duration,
}

impl ConfigStore for SlowStore {
    fn profiles(&self) -> Vec<String> {
        Vec::new()
    }

    fn profile_services(&self, _profile: &str) -> Option<Vec<String>> {
        None
    }

    fn env_json(&self, _service: &str) -> Option<String> {
        std::thread::sleep(self.delay);
        None
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_while_spawning_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::default());
    let store: Arc<dyn ConfigStore> = Arc::new(SlowStore {
        delay: Duration::from_millis(300),
    });
    let supervisor = Arc::new(ProcessSupervisor::new(
        registry.clone(),
        fast_settings(),
        Some(store),
    ));
    let handle = registry
        .insert(ServiceDefinition::new("slow", dir.path()).with_command("exec sleep 30"))
        .unwrap();
    let id = handle.read().id();

    let starting = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.start(id).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.read().status, Status::Starting);
    assert!(!supervisor.is_supervising(id));

    let err = supervisor.stop(id).await.unwrap_err();
    assert!(matches!(err, Error::TransitionInProgress { ref service, .. } if service == "slow"));

    starting.await.unwrap().unwrap();
    assert!(supervisor.is_supervising(id));
    assert!(handle.read().pid.is_some());

    // Once tracked, the process can be stopped and nothing is left behind
    supervisor.stop(id).await.unwrap();
    let service = handle.read();
    assert_eq!(service.status, Status::Stopped);
    assert_eq!(service.pid, None);
    assert!(!supervisor.is_supervising(id));
}
