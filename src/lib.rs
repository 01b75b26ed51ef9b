//! # devdeck
//!
//! Local supervisor for fleets of Java microservices in development.
//!
//! ## Features
//!
//! - **Dependency Graph**: hard, soft and optional edges with validation and
//!   cycle detection
//! - **Deterministic Startup Order**: Kahn's algorithm, ties broken by
//!   `order` then name
//! - **Process Supervision**: Maven, Gradle or custom commands in their own
//!   process group, with captured logs and graceful SIGTERM/SIGKILL shutdown
//! - **Health Gating**: dependents wait until their dependencies are running
//!   or report healthy over HTTP
//! - **Cancellation Support**: in-progress operations abort via
//!   `CancellationToken`
//!
//! ## Quick Start
//!
//! ```no_run
//! use devdeck::{Orchestrator, Parser};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Parser::new().load_config("devdeck.yaml")?;
//! let orchestrator = Orchestrator::builder()
//!     .registry(Arc::new(config.to_registry()?))
//!     .settings(config.settings.clone())
//!     .config_store(Arc::new(config.to_store()?))
//!     .build();
//!
//! let report = orchestrator.start_all().await?;
//! for name in report.failed() {
//!     eprintln!("{} failed to start", name);
//! }
//!
//! orchestrator.stop_all().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! - Service state is shared through [`registry::Registry`]; per-service
//!   locks are never held across an await
//! - Fleet-wide operations are serialized by the orchestrator
//! - Waits poll and can be cancelled via [`Orchestrator::cancel_operations`]

pub mod config;
pub mod dependency;
pub mod error;
pub mod healthcheck;
pub mod orchestrator;
pub mod registry;
pub mod service;

// Re-export commonly used types
pub use config::{FleetConfig, Parser, ServiceDefinition, ServiceDependency, Settings};
pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, ServiceOutcome, StartReport, StopReport};
pub use registry::{Registry, ServiceId};
pub use service::{HealthStatus, Status};
