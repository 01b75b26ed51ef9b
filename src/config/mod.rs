//! Configuration parsing and types.
//!
//! - `types` - Root config structure (`FleetConfig`, `Settings`, `Profile`)
//! - `service` - Service definitions (`ServiceDefinition`, `BuildSystem`)
//! - `dependency` - Dependency edges (`ServiceDependency`, `DependencyType`)
//! - `duration` - Human-readable durations and their serde adapter
//! - `parser` - YAML config loading
//! - `store` - Read-only access to profiles and env overrides

mod dependency;
mod duration;
mod parser;
mod service;
mod store;
mod types;

pub use dependency::*;
pub use duration::*;
pub use parser::*;
pub use service::*;
pub use store::*;
pub use types::*;
