//! Fleet-level coordination: dependency-gated startup, ordered shutdown and
//! background health monitoring.

mod builder;
mod core;
mod monitoring;
mod report;
mod responses;
mod waiter;

pub use builder::OrchestratorBuilder;
pub use core::*;
pub use report::*;
pub use responses::*;
