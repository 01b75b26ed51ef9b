//! Services and their process supervision.
//!
//! - [`Service`]: a definition plus runtime state, shared as
//!   [`ServiceHandle`](crate::registry::ServiceHandle)
//! - [`ProcessSupervisor`]: spawns, watches and terminates service processes
//! - [`LogBuffer`]: bounded capture of process output
//! - [`ServiceMetrics`]: health-check and uptime statistics
//!
//! # Example
//!
//! ```ignore
//! use devdeck::service::Status;
//!
//! let handle = registry.resolve("gateway")?;
//! if handle.read().status == Status::Running {
//!     println!("gateway is up");
//! }
//! ```

mod command;
mod entity;
mod log_capture;
mod metrics;
mod process;
mod resources;
mod types;

pub use command::*;
pub use entity::*;
pub use log_capture::*;
pub use metrics::*;
pub use process::*;
pub use resources::*;
pub use types::*;
