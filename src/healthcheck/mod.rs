//! HTTP health probing and readiness waits.

mod checker;
mod http;
mod monitor;

pub use checker::*;
pub use http::*;
pub use monitor::*;
