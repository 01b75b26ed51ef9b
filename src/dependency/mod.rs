//! Dependency graph, validation and startup ordering.

mod graph;
mod resolver;
mod validator;

pub use graph::*;
pub use resolver::*;
pub use validator::*;
