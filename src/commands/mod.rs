mod graph;
mod up;
mod validate;

pub use graph::{run_deps, run_order};
pub use up::run_up;
pub use validate::run_validate;
