//! Command implementations.
//!
//! Each command lives in its own module and exposes an `execute` function
//! taking its parsed arguments.

pub mod build;
pub mod check;
pub mod graph;
pub mod heal;
pub mod translate;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use check::execute as check_execute;
pub use graph::execute as graph_execute;
pub use heal::execute as heal_execute;
pub use translate::execute as translate_execute;
