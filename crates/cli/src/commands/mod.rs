//! Command implementations.

mod describe;
mod run;

pub use describe::run_describe;
pub use run::run_scenario;
