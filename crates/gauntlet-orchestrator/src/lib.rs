//! Test execution: per-chunk runners, the parallel scheduler and report
//! rendering.

pub mod render;
pub mod runner;
pub mod scheduler;

use gauntlet_types::GauntletError;

pub use runner::{RunnerConfig, TestRunner};
pub use scheduler::{partition, RunOutput, Scheduler};

pub fn orchestrator_error(message: impl Into<String>) -> GauntletError {
    GauntletError::Worker(message.into())
}
