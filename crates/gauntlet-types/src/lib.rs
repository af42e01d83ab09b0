//! Shared domain types for the Gauntlet project.

pub mod config;
pub mod position;
pub mod report;
pub mod telemetry;

mod errors;

pub use errors::{GauntletError, Result};
