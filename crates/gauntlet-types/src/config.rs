use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{position::SearchBudget, GauntletError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub depth: u32,
    pub movetime_ms: u64,
    pub early_stop: bool,
    /// `stop` is sent once the reported depth is strictly greater than this.
    pub early_stop_depth: u32,
}

impl SearchConfig {
    pub fn budget(&self) -> SearchBudget {
        SearchBudget {
            depth: self.depth,
            movetime_ms: self.movetime_ms,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: 64,
            movetime_ms: 10_000,
            early_stop: true,
            early_stop_depth: 4,
        }
    }
}

/// What a worker does after its engine violates the protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Kill the engine and drop the rest of the chunk.
    #[default]
    AbortChunk,
    /// Kill the engine, launch a fresh one and continue with the next position.
    SkipPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub jobs: usize,
    pub fault_policy: FaultPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            fault_policy: FaultPolicy::AbortChunk,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    /// Echo every protocol line at `info` instead of `trace`.
    pub debug: bool,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ops: OpsConfig,
}

impl HarnessConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            GauntletError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            GauntletError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.path.trim().is_empty() {
            return Err(GauntletError::Configuration(
                "engine.path must not be empty".into(),
            ));
        }
        if self.search.depth == 0 {
            return Err(GauntletError::Configuration(
                "search.depth must be greater than zero".into(),
            ));
        }
        if self.search.movetime_ms == 0 {
            return Err(GauntletError::Configuration(
                "search.movetime_ms must be greater than zero".into(),
            ));
        }
        if self.scheduler.jobs == 0 {
            return Err(GauntletError::Configuration(
                "scheduler.jobs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
