//! Operational helpers: logging setup and machine-readable run records.

use chrono::{DateTime, Utc};
use gauntlet_types::{
    config::OpsConfig,
    report::{AggregateReport, ChunkOutcome, PositionResult},
    GauntletError, Result,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global fmt subscriber. Logs go to stderr so stdout carries
/// only the report.
pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ops_error(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ops_error(format!("tracing init error: {err}")))?;
    Ok(())
}

/// One-shot JSON dump of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub engine: String,
    pub suite: String,
    pub report: AggregateReport,
    pub results: Vec<PositionResult>,
}

impl RunRecord {
    /// `outcomes` are flattened in the order given.
    pub fn new(
        engine: impl Into<String>,
        suite: impl Into<String>,
        started_at: DateTime<Utc>,
        report: AggregateReport,
        outcomes: &[ChunkOutcome],
    ) -> Self {
        Self {
            started_at,
            finished_at: Utc::now(),
            engine: engine.into(),
            suite: suite.into(),
            report,
            results: outcomes
                .iter()
                .flat_map(|outcome| outcome.stats.results().iter().cloned())
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ops_error(format!("failed to encode run record: {err}")))
    }
}

pub fn ops_error(message: impl Into<String>) -> GauntletError {
    GauntletError::Ops(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_types::{report::ChunkStats, telemetry::TelemetrySnapshot};

    #[test]
    fn run_record_serializes_results_in_chunk_order() {
        let chunk = |idx: usize, id: &str| ChunkOutcome {
            chunk: idx,
            stats: std::iter::once(PositionResult::new(
                id,
                "e2e4",
                "e2e4",
                TelemetrySnapshot {
                    depth: 6,
                    nodes: 100,
                    time_ms: 4,
                },
            ))
            .collect::<ChunkStats>(),
            failures: Vec::new(),
        };
        let outcomes = vec![chunk(0, "A"), chunk(1, "B")];
        let report = AggregateReport::from_outcomes(&outcomes);
        let record = RunRecord::new("engine", "suite.epd", Utc::now(), report, &outcomes);

        let json = record.to_json().expect("encode");
        let decoded: serde_json::Value = serde_json::from_str(&json).expect("decode");
        assert_eq!(decoded["report"]["passed_count"], 2);
        assert_eq!(decoded["report"]["total_nodes"], 200);
        assert_eq!(decoded["results"][0]["id"], "A");
        assert_eq!(decoded["results"][1]["id"], "B");
        assert_eq!(decoded["suite"], "suite.epd");
        assert!(record.finished_at >= record.started_at);
    }
}
