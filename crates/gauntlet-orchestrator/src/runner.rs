//! Sequential execution of one chunk of positions against one engine.

use gauntlet_engine::{EngineLauncher, SearchOutcome, SessionOptions, UciSession};
use gauntlet_types::{
    config::{FaultPolicy, HarnessConfig},
    position::{Position, SearchBudget},
    report::{ChunkFailure, ChunkOutcome, ChunkStats, PositionResult},
    telemetry::TelemetrySnapshot,
    Result,
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    pub budget: SearchBudget,
    pub session: SessionOptions,
    pub fault_policy: FaultPolicy,
}

impl RunnerConfig {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            budget: config.search.budget(),
            session: SessionOptions::from_config(&config.search, &config.ops),
            fault_policy: config.scheduler.fault_policy,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            budget: SearchBudget::default(),
            session: SessionOptions::default(),
            fault_policy: FaultPolicy::AbortChunk,
        }
    }
}

/// Drives engines from `launcher` across a chunk, one position at a time.
pub struct TestRunner<L: EngineLauncher> {
    launcher: L,
    config: RunnerConfig,
}

impl<L: EngineLauncher> TestRunner<L> {
    pub fn new(launcher: L, config: RunnerConfig) -> Self {
        Self { launcher, config }
    }

    async fn open_session(&self) -> Result<UciSession<L::Transport>> {
        let transport = self.launcher.launch().await?;
        UciSession::start(transport, self.config.session).await
    }

    /// Runs `positions` in order. Results preserve input order; a fatal
    /// engine error is recorded as a [`ChunkFailure`] and handled per the
    /// configured [`FaultPolicy`]. Results gathered before the failure are
    /// kept.
    pub async fn run_chunk(&self, chunk: usize, positions: &[Position]) -> ChunkOutcome {
        let mut stats = ChunkStats::new();
        let mut failures = Vec::new();

        let mut session = match self.open_session().await {
            Ok(session) => session,
            Err(err) => {
                error!("Chunk {chunk}: engine failed to start: {err}");
                failures.push(ChunkFailure {
                    chunk,
                    position_id: None,
                    message: err.to_string(),
                });
                return ChunkOutcome {
                    chunk,
                    stats,
                    failures,
                };
            }
        };
        info!("Chunk {chunk}: engine ready, {} positions", positions.len());

        for (idx, position) in positions.iter().enumerate() {
            match session.search(position, self.config.budget).await {
                Ok(outcome) => stats.record(to_result(position, outcome)),
                Err(err) => {
                    error!("Chunk {chunk}: {} aborted: {err}", position.id);
                    failures.push(ChunkFailure {
                        chunk,
                        position_id: Some(position.id.clone()),
                        message: err.to_string(),
                    });
                    if self.config.fault_policy == FaultPolicy::AbortChunk {
                        let remaining = positions.len() - idx - 1;
                        warn!("Chunk {chunk}: dropping {remaining} remaining positions");
                        break;
                    }
                    session = match self.open_session().await {
                        Ok(fresh) => fresh,
                        Err(err) => {
                            error!("Chunk {chunk}: engine restart failed: {err}");
                            failures.push(ChunkFailure {
                                chunk,
                                position_id: None,
                                message: err.to_string(),
                            });
                            break;
                        }
                    };
                }
            }
        }

        session.terminate().await;
        debug!(
            "Chunk {chunk}: {} results, {} failures",
            stats.results().len(),
            failures.len()
        );
        ChunkOutcome {
            chunk,
            stats,
            failures,
        }
    }
}

fn to_result(position: &Position, outcome: SearchOutcome) -> PositionResult {
    let snapshot = match &outcome.telemetry {
        Some(telemetry) => {
            let missing = telemetry.missing_fields();
            if !missing.is_empty() {
                warn!(
                    "{}: telemetry lacks {}; counting as zero",
                    position.id,
                    missing.join(", ")
                );
            }
            telemetry.snapshot()
        }
        None => {
            warn!("{}: no telemetry before bestmove", position.id);
            TelemetrySnapshot::default()
        }
    };
    PositionResult::new(
        position.id.clone(),
        position.expected_move.clone(),
        outcome.best_move,
        snapshot,
    )
}
