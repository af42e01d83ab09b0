//! Fan-out of a suite across isolated workers and merge of their subtotals.

use std::sync::Arc;

use futures::{stream::FuturesUnordered, StreamExt};
use gauntlet_engine::EngineLauncher;
use gauntlet_types::{
    position::Position,
    report::{AggregateReport, ChunkFailure, ChunkOutcome, ChunkStats},
    Result,
};
use tracing::{error, info};

use crate::{orchestrator_error, runner::TestRunner};

/// Splits `positions` into at most `jobs` contiguous chunks.
///
/// `min(jobs, len)` chunks of `len / chunks` positions each; the last chunk
/// also takes the remainder. An empty slice yields no chunks.
pub fn partition(positions: &[Position], jobs: usize) -> Vec<&[Position]> {
    let chunks = jobs.min(positions.len());
    if chunks == 0 {
        return Vec::new();
    }
    let size = positions.len() / chunks;
    (0..chunks)
        .map(|idx| {
            let start = idx * size;
            let end = if idx + 1 == chunks {
                positions.len()
            } else {
                start + size
            };
            &positions[start..end]
        })
        .collect()
}

/// Merged result of a full run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: AggregateReport,
    /// Per-chunk outcomes ordered by chunk index.
    pub outcomes: Vec<ChunkOutcome>,
}

pub struct Scheduler<L: EngineLauncher> {
    runner: Arc<TestRunner<L>>,
    jobs: usize,
}

impl<L> Scheduler<L>
where
    L: EngineLauncher + 'static,
{
    pub fn new(runner: TestRunner<L>, jobs: usize) -> Result<Self> {
        if jobs == 0 {
            return Err(orchestrator_error("jobs must be greater than zero"));
        }
        Ok(Self {
            runner: Arc::new(runner),
            jobs,
        })
    }

    /// Runs every chunk on its own task with its own engine, calling
    /// `on_chunk` as each finishes. Chunks never share state; a failed chunk
    /// does not cancel its siblings.
    pub async fn run<F>(&self, positions: &[Position], mut on_chunk: F) -> RunOutput
    where
        F: FnMut(&ChunkOutcome),
    {
        let chunks = partition(positions, self.jobs);
        info!(
            "Scheduling {} positions across {} workers",
            positions.len(),
            chunks.len()
        );

        let mut pending: FuturesUnordered<_> = chunks
            .into_iter()
            .enumerate()
            .map(|(idx, chunk)| {
                let runner = Arc::clone(&self.runner);
                let chunk = chunk.to_vec();
                let handle = tokio::spawn(async move { runner.run_chunk(idx, &chunk).await });
                async move { (idx, handle.await) }
            })
            .collect();

        let mut outcomes = Vec::new();
        while let Some((idx, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|err| {
                error!("Worker for chunk {idx} died: {err}");
                ChunkOutcome {
                    chunk: idx,
                    stats: ChunkStats::new(),
                    failures: vec![ChunkFailure {
                        chunk: idx,
                        position_id: None,
                        message: orchestrator_error(format!("worker died: {err}")).to_string(),
                    }],
                }
            });
            on_chunk(&outcome);
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|outcome| outcome.chunk);
        let report = AggregateReport::from_outcomes(&outcomes);
        info!("{}", report.summary_line());
        RunOutput { report, outcomes }
    }
}
