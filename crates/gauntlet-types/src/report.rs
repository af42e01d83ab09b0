use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySnapshot;

/// Outcome of testing one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResult {
    pub id: String,
    pub expected_move: String,
    pub actual_move: String,
    pub matched: bool,
    pub telemetry: TelemetrySnapshot,
}

impl PositionResult {
    pub fn new(
        id: impl Into<String>,
        expected_move: impl Into<String>,
        actual_move: impl Into<String>,
        telemetry: TelemetrySnapshot,
    ) -> Self {
        let expected_move = expected_move.into();
        let actual_move = actual_move.into();
        Self {
            id: id.into(),
            matched: actual_move == expected_move,
            expected_move,
            actual_move,
            telemetry,
        }
    }

    pub fn verdict_line(&self) -> String {
        let tag = if self.matched { "[  OK  ]" } else { "[ FAIL ]" };
        format!(
            "{tag} {}: {} - {}",
            self.id, self.expected_move, self.actual_move
        )
    }
}

/// Summable subtotal produced by one worker. Totals always equal the sums
/// over `results`; mutate only through [`ChunkStats::record`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStats {
    total_nodes: u64,
    total_time_ms: u64,
    total_depth: u64,
    results: Vec<PositionResult>,
}

impl ChunkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: PositionResult) {
        self.total_nodes = self.total_nodes.saturating_add(result.telemetry.nodes);
        self.total_time_ms = self.total_time_ms.saturating_add(result.telemetry.time_ms);
        self.total_depth = self
            .total_depth
            .saturating_add(u64::from(result.telemetry.depth));
        self.results.push(result);
    }

    pub fn total_nodes(&self) -> u64 {
        self.total_nodes
    }

    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    pub fn total_depth(&self) -> u64 {
        self.total_depth
    }

    pub fn results(&self) -> &[PositionResult] {
        &self.results
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.matched).count()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<PositionResult> for ChunkStats {
    fn from_iter<I: IntoIterator<Item = PositionResult>>(iter: I) -> Self {
        let mut stats = ChunkStats::new();
        for result in iter {
            stats.record(result);
        }
        stats
    }
}

/// A fatal condition that ended (or, under the skip policy, interrupted)
/// a worker's chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk: usize,
    /// Position being searched when the failure happened; `None` when the
    /// engine never got past the handshake.
    pub position_id: Option<String>,
    pub message: String,
}

impl ChunkFailure {
    pub fn diagnostic_line(&self) -> String {
        match &self.position_id {
            Some(id) => format!("[ERROR ] chunk {} at {id}: {}", self.chunk, self.message),
            None => format!("[ERROR ] chunk {}: {}", self.chunk, self.message),
        }
    }
}

/// Everything one worker hands back to the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub chunk: usize,
    pub stats: ChunkStats,
    pub failures: Vec<ChunkFailure>,
}

impl ChunkOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Final merged counters for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub passed_count: usize,
    pub total_count: usize,
    pub total_nodes: u64,
    pub total_time_ms: u64,
    pub total_depth: u64,
    pub nps: u64,
    pub avg_depth: f64,
    pub failures: Vec<ChunkFailure>,
}

impl AggregateReport {
    /// Pure reduction over chunk subtotals; independent of chunk order.
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a ChunkOutcome>,
    {
        let mut passed_count = 0;
        let mut total_count = 0;
        let mut total_nodes = 0u64;
        let mut total_time_ms = 0u64;
        let mut total_depth = 0u64;
        let mut failures = Vec::new();

        for outcome in outcomes {
            passed_count += outcome.stats.passed_count();
            total_count += outcome.stats.results().len();
            total_nodes = total_nodes.saturating_add(outcome.stats.total_nodes());
            total_time_ms = total_time_ms.saturating_add(outcome.stats.total_time_ms());
            total_depth = total_depth.saturating_add(outcome.stats.total_depth());
            failures.extend(outcome.failures.iter().cloned());
        }
        failures.sort_by_key(|f| f.chunk);

        let nps = total_nodes.saturating_mul(1000) / total_time_ms.max(1);
        let avg_depth = if total_count == 0 {
            0.0
        } else {
            total_depth as f64 / total_count as f64
        };

        Self {
            passed_count,
            total_count,
            total_nodes,
            total_time_ms,
            total_depth,
            nps,
            avg_depth,
            failures,
        }
    }

    pub fn pass_ratio(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.passed_count as f64 / self.total_count as f64
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "passed {}/{} [{:.2}], time {}, nodes {}, avg_nps {}, avg_depth {:.2}",
            self.passed_count,
            self.total_count,
            self.pass_ratio(),
            self.total_time_ms,
            self.total_nodes,
            self.nps,
            self.avg_depth
        )
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
