//! Plain-text report lines.

use gauntlet_types::report::ChunkOutcome;

/// Verdict lines for a finished chunk in input order, followed by any
/// failure diagnostics.
pub fn chunk_lines(outcome: &ChunkOutcome) -> Vec<String> {
    outcome
        .stats
        .results()
        .iter()
        .map(|result| result.verdict_line())
        .chain(outcome.failures.iter().map(|f| f.diagnostic_line()))
        .collect()
}
