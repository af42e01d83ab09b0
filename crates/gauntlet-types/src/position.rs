use serde::{Deserialize, Serialize};

/// One labeled test case handed to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    /// Full six-field FEN sent verbatim after `position fen`.
    pub fen: String,
    /// Accepted answer in coordinate notation, e.g. `e2e4`.
    pub expected_move: String,
}

impl Position {
    pub fn new(
        id: impl Into<String>,
        fen: impl Into<String>,
        expected_move: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            fen: fen.into(),
            expected_move: expected_move.into(),
        }
    }
}

/// Per-position search limits passed on the `go` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBudget {
    pub depth: u32,
    pub movetime_ms: u64,
}

impl SearchBudget {
    pub fn go_command(&self) -> String {
        format!("go movetime {} depth {}", self.movetime_ms, self.depth)
    }
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            depth: 64,
            movetime_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_command_carries_both_limits() {
        let budget = SearchBudget {
            depth: 12,
            movetime_ms: 2500,
        };
        assert_eq!(budget.go_command(), "go movetime 2500 depth 12");
        assert_eq!(
            SearchBudget::default().go_command(),
            "go movetime 10000 depth 64"
        );
    }
}
