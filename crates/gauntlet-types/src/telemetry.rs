use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::GauntletError;

/// Engine evaluation as reported on an `info` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Centipawns(i32),
    MateIn(i32),
}

impl FromStr for Score {
    type Err = GauntletError;

    /// Accepts the re-joined form `"cp 34"` or `"mate -3"`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split_whitespace();
        let kind = parts.next();
        let amount = parts.next().and_then(|raw| raw.parse::<i32>().ok());
        match (kind, amount) {
            (Some("cp"), Some(cp)) => Ok(Score::Centipawns(cp)),
            (Some("mate"), Some(moves)) => Ok(Score::MateIn(moves)),
            _ => Err(GauntletError::Decode(format!("unrecognised score '{value}'"))),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "cp {cp}"),
            Score::MateIn(moves) => write!(f, "mate {moves}"),
        }
    }
}

/// One decoded `info ... pv ...` line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineTelemetry {
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    pub time_ms: Option<u64>,
    pub score: Option<Score>,
    pub principal_variation: Vec<String>,
}

impl EngineTelemetry {
    /// First move of the principal variation.
    pub fn best_move(&self) -> Option<&str> {
        self.principal_variation.first().map(String::as_str)
    }

    /// Names of the fields aggregation needs but the engine did not send.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.depth.is_none() {
            missing.push("depth");
        }
        if self.nodes.is_none() {
            missing.push("nodes");
        }
        if self.time_ms.is_none() {
            missing.push("time");
        }
        missing
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            depth: self.depth.unwrap_or(0),
            nodes: self.nodes.unwrap_or(0),
            time_ms: self.time_ms.unwrap_or(0),
        }
    }
}

/// Counters retained per position once its search has terminated.
/// Missing fields count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub depth: u32,
    pub nodes: u64,
    pub time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_joined_score_values() {
        assert_eq!("cp 34".parse::<Score>().unwrap(), Score::Centipawns(34));
        assert_eq!("mate -3".parse::<Score>().unwrap(), Score::MateIn(-3));
        assert!("cp".parse::<Score>().is_err());
        assert!("wdl 1 2 3".parse::<Score>().is_err());
    }

    #[test]
    fn snapshot_zeroes_missing_fields() {
        let telemetry = EngineTelemetry {
            depth: Some(7),
            nodes: None,
            time_ms: Some(40),
            score: None,
            principal_variation: vec!["e2e4".into()],
        };
        assert_eq!(telemetry.missing_fields(), vec!["nodes"]);
        assert_eq!(
            telemetry.snapshot(),
            TelemetrySnapshot {
                depth: 7,
                nodes: 0,
                time_ms: 40
            }
        );
        assert_eq!(telemetry.best_move(), Some("e2e4"));
    }
}
