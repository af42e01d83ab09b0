//! Decoding of single lines of engine output.

use std::collections::BTreeMap;

use gauntlet_types::telemetry::{EngineTelemetry, Score};

/// Classified line of engine output during a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Terminal `bestmove <move>` line. Anything after the move is ignored.
    BestMove(String),
    /// `info` line carrying a principal variation.
    Info(EngineTelemetry),
    /// `info` line without a usable `pv` segment. Not an error.
    PartialInfo,
    /// Anything else, including a `bestmove` with no move token.
    Unrecognised(String),
}

/// Key/value view of an `info` line split at its `pv` token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInfo {
    pub fields: BTreeMap<String, String>,
    pub principal_variation: Vec<String>,
}

/// Why an `info` line could not be turned into telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeGap {
    NotInfo,
    MissingPv,
}

/// Tokens that appear in the key space without a value.
const FLAG_TOKENS: [&str; 2] = ["lowerbound", "upperbound"];

pub fn classify(line: &str) -> EngineEvent {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("bestmove") => match tokens.next() {
            Some(mv) => EngineEvent::BestMove(mv.to_string()),
            None => EngineEvent::Unrecognised(line.to_string()),
        },
        Some("info") => match parse_info(line) {
            Ok(raw) => EngineEvent::Info(decode_telemetry(&raw)),
            Err(_) => EngineEvent::PartialInfo,
        },
        _ => EngineEvent::Unrecognised(line.to_string()),
    }
}

/// Splits an `info` line into its key space and principal variation.
///
/// The `score` value spans two tokens (`cp 34`, `mate 3`) and is re-joined
/// into one entry so the pairs after it stay aligned. A trailing
/// `lowerbound`/`upperbound` flag is stored under `bound`. `string` swallows
/// the rest of the key space.
pub fn parse_info(line: &str) -> Result<RawInfo, DecodeGap> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"info") {
        return Err(DecodeGap::NotInfo);
    }
    let body = &tokens[1..];
    let pv_at = body
        .iter()
        .position(|token| *token == "pv")
        .ok_or(DecodeGap::MissingPv)?;
    let (keys, pv) = (&body[..pv_at], &body[pv_at + 1..]);
    if pv.is_empty() {
        return Err(DecodeGap::MissingPv);
    }

    let mut fields = BTreeMap::new();
    let mut cursor = 0;
    while cursor < keys.len() {
        let key = keys[cursor];
        if FLAG_TOKENS.contains(&key) {
            fields.insert("bound".to_string(), key.to_string());
            cursor += 1;
            continue;
        }
        let width = match key {
            "score" => 2,
            "string" => keys.len() - cursor - 1,
            _ => 1,
        };
        let start = cursor + 1;
        let end = start + width;
        if width == 0 || end > keys.len() {
            break;
        }
        fields.insert(key.to_string(), keys[start..end].join(" "));
        cursor = end;
    }

    Ok(RawInfo {
        fields,
        principal_variation: pv.iter().map(|mv| mv.to_string()).collect(),
    })
}

/// Typed view of the fields aggregation cares about. Fields that are absent
/// or unparsable stay `None`.
pub fn decode_telemetry(raw: &RawInfo) -> EngineTelemetry {
    EngineTelemetry {
        depth: raw.fields.get("depth").and_then(|v| v.parse().ok()),
        nodes: raw.fields.get("nodes").and_then(|v| v.parse().ok()),
        time_ms: raw.fields.get("time").and_then(|v| v.parse().ok()),
        score: raw
            .fields
            .get("score")
            .and_then(|v| v.parse::<Score>().ok()),
        principal_variation: raw.principal_variation.clone(),
    }
}
