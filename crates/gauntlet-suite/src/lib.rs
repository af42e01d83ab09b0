//! EPD test-suite loading.
//!
//! Each non-blank line holds the four board fields of a FEN followed by
//! `;`-terminated operations. `id` labels the record, `bm` lists accepted
//! best moves (SAN or coordinate notation), `hmvc`/`fmvn` fill the move
//! counters. Moves are normalised to coordinate notation so they compare
//! directly against the engine's `bestmove`.

use std::{fs, path::Path, str::FromStr};

use chess::{Board, BoardBuilder, ChessMove, Color, File, MoveGen, Piece, ALL_SQUARES};
use gauntlet_types::{position::Position, GauntletError, Result};
use tracing::{debug, info};

/// One EPD line after parsing, before it is reduced to a [`Position`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpdRecord {
    pub id: String,
    pub fen: String,
    /// Accepted best moves in coordinate notation, in file order.
    pub best_moves: Vec<String>,
}

impl EpdRecord {
    pub fn into_position(self) -> Result<Position> {
        let expected = self
            .best_moves
            .into_iter()
            .next()
            .ok_or_else(|| suite_error(format!("{}: no best move", self.id)))?;
        Ok(Position::new(self.id, self.fen, expected))
    }
}

pub fn load_suite<P: AsRef<Path>>(path: P) -> Result<Vec<Position>> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref).map_err(|err| {
        suite_error(format!(
            "unable to read test suite {}: {err}",
            path_ref.display()
        ))
    })?;
    let positions = parse_suite(&contents, &path_ref.display().to_string())?;
    info!(
        "Loaded {} positions from {}",
        positions.len(),
        path_ref.display()
    );
    Ok(positions)
}

/// Parses a whole suite. `source` names the input in error messages and in
/// fallback ids for records without an `id` operation.
pub fn parse_suite(contents: &str, source: &str) -> Result<Vec<Position>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let trimmed = line.trim();
            !trimmed.is_empty() && !trimmed.starts_with('#')
        })
        .map(|(idx, line)| {
            let label = format!("{source}:{}", idx + 1);
            parse_record(line, &label)
                .and_then(EpdRecord::into_position)
                .map_err(|err| suite_error(format!("{label}: {err}")))
        })
        .collect()
}

pub fn parse_record(line: &str, fallback_id: &str) -> Result<EpdRecord> {
    let mut rest = line.trim();
    let mut board_fields = Vec::with_capacity(4);
    while board_fields.len() < 4 && !rest.is_empty() {
        let (field, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        board_fields.push(field);
        rest = tail.trim_start();
    }
    if board_fields.len() < 4 {
        return Err(suite_error("expected four board fields"));
    }
    let operations = split_operations(rest);

    let mut id = None;
    let mut raw_moves = Vec::new();
    let mut halfmove = "0".to_string();
    let mut fullmove = "1".to_string();
    for (opcode, operands) in operations {
        match opcode.as_str() {
            "id" => id = operands.into_iter().next(),
            "bm" => raw_moves = operands,
            "hmvc" => halfmove = operands.into_iter().next().unwrap_or(halfmove),
            "fmvn" => fullmove = operands.into_iter().next().unwrap_or(fullmove),
            other => debug!("Ignoring EPD opcode '{other}'"),
        }
    }

    let fen = format!("{} {halfmove} {fullmove}", board_fields.join(" "));
    let board = parse_board(&fen)?;
    if raw_moves.is_empty() {
        return Err(suite_error("missing bm operation"));
    }
    let best_moves = raw_moves
        .iter()
        .map(|raw| resolve_move(&board, raw))
        .collect::<Result<Vec<_>>>()?;

    Ok(EpdRecord {
        id: id.unwrap_or_else(|| fallback_id.to_string()),
        fen,
        best_moves,
    })
}

/// Builds a [`Board`], rejecting placements without exactly one king per
/// side before `chess` computes pins from the king squares.
pub fn parse_board(fen: &str) -> Result<Board> {
    let builder = BoardBuilder::from_str(fen)
        .map_err(|err| suite_error(format!("bad board '{fen}': {err:?}")))?;
    for color in [Color::White, Color::Black] {
        let kings = ALL_SQUARES
            .iter()
            .filter(|square| builder[**square] == Some((Piece::King, color)))
            .count();
        if kings != 1 {
            return Err(suite_error(format!(
                "bad board '{fen}': {kings} {color:?} kings"
            )));
        }
    }
    Board::try_from(&builder).map_err(|err| suite_error(format!("bad board '{fen}': {err:?}")))
}

/// Resolves a SAN or coordinate move against `board`, returning coordinate
/// notation (`e2e4`, `e7e8q`).
pub fn resolve_move(board: &Board, raw: &str) -> Result<String> {
    let san = raw
        .trim_end_matches(&['+', '#', '!', '?'][..])
        .replace('=', "");
    if let Ok(mv) = ChessMove::from_san(board, &san) {
        return Ok(mv.to_string());
    }
    if let Some(mv) = scan_san(board, &san) {
        return Ok(mv.to_string());
    }
    match ChessMove::from_str(&san) {
        Ok(mv) if board.legal(mv) => Ok(mv.to_string()),
        _ => Err(suite_error(format!("illegal or unparsable move '{raw}'"))),
    }
}

/// Matches SAN against the legal moves: moving piece, destination,
/// promotion and any from-file/from-rank disambiguation. Covers the forms
/// `from_san` rejects (en-passant captures among them). `None` unless exactly
/// one legal move fits.
fn scan_san(board: &Board, san: &str) -> Option<ChessMove> {
    let castle_file = match san {
        "O-O" | "0-0" => Some(File::G),
        "O-O-O" | "0-0-0" => Some(File::C),
        _ => None,
    };
    if let Some(file) = castle_file {
        return unique(MoveGen::new_legal(board).filter(|mv| {
            board.piece_on(mv.get_source()) == Some(Piece::King)
                && mv.get_source().get_file() == File::E
                && mv.get_dest().get_file() == file
        }));
    }

    let mut chars: Vec<char> = san.chars().filter(|c| *c != 'x').collect();
    let piece = match chars.first() {
        Some('N') => Piece::Knight,
        Some('B') => Piece::Bishop,
        Some('R') => Piece::Rook,
        Some('Q') => Piece::Queen,
        Some('K') => Piece::King,
        _ => Piece::Pawn,
    };
    if piece != Piece::Pawn {
        chars.remove(0);
    }
    let mut promotion = None;
    if piece == Piece::Pawn && chars.last().is_some_and(|c| c.is_ascii_alphabetic()) {
        promotion = match chars.pop().map(|c| c.to_ascii_uppercase()) {
            Some('Q') => Some(Piece::Queen),
            Some('R') => Some(Piece::Rook),
            Some('B') => Some(Piece::Bishop),
            Some('N') => Some(Piece::Knight),
            _ => return None,
        };
    }
    if chars.len() < 2 {
        return None;
    }
    let dest: String = chars[chars.len() - 2..].iter().collect();
    let prefix = &chars[..chars.len() - 2];
    let from_file = prefix.iter().find(|c| ('a'..='h').contains(*c)).copied();
    let from_rank = prefix.iter().find(|c| ('1'..='8').contains(*c)).copied();

    unique(MoveGen::new_legal(board).filter(|mv| {
        let source = mv.get_source().to_string();
        board.piece_on(mv.get_source()) == Some(piece)
            && mv.get_dest().to_string() == dest
            && mv.get_promotion() == promotion
            && from_file.map_or(true, |f| source.starts_with(f))
            && from_rank.map_or(true, |r| source.ends_with(r))
    }))
}

fn unique(mut candidates: impl Iterator<Item = ChessMove>) -> Option<ChessMove> {
    let first = candidates.next()?;
    candidates.next().is_none().then_some(first)
}

/// Splits the operation section on `;` outside double quotes into
/// `(opcode, operands)` pairs, stripping quotes from operands.
fn split_operations(section: &str) -> Vec<(String, Vec<String>)> {
    let mut raw_ops = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in section.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ';' if !quoted => raw_ops.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    raw_ops.push(current);

    raw_ops
        .iter()
        .filter_map(|op| {
            let op = op.trim();
            let (opcode, rest) = op.split_once(char::is_whitespace).unwrap_or((op, ""));
            if opcode.is_empty() {
                return None;
            }
            Some((opcode.to_string(), split_operands(rest)))
        })
        .collect()
}

fn split_operands(rest: &str) -> Vec<String> {
    let rest = rest.trim();
    if let Some(inner) = rest.strip_prefix('"') {
        return vec![inner.trim_end_matches('"').to_string()];
    }
    rest.split_whitespace().map(str::to_string).collect()
}

pub fn suite_error(message: impl Into<String>) -> GauntletError {
    GauntletError::Suite(message.into())
}
