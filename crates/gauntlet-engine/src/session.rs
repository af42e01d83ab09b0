//! UCI session state machine driving one engine instance.

use gauntlet_types::{
    config::{OpsConfig, SearchConfig},
    position::{Position, SearchBudget},
    telemetry::EngineTelemetry,
    GauntletError, Result,
};
use tracing::{debug, info, trace, warn};

use crate::{
    engine_error,
    parser::{classify, EngineEvent},
    transport::EngineTransport,
};

/// Lifecycle of a [`UciSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Handshaking,
    Ready,
    Searching,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Log every exchanged line at `info` rather than `trace`.
    pub echo: bool,
    /// Issue `stop` once the PV head matches the expected move at a depth
    /// strictly greater than this. `None` always waits for `bestmove`.
    pub early_stop_depth: Option<u32>,
}

impl SessionOptions {
    pub fn from_config(search: &SearchConfig, ops: &OpsConfig) -> Self {
        Self {
            echo: ops.debug,
            early_stop_depth: search.early_stop.then_some(search.early_stop_depth),
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            echo: false,
            early_stop_depth: Some(4),
        }
    }
}

/// Verdict and telemetry for one searched position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Token following `bestmove` on the terminal line.
    pub best_move: String,
    /// Last telemetry seen before termination; frozen when `stop` was sent.
    pub telemetry: Option<EngineTelemetry>,
    pub stopped_early: bool,
}

pub struct UciSession<T: EngineTransport> {
    transport: T,
    state: SessionState,
    options: SessionOptions,
}

impl<T: EngineTransport> UciSession<T> {
    pub fn new(transport: T, options: SessionOptions) -> Self {
        Self {
            transport,
            state: SessionState::Unstarted,
            options,
        }
    }

    /// Creates a session and runs the handshake.
    pub async fn start(transport: T, options: SessionOptions) -> Result<Self> {
        let mut session = Self::new(transport, options);
        session.handshake().await?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sends `uci` and discards everything up to `uciok`.
    pub async fn handshake(&mut self) -> Result<()> {
        self.expect_state(SessionState::Unstarted, "handshake")?;
        self.state = SessionState::Handshaking;
        match self.await_uciok().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(err) => {
                self.terminate().await;
                Err(err)
            }
        }
    }

    async fn await_uciok(&mut self) -> Result<()> {
        self.send("uci").await?;
        loop {
            match self.transport.read_line().await? {
                Some(line) => {
                    self.log_exchange("<", &line);
                    if line.trim() == "uciok" {
                        return Ok(());
                    }
                }
                None => {
                    return Err(GauntletError::Handshake(
                        "engine output closed before uciok".into(),
                    ))
                }
            }
        }
    }

    /// Searches one position. Any fatal error leaves the session
    /// [`SessionState::Terminated`] with the engine killed.
    pub async fn search(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<SearchOutcome> {
        self.expect_state(SessionState::Ready, "search")?;
        match self.run_search(position, budget).await {
            Ok(outcome) => {
                self.state = SessionState::Ready;
                Ok(outcome)
            }
            Err(err) => {
                warn!("Search of {} failed: {err}", position.id);
                self.terminate().await;
                Err(err)
            }
        }
    }

    async fn run_search(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<SearchOutcome> {
        self.send(&format!("position fen {}", position.fen)).await?;
        self.send(&budget.go_command()).await?;
        self.state = SessionState::Searching;

        let mut last: Option<EngineTelemetry> = None;
        let mut stopped_early = false;
        loop {
            match self.next_event().await? {
                EngineEvent::BestMove(mv) => {
                    return Ok(SearchOutcome {
                        best_move: mv,
                        telemetry: last,
                        stopped_early,
                    });
                }
                EngineEvent::Info(telemetry) => {
                    if stopped_early {
                        continue;
                    }
                    let confirmed = self.confirms(&telemetry, &position.expected_move);
                    last = Some(telemetry);
                    if confirmed {
                        debug!(
                            "{}: {} confirmed, stopping early",
                            position.id, position.expected_move
                        );
                        self.send("stop").await?;
                        stopped_early = true;
                    }
                }
                EngineEvent::PartialInfo => {}
                EngineEvent::Unrecognised(line) => {
                    return Err(GauntletError::ProtocolViolation(line));
                }
            }
        }
    }

    fn confirms(&self, telemetry: &EngineTelemetry, expected: &str) -> bool {
        match self.options.early_stop_depth {
            Some(threshold) => {
                telemetry.best_move() == Some(expected)
                    && telemetry.depth.is_some_and(|depth| depth > threshold)
            }
            None => false,
        }
    }

    /// Single blocking read, classified. End of output mid-search is a
    /// protocol violation.
    async fn next_event(&mut self) -> Result<EngineEvent> {
        let line = self.transport.read_line().await?.ok_or_else(|| {
            GauntletError::ProtocolViolation("engine output closed during search".into())
        })?;
        self.log_exchange("<", &line);
        Ok(classify(&line))
    }

    async fn send(&mut self, line: &str) -> Result<()> {
        self.log_exchange(">", line);
        self.transport.send_line(line).await
    }

    /// Kills the engine. Idempotent.
    pub async fn terminate(&mut self) {
        if self.state == SessionState::Terminated {
            return;
        }
        if let Err(err) = self.transport.kill().await {
            warn!("Failed to kill engine: {err}");
        }
        self.state = SessionState::Terminated;
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(engine_error(format!(
                "cannot {action} in state {:?}",
                self.state
            )))
        }
    }

    fn log_exchange(&self, direction: &str, line: &str) {
        if self.options.echo {
            info!("{direction} {line}");
        } else {
            trace!("{direction} {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedEngine;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn position(expected: &str) -> Position {
        Position::new("WAC.001", START_FEN, expected)
    }

    fn budget() -> SearchBudget {
        SearchBudget {
            depth: 10,
            movetime_ms: 500,
        }
    }

    #[tokio::test]
    async fn handshake_discards_lines_until_uciok() {
        let engine = ScriptedEngine::new().with_handshake([
            "id name Scripted",
            "id author Nobody",
            "option name Hash type spin default 16 min 1 max 1024",
            "uciok",
        ]);
        let log = engine.command_log();
        let session = UciSession::start(engine, SessionOptions::default())
            .await
            .expect("handshake");
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(log.commands(), vec!["uci"]);
    }

    #[tokio::test]
    async fn closed_output_before_uciok_is_a_handshake_failure() {
        let engine = ScriptedEngine::new().with_handshake(["id name Broken"]);
        let log = engine.command_log();
        let mut session = UciSession::new(engine, SessionOptions::default());
        let err = session.handshake().await.unwrap_err();
        assert!(matches!(err, GauntletError::Handshake(_)));
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(log.was_killed());
    }

    #[tokio::test]
    async fn search_before_handshake_is_rejected() {
        let mut session = UciSession::new(ScriptedEngine::new(), SessionOptions::default());
        let err = session.search(&position("e2e4"), budget()).await.unwrap_err();
        assert!(matches!(err, GauntletError::Engine(_)));
        assert_eq!(session.state(), SessionState::Unstarted);
    }

    #[tokio::test]
    async fn early_stop_once_expected_move_confirmed() {
        let engine = ScriptedEngine::new().script(
            START_FEN,
            [
                "info depth 1 nodes 20 time 1 score cp 10 pv d2d4",
                "info depth 5 nodes 900 time 30 score cp 40 pv e2e4 e7e5",
                "info depth 6 nodes 4000 time 90 score cp 35 pv e2e4 c7c5",
                "bestmove e2e4 ponder e7e5",
            ],
        );
        let log = engine.command_log();
        let mut session = UciSession::start(engine, SessionOptions::default())
            .await
            .expect("handshake");

        let outcome = session.search(&position("e2e4"), budget()).await.unwrap();
        assert!(outcome.stopped_early);
        assert_eq!(outcome.best_move, "e2e4");
        let telemetry = outcome.telemetry.expect("telemetry retained");
        assert_eq!(telemetry.depth, Some(5));
        assert_eq!(telemetry.nodes, Some(900));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(
            log.commands(),
            vec![
                "uci".to_string(),
                format!("position fen {START_FEN}"),
                "go movetime 500 depth 10".to_string(),
                "stop".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn shallow_match_does_not_stop() {
        let engine = ScriptedEngine::new().script(
            START_FEN,
            [
                "info depth 4 nodes 300 time 8 score cp 22 pv e2e4",
                "info depth 7 nodes 8000 time 120 score cp 18 pv d2d4",
                "bestmove d2d4",
            ],
        );
        let log = engine.command_log();
        let mut session = UciSession::start(engine, SessionOptions::default())
            .await
            .unwrap();

        let outcome = session.search(&position("e2e4"), budget()).await.unwrap();
        assert!(!outcome.stopped_early);
        assert_eq!(outcome.best_move, "d2d4");
        assert_eq!(outcome.telemetry.and_then(|t| t.depth), Some(7));
        assert!(!log.commands().contains(&"stop".to_string()));
    }

    #[tokio::test]
    async fn actual_move_comes_from_bestmove_line() {
        let engine = ScriptedEngine::new().script(
            START_FEN,
            [
                "info depth 9 nodes 100 time 5 score cp 5 pv g1f3",
                "bestmove b1c3",
            ],
        );
        let mut session = UciSession::start(engine, SessionOptions::default())
            .await
            .unwrap();
        let outcome = session.search(&position("e2e4"), budget()).await.unwrap();
        assert_eq!(outcome.best_move, "b1c3");
    }

    #[tokio::test]
    async fn disabled_early_stop_waits_for_bestmove() {
        let engine = ScriptedEngine::new().script(
            START_FEN,
            [
                "info depth 12 nodes 100 time 5 score cp 5 pv e2e4",
                "info depth 13 nodes 200 time 9 score cp 6 pv e2e4",
                "bestmove e2e4",
            ],
        );
        let options = SessionOptions {
            echo: false,
            early_stop_depth: None,
        };
        let mut session = UciSession::start(engine, options).await.unwrap();
        let outcome = session.search(&position("e2e4"), budget()).await.unwrap();
        assert!(!outcome.stopped_early);
        assert_eq!(outcome.telemetry.and_then(|t| t.depth), Some(13));
    }

    #[tokio::test]
    async fn partial_info_lines_are_skipped() {
        let engine = ScriptedEngine::new().script(
            START_FEN,
            [
                "info string using 1 thread",
                "info depth 1 currmove e2e4 currmovenumber 1",
                "bestmove e2e4",
            ],
        );
        let mut session = UciSession::start(engine, SessionOptions::default())
            .await
            .unwrap();
        let outcome = session.search(&position("e2e4"), budget()).await.unwrap();
        assert_eq!(outcome.best_move, "e2e4");
        assert!(outcome.telemetry.is_none());
    }

    #[tokio::test]
    async fn malformed_line_terminates_session() {
        let engine = ScriptedEngine::new().script(
            START_FEN,
            [
                "info depth 1 nodes 20 time 1 score cp 10 pv d2d4",
                "garbage output",
                "bestmove d2d4",
            ],
        );
        let log = engine.command_log();
        let mut session = UciSession::start(engine, SessionOptions::default())
            .await
            .unwrap();
        let err = session.search(&position("e2e4"), budget()).await.unwrap_err();
        match err {
            GauntletError::ProtocolViolation(line) => assert_eq!(line, "garbage output"),
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(log.was_killed());
        assert!(session.search(&position("e2e4"), budget()).await.is_err());
    }

    #[tokio::test]
    async fn engine_exit_mid_search_is_a_violation() {
        let engine = ScriptedEngine::new().script(
            START_FEN,
            ["info depth 1 nodes 20 time 1 score cp 10 pv d2d4"],
        );
        let mut session = UciSession::start(engine, SessionOptions::default())
            .await
            .unwrap();
        let err = session.search(&position("e2e4"), budget()).await.unwrap_err();
        assert!(matches!(err, GauntletError::ProtocolViolation(_)));
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn options_follow_configuration() {
        let mut search = SearchConfig::default();
        let ops = OpsConfig {
            log_level: "info".into(),
            debug: true,
        };
        let options = SessionOptions::from_config(&search, &ops);
        assert!(options.echo);
        assert_eq!(options.early_stop_depth, Some(4));
        search.early_stop = false;
        assert_eq!(
            SessionOptions::from_config(&search, &ops).early_stop_depth,
            None
        );
    }
}
