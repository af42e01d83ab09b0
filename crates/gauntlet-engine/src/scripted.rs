//! Scripted stand-in engine for exercising sessions without a subprocess.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use gauntlet_types::{GauntletError, Result};

use crate::transport::{EngineLauncher, EngineTransport};

/// Shared record of what a scripted engine was told.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    inner: Arc<Mutex<LogState>>,
}

#[derive(Debug, Default)]
struct LogState {
    commands: Vec<String>,
    kills: usize,
}

impl CommandLog {
    pub fn commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    pub fn was_killed(&self) -> bool {
        self.kill_count() > 0
    }

    pub fn kill_count(&self) -> usize {
        self.inner.lock().map(|state| state.kills).unwrap_or_default()
    }

    fn push(&self, command: &str) {
        if let Ok(mut state) = self.inner.lock() {
            state.commands.push(command.to_string());
        }
    }

    fn record_kill(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.kills += 1;
        }
    }
}

/// Replays configured output keyed by the FEN of the last `position` command.
///
/// `uci` queues the handshake lines, `go` queues the script for the current
/// FEN (an unknown FEN answers `bestmove 0000`), and `stop` discards any
/// queued `info` lines so the next line read is the pending `bestmove`.
/// An empty queue reads as closed output.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    handshake: Vec<String>,
    scripts: HashMap<String, Vec<String>>,
    pending: VecDeque<String>,
    current_fen: Option<String>,
    killed: bool,
    log: CommandLog,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            handshake: vec!["id name Scripted".into(), "uciok".into()],
            scripts: HashMap::new(),
            pending: VecDeque::new(),
            current_fen: None,
            killed: false,
            log: CommandLog::default(),
        }
    }

    pub fn with_handshake<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handshake = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn script<I, S>(mut self, fen: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .insert(fen.into(), lines.into_iter().map(Into::into).collect());
        self
    }

    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineTransport for ScriptedEngine {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        if self.killed {
            return Err(GauntletError::Io("scripted engine was killed".into()));
        }
        self.log.push(line);
        if line == "uci" {
            self.pending.extend(self.handshake.iter().cloned());
        } else if let Some(fen) = line.strip_prefix("position fen ") {
            self.current_fen = Some(fen.to_string());
        } else if line.starts_with("go") {
            let script = self
                .current_fen
                .as_ref()
                .and_then(|fen| self.scripts.get(fen))
                .cloned()
                .unwrap_or_else(|| vec!["bestmove 0000".into()]);
            self.pending.extend(script);
        } else if line == "stop" {
            self.pending.retain(|queued| !queued.starts_with("info"));
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        if self.killed {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }

    async fn kill(&mut self) -> Result<()> {
        self.killed = true;
        self.pending.clear();
        self.log.record_kill();
        Ok(())
    }
}

/// Hands out copies of a template [`ScriptedEngine`], one per launch.
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    template: ScriptedEngine,
    launches: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub fn new(template: ScriptedEngine) -> Self {
        Self {
            template,
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Log shared by every engine this launcher produced.
    pub fn command_log(&self) -> CommandLog {
        self.template.command_log()
    }
}

#[async_trait]
impl EngineLauncher for ScriptedLauncher {
    type Transport = ScriptedEngine;

    async fn launch(&self) -> Result<ScriptedEngine> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(self.template.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_drops_queued_info_lines() {
        let mut engine = ScriptedEngine::new().script(
            "fen-a",
            ["info depth 1 pv a2a3", "info depth 2 pv a2a4", "bestmove a2a4"],
        );
        engine.send_line("position fen fen-a").await.unwrap();
        engine.send_line("go movetime 10 depth 2").await.unwrap();
        assert_eq!(
            engine.read_line().await.unwrap().as_deref(),
            Some("info depth 1 pv a2a3")
        );
        engine.send_line("stop").await.unwrap();
        assert_eq!(
            engine.read_line().await.unwrap().as_deref(),
            Some("bestmove a2a4")
        );
        assert_eq!(engine.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn unknown_fen_answers_null_move() {
        let mut engine = ScriptedEngine::new();
        engine.send_line("position fen unknown").await.unwrap();
        engine.send_line("go movetime 10 depth 2").await.unwrap();
        assert_eq!(
            engine.read_line().await.unwrap().as_deref(),
            Some("bestmove 0000")
        );
    }

    #[tokio::test]
    async fn launcher_counts_fresh_engines() {
        let launcher = ScriptedLauncher::new(ScriptedEngine::new());
        let mut first = launcher.launch().await.unwrap();
        first.kill().await.unwrap();
        let mut second = launcher.launch().await.unwrap();
        assert_eq!(launcher.launches(), 2);
        second.send_line("uci").await.unwrap();
        assert_eq!(
            second.read_line().await.unwrap().as_deref(),
            Some("id name Scripted")
        );
        assert_eq!(launcher.command_log().kill_count(), 1);
    }
}
