//! Line-oriented pipes to an engine process.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use gauntlet_types::{config::EngineConfig, GauntletError, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    process::{Child, ChildStdin, ChildStdout, Command},
};
use tracing::debug;

/// Bidirectional text-line channel to one engine instance.
#[async_trait]
pub trait EngineTransport: Send {
    /// Writes `line` plus a newline and flushes.
    async fn send_line(&mut self, line: &str) -> Result<()>;
    /// Blocks until the engine emits a line. `Ok(None)` once its output closed.
    async fn read_line(&mut self) -> Result<Option<String>>;
    async fn kill(&mut self) -> Result<()>;
}

/// Produces a fresh, exclusively owned engine per worker.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    type Transport: EngineTransport + 'static;

    async fn launch(&self) -> Result<Self::Transport>;
}

pub struct ProcessTransport {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl ProcessTransport {
    pub fn spawn(path: &Path, args: &[String]) -> Result<Self> {
        let mut child = Command::new(path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| GauntletError::Spawn(format!("{}: {err}", path.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GauntletError::Spawn("engine stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GauntletError::Spawn("engine stdout not captured".into()))?;

        debug!("Spawned engine {} (pid {:?})", path.display(), child.id());
        Ok(Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

#[async_trait]
impl EngineTransport for ProcessTransport {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|err| GauntletError::Io(format!("write '{line}' failed: {err}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|err| GauntletError::Io(format!("flush failed: {err}")))
    }

    async fn read_line(&mut self) -> Result<Option<String>> {
        let line = self
            .lines
            .next_line()
            .await
            .map_err(|err| GauntletError::Io(format!("read failed: {err}")))?;
        Ok(line.map(|l| l.trim_end().to_string()))
    }

    async fn kill(&mut self) -> Result<()> {
        match self.child.try_wait() {
            Ok(Some(_)) => Ok(()),
            _ => self
                .child
                .kill()
                .await
                .map_err(|err| GauntletError::Io(format!("failed to kill engine: {err}"))),
        }
    }
}

/// Launches the configured engine executable as a child process.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    path: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            args: config.args.clone(),
        }
    }
}

#[async_trait]
impl EngineLauncher for ProcessLauncher {
    type Transport = ProcessTransport;

    async fn launch(&self) -> Result<ProcessTransport> {
        ProcessTransport::spawn(&self.path, &self.args)
    }
}
