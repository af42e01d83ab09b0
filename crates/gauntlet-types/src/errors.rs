use thiserror::Error;

pub type Result<T, E = GauntletError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum GauntletError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("test suite error: {0}")]
    Suite(String),
    #[error("engine error: {0}")]
    Engine(String),
    #[error("failed to launch engine: {0}")]
    Spawn(String),
    #[error("engine i/o error: {0}")]
    Io(String),
    #[error("handshake failure: {0}")]
    Handshake(String),
    #[error("invalid response: {0}")]
    ProtocolViolation(String),
    #[error("telemetry decode error: {0}")]
    Decode(String),
    #[error("worker error: {0}")]
    Worker(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
