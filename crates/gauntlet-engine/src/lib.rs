//! UCI protocol plumbing: line parser, engine transports and the session
//! state machine.

pub mod parser;
pub mod scripted;
pub mod session;
pub mod transport;

use gauntlet_types::GauntletError;

pub use session::{SearchOutcome, SessionOptions, SessionState, UciSession};
pub use transport::{EngineLauncher, EngineTransport, ProcessLauncher, ProcessTransport};

pub fn engine_error(message: impl Into<String>) -> GauntletError {
    GauntletError::Engine(message.into())
}
