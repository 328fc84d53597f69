//! Error types for liquidclock

use thiserror::Error;

/// Errors surfaced at the edges of the simulation (configuration, fonts,
/// remote control). The per-frame path never fails.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown display state: {0:?}")]
    UnknownDisplayState(String),

    #[error("malformed command: {0}")]
    Command(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("socket error: {0}")]
    Socket(String),

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
