// src/error.rs
// Error types for the gesture sync engine

use thiserror::Error;

/// Engine error type
#[derive(Error, Debug)]
pub enum HudError {
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed frame: {0}")]
    Format(String),
    #[error("unknown event type: {0}")]
    UnknownKind(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("engine channel closed")]
    ChannelClosed,
}

impl HudError {
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Engine result type
pub type HudResult<T> = Result<T, HudError>;
