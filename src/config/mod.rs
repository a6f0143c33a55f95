// src/config/mod.rs
// Configuration for the HUD sync engine - read from environment once at
// startup and injected into the engine, never held in ambient globals.

pub mod helpers;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HudError, HudResult};

/// Main configuration structure - composes all domain configs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HudConfig {
    pub socket: SocketConfig,
    pub logging: LoggingConfig,
}

impl HudConfig {
    pub fn from_env() -> Self {
        Self {
            socket: SocketConfig::from_env(),
            logging: LoggingConfig::from_env(),
        }
    }

    /// Validate config on startup
    pub fn validate(&self) -> HudResult<()> {
        self.socket.validate()
    }
}

/// Gesture socket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// WebSocket endpoint of the gesture controller
    pub endpoint: String,
    /// Base delay before a reconnect attempt, in milliseconds
    pub reconnect_delay_ms: u64,
    /// Consecutive failed attempts tolerated before giving up
    pub max_retries: u32,
    /// Ceiling for the exponential backoff, in milliseconds
    pub backoff_cap_ms: u64,
}

impl SocketConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: helpers::env_or("GESTURE_WS_URL", "ws://127.0.0.1:8765"),
            reconnect_delay_ms: helpers::env_parsed("GESTURE_WS_RECONNECT_MS", 3_000),
            max_retries: helpers::env_parsed("GESTURE_WS_MAX_RETRIES", 10),
            backoff_cap_ms: helpers::env_parsed("GESTURE_WS_BACKOFF_CAP_MS", 30_000),
        }
    }

    pub fn validate(&self) -> HudResult<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| HudError::config(format!("bad endpoint {}: {}", self.endpoint, e)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(()),
            other => Err(HudError::config(format!(
                "unsupported endpoint scheme: {other}"
            ))),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: helpers::env_or("HUD_LOG_LEVEL", "info"),
        }
    }
}
