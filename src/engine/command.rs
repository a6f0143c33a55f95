// src/engine/command.rs
// Outbound half of the protocol: user-driven commands serialized onto
// the open socket, fire-and-forget.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::engine::state::HudSnapshot;

/// Commands sent from the HUD back to the gesture controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HudCommand {
    StartListening,
    StopListening {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcription: Option<String>,
    },
    DropMarker {
        lat: f64,
        lon: f64,
    },
}

/// Fire-and-forget sender. Commands issued while the socket is not open
/// are dropped, never queued across a disconnect.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<HudCommand>,
    snapshot_rx: watch::Receiver<HudSnapshot>,
}

impl CommandSender {
    pub(crate) fn new(
        tx: mpsc::Sender<HudCommand>,
        snapshot_rx: watch::Receiver<HudSnapshot>,
    ) -> Self {
        Self { tx, snapshot_rx }
    }

    pub fn send(&self, command: HudCommand) {
        if !self.snapshot_rx.borrow().phase.is_connected() {
            debug!("socket not open, dropping command {:?}", command);
            return;
        }
        if let Err(e) = self.tx.try_send(command) {
            debug!("command channel unavailable: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_serialize_to_wire_shape() {
        let json = serde_json::to_value(&HudCommand::StartListening).unwrap();
        assert_eq!(json, serde_json::json!({"command": "START_LISTENING"}));

        let json = serde_json::to_value(&HudCommand::StopListening {
            transcription: Some("reroute the convoy".to_string()),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"command": "STOP_LISTENING", "transcription": "reroute the convoy"})
        );

        let json = serde_json::to_value(&HudCommand::StopListening { transcription: None }).unwrap();
        assert_eq!(json, serde_json::json!({"command": "STOP_LISTENING"}));

        let json = serde_json::to_value(&HudCommand::DropMarker {
            lat: 25.7617,
            lon: -80.1918,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"command": "DROP_MARKER", "lat": 25.7617, "lon": -80.1918})
        );
    }
}
