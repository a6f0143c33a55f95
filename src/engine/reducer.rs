// src/engine/reducer.rs
// The reducer task: sole owner and writer of HudState. Inbound events,
// connection phase changes, and tool-expiry ticks all arrive on one
// channel, so application is strictly ordered and one-at-a-time.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::engine::event::{GestureEvent, GesturePayload};
use crate::engine::projector::normalize_lon;
use crate::engine::state::{Alert, ConnectionPhase, HudSnapshot, HudState, Marker};
use crate::engine::HudNotice;

/// How long a tool-execution indicator stays up without a newer one
pub const TOOL_EXPIRY: Duration = Duration::from_millis(3_000);

/// Everything the reducer task reacts to
#[derive(Debug)]
pub(crate) enum ReducerMsg {
    Event(GestureEvent),
    ConnectionUp,
    ConnectionDown,
    GaveUp,
    ToolExpired { generation: u64 },
}

/// Side effects requested by a state transition
#[derive(Debug, Default)]
pub(crate) struct Effects {
    /// Generation to schedule a tool-expiry timer for
    pub(crate) tool_expiry: Option<u64>,
    pub(crate) notice: Option<HudNotice>,
}

impl HudState {
    /// Apply one event. All-or-nothing: validation happened at the parse
    /// boundary, so every arm below leaves the state consistent.
    pub(crate) fn apply(&mut self, event: GestureEvent) -> Effects {
        self.note_event(event.kind(), event.timestamp);
        let mut effects = Effects::default();

        match event.payload {
            GesturePayload::Init { camera, markers } => {
                if let Some(camera) = camera {
                    self.set_camera(camera);
                }
                if let Some(markers) = markers {
                    self.replace_markers(markers);
                }
            }
            GesturePayload::Move(camera) => {
                self.set_camera(camera.clone());
                effects.notice = Some(HudNotice::CameraMoved(camera));
            }
            GesturePayload::Select { lat, lon, kind } => {
                let marker = Marker {
                    lat,
                    lon,
                    kind,
                    placed_at: event.timestamp,
                };
                self.append_marker(marker.clone());
                effects.notice = Some(HudNotice::MarkerPlaced(marker));
            }
            GesturePayload::Zoom { delta } => {
                self.adjust_camera(|camera| {
                    camera.altitude = (camera.altitude + delta).max(0.0);
                });
            }
            GesturePayload::Rotate { angle } => {
                self.adjust_camera(|camera| {
                    camera.lon = normalize_lon(camera.lon + angle);
                });
            }
            GesturePayload::VoiceStart => self.set_listening(true),
            GesturePayload::VoiceEnd { transcription } => {
                if let Some(text) = transcription {
                    debug!("voice input ended: {text}");
                }
                self.set_listening(false);
            }
            GesturePayload::AgentSpeakStart { agent, message } => {
                if let Some(agent) = agent {
                    debug!(
                        "agent {agent} speaking: {}",
                        message.as_deref().unwrap_or("")
                    );
                }
                self.set_speaking(true);
            }
            GesturePayload::AgentSpeakEnd => self.set_speaking(false),
            GesturePayload::ToolExecute { tool, status } => {
                debug!("tool executing: {tool} ({status})");
                effects.tool_expiry = Some(self.set_tool(tool, status));
            }
            GesturePayload::Alert { level, message } => {
                info!("alert [{level:?}]: {message}");
                self.push_alert(Alert {
                    level,
                    message,
                    occurred_at: event.timestamp,
                });
            }
        }

        effects
    }
}

pub(crate) struct ReducerTask {
    pub(crate) state: HudState,
    pub(crate) rx: mpsc::Receiver<ReducerMsg>,
    /// Handed to expiry timers so they can post back into the channel
    pub(crate) timer_tx: mpsc::Sender<ReducerMsg>,
    pub(crate) snapshot_tx: watch::Sender<HudSnapshot>,
    pub(crate) notice_tx: broadcast::Sender<HudNotice>,
    pub(crate) shutdown_rx: watch::Receiver<bool>,
}

impl ReducerTask {
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(msg) => self.handle(msg),
                    None => break,
                },
                changed = self.shutdown_rx.changed() => {
                    // A dropped shutdown sender means the handle is gone
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("reducer task stopped");
    }

    fn handle(&mut self, msg: ReducerMsg) {
        match msg {
            ReducerMsg::Event(event) => {
                let effects = self.state.apply(event);
                if let Some(generation) = effects.tool_expiry {
                    let tx = self.timer_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(TOOL_EXPIRY).await;
                        let _ = tx.send(ReducerMsg::ToolExpired { generation }).await;
                    });
                }
                if let Some(notice) = effects.notice {
                    // Lagging or absent observers are fine
                    let _ = self.notice_tx.send(notice);
                }
            }
            ReducerMsg::ConnectionUp => {
                info!("gesture link up");
                self.state.set_phase(ConnectionPhase::Connected);
            }
            ReducerMsg::ConnectionDown => {
                info!("gesture link down");
                self.state.set_phase(ConnectionPhase::Disconnected);
            }
            ReducerMsg::GaveUp => {
                warn!("gesture link exhausted its retries");
                self.state.set_phase(ConnectionPhase::GaveUp);
            }
            ReducerMsg::ToolExpired { generation } => {
                if self.state.clear_tool_if_current(generation) {
                    debug!("tool indicator expired (generation {generation})");
                }
            }
        }

        self.snapshot_tx.send_replace(self.state.snapshot());
    }
}
