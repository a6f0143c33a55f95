// src/engine/state.rs
// View state owned by the reducer task, plus the immutable snapshot
// handed to readers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::event::GestureKind;

/// Alerts kept in the feed; older entries are evicted
pub const ALERT_CAPACITY: usize = 5;

/// Camera altitude when a payload omits it, in metres
pub const DEFAULT_ALTITUDE: f64 = 15_000_000.0;

/// Connection lifecycle as seen by readers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connected,
    /// Retry cap exhausted; the engine will not reconnect again
    GaveUp,
}

impl ConnectionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Where the camera points. Replaced wholesale on MOVE/INIT, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub target_name: Option<String>,
}

/// A dropped marker. Immutable once placed, never removed in-session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub lat: f64,
    pub lon: f64,
    pub kind: Option<String>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// An entry in the alert feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// The single live tool-execution indicator. The generation id lets a
/// stale expiry timer recognize that a newer execution has superseded
/// the record it was scheduled for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecution {
    pub tool: String,
    pub status: String,
    pub generation: u64,
}

/// View state. Exactly one writer: the reducer task.
#[derive(Debug, Default)]
pub struct HudState {
    phase: ConnectionPhase,
    camera: Option<CameraState>,
    markers: Vec<Marker>,
    is_listening: bool,
    is_speaking: bool,
    current_tool: Option<ToolExecution>,
    alerts: VecDeque<Alert>,
    last_event: Option<(GestureKind, DateTime<Utc>)>,
    tool_generation: u64,
}

impl HudState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: ConnectionPhase) {
        self.phase = phase;
    }

    pub fn camera(&self) -> Option<&CameraState> {
        self.camera.as_ref()
    }

    pub fn set_camera(&mut self, camera: CameraState) {
        self.camera = Some(camera);
    }

    /// Partial camera adjustment; a no-op until the first camera exists
    pub fn adjust_camera(&mut self, f: impl FnOnce(&mut CameraState)) {
        if let Some(camera) = self.camera.as_mut() {
            f(camera);
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn append_marker(&mut self, marker: Marker) {
        self.markers.push(marker);
    }

    pub fn replace_markers(&mut self, markers: Vec<Marker>) {
        self.markers = markers;
    }

    pub fn set_listening(&mut self, listening: bool) {
        self.is_listening = listening;
    }

    pub fn set_speaking(&mut self, speaking: bool) {
        self.is_speaking = speaking;
    }

    pub fn current_tool(&self) -> Option<&ToolExecution> {
        self.current_tool.as_ref()
    }

    /// Replace the tool indicator, returning the generation the caller
    /// should schedule an expiry for.
    pub fn set_tool(&mut self, tool: String, status: String) -> u64 {
        self.tool_generation += 1;
        let generation = self.tool_generation;
        self.current_tool = Some(ToolExecution {
            tool,
            status,
            generation,
        });
        generation
    }

    /// Clear the tool indicator if `generation` still identifies the live
    /// record. Stale timers for superseded records fall through.
    pub fn clear_tool_if_current(&mut self, generation: u64) -> bool {
        match &self.current_tool {
            Some(tool) if tool.generation == generation => {
                self.current_tool = None;
                true
            }
            _ => false,
        }
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    /// Prepend an alert, evicting the oldest beyond capacity
    pub fn push_alert(&mut self, alert: Alert) {
        self.alerts.push_front(alert);
        self.alerts.truncate(ALERT_CAPACITY);
    }

    pub fn note_event(&mut self, kind: GestureKind, timestamp: DateTime<Utc>) {
        self.last_event = Some((kind, timestamp));
    }

    pub fn snapshot(&self) -> HudSnapshot {
        HudSnapshot {
            phase: self.phase,
            camera: self.camera.clone(),
            markers: self.markers.clone(),
            is_listening: self.is_listening,
            is_speaking: self.is_speaking,
            current_tool: self.current_tool.clone(),
            alerts: self.alerts.iter().cloned().collect(),
            last_event: self.last_event,
        }
    }
}

/// Immutable read model published after every applied event. Rendering
/// reads the latest snapshot once per frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HudSnapshot {
    pub phase: ConnectionPhase,
    pub camera: Option<CameraState>,
    pub markers: Vec<Marker>,
    pub is_listening: bool,
    pub is_speaking: bool,
    pub current_tool: Option<ToolExecution>,
    /// Newest first, at most [`ALERT_CAPACITY`] entries
    pub alerts: Vec<Alert>,
    pub last_event: Option<(GestureKind, DateTime<Utc>)>,
}
