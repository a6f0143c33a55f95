// src/lib.rs
// aegis-hud: gesture/telemetry synchronization engine for the Aegis-1
// mission control HUD. Keeps the camera, marker set, voice/agent flags,
// tool indicator, and alert feed consistent with the gesture controller
// over a persistent WebSocket, reconnecting transparently.

pub mod config;
pub mod engine;
pub mod error;

pub use config::{HudConfig, LoggingConfig, SocketConfig};
pub use engine::command::HudCommand;
pub use engine::event::{GestureEvent, GestureKind, GesturePayload};
pub use engine::projector::{project, project_target, Projection};
pub use engine::state::{
    Alert, AlertLevel, CameraState, ConnectionPhase, HudSnapshot, Marker, ToolExecution,
};
pub use engine::{spawn, HudHandle, HudNotice};
pub use error::{HudError, HudResult};
