// src/engine/event.rs
// Inbound wire protocol: the gesture event tagged union, validated at
// the transport boundary. Frames that fail validation are rejected here
// and never reach the reducer.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::state::{AlertLevel, CameraState, Marker, DEFAULT_ALTITUDE};
use crate::error::{HudError, HudResult};

/// The eleven recognized inbound event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GestureKind {
    Init,
    Move,
    Select,
    Zoom,
    Rotate,
    VoiceStart,
    VoiceEnd,
    AgentSpeakStart,
    AgentSpeakEnd,
    ToolExecute,
    Alert,
}

/// A validated inbound event
#[derive(Debug, Clone, PartialEq)]
pub struct GestureEvent {
    pub timestamp: DateTime<Utc>,
    pub payload: GesturePayload,
}

impl GestureEvent {
    pub fn kind(&self) -> GestureKind {
        self.payload.kind()
    }
}

/// Typed payload per event kind
#[derive(Debug, Clone, PartialEq)]
pub enum GesturePayload {
    Init {
        camera: Option<CameraState>,
        markers: Option<Vec<Marker>>,
    },
    Move(CameraState),
    Select {
        lat: f64,
        lon: f64,
        kind: Option<String>,
    },
    Zoom {
        delta: f64,
    },
    Rotate {
        angle: f64,
    },
    VoiceStart,
    VoiceEnd {
        transcription: Option<String>,
    },
    AgentSpeakStart {
        agent: Option<String>,
        message: Option<String>,
    },
    AgentSpeakEnd,
    ToolExecute {
        tool: String,
        status: String,
    },
    Alert {
        level: AlertLevel,
        message: String,
    },
}

impl GesturePayload {
    pub fn kind(&self) -> GestureKind {
        match self {
            Self::Init { .. } => GestureKind::Init,
            Self::Move(_) => GestureKind::Move,
            Self::Select { .. } => GestureKind::Select,
            Self::Zoom { .. } => GestureKind::Zoom,
            Self::Rotate { .. } => GestureKind::Rotate,
            Self::VoiceStart => GestureKind::VoiceStart,
            Self::VoiceEnd { .. } => GestureKind::VoiceEnd,
            Self::AgentSpeakStart { .. } => GestureKind::AgentSpeakStart,
            Self::AgentSpeakEnd => GestureKind::AgentSpeakEnd,
            Self::ToolExecute { .. } => GestureKind::ToolExecute,
            Self::Alert { .. } => GestureKind::Alert,
        }
    }
}

/// Raw frame envelope: { "type": ..., "timestamp": ..., "data": {...} }
#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    timestamp: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

fn default_altitude() -> f64 {
    DEFAULT_ALTITUDE
}

#[derive(Deserialize)]
struct CameraData {
    lat: f64,
    lon: f64,
    #[serde(default = "default_altitude")]
    altitude: f64,
    #[serde(default)]
    target_name: Option<String>,
}

impl From<CameraData> for CameraState {
    fn from(data: CameraData) -> Self {
        Self {
            lat: data.lat,
            lon: data.lon,
            altitude: data.altitude,
            target_name: data.target_name,
        }
    }
}

#[derive(Deserialize)]
struct InitData {
    #[serde(default)]
    camera: Option<CameraData>,
    #[serde(default)]
    markers: Option<Vec<MarkerData>>,
}

#[derive(Deserialize)]
struct MarkerData {
    lat: f64,
    lon: f64,
    #[serde(default)]
    marker_type: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct SelectData {
    lat: f64,
    lon: f64,
    #[serde(default)]
    marker_type: Option<String>,
}

#[derive(Deserialize)]
struct ZoomData {
    delta: f64,
}

#[derive(Deserialize)]
struct RotateData {
    angle: f64,
}

#[derive(Deserialize, Default)]
struct VoiceEndData {
    #[serde(default)]
    transcription: Option<String>,
}

#[derive(Deserialize, Default)]
struct AgentSpeakData {
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ToolExecuteData {
    tool: String,
    status: String,
}

#[derive(Deserialize)]
struct AlertData {
    level: AlertLevel,
    message: String,
}

impl GestureEvent {
    /// Parse and validate a text frame. Unknown kinds and payloads that
    /// fail schema validation are errors; the caller logs and drops the
    /// frame without touching state.
    pub fn parse(text: &str) -> HudResult<Self> {
        let frame: RawFrame = serde_json::from_str(text)
            .map_err(|e| HudError::format(format!("not a gesture frame: {e}")))?;

        let kind: GestureKind =
            serde_json::from_value(serde_json::Value::String(frame.kind.clone()))
                .map_err(|_| HudError::UnknownKind(frame.kind.clone()))?;

        let timestamp = parse_timestamp(frame.timestamp.as_deref());
        let payload = parse_payload(kind, frame.data, timestamp)?;

        Ok(Self { timestamp, payload })
    }
}

fn parse_payload(
    kind: GestureKind,
    data: serde_json::Value,
    received_at: DateTime<Utc>,
) -> HudResult<GesturePayload> {
    let reject = |e: serde_json::Error| HudError::format(format!("{kind:?} payload: {e}"));

    let payload = match kind {
        GestureKind::Init => {
            let data: InitData = serde_json::from_value(data).map_err(reject)?;
            GesturePayload::Init {
                camera: data.camera.map(CameraState::from),
                markers: data.markers.map(|markers| {
                    markers
                        .into_iter()
                        .map(|m| Marker {
                            lat: m.lat,
                            lon: m.lon,
                            kind: m.marker_type,
                            placed_at: m
                                .timestamp
                                .as_deref()
                                .and_then(parse_iso8601)
                                .unwrap_or(received_at),
                        })
                        .collect()
                }),
            }
        }
        GestureKind::Move => {
            let data: CameraData = serde_json::from_value(data).map_err(reject)?;
            GesturePayload::Move(data.into())
        }
        GestureKind::Select => {
            let data: SelectData = serde_json::from_value(data).map_err(reject)?;
            GesturePayload::Select {
                lat: data.lat,
                lon: data.lon,
                kind: data.marker_type,
            }
        }
        GestureKind::Zoom => {
            let data: ZoomData = serde_json::from_value(data).map_err(reject)?;
            GesturePayload::Zoom { delta: data.delta }
        }
        GestureKind::Rotate => {
            let data: RotateData = serde_json::from_value(data).map_err(reject)?;
            GesturePayload::Rotate { angle: data.angle }
        }
        GestureKind::VoiceStart => GesturePayload::VoiceStart,
        GestureKind::VoiceEnd => {
            let data: VoiceEndData = serde_json::from_value(data).unwrap_or_default();
            GesturePayload::VoiceEnd {
                transcription: data.transcription,
            }
        }
        GestureKind::AgentSpeakStart => {
            let data: AgentSpeakData = serde_json::from_value(data).unwrap_or_default();
            GesturePayload::AgentSpeakStart {
                agent: data.agent,
                message: data.message,
            }
        }
        GestureKind::AgentSpeakEnd => GesturePayload::AgentSpeakEnd,
        GestureKind::ToolExecute => {
            let data: ToolExecuteData = serde_json::from_value(data).map_err(reject)?;
            GesturePayload::ToolExecute {
                tool: data.tool,
                status: data.status,
            }
        }
        GestureKind::Alert => {
            let data: AlertData = serde_json::from_value(data).map_err(reject)?;
            GesturePayload::Alert {
                level: data.level,
                message: data.message,
            }
        }
    };

    Ok(payload)
}

/// The feed emits `datetime.isoformat()` timestamps, which may or may
/// not carry a UTC offset. Accept both; fall back to receive time.
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(parse_iso8601).unwrap_or_else(Utc::now)
}

fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_frame() {
        let frame = r#"{
            "type": "MOVE",
            "timestamp": "2026-08-05T10:15:00+00:00",
            "data": {"lat": -6.2088, "lon": 106.8456, "altitude": 15000000, "target_name": "Jakarta Flood"}
        }"#;
        let event = GestureEvent::parse(frame).unwrap();
        assert_eq!(event.kind(), GestureKind::Move);
        match event.payload {
            GesturePayload::Move(camera) => {
                assert_eq!(camera.lat, -6.2088);
                assert_eq!(camera.target_name.as_deref(), Some("Jakarta Flood"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn move_without_altitude_gets_default() {
        let frame = r#"{"type": "MOVE", "data": {"lat": 1.0, "lon": 2.0}}"#;
        let event = GestureEvent::parse(frame).unwrap();
        match event.payload {
            GesturePayload::Move(camera) => assert_eq!(camera.altitude, DEFAULT_ALTITUDE),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn parses_naive_isoformat_timestamp() {
        let frame = r#"{"type": "VOICE_START", "timestamp": "2026-08-05T10:15:00.123456", "data": {}}"#;
        let event = GestureEvent::parse(frame).unwrap();
        assert_eq!(event.timestamp.format("%Y-%m-%d").to_string(), "2026-08-05");
    }

    #[test]
    fn parses_select_and_alert_payloads() {
        let select = GestureEvent::parse(
            r#"{"type": "SELECT", "data": {"lat": 34.05, "lon": -118.24, "marker_type": "medical"}}"#,
        )
        .unwrap();
        assert!(matches!(
            select.payload,
            GesturePayload::Select { kind: Some(ref k), .. } if k == "medical"
        ));

        let alert = GestureEvent::parse(
            r#"{"type": "ALERT", "data": {"level": "critical", "message": "New flood zone detected in sector 7"}}"#,
        )
        .unwrap();
        assert!(matches!(
            alert.payload,
            GesturePayload::Alert { level: AlertLevel::Critical, .. }
        ));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = GestureEvent::parse(r#"{"type": "TELEPORT", "data": {}}"#).unwrap_err();
        assert!(matches!(err, HudError::UnknownKind(kind) if kind == "TELEPORT"));
    }

    #[test]
    fn rejects_non_json_frame() {
        assert!(matches!(
            GestureEvent::parse("not json"),
            Err(HudError::Format(_))
        ));
    }

    #[test]
    fn rejects_tool_execute_missing_fields() {
        let err = GestureEvent::parse(r#"{"type": "TOOL_EXECUTE", "data": {"tool": "NASA_FIRMS"}}"#)
            .unwrap_err();
        assert!(matches!(err, HudError::Format(_)));
    }

    #[test]
    fn rejects_bad_alert_level() {
        assert!(
            GestureEvent::parse(r#"{"type": "ALERT", "data": {"level": "fatal", "message": "x"}}"#)
                .is_err()
        );
    }

    #[test]
    fn tolerates_extra_payload_fields() {
        let frame = r#"{"type": "ZOOM", "data": {"delta": -500000.0, "source": "pinch"}}"#;
        let event = GestureEvent::parse(frame).unwrap();
        assert!(matches!(event.payload, GesturePayload::Zoom { delta } if delta == -500000.0));
    }

    #[test]
    fn missing_timestamp_falls_back_to_receive_time() {
        let before = Utc::now();
        let event = GestureEvent::parse(r#"{"type": "VOICE_END", "data": {}}"#).unwrap();
        assert!(event.timestamp >= before);
    }
}
