// src/engine/projector.rs
// Pure camera-to-screen projection. Called for every marker and for the
// camera target on every animation frame, so it must stay deterministic
// and side-effect-free.

use serde::Serialize;

use crate::engine::state::CameraState;

/// Half-angle of the visible hemisphere, in degrees of longitude
pub const VISIBLE_HALF_ANGLE: f64 = 90.0;

/// Flattens the vertical axis to suggest global curvature
pub const VERTICAL_COMPRESSION: f64 = 0.65;

/// Screen-space result. Origin at display centre, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub x: f64,
    pub y: f64,
    pub visible: bool,
}

/// Project a geographic point onto screen space, treating the display as
/// centred on the camera's reference longitude. Points more than 90° of
/// longitude away fall on the back hemisphere and are culled.
pub fn project(camera: &CameraState, lat: f64, lon: f64, radius: f64) -> Projection {
    let dlon = normalize_lon(lon - camera.lon);
    Projection {
        x: dlon / VISIBLE_HALF_ANGLE * radius,
        y: -(lat / VISIBLE_HALF_ANGLE) * radius * VERTICAL_COMPRESSION,
        visible: dlon.abs() < VISIBLE_HALF_ANGLE,
    }
}

/// Project the camera's own target point. Always on the vertical centre
/// line of the display.
pub fn project_target(camera: &CameraState, radius: f64) -> Projection {
    project(camera, camera.lat, camera.lon, radius)
}

/// Wrap a longitude offset into (-180, 180]
pub fn normalize_lon(lon: f64) -> f64 {
    let mut wrapped = (lon + 180.0) % 360.0;
    if wrapped <= 0.0 {
        wrapped += 360.0;
    }
    wrapped - 180.0
}
