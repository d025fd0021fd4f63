//! Horizontal bearings between entities

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Yaw in degrees that faces from `from` toward `to`, ignoring height.
/// 0° looks along +x, 90° along +y.
pub fn bearing_deg(from: Vec3, to: Vec3) -> f32 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Smallest absolute difference between two headings, in [0, 180]
pub fn heading_delta_deg(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Degrees `facing` must turn to look from `from` at `to`
pub fn required_turn_deg(from: Vec3, facing_deg: f32, to: Vec3) -> f32 {
    heading_delta_deg(facing_deg, bearing_deg(from, to))
}
