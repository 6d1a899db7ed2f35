//! Tunnel Grove - An endless tunnel runner through procedurally grown trees
//!
//! Core modules:
//! - `geometry`: Procedural shapes, skeletons and the branching tree builder
//! - `sim`: Frame-stepped simulation (player, obstacle pool, levels, physics)
//! - `input`: Key code to intent mapping
//! - `settings`: Data-driven session configuration

pub mod geometry;
pub mod input;
pub mod settings;
pub mod sim;

pub use settings::Settings;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed physics timestep (the engine subdivides elapsed time into these)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per physics step to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 10;

    /// Tunnel dimensions
    pub const TUNNEL_RADIUS: f32 = 4.0;
    pub const TUNNEL_SEGMENT_LENGTH: f32 = 40.0;
    pub const TUNNEL_SEGMENTS: usize = 3;

    /// Player body
    pub const PLAYER_RADIUS: f32 = 0.3;
    pub const PLAYER_MASS: f32 = 1.0;
    /// Lateral speed set by an active intent (scaled by dt)
    pub const LATERAL_RATE: f32 = 120.0;
    /// Exponential decay factor for released axes
    pub const VELOCITY_DAMPING: f32 = 4.0;
    /// Fraction of the tunnel radius the player may use laterally
    pub const LATERAL_LIMIT_FACTOR: f32 = 0.6;
    /// Visual banking per unit of lateral velocity
    pub const TILT_RATE: f32 = 5.0;

    /// Camera trails the player by this much along +z
    pub const CAMERA_OFFSET: f32 = 4.0;
    /// Fraction of the player's lateral offset the camera looks toward
    pub const CAMERA_PULL: f32 = 0.25;

    /// Obstacles are rooted on this fraction of the tunnel radius
    pub const OBSTACLE_RING_FACTOR: f32 = 0.75;
    /// Default obstacle pool size
    pub const POOL_SIZE: usize = 24;
    /// Points awarded per obstacle passed
    pub const SCORE_PER_OBSTACLE: u64 = 100;

    /// Collision layer shared by the player and enabled obstacles
    pub const ACTIVE_COLLISION_LAYER: u32 = 1;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Angle of the direction pointing from `from` to `to`
#[inline]
pub fn angle_to(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}
