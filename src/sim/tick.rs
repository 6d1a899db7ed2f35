//! Per-frame simulation tick
//!
//! One tick per rendered frame, always in the same order: steer, move,
//! clamp, bank, sync the player body, frame the camera, pose obstacles,
//! step physics, then resolve collisions, scoring, retirement and level
//! turnover.

use glam::Vec2;

use super::state::{GameEvent, GameState, Player};
use crate::consts::*;

/// Intents held during a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Debug mode only
    pub forward: bool,
    /// Debug mode only
    pub back: bool,
}

/// Advance the session by `dt` seconds of wall time
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if !state.is_running() {
        return;
    }
    state.time_ticks += 1;

    state.tunnel.recycle(state.player.position.z);

    steer(&mut state.player, input, dt);
    advance(state, input, dt);
    clamp_to_tunnel(&mut state.player);

    // Bank into the lateral motion
    let player = &mut state.player;
    player.yaw += TILT_RATE * player.velocity.x * dt;
    player.pitch += -TILT_RATE * player.velocity.y * dt;

    // Kinematic sync; physics only reports contacts for the player
    state.world.set_position(state.player_body, state.player.position);
    state
        .world
        .set_orientation(state.player_body, state.player.orientation());

    state.camera.follow(&state.player);
    state
        .obstacles
        .update_poses(state.player.position, TUNNEL_SEGMENT_LENGTH);

    state.world.step(SIM_DT, dt);

    // Collision wins over anything else this frame
    let player_body = state.player_body;
    let hit = state
        .world
        .drain_contacts()
        .iter()
        .any(|contact| contact.involves(player_body));
    if hit {
        state.end();
        return;
    }

    let passed = state.obstacles.mark_passed(state.player.position.z);
    for _ in 0..passed {
        let score = state.level.award_pass();
        state.emit(GameEvent::ScoreChanged(score));
        if state.level.evaluate() {
            log::info!("Reached level {} at score {}", state.level.level(), score);
        }
    }

    let retired = state
        .obstacles
        .retire_behind(state.camera.position.z, &mut state.world);
    if retired > 0 {
        log::debug!(
            "Retired {} obstacles, {} still active",
            retired,
            state.obstacles.active().len()
        );
    }

    if state.obstacles.active().is_empty() {
        state.emit(GameEvent::LevelCompleted);
        if state.level.evaluate() {
            log::info!(
                "Reached level {} at score {}",
                state.level.level(),
                state.level.score()
            );
        }
        state.change_level();
    }
}

/// Run one scheduled frame. Returns whether another frame should follow.
pub fn run_frame(state: &mut GameState, input: &TickInput, elapsed: f32) -> bool {
    if !state.is_running() {
        return false;
    }
    tick(state, input, elapsed);
    state.is_running()
}

/// Held intents set lateral velocity outright; released axes coast to a stop
fn steer(player: &mut Player, input: &TickInput, dt: f32) {
    let rate = LATERAL_RATE * dt;
    let decay = 1.0 - VELOCITY_DAMPING * dt;

    if input.up || input.down {
        player.velocity.y = if input.down { -rate } else { rate };
    } else {
        player.velocity.y *= decay;
    }

    if input.left || input.right {
        player.velocity.x = if input.right { rate } else { -rate };
    } else {
        player.velocity.x *= decay;
    }
}

fn advance(state: &mut GameState, input: &TickInput, dt: f32) {
    let player = &mut state.player;
    player.position.x += player.velocity.x * dt;
    player.position.y += player.velocity.y * dt;

    let step = state.level.speed() * dt;
    if state.debug {
        if input.forward {
            player.position.z -= step;
        }
        if input.back {
            player.position.z += step;
        }
    } else {
        player.position.z -= step;
    }
}

/// Hard inelastic wall at the lateral limit
fn clamp_to_tunnel(player: &mut Player) {
    let limit = player.lateral_limit();
    let lateral = player.position.truncate();
    if lateral.length() > limit {
        let clamped = lateral.normalize_or_zero() * limit;
        player.position.x = clamped.x;
        player.position.y = clamped.y;
        player.velocity = Vec2::ZERO;
    }
}

/// Dodge toward the far wall from the nearest obstacle ahead (demo mode)
pub fn autopilot_input(state: &GameState) -> TickInput {
    let player = &state.player;
    let nearest = state
        .obstacles
        .iter_active()
        .filter(|o| o.position.z < player.position.z)
        .max_by(|a, b| {
            a.position
                .z
                .partial_cmp(&b.position.z)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

    let target = match nearest {
        Some(obstacle) => {
            -obstacle.position.truncate().normalize_or_zero() * player.lateral_limit() * 0.8
        }
        None => Vec2::ZERO,
    };
    let offset = target - player.position.truncate();
    let dead_zone = 0.1;

    TickInput {
        up: offset.y > dead_zone,
        down: offset.y < -dead_zone,
        left: offset.x < -dead_zone,
        right: offset.x > dead_zone,
        ..Default::default()
    }
}
