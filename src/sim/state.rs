//! Game state and core simulation types
//!
//! `GameState` is the whole session: player, camera, tunnel, level
//! progression, the obstacle pool and the physics world it lives in.

use glam::{EulerRot, Quat, Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::level::LevelState;
use super::physics::{BodyHandle, BodyShape, World};
use super::pool::ObstaclePool;
use crate::Settings;
use crate::consts::*;

/// Current phase of gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for the start toggle
    Idle,
    /// Active gameplay
    Running,
    /// Run ended, terminal until reset
    GameOver,
}

/// Notifications for the presentation layer, drained once per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    Started,
    ScoreChanged(u64),
    LevelCompleted,
    GameEnded(u64),
}

/// The player's craft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub position: Vec3,
    /// Lateral (x, y) velocity; forward motion comes from the level speed
    pub velocity: Vec2,
    /// Banking about x, follows -y velocity
    pub pitch: f32,
    /// Banking about y, follows x velocity
    pub yaw: f32,
    pub radius: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec2::ZERO,
            pitch: 0.0,
            yaw: 0.0,
            radius: PLAYER_RADIUS,
        }
    }
}

impl Player {
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.pitch, self.yaw, 0.0)
    }

    /// Largest lateral radius the player may reach
    pub fn lateral_limit(&self) -> f32 {
        LATERAL_LIMIT_FACTOR * TUNNEL_RADIUS - self.radius
    }
}

/// Chase camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    /// Look-at point
    pub target: Vec3,
}

impl Camera {
    pub fn behind(player: &Player) -> Self {
        let mut camera = Self {
            position: Vec3::ZERO,
            target: Vec3::ZERO,
        };
        camera.follow(player);
        camera
    }

    /// Trail on the tunnel axis, looking partway toward the player
    pub fn follow(&mut self, player: &Player) {
        let p = player.position;
        self.position = Vec3::new(0.0, 0.0, p.z + CAMERA_OFFSET);
        self.target = Vec3::new(p.x * CAMERA_PULL, p.y * CAMERA_PULL, p.z);
    }
}

/// Forward positions of the leapfrogging tunnel segments
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunnel {
    pub segments: [f32; TUNNEL_SEGMENTS],
}

impl Default for Tunnel {
    fn default() -> Self {
        let mut segments = [0.0; TUNNEL_SEGMENTS];
        for (i, z) in segments.iter_mut().enumerate() {
            *z = -(i as f32) * TUNNEL_SEGMENT_LENGTH;
        }
        Self { segments }
    }
}

impl Tunnel {
    /// Move segments the player has left behind to the front
    pub fn recycle(&mut self, player_z: f32) {
        let span = TUNNEL_SEGMENTS as f32 * TUNNEL_SEGMENT_LENGTH;
        for z in &mut self.segments {
            if player_z < *z - 0.6 * TUNNEL_SEGMENT_LENGTH {
                *z -= span;
            }
        }
    }
}

/// Complete session state
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub phase: GamePhase,
    pub level: LevelState,
    pub player: Player,
    pub camera: Camera,
    pub tunnel: Tunnel,
    pub obstacles: ObstaclePool,
    pub world: World,
    pub player_body: BodyHandle,
    pub rng: Pcg32,
    /// Manual forward/back control instead of constant speed
    pub debug: bool,
    /// Simulation tick counter
    pub time_ticks: u64,
    events: Vec<GameEvent>,
}

impl GameState {
    /// Build the obstacle pool and player body, then lay out level 1
    pub fn new(settings: &Settings) -> Self {
        let settings = settings.clone().sanitized();
        let seed = settings.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut world = World::new();

        let obstacles = ObstaclePool::new(settings.pool_size, &settings.tree, &mut world, &mut rng);
        let player_body = world.create_body(
            PLAYER_MASS,
            BodyShape::Sphere {
                radius: PLAYER_RADIUS,
            },
        );
        world.set_collision_filter(player_body, ACTIVE_COLLISION_LAYER, ACTIVE_COLLISION_LAYER);

        log::info!("New session with seed {}", seed);

        let player = Player::default();
        let mut state = Self {
            seed,
            phase: GamePhase::Idle,
            level: LevelState::new(),
            camera: Camera::behind(&player),
            player,
            tunnel: Tunnel::default(),
            obstacles,
            world,
            player_body,
            rng,
            debug: settings.debug,
            time_ticks: 0,
            events: Vec::new(),
        };
        state.reset();
        state
    }

    /// Restore player, level and tunnel, and lay out a fresh level.
    /// The session waits in `Idle` for the next toggle.
    pub fn reset(&mut self) {
        self.phase = GamePhase::Idle;
        self.level = LevelState::new();
        self.player = Player::default();
        self.camera = Camera::behind(&self.player);
        self.tunnel = Tunnel::default();
        self.time_ticks = 0;

        self.world.set_position(self.player_body, self.player.position);
        self.world.set_orientation(self.player_body, self.player.orientation());
        self.world.set_velocity(self.player_body, Vec3::ZERO);
        self.world.drain_contacts();

        self.change_level();
    }

    /// Apply the current level's tables and lay out its obstacles
    pub fn change_level(&mut self) {
        self.level.apply_tables();
        let placed = self.obstacles.change_level(
            self.level.branch_count(),
            self.player.position.z,
            &mut self.world,
            &mut self.rng,
        );
        log::info!(
            "Level {}: speed {}, {} obstacles",
            self.level.level(),
            self.level.speed(),
            placed
        );
    }

    /// Start or stop the run. Ignored once the game is over.
    pub fn toggle(&mut self) {
        match self.phase {
            GamePhase::Idle => {
                self.phase = GamePhase::Running;
                self.emit(GameEvent::Started);
                log::info!("Run started");
            }
            GamePhase::Running => {
                self.phase = GamePhase::Idle;
                log::info!("Run stopped");
            }
            GamePhase::GameOver => {
                log::debug!("Toggle ignored after game over");
            }
        }
    }

    /// End the run. Returns false if it had already ended.
    pub fn end(&mut self) -> bool {
        if self.phase == GamePhase::GameOver {
            return false;
        }
        self.phase = GamePhase::GameOver;
        let score = self.level.score();
        self.emit(GameEvent::GameEnded(score));
        log::info!("Game over at level {} with score {}", self.level.level(), score);
        true
    }

    pub fn is_running(&self) -> bool {
        self.phase == GamePhase::Running
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take every event raised since the last drain
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}
