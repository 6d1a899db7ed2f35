//! Simulation module
//!
//! All gameplay logic lives here. Given the same seed and the same inputs
//! a session plays out identically:
//! - Seeded RNG only
//! - Stable iteration order (pool slot order)
//! - No rendering or platform dependencies

pub mod level;
pub mod physics;
pub mod pool;
pub mod state;
pub mod tick;

pub use level::{BRANCH_COUNTS, LevelState, SCORE_THRESHOLDS, SPEEDS};
pub use physics::{Body, BodyHandle, BodyShape, Contact, World};
pub use pool::{Obstacle, ObstacleId, ObstaclePool};
pub use state::{Camera, GameEvent, GamePhase, GameState, Player, Tunnel};
pub use tick::{TickInput, autopilot_input, run_frame, tick};
