//! Difficulty tiers
//!
//! Three parallel tables indexed by `level - 1`. Levels past the end of the
//! tables reuse the last entry.

use crate::consts::SCORE_PER_OBSTACLE;

/// Forward speed per level (units/s)
pub const SPEEDS: [f32; 12] = [
    10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0, 24.0, 26.0, 28.0, 30.0, 32.0,
];

/// A score strictly above `SCORE_THRESHOLDS[i]` qualifies for level `i + 1`
pub const SCORE_THRESHOLDS: [u64; 12] = [
    0, 500, 2000, 4000, 6500, 9500, 13000, 18000, 24000, 31000, 39000, 48000,
];

/// Obstacles laid out per level
pub const BRANCH_COUNTS: [usize; 12] = [6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18];

/// Score and difficulty of the current run.
///
/// Score and level only grow until `reset`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelState {
    level: u32,
    score: u64,
    speed: f32,
    branch_count: usize,
}

impl Default for LevelState {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelState {
    pub fn new() -> Self {
        let mut state = Self {
            level: 1,
            score: 0,
            speed: 0.0,
            branch_count: 0,
        };
        state.apply_tables();
        state
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    /// Forward speed for the current layout
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Obstacles to activate for the current layout
    pub fn branch_count(&self) -> usize {
        self.branch_count
    }

    fn table_index(&self) -> usize {
        (self.level as usize).clamp(1, SPEEDS.len()) - 1
    }

    /// Load speed and branch count for the current level
    pub fn apply_tables(&mut self) {
        let index = self.table_index();
        self.speed = SPEEDS[index];
        self.branch_count = BRANCH_COUNTS[index];
    }

    /// Credit one passed obstacle, returning the new score
    pub fn award_pass(&mut self) -> u64 {
        self.score += SCORE_PER_OBSTACLE;
        self.score
    }

    /// Raise the level to the highest tier the score qualifies for.
    /// Returns true when the level changed.
    pub fn evaluate(&mut self) -> bool {
        for i in (0..SCORE_THRESHOLDS.len()).rev() {
            let tier = i as u32 + 1;
            if self.score > SCORE_THRESHOLDS[i] && self.level < tier {
                self.level = tier;
                return true;
            }
        }
        false
    }

    /// Score needed to reach the next level, 0 past the last one
    pub fn next_threshold(&self) -> u64 {
        SCORE_THRESHOLDS
            .get(self.level as usize)
            .copied()
            .unwrap_or(0)
    }
}
