//! Keyboard intents
//!
//! Raw key codes map 1:1 onto intents. Key-down sets, key-up clears, and
//! auto-repeat of a held key changes nothing.

use crate::sim::TickInput;

/// Abstract player intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Up,
    Down,
    Left,
    Right,
    /// Debug forward
    Forward,
    /// Debug back
    Back,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::Up,
        Intent::Down,
        Intent::Left,
        Intent::Right,
        Intent::Forward,
        Intent::Back,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Map a DOM-style key code (arrows, WASD, space, shift)
pub fn intent_for_key(code: u32) -> Option<Intent> {
    match code {
        38 | 87 => Some(Intent::Up),
        40 | 83 => Some(Intent::Down),
        37 | 65 => Some(Intent::Left),
        39 | 68 => Some(Intent::Right),
        32 => Some(Intent::Forward),
        16 => Some(Intent::Back),
        _ => None,
    }
}

/// Currently held intents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    held: [bool; 6],
}

impl KeyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the intent the key maps to, if any
    pub fn key_down(&mut self, code: u32) -> Option<Intent> {
        let intent = intent_for_key(code)?;
        self.held[intent.slot()] = true;
        Some(intent)
    }

    pub fn key_up(&mut self, code: u32) -> Option<Intent> {
        let intent = intent_for_key(code)?;
        self.held[intent.slot()] = false;
        Some(intent)
    }

    pub fn is_held(&self, intent: Intent) -> bool {
        self.held[intent.slot()]
    }

    /// Drop every held key (focus loss)
    pub fn release_all(&mut self) {
        self.held = [false; 6];
    }

    pub fn tick_input(&self) -> TickInput {
        TickInput {
            up: self.is_held(Intent::Up),
            down: self.is_held(Intent::Down),
            left: self.is_held(Intent::Left),
            right: self.is_held(Intent::Right),
            forward: self.is_held(Intent::Forward),
            back: self.is_held(Intent::Back),
        }
    }
}
