//! Player input state.
//!
//! Keyboard edges update an [`InputState`]; the simulation tick only reads it.
//! Both axes are stepped rather than analog, and the car model is tuned for that.

use serde::{Deserialize, Serialize};

/// Forward axis value while accelerating
pub const FORWARD_ACCELERATE: f32 = 1.0;
/// Forward axis value while braking / reversing
pub const FORWARD_BRAKE: f32 = -0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
}

impl Key {
    /// Map a DOM-style key name (`"w"`, `"ArrowUp"`, ...) to a key
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "w" => Some(Key::W),
            "a" => Some(Key::A),
            "s" => Some(Key::S),
            "d" => Some(Key::D),
            "arrowup" => Some(Key::ArrowUp),
            "arrowdown" => Some(Key::ArrowDown),
            "arrowleft" => Some(Key::ArrowLeft),
            "arrowright" => Some(Key::ArrowRight),
            _ => None,
        }
    }
}

/// Two logical axes: forward ∈ {-0.5, 0, 1}, turn ∈ {-1, 0, 1}
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    pub forward: f32,
    pub turn: f32,
}

impl InputState {
    pub const IDLE: InputState = InputState {
        forward: 0.0,
        turn: 0.0,
    };

    pub fn new(forward: f32, turn: f32) -> Self {
        Self { forward, turn }
    }

    pub fn key_down(&mut self, key: Key) {
        match key {
            Key::W | Key::ArrowUp => self.forward = FORWARD_ACCELERATE,
            Key::S | Key::ArrowDown => self.forward = FORWARD_BRAKE,
            Key::A | Key::ArrowLeft => self.turn = -1.0,
            Key::D | Key::ArrowRight => self.turn = 1.0,
        }
    }

    pub fn key_up(&mut self, key: Key) {
        match key {
            Key::W | Key::S | Key::ArrowUp | Key::ArrowDown => self.forward = 0.0,
            Key::A | Key::D | Key::ArrowLeft | Key::ArrowRight => self.turn = 0.0,
        }
    }

    /// Force both axes into [-1, 1]; non-finite values read as released
    pub fn clamp(&mut self) {
        let axis = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        self.forward = axis(self.forward);
        self.turn = axis(self.turn);
    }
}
