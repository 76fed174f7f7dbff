// Define message types for the runtime

use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of travel for the car
///
/// `Stop` is the "no direction" state: motors are silenced but the stored
/// speed is kept so the next direction resumes at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Stop,
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    /// Direction code carried in the MOTOR_DIRECTION frame payload.
    /// `Stop` has no code; it is never sent as a frame.
    pub fn code(self) -> Option<u8> {
        match self {
            Direction::Stop => None,
            Direction::Forward => Some(1),
            Direction::Backward => Some(2),
            Direction::Left => Some(3),
            Direction::Right => Some(4),
        }
    }

    pub fn is_moving(self) -> bool {
        self != Direction::Stop
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Stop => "Stop",
            Direction::Forward => "Forward",
            Direction::Backward => "Backward",
            Direction::Left => "Left",
            Direction::Right => "Right",
        };
        f.write_str(name)
    }
}

/// PWM speed in [0, 255] (0 = off, 255 = full duty)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Speed(u8);

impl Speed {
    pub const ZERO: Speed = Speed(0);
    pub const MAX: Speed = Speed(u8::MAX);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Clamp an arbitrary integer into the valid speed range.
    /// Out-of-range input is clamped, never rejected.
    pub fn clamped(value: i32) -> Self {
        Self(value.clamp(0, u8::MAX as i32) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Normalized duty cycle for a PWM write
    pub fn duty(self) -> f32 {
        self.0 as f32 / 255.0
    }
}

impl From<u8> for Speed {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authoritative direction + speed record held by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorState {
    pub direction: Direction,
    pub speed: Speed,
}

impl MotorState {
    /// Duty cycle actually applied to the motors: zero while stopped,
    /// whatever the stored speed is.
    pub fn effective_duty(&self) -> f32 {
        if self.direction.is_moving() {
            self.speed.duty()
        } else {
            0.0
        }
    }
}

// Command from teleop/UI -> runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    // i32 so out-of-range values reach the clamp instead of failing to parse
    SetSpeed { value: i32 },
    ClearLog,
}

impl Command {
    /// Direction this command issues, if it is a direction command
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Command::Forward => Some(Direction::Forward),
            Command::Backward => Some(Direction::Backward),
            Command::Left => Some(Direction::Left),
            Command::Right => Some(Direction::Right),
            Command::Stop => Some(Direction::Stop),
            Command::SetSpeed { .. } | Command::ClearLog => None,
        }
    }
}

/// A controller operation that was attempted, reported when it fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transition {
    Issue { direction: Direction },
    SetSpeed { speed: Speed },
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Issue { direction } => write!(f, "issue {}", direction),
            Transition::SetSpeed { speed } => write!(f, "set speed {}", speed),
        }
    }
}
