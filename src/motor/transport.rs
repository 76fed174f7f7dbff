// Serial transport abstraction shared by the Firmata link and the simulated bus

use std::time::Duration;

/// Sysex id of the custom direction frame understood by the car firmware
pub const MOTOR_DIRECTION: u8 = 0x01;

/// Error types for serial communication with the board
#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Failed to open {port} at {baud} baud: {source}")]
    Connection {
        port: String,
        baud: u32,
        #[source]
        source: serialport::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Duty cycle {duty} on pin {pin} is outside [0, 1]")]
    DutyOutOfRange { pin: u8, duty: f32 },

    #[error("Sysex byte 0x{byte:02X} does not fit in 7 bits")]
    PayloadOutOfRange { byte: u8 },
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// Custom protocol frame: a one-byte sysex opcode plus payload bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialFrame {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl SerialFrame {
    pub fn new(opcode: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// MOTOR_DIRECTION frame carrying a single direction code
    pub fn direction(code: u8) -> Self {
        Self::new(MOTOR_DIRECTION, [code])
    }
}

/// Byte-level link to the microcontroller.
///
/// Only the motor driver holds one; every write reports failure so the
/// controller can abort a transition instead of drifting out of sync
/// with the device.
pub trait SerialChannel {
    /// Prepare a pin for PWM output
    fn configure_pwm(&mut self, _pin: u8) -> Result<()> {
        Ok(())
    }

    /// Write a normalized duty cycle in [0, 1] to a PWM pin
    fn write_pwm(&mut self, pin: u8, duty: f32) -> Result<()>;

    /// Send a custom protocol frame
    fn send_frame(&mut self, frame: &SerialFrame) -> Result<()>;
}

impl<S: SerialChannel + ?Sized> SerialChannel for Box<S> {
    fn configure_pwm(&mut self, pin: u8) -> Result<()> {
        (**self).configure_pwm(pin)
    }

    fn write_pwm(&mut self, pin: u8, duty: f32) -> Result<()> {
        (**self).write_pwm(pin, duty)
    }

    fn send_frame(&mut self, frame: &SerialFrame) -> Result<()> {
        (**self).send_frame(frame)
    }
}

/// Reject duty cycles outside [0, 1] (NaN included)
pub(crate) fn check_duty(pin: u8, duty: f32) -> Result<()> {
    if (0.0..=1.0).contains(&duty) {
        Ok(())
    } else {
        Err(SerialError::DutyOutOfRange { pin, duty })
    }
}
