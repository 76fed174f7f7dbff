// High-level motor driver for the car
//
// Owns the serial link and the two PWM motor channels, and exposes the
// writes a direction/speed transition needs.

use tracing::{debug, info, warn};

use super::transport::{Result, SerialChannel, SerialFrame};
use crate::messages::Direction;

/// Enable (PWM) pins for the two motors
pub const MOTOR_PIN_LEFT: u8 = 3;
pub const MOTOR_PIN_RIGHT: u8 = 11;

/// One PWM-capable output pin driving a motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorChannel {
    pin: u8,
}

impl MotorChannel {
    pub fn new(pin: u8) -> Self {
        Self { pin }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Write a normalized duty cycle in [0, 1] through the given link
    pub fn write<S: SerialChannel + ?Sized>(&self, bus: &mut S, duty: f32) -> Result<()> {
        bus.write_pwm(self.pin, duty)
    }
}

/// Motor driver for the two-motor car
pub struct MotorDriver<S: SerialChannel> {
    bus: S,
    motors: [MotorChannel; 2], // [left, right]
}

impl<S: SerialChannel> MotorDriver<S> {
    /// Create a driver on the default pins
    pub fn new(bus: S) -> Self {
        Self::with_pins(bus, MOTOR_PIN_LEFT, MOTOR_PIN_RIGHT)
    }

    /// Create with custom pins
    pub fn with_pins(bus: S, left_pin: u8, right_pin: u8) -> Self {
        Self {
            bus,
            motors: [MotorChannel::new(left_pin), MotorChannel::new(right_pin)],
        }
    }

    /// Switch both motor pins to PWM output.
    ///
    /// Must be called before sending duty cycles to real hardware.
    pub fn initialize(&mut self) -> Result<()> {
        info!(
            "Configuring motor pins {} and {} for PWM",
            self.motors[0].pin(),
            self.motors[1].pin()
        );
        for motor in self.motors {
            self.bus.configure_pwm(motor.pin())?;
        }
        Ok(())
    }

    /// Send the MOTOR_DIRECTION frame for a moving direction.
    /// `Stop` has no frame, so nothing is sent for it.
    pub fn send_direction(&mut self, direction: Direction) -> Result<()> {
        match direction.code() {
            Some(code) => {
                debug!("Sending direction frame: {} (code {})", direction, code);
                self.bus.send_frame(&SerialFrame::direction(code))
            }
            None => Ok(()),
        }
    }

    /// Write the same duty cycle to both motors
    pub fn set_duty(&mut self, duty: f32) -> Result<()> {
        debug!("Setting motor duty: {:.3}", duty);
        for motor in self.motors {
            motor.write(&mut self.bus, duty)?;
        }
        Ok(())
    }

    /// Write a duty cycle to every motor even if some writes fail.
    /// Returns the first error.
    pub fn force_duty(&mut self, duty: f32) -> Result<()> {
        let mut first_err = None;
        for motor in self.motors {
            if let Err(e) = motor.write(&mut self.bus, duty) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Silence both motors
    pub fn stop(&mut self) -> Result<()> {
        self.set_duty(0.0)
    }
}

impl<S: SerialChannel> Drop for MotorDriver<S> {
    fn drop(&mut self) {
        // Never leave the motors running once nothing controls them
        if let Err(e) = self.force_duty(0.0) {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
