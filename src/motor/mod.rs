// Motor control module for the two-motor car
//
// Provides:
// - Serial transport abstraction (frames + PWM writes)
// - Firmata serial protocol implementation
// - Simulated bus for running without hardware
// - Motor driver owning the link and both PWM channels

mod driver;
pub mod firmata;
pub mod sim;
pub mod transport;

pub use driver::{MotorChannel, MotorDriver, MOTOR_PIN_LEFT, MOTOR_PIN_RIGHT};
pub use firmata::FirmataBus;
pub use sim::{BusWrite, BusMonitor, SimulatedBus};
pub use transport::{SerialChannel, SerialError, SerialFrame, MOTOR_DIRECTION};
