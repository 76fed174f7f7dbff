// Serial link, motor pins, topics
use std::num::NonZeroUsize;
use std::time::Duration;

use clap::Parser;

use crate::motor::firmata::{DEFAULT_BAUDRATE, DEFAULT_TIMEOUT_MS};
use crate::motor::{MOTOR_PIN_LEFT, MOTOR_PIN_RIGHT};

// Serial port for the Arduino running StandardFirmata
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

// Arduino resets when the port opens; give the bootloader time to hand over
pub const DEFAULT_SETTLE_MS: u64 = 2000;

// Zenoh topics
pub const TOPIC_CMD: &str = "car/cmd"; // commands
pub const TOPIC_EVENTS: &str = "car/events"; // controller events
pub const TOPIC_STATE: &str = "car/state"; // latest motor state

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Drive a two-motor Firmata car from zenoh commands")]
pub struct Config {
    /// Serial port of the board
    #[arg(long, default_value = DEFAULT_PORT)]
    pub port: String,

    /// Baud rate of the serial link
    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    pub baud: u32,

    /// PWM pin of the left motor (Firmata addresses pins 0-127)
    #[arg(long, default_value_t = MOTOR_PIN_LEFT, value_parser = clap::value_parser!(u8).range(0..=127))]
    pub left_pin: u8,

    /// PWM pin of the right motor
    #[arg(long, default_value_t = MOTOR_PIN_RIGHT, value_parser = clap::value_parser!(u8).range(0..=127))]
    pub right_pin: u8,

    /// Serial write timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub write_timeout_ms: u64,

    /// Delay after opening the port before the first write
    #[arg(long, default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,

    /// Keep at most this many command log entries (unbounded if omitted)
    #[arg(long)]
    pub log_capacity: Option<NonZeroUsize>,

    /// Use a simulated board instead of the serial port
    #[arg(long)]
    pub simulate: bool,

    /// Zenoh key expression commands are received on
    #[arg(long, default_value = TOPIC_CMD)]
    pub topic_cmd: String,

    /// Zenoh key expression controller events are published on
    #[arg(long, default_value = TOPIC_EVENTS)]
    pub topic_events: String,

    /// Zenoh key expression the motor state is published on after every command
    #[arg(long, default_value = TOPIC_STATE)]
    pub topic_state: String,
}

impl Config {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: DEFAULT_BAUDRATE,
            left_pin: MOTOR_PIN_LEFT,
            right_pin: MOTOR_PIN_RIGHT,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            log_capacity: None,
            simulate: false,
            topic_cmd: TOPIC_CMD.to_string(),
            topic_events: TOPIC_EVENTS.to_string(),
            topic_state: TOPIC_STATE.to_string(),
        }
    }
}
