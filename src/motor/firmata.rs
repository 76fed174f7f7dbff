// Firmata serial protocol implementation (StandardFirmata + custom sysex)
//
// Messages used:
//   SET_PIN_MODE    [0xF4, pin, mode]
//   ANALOG_MESSAGE  [0xE0 | pin, lsb7, msb7]            (pins 0-15)
//   EXTENDED_ANALOG [0xF0, 0x6F, pin, lsb7, msb7, 0xF7]  (pins above 15)
//   SYSEX           [0xF0, opcode, payload..., 0xF7]

use serialport::{self, SerialPort};
use std::io::{ErrorKind, Write};
use std::time::Duration;
use tracing::{debug, info};

use super::transport::{check_duty, Result, SerialChannel, SerialError, SerialFrame};

/// Default serial configuration for StandardFirmata
pub const DEFAULT_BAUDRATE: u32 = 57_600;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Command bytes
const START_SYSEX: u8 = 0xF0;
const END_SYSEX: u8 = 0xF7;
const SET_PIN_MODE: u8 = 0xF4;
const ANALOG_MESSAGE: u8 = 0xE0;
const EXTENDED_ANALOG: u8 = 0x6F;

/// SET_PIN_MODE mode byte for PWM output
const PIN_MODE_PWM: u8 = 3;

/// Highest pin addressable by a plain ANALOG_MESSAGE
const MAX_ANALOG_MESSAGE_PIN: u8 = 15;

/// Data bytes carry 7 bits; anything higher would read as a command byte
const MAX_DATA_BYTE: u8 = 0x7F;

/// Firmata link to the board - handles serial communication
pub struct FirmataBus {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl FirmataBus {
    /// Open a connection to the board; writes fail after `timeout`
    pub fn open_with_timeout(port_name: &str, baudrate: u32, timeout: Duration) -> Result<Self> {
        info!("Opening Firmata link on {} at {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(timeout)
            .open()
            .map_err(|source| SerialError::Connection {
                port: port_name.to_string(),
                baud: baudrate,
                source,
            })?;

        Ok(Self { port, timeout })
    }

    /// Reject bytes that do not fit in a 7-bit data byte
    fn check_data_byte(byte: u8) -> Result<u8> {
        if byte > MAX_DATA_BYTE {
            Err(SerialError::PayloadOutOfRange { byte })
        } else {
            Ok(byte)
        }
    }

    /// Build a SET_PIN_MODE message switching a pin to PWM
    fn pwm_mode_message(pin: u8) -> Result<Vec<u8>> {
        Ok(vec![SET_PIN_MODE, Self::check_data_byte(pin)?, PIN_MODE_PWM])
    }

    /// Build an analog write, falling back to extended analog for high pins
    fn analog_message(pin: u8, value: u16) -> Result<Vec<u8>> {
        let pin = Self::check_data_byte(pin)?;
        let lsb = (value & 0x7F) as u8;
        let msb = ((value >> 7) & 0x7F) as u8;

        if pin <= MAX_ANALOG_MESSAGE_PIN {
            Ok(vec![ANALOG_MESSAGE | pin, lsb, msb])
        } else {
            Ok(vec![START_SYSEX, EXTENDED_ANALOG, pin, lsb, msb, END_SYSEX])
        }
    }

    /// Build a sysex message; every data byte must fit in 7 bits
    fn sysex_message(command: u8, data: &[u8]) -> Result<Vec<u8>> {
        for &byte in std::iter::once(&command).chain(data) {
            Self::check_data_byte(byte)?;
        }

        let mut packet = Vec::with_capacity(data.len() + 3);
        packet.push(START_SYSEX);
        packet.push(command);
        packet.extend_from_slice(data);
        packet.push(END_SYSEX);
        Ok(packet)
    }

    /// Map a [0, 1] duty cycle onto the 8-bit PWM range
    fn duty_to_value(duty: f32) -> u16 {
        (duty * 255.0).round() as u16
    }

    /// Write a message to the port
    fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        let timed_out = |e: std::io::Error| {
            if e.kind() == ErrorKind::TimedOut {
                SerialError::Timeout(timeout)
            } else {
                SerialError::Io(e)
            }
        };

        self.port.write_all(packet).map_err(timed_out)?;
        self.port.flush().map_err(timed_out)?;
        Ok(())
    }

    /// Switch a pin to PWM output
    pub fn set_pwm_mode(&mut self, pin: u8) -> Result<()> {
        debug!("Set pin {} mode PWM", pin);
        let packet = Self::pwm_mode_message(pin)?;
        self.send_packet(&packet)
    }

    /// Write a raw analog (PWM) value to a pin
    pub fn analog_write(&mut self, pin: u8, value: u16) -> Result<()> {
        debug!("Analog write pin {}: value={}", pin, value);
        let packet = Self::analog_message(pin, value)?;
        self.send_packet(&packet)
    }

    /// Send a sysex command
    pub fn send_sysex(&mut self, command: u8, data: &[u8]) -> Result<()> {
        let packet = Self::sysex_message(command, data)?;
        debug!("Sysex 0x{:02X}: {:02X?}", command, data);
        self.send_packet(&packet)
    }
}

impl SerialChannel for FirmataBus {
    fn configure_pwm(&mut self, pin: u8) -> Result<()> {
        self.set_pwm_mode(pin)
    }

    fn write_pwm(&mut self, pin: u8, duty: f32) -> Result<()> {
        check_duty(pin, duty)?;
        self.analog_write(pin, Self::duty_to_value(duty))
    }

    fn send_frame(&mut self, frame: &SerialFrame) -> Result<()> {
        self.send_sysex(frame.opcode, &frame.payload)
    }
}
