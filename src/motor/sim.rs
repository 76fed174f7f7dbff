// In-process stand-in for the board
//
// Used by `--simulate` to run without hardware, and by tests to record
// every write and inject transport failures.

use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::transport::{check_duty, Result, SerialChannel, SerialError, SerialFrame};

/// One write observed on the simulated bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusWrite {
    PinMode { pin: u8 },
    Pwm { pin: u8, duty: f32 },
    Frame(SerialFrame),
}

#[derive(Debug, Default)]
struct Shared {
    journal: Vec<BusWrite>,
    fail_frames: bool,
    fail_pwm: bool,
    // PWM writes left before a single injected failure
    pwm_countdown: Option<usize>,
}

/// Simulated serial link
pub struct SimulatedBus {
    shared: Option<Arc<Mutex<Shared>>>,
}

/// Handle for inspecting a recording bus and injecting faults
#[derive(Clone)]
pub struct BusMonitor {
    shared: Arc<Mutex<Shared>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedBus {
    /// A bus that only logs writes
    pub fn new() -> Self {
        Self { shared: None }
    }

    /// A bus that also records writes, plus the monitor to read them back
    pub fn recording() -> (Self, BusMonitor) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let monitor = BusMonitor {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                shared: Some(shared),
            },
            monitor,
        )
    }

    fn record(&mut self, write: BusWrite, fails: impl FnOnce(&mut Shared) -> bool) -> Result<()> {
        if let Some(shared) = &self.shared {
            let mut shared = lock(shared);
            if fails(&mut *shared) {
                return Err(SerialError::Io(std::io::Error::new(
                    ErrorKind::BrokenPipe,
                    "simulated transport failure",
                )));
            }
            shared.journal.push(write);
        }
        Ok(())
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialChannel for SimulatedBus {
    fn configure_pwm(&mut self, pin: u8) -> Result<()> {
        debug!("[sim] pin {} -> PWM", pin);
        self.record(BusWrite::PinMode { pin }, |_| false)
    }

    fn write_pwm(&mut self, pin: u8, duty: f32) -> Result<()> {
        check_duty(pin, duty)?;
        debug!("[sim] pwm pin {}: duty={:.3}", pin, duty);
        self.record(BusWrite::Pwm { pin, duty }, |s| {
            let nth_failed = match s.pwm_countdown {
                Some(1) => {
                    s.pwm_countdown = None;
                    true
                }
                Some(n) => {
                    s.pwm_countdown = Some(n - 1);
                    false
                }
                None => false,
            };
            s.fail_pwm || nth_failed
        })
    }

    fn send_frame(&mut self, frame: &SerialFrame) -> Result<()> {
        debug!("[sim] frame 0x{:02X}: {:02X?}", frame.opcode, frame.payload);
        self.record(BusWrite::Frame(frame.clone()), |s| s.fail_frames)
    }
}

impl BusMonitor {
    /// Every successful write, in order
    pub fn writes(&self) -> Vec<BusWrite> {
        lock(&self.shared).journal.clone()
    }

    /// Successful PWM writes as (pin, duty)
    pub fn pwm_writes(&self) -> Vec<(u8, f32)> {
        lock(&self.shared)
            .journal
            .iter()
            .filter_map(|w| match w {
                BusWrite::Pwm { pin, duty } => Some((*pin, *duty)),
                _ => None,
            })
            .collect()
    }

    /// Successfully sent frames
    pub fn frames(&self) -> Vec<SerialFrame> {
        lock(&self.shared)
            .journal
            .iter()
            .filter_map(|w| match w {
                BusWrite::Frame(frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last duty written to a pin
    pub fn last_duty(&self, pin: u8) -> Option<f32> {
        self.pwm_writes()
            .into_iter()
            .rev()
            .find(|&(p, _)| p == pin)
            .map(|(_, duty)| duty)
    }

    pub fn clear(&self) {
        lock(&self.shared).journal.clear();
    }

    /// Make every following frame send fail
    pub fn fail_frames(&self, fail: bool) {
        lock(&self.shared).fail_frames = fail;
    }

    /// Make every following PWM write fail
    pub fn fail_pwm(&self, fail: bool) {
        lock(&self.shared).fail_pwm = fail;
    }

    /// Fail only the `n`th PWM write from now (1-based); later writes succeed
    pub fn fail_nth_pwm(&self, n: usize) {
        lock(&self.shared).pwm_countdown = (n > 0).then_some(n);
    }
}
