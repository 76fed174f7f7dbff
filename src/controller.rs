// Motion controller: the direction/speed state machine
//
// Every operation either completes all of its device writes and then
// commits state, logs and notifies, or fails without touching state. A
// failure after some writes went out restores the device to that state.

use tracing::{debug, info, warn};

use crate::events::{Event, EventBus, SubscriptionToken};
use crate::history::{CommandLog, LogEntry, LogKind};
use crate::messages::{Command, Direction, MotorState, Speed, Transition};
use crate::motor::{MotorDriver, SerialChannel, SerialError};

/// Error types for controller operations
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Transition failed ({attempted}): {source}")]
    TransitionFailed {
        attempted: Transition,
        #[source]
        source: SerialError,
    },
}

/// Owns the motor driver, the authoritative state, the command log and the
/// event bus. One instance per device; all mutation goes through `&mut self`.
pub struct MotionController<S: SerialChannel> {
    driver: MotorDriver<S>,
    state: MotorState,
    log: CommandLog,
    events: EventBus,
}

impl<S: SerialChannel> MotionController<S> {
    /// Start stopped at speed 0
    pub fn new(driver: MotorDriver<S>, log: CommandLog) -> Self {
        Self {
            driver,
            state: MotorState::default(),
            log,
            events: EventBus::new(),
        }
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    /// Issue a direction. `Direction::Stop` silences the motors without
    /// sending a frame; the stored speed is kept for the next direction.
    pub fn issue(&mut self, direction: Direction) -> Result<MotorState, ControllerError> {
        let attempted = Transition::Issue { direction };
        let result = if direction.is_moving() {
            self.driver.send_direction(direction).and_then(|()| {
                let duty = self.state.speed.duty();
                self.set_duty_or_rollback(duty, true)
            })
        } else {
            self.set_duty_or_rollback(0.0, false)
        };
        self.check(attempted, result)?;

        info!("Direction: {}", direction);
        self.state.direction = direction;
        self.publish_state();
        self.append(LogKind::Direction(direction));
        Ok(self.state)
    }

    /// Set the speed, clamping to [0, 255]. Motors only pick it up while a
    /// direction is active; when stopped the value is just remembered.
    pub fn set_speed(&mut self, value: i32) -> Result<MotorState, ControllerError> {
        let speed = Speed::clamped(value);
        if i32::from(speed.value()) != value {
            debug!("Speed {} clamped to {}", value, speed);
        }

        if self.state.direction.is_moving() {
            let result = self.set_duty_or_rollback(speed.duty(), false);
            self.check(Transition::SetSpeed { speed }, result)?;
        }

        info!("Speed: {}", speed);
        self.state.speed = speed;
        self.publish_state();
        self.append(LogKind::SpeedChange(speed));
        Ok(self.state)
    }

    pub fn clear_log(&mut self) {
        info!("Clearing command log ({} entries)", self.log.len());
        self.log.clear();
        self.events.publish(&Event::LogCleared);
    }

    /// Apply a wire command
    pub fn apply(&mut self, command: Command) -> Result<MotorState, ControllerError> {
        match command {
            Command::Forward => self.issue(Direction::Forward),
            Command::Backward => self.issue(Direction::Backward),
            Command::Left => self.issue(Direction::Left),
            Command::Right => self.issue(Direction::Right),
            Command::Stop => self.issue(Direction::Stop),
            Command::SetSpeed { value } => self.set_speed(value),
            Command::ClearLog => {
                self.clear_log();
                Ok(self.state)
            }
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        self.events.unsubscribe(token)
    }

    /// Log entries in insertion order
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &LogEntry> + '_ {
        self.log.entries()
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    /// Write `duty` to both motors. A write failing part way leaves the
    /// motors split, so put the device back to the committed state first.
    fn set_duty_or_rollback(&mut self, duty: f32, frame_sent: bool) -> Result<(), SerialError> {
        match self.driver.set_duty(duty) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.rollback(frame_sent);
                Err(e)
            }
        }
    }

    /// Best-effort restore of the device to `self.state`
    fn rollback(&mut self, frame_sent: bool) {
        let prior = self.state;
        warn!("Restoring motors to {:?} {}", prior.direction, prior.speed);

        if frame_sent && prior.direction.is_moving() {
            if let Err(e) = self.driver.send_direction(prior.direction) {
                warn!("Failed to restore direction frame: {}", e);
            }
        }
        if let Err(e) = self.driver.force_duty(prior.effective_duty()) {
            warn!("Failed to restore motor duty: {}", e);
        }
    }

    fn check(
        &mut self,
        attempted: Transition,
        result: Result<(), SerialError>,
    ) -> Result<(), ControllerError> {
        result.map_err(|source| {
            warn!("Failed to {}: {}", attempted, source);
            self.events.publish(&Event::TransitionFailed {
                attempted,
                reason: source.to_string(),
            });
            ControllerError::TransitionFailed { attempted, source }
        })
    }

    fn publish_state(&mut self) {
        self.events.publish(&Event::StateChanged {
            direction: self.state.direction,
            speed: self.state.speed,
        });
    }

    fn append(&mut self, kind: LogKind) {
        let entry = self.log.append(kind).clone();
        self.events.publish(&Event::LogAppended { entry });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::sim::{BusMonitor, SimulatedBus};
    use crate::motor::{MOTOR_PIN_LEFT, MOTOR_PIN_RIGHT};

    fn controller() -> (MotionController<SimulatedBus>, BusMonitor) {
        let (bus, monitor) = SimulatedBus::recording();
        let controller = MotionController::new(MotorDriver::new(bus), CommandLog::new());
        (controller, monitor)
    }

    #[test]
    fn test_starts_stopped() {
        let (controller, monitor) = controller();
        assert_eq!(controller.state(), MotorState::default());
        assert_eq!(controller.entries().len(), 0);
        assert!(monitor.writes().is_empty());
    }

    #[test]
    fn test_apply_maps_commands() {
        let (mut controller, _monitor) = controller();

        let state = controller.apply(Command::SetSpeed { value: 90 }).unwrap();
        assert_eq!(state.speed, Speed::new(90));

        let state = controller.apply(Command::Backward).unwrap();
        assert_eq!(state.direction, Direction::Backward);

        let state = controller.apply(Command::Stop).unwrap();
        assert_eq!(state.direction, Direction::Stop);
        assert_eq!(state.speed, Speed::new(90));

        controller.apply(Command::ClearLog).unwrap();
        assert_eq!(controller.entries().len(), 0);
    }

    #[test]
    fn test_speed_failure_keeps_state() {
        let (mut controller, monitor) = controller();
        controller.set_speed(50).unwrap();
        controller.issue(Direction::Forward).unwrap();

        monitor.fail_pwm(true);
        let err = controller.set_speed(200).unwrap_err();
        assert!(matches!(
            err,
            ControllerError::TransitionFailed {
                attempted: Transition::SetSpeed { .. },
                ..
            }
        ));
        assert_eq!(controller.state().speed, Speed::new(50));
        assert_eq!(controller.entries().len(), 2);
    }

    #[test]
    fn test_split_speed_write_is_rolled_back() {
        let (mut controller, monitor) = controller();
        controller.set_speed(50).unwrap();
        controller.issue(Direction::Forward).unwrap();

        monitor.fail_nth_pwm(2);
        assert!(controller.set_speed(200).is_err());

        let duty = Speed::new(50).duty();
        assert_eq!(monitor.last_duty(MOTOR_PIN_LEFT), Some(duty));
        assert_eq!(monitor.last_duty(MOTOR_PIN_RIGHT), Some(duty));
        assert_eq!(controller.state().speed, Speed::new(50));
    }

    #[test]
    fn test_stop_failure_keeps_direction() {
        let (mut controller, monitor) = controller();
        controller.issue(Direction::Right).unwrap();

        monitor.fail_pwm(true);
        assert!(controller.issue(Direction::Stop).is_err());
        assert_eq!(controller.state().direction, Direction::Right);
    }
}
