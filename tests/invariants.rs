use proptest::prelude::*;

use arduino_car_runtime::motor::{MotorDriver, SimulatedBus, MOTOR_PIN_LEFT, MOTOR_PIN_RIGHT};
use arduino_car_runtime::{CommandLog, Direction, LogKind, MotionController, Speed};

#[derive(Debug, Clone)]
enum Op {
    Issue(Direction),
    SetSpeed(i32),
    ClearLog,
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Stop),
        Just(Direction::Forward),
        Just(Direction::Backward),
        Just(Direction::Left),
        Just(Direction::Right),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => direction().prop_map(Op::Issue),
        4 => (-100i32..400).prop_map(Op::SetSpeed),
        1 => Just(Op::ClearLog),
    ]
}

proptest! {
    #[test]
    fn motors_follow_state(ops in prop::collection::vec(op(), 1..40)) {
        let (bus, monitor) = SimulatedBus::recording();
        let mut controller = MotionController::new(MotorDriver::new(bus), CommandLog::new());

        for op in ops {
            let writes_before = monitor.pwm_writes().len();
            let entries_before = controller.entries().len();
            let was_moving = controller.state().direction.is_moving();

            match op {
                Op::Issue(direction) => {
                    controller.issue(direction).unwrap();
                }
                Op::SetSpeed(value) => {
                    controller.set_speed(value).unwrap();
                    let last = controller.entries().last().map(|e| e.kind());
                    prop_assert_eq!(last, Some(LogKind::SpeedChange(Speed::clamped(value))));
                    prop_assert_eq!(controller.entries().len(), entries_before + 1);
                    if !was_moving {
                        prop_assert_eq!(monitor.pwm_writes().len(), writes_before);
                    }
                }
                Op::ClearLog => {
                    controller.clear_log();
                    prop_assert_eq!(controller.entries().len(), 0);
                }
            }

            // Whatever was written last is what the state says the motors do
            if !monitor.pwm_writes().is_empty() {
                let state = controller.state();
                let expected = if state.direction.is_moving() {
                    state.speed.duty()
                } else {
                    0.0
                };
                prop_assert_eq!(monitor.last_duty(MOTOR_PIN_LEFT), Some(expected));
                prop_assert_eq!(monitor.last_duty(MOTOR_PIN_RIGHT), Some(expected));
            }
        }
    }

    #[test]
    fn failed_transitions_change_nothing(ops in prop::collection::vec(op(), 1..20), target in direction()) {
        let (bus, monitor) = SimulatedBus::recording();
        let mut controller = MotionController::new(MotorDriver::new(bus), CommandLog::new());
        for op in ops {
            match op {
                Op::Issue(direction) => { controller.issue(direction).unwrap(); }
                Op::SetSpeed(value) => { controller.set_speed(value).unwrap(); }
                Op::ClearLog => controller.clear_log(),
            }
        }

        let state = controller.state();
        let entries = controller.entries().len();
        monitor.fail_frames(true);
        monitor.fail_pwm(true);

        prop_assert!(controller.issue(target).is_err());
        prop_assert_eq!(controller.state(), state);
        prop_assert_eq!(controller.entries().len(), entries);
    }
}
