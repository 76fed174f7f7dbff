pub mod config;
pub mod controller;
pub mod events;
pub mod history;
pub mod messages;
pub mod motor;
pub mod runtime;

pub use controller::{ControllerError, MotionController};
pub use events::{Event, EventBus, SubscriptionToken};
pub use history::{CommandLog, LogEntry, LogKind};
pub use messages::{Command, Direction, MotorState, Speed};
