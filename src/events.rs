// Event bus: synchronous fan-out of controller notifications to subscribers

use serde::Serialize;

use crate::history::LogEntry;
use crate::messages::{Direction, Speed, Transition};

/// Notification emitted by the controller after each operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    StateChanged { direction: Direction, speed: Speed },
    LogAppended { entry: LogEntry },
    LogCleared,
    TransitionFailed { attempted: Transition, reason: String },
}

/// Returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Handler = Box<dyn FnMut(&Event) + Send>;

/// Subscribers are called in subscription order, on the publishing thread.
/// Late subscribers do not see earlier events.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<(SubscriptionToken, Handler)>,
    next_token: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionToken
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.handlers.push((token, Box::new(handler)));
        token
    }

    /// Returns false if the token was not subscribed
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(t, _)| *t != token);
        self.handlers.len() != before
    }

    pub fn publish(&mut self, event: &Event) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}
