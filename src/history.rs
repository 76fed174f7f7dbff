// Command history: timestamped record of accepted commands and speed changes

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::messages::{Direction, Speed};

/// What a log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LogKind {
    Direction(Direction),
    SpeedChange(Speed),
}

/// One accepted command. Fields are private; entries never change once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    seq: u64,
    timestamp: DateTime<Local>,
    #[serde(flatten)]
    kind: LogKind,
}

impl LogEntry {
    /// Monotonic sequence number, not reset by `clear`
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn kind(&self) -> LogKind {
        self.kind
    }
}

/// Wall-clock format used when rendering entries
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.timestamp.format(TIMESTAMP_FORMAT))?;
        match self.kind {
            LogKind::Direction(direction) => write!(f, "Moved {}", direction),
            LogKind::SpeedChange(speed) => write!(f, "Speed changed to {}", speed),
        }
    }
}

/// Append-only command log with an optional capacity cap
#[derive(Debug, Default)]
pub struct CommandLog {
    entries: VecDeque<LogEntry>,
    capacity: Option<NonZeroUsize>,
    next_seq: u64,
}

impl CommandLog {
    /// Unbounded log
    pub fn new() -> Self {
        Self::default()
    }

    /// Log keeping at most `capacity` entries; the oldest are evicted first
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Log with an optional cap, as read from configuration
    pub fn with_capacity_limit(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Record a new entry stamped with the current time
    pub fn append(&mut self, kind: LogKind) -> &LogEntry {
        if let Some(cap) = self.capacity {
            while self.entries.len() >= cap.get() {
                self.entries.pop_front();
            }
        }

        let entry = LogEntry {
            seq: self.next_seq,
            timestamp: Local::now(),
            kind,
        };
        self.next_seq += 1;
        self.entries.push_back(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in insertion order
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &LogEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[test]
    fn test_append_in_order() {
        let mut log = CommandLog::new();
        log.append(LogKind::Direction(Direction::Forward));
        log.append(LogKind::SpeedChange(Speed::new(128)));

        let kinds: Vec<_> = log.entries().map(LogEntry::kind).collect();
        assert_eq!(
            kinds,
            vec![
                LogKind::Direction(Direction::Forward),
                LogKind::SpeedChange(Speed::new(128)),
            ]
        );

        let seqs: Vec<_> = log.entries().map(LogEntry::seq).collect();
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn test_clear_keeps_sequence() {
        let mut log = CommandLog::new();
        log.append(LogKind::Direction(Direction::Left));
        log.clear();
        assert!(log.is_empty());

        let entry = log.append(LogKind::Direction(Direction::Stop));
        assert_eq!(entry.seq(), 1);
    }

    #[test]
    fn test_bounded_evicts_oldest() {
        let mut log = CommandLog::bounded(NonZeroUsize::new(2).unwrap());
        for speed in [10, 20, 30] {
            log.append(LogKind::SpeedChange(Speed::new(speed)));
        }

        assert_eq!(log.len(), 2);
        let first = log.entries().next().unwrap();
        assert_eq!(first.kind(), LogKind::SpeedChange(Speed::new(20)));
    }

    fn split_rendered(entry: &LogEntry) -> (String, String) {
        let rendered = entry.to_string();
        let (stamp, message) = rendered
            .strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
            .expect("entry starts with a bracketed timestamp");
        (stamp.to_string(), message.to_string())
    }

    #[test]
    fn test_display() {
        let mut log = CommandLog::new();
        let entry = log.append(LogKind::Direction(Direction::Backward)).clone();
        let (stamp, message) = split_rendered(&entry);
        assert_eq!(message, "Moved Backward");
        assert_eq!(stamp, entry.timestamp().format(TIMESTAMP_FORMAT).to_string());
        assert!(NaiveDateTime::parse_from_str(&stamp, TIMESTAMP_FORMAT).is_ok());

        let entry = log.append(LogKind::SpeedChange(Speed::new(64))).clone();
        let (_, message) = split_rendered(&entry);
        assert_eq!(message, "Speed changed to 64");
    }

    #[test]
    fn test_entry_json() {
        let mut log = CommandLog::new();
        let entry = log.append(LogKind::Direction(Direction::Right)).clone();
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["seq"], 0);
        assert!(json["timestamp"].is_string());
        assert_eq!(json["kind"], "direction");
        assert_eq!(json["value"], "right");
    }
}
