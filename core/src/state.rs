//! Shared State
//!
//! The mutable state every module can see: the message log shown in the
//! messages panel and a free-form key/value namespace for modules that
//! collaborate. It is owned by the application and handed out as `&mut`,
//! never through a global.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Default number of log entries kept
pub const DEFAULT_MESSAGE_CAPACITY: usize = 300;

/// Severity of a log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Routine information
    Info,
    /// Something the user should notice
    Warn,
    /// A failure that was contained
    Error,
}

/// One line of the message log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    /// When it was logged
    pub at: DateTime<Local>,
    /// Severity
    pub level: LogLevel,
    /// Text
    pub text: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.at.format("%H:%M:%S"), self.text)
    }
}

/// Append-only log with a fixed capacity; the oldest entry is evicted first
#[derive(Clone, Debug)]
pub struct MessageLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    evicted: u64,
}

impl MessageLog {
    /// Create a log holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append an entry
    pub fn push(&mut self, level: LogLevel, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(LogEntry {
            at: Local::now(),
            level,
            text: text.into(),
        });
    }

    /// Append an info entry
    pub fn info(&mut self, text: impl Into<String>) {
        self.push(LogLevel::Info, text);
    }

    /// Append a warning
    pub fn warn(&mut self, text: impl Into<String>) {
        self.push(LogLevel::Warn, text);
    }

    /// Append an error
    pub fn error(&mut self, text: impl Into<String>) {
        self.push(LogLevel::Error, text);
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator + '_ {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first
    pub fn tail(&self, n: usize) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// The newest entry
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    /// Entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped to make room so far
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_CAPACITY)
    }
}

/// State shared by all modules of one application
#[derive(Clone, Debug, Default)]
pub struct SharedState {
    /// The message log
    pub messages: MessageLog,
    values: HashMap<String, Value>,
}

impl SharedState {
    /// Create state with a message log of the given capacity
    pub fn new(message_capacity: usize) -> Self {
        Self {
            messages: MessageLog::new(message_capacity),
            values: HashMap::new(),
        }
    }

    /// Raw value under a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed value under a key; `None` if missing or of another shape
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store a value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Serialize) -> Option<Value> {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.insert(key.into(), value)
    }

    /// Remove a key
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Keys currently set, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
