//! Log capture for supervised processes.
//!
//! Each service owns a bounded [`LogBuffer`]. Background pump tasks read the
//! child's stdout and stderr line by line and append a [`LogEntry`] with a
//! level inferred from the line's text.

use crate::registry::ServiceHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default maximum number of log lines to keep in memory per service.
pub const DEFAULT_MAX_LOG_LINES: usize = 1000;

/// Fraction of capacity at which a one-time warning is emitted.
const LOG_BUFFER_WARNING_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Infer a level from the keywords Java logging frameworks print.
    ///
    /// ```
    /// use devdeck::service::LogLevel;
    ///
    /// assert_eq!(LogLevel::infer("2024-01-01 ERROR o.s.boot Application failed"), LogLevel::Error);
    /// assert_eq!(LogLevel::infer("java.lang.IllegalStateException: boom"), LogLevel::Error);
    /// assert_eq!(LogLevel::infer(" WARN  Deprecated property"), LogLevel::Warn);
    /// assert_eq!(LogLevel::infer("Started Application in 3.2 seconds"), LogLevel::Info);
    /// ```
    pub fn infer(line: &str) -> LogLevel {
        if ["ERROR", "FATAL", "SEVERE", "Exception"]
            .iter()
            .any(|k| line.contains(k))
        {
            LogLevel::Error
        } else if line.contains("WARN") {
            LogLevel::Warn
        } else if line.contains("DEBUG") || line.contains("TRACE") {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    /// An entry for a captured output line, with an inferred level.
    pub fn from_line(line: impl Into<String>) -> Self {
        let message = line.into();
        Self::new(LogLevel::infer(&message), message)
    }
}

/// Ring buffer of the most recent log entries of one service.
///
/// The oldest entry is evicted once `capacity` is reached; evictions are
/// counted in `dropped`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    dropped: u64,
    #[serde(skip)]
    warned: bool,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_LOG_LINES)
    }
}

impl LogBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_MAX_LOG_LINES)),
            capacity,
            dropped: 0,
            warned: false,
        }
    }

    /// Append an entry, evicting the oldest when full.
    ///
    /// Returns `true` exactly once: the first time the buffer reaches the
    /// warning threshold.
    pub fn push(&mut self, entry: LogEntry) -> bool {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);

        let threshold = ((self.capacity as f64) * LOG_BUFFER_WARNING_THRESHOLD).ceil() as usize;
        if !self.warned && self.entries.len() >= threshold {
            self.warned = true;
            return true;
        }
        false
    }

    /// The last `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Spawn a task that appends every line of `reader` to the service's logs.
///
/// The task ends at EOF, on a read error, or when `shutdown` is cancelled.
pub fn spawn_log_pump<R>(
    reader: R,
    service: ServiceHandle,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => {
                    match read {
                        Ok(0) => break,
                        Ok(_) => {
                            let line = decode_line(&buf);
                            buf.clear();
                            service.write().append_log(LogEntry::from_line(line));
                        }
                        Err(e) => {
                            tracing::debug!("Log stream closed with error: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    })
}

/// Decode one raw output line, dropping the line terminator.
fn decode_line(raw: &[u8]) -> String {
    let trimmed = raw.strip_suffix(b"\n").unwrap_or(raw);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    String::from_utf8_lossy(trimmed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_line_strips_terminators_and_replaces_invalid_bytes() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"crlf\r\n"), "crlf");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"caf\xe9\n"), "caf\u{FFFD}");
    }

    #[test]
    fn infer_prefers_error_over_warn() {
        assert_eq!(LogLevel::infer("WARN then FATAL"), LogLevel::Error);
        assert_eq!(LogLevel::infer("SEVERE: pool exhausted"), LogLevel::Error);
        assert_eq!(LogLevel::infer("TRACE o.h.SQL"), LogLevel::Debug);
        assert_eq!(LogLevel::infer("warning lowercase"), LogLevel::Info);
    }

    #[test]
    fn buffer_never_exceeds_capacity() {
        let mut buf = LogBuffer::with_capacity(3);
        for i in 0..10 {
            buf.push(LogEntry::new(LogLevel::Info, format!("line {}", i)));
            assert!(buf.len() <= 3);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.dropped(), 7);
        let messages: Vec<_> = buf.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["line 7", "line 8", "line 9"]);
    }

    #[test]
    fn threshold_signal_fires_once() {
        let mut buf = LogBuffer::with_capacity(10);
        let signals: Vec<bool> = (0..20)
            .map(|i| buf.push(LogEntry::new(LogLevel::Info, i.to_string())))
            .collect();
        assert_eq!(signals.iter().filter(|s| **s).count(), 1);
        // 8th push reaches 80% of 10
        assert!(signals[7]);
    }

    #[test]
    fn tail_returns_newest_in_order() {
        let mut buf = LogBuffer::with_capacity(5);
        for i in 0..4 {
            buf.push(LogEntry::new(LogLevel::Info, i.to_string()));
        }
        let tail: Vec<_> = buf.tail(2).into_iter().map(|e| e.message).collect();
        assert_eq!(tail, vec!["2", "3"]);
        assert_eq!(buf.tail(100).len(), 4);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut buf = LogBuffer::with_capacity(0);
        buf.push(LogEntry::new(LogLevel::Info, "a"));
        buf.push(LogEntry::new(LogLevel::Info, "b"));
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.capacity(), 1);
    }
}
