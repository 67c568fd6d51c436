use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// One append-only log line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStream {
    Info,
    Debug,
}

/// A record paired with the stream it was appended to; broadcast to live
/// subscribers as it is written.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub stream: LogStream,
    pub record: LogRecord,
}

/// The engine's observational side channel: two append-only streams (info and
/// debug) plus a broadcast sender for live tailing. `log`/`error`/debug-node
/// writes all land here; retrieval and clearing are plain reads over the
/// stores.
pub struct LogStore {
    info: Mutex<Vec<LogRecord>>,
    debug: Mutex<Vec<LogRecord>>,
    sender: broadcast::Sender<LogEvent>,
}

impl LogStore {
    pub fn new(live_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(live_capacity);
        Self {
            info: Mutex::new(Vec::new()),
            debug: Mutex::new(Vec::new()),
            sender,
        }
    }

    pub fn append(&self, stream: LogStream, message: impl Into<String>) {
        let record = LogRecord {
            timestamp: Utc::now(),
            message: message.into(),
        };
        match stream {
            LogStream::Info => tracing::info!(target: "wireflow::log", "{}", record.message),
            LogStream::Debug => tracing::debug!(target: "wireflow::log", "{}", record.message),
        }
        self.push(stream, record);
    }

    /// Failure records: stored on the debug stream, traced once at error
    /// level.
    pub fn append_error(&self, message: impl Into<String>) {
        let record = LogRecord {
            timestamp: Utc::now(),
            message: message.into(),
        };
        tracing::error!(target: "wireflow::log", "{}", record.message);
        self.push(LogStream::Debug, record);
    }

    fn push(&self, stream: LogStream, record: LogRecord) {
        match stream {
            LogStream::Info => self.info.lock().expect("log store poisoned").push(record.clone()),
            LogStream::Debug => self.debug.lock().expect("log store poisoned").push(record.clone()),
        }
        let _ = self.sender.send(LogEvent { stream, record });
    }

    pub fn records(&self, stream: LogStream) -> Vec<LogRecord> {
        match stream {
            LogStream::Info => self.info.lock().expect("log store poisoned").clone(),
            LogStream::Debug => self.debug.lock().expect("log store poisoned").clone(),
        }
    }

    pub fn clear(&self, stream: LogStream) {
        match stream {
            LogStream::Info => self.info.lock().expect("log store poisoned").clear(),
            LogStream::Debug => self.debug.lock().expect("log store poisoned").clear(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    /// Writer scoped to one node (or other component); prefixes every record.
    pub fn writer(self: &Arc<Self>, scope: impl Into<String>) -> LogWriter {
        LogWriter {
            store: Arc::clone(self),
            scope: scope.into(),
        }
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Scoped handle nodes write through. Clones are cheap; safe to use from
/// concurrent branches.
#[derive(Clone)]
pub struct LogWriter {
    store: Arc<LogStore>,
    scope: String,
}

impl LogWriter {
    pub fn info(&self, message: impl fmt::Display) {
        self.store
            .append(LogStream::Info, format!("[{}] {}", self.scope, message));
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.store
            .append(LogStream::Debug, format!("[{}] {}", self.scope, message));
    }

    /// Record a failure without throwing across the graph.
    pub fn error(&self, text: impl fmt::Display, cause: Option<&dyn fmt::Display>) {
        let line = match cause {
            Some(cause) => format!("[{}] error: {}: {}", self.scope, text, cause),
            None => format!("[{}] error: {}", self.scope, text),
        };
        self.store.append_error(line);
    }

    pub fn store(&self) -> &Arc<LogStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_lands_on_debug_stream() {
        let store = Arc::new(LogStore::default());
        let writer = store.writer("node-1");
        writer.info("hello");
        writer.error("bad things", Some(&"cause"));

        assert_eq!(store.records(LogStream::Info).len(), 1);
        let debug = store.records(LogStream::Debug);
        assert_eq!(debug.len(), 1);
        assert!(debug[0].message.contains("bad things"));
        assert!(debug[0].message.contains("cause"));
    }

    #[test]
    fn error_produces_exactly_one_record_and_event() {
        let store = Arc::new(LogStore::default());
        let mut events = store.subscribe();
        store.writer("node-1").error("boom", None);

        assert_eq!(store.records(LogStream::Debug).len(), 1);
        let event = events.try_recv().unwrap();
        assert_eq!(event.stream, LogStream::Debug);
        assert!(event.record.message.contains("boom"));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn clear_empties_one_stream_only() {
        let store = Arc::new(LogStore::default());
        store.append(LogStream::Info, "a");
        store.append(LogStream::Debug, "b");
        store.clear(LogStream::Debug);
        assert_eq!(store.records(LogStream::Info).len(), 1);
        assert!(store.records(LogStream::Debug).is_empty());
    }
}
