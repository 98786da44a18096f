//! Bounded record of a protocol conversation.
//!
//! A [`Transcript`] is attached to a [`Connection`](super::Connection) and
//! survives STARTTLS upgrades. Handles are cheap clones sharing one log, so
//! the probe can still read the conversation after its client is dropped
//! by a failure or a deadline.

use std::sync::{Arc, Mutex};

/// Entries kept before further traffic is only counted.
pub const MAX_TRANSCRIPT_ENTRIES: usize = 200;

/// Longest entry kept, in characters.
pub const MAX_ENTRY_LEN: usize = 512;

#[derive(Debug, Default)]
struct Log {
    entries: Vec<String>,
    dropped: usize,
}

/// Shared, size-capped conversation log.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    log: Arc<Mutex<Log>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a line sent by the client.
    pub fn client(&self, line: &str) {
        self.push("C", line);
    }

    /// Record a line received from the server.
    pub fn server(&self, line: &str) {
        self.push("S", line);
    }

    fn push(&self, side: &str, line: &str) {
        let Ok(mut log) = self.log.lock() else {
            return;
        };
        if log.entries.len() >= MAX_TRANSCRIPT_ENTRIES {
            log.dropped += 1;
            return;
        }
        let entry = if line.chars().count() > MAX_ENTRY_LEN {
            let kept: String = line.chars().take(MAX_ENTRY_LEN).collect();
            format!("{side}: {kept}...")
        } else {
            format!("{side}: {line}")
        };
        log.entries.push(entry);
    }

    /// Snapshot of the conversation so far.
    ///
    /// When entries were dropped, a final line says how many.
    pub fn lines(&self) -> Vec<String> {
        let Ok(log) = self.log.lock() else {
            return Vec::new();
        };
        let mut lines = log.entries.clone();
        if log.dropped > 0 {
            lines.push(format!("[{} more lines not recorded]", log.dropped));
        }
        lines
    }
}
