//! Per-client coalescing of session updates.
//!
//! Rapid status flips (working → awaiting → working within milliseconds)
//! would otherwise flood clients; updates buffer for up to the coalesce
//! window per session with last-write-wins, while removals and focus
//! changes bypass the buffer.

use std::collections::HashMap;
use std::time::Duration;

use jacques_protocol::Session;

/// Maximum delay a session update may sit in the buffer.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(50);

/// Last-write-wins buffer of pending session updates.
#[derive(Default)]
pub struct Coalescer {
    pending: HashMap<String, Box<Session>>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an update, replacing any pending one for the same session.
    pub fn push(&mut self, session: Box<Session>) {
        self.pending.insert(session.session_id.clone(), session);
    }

    /// Discard any pending update for a session (it is being removed; the
    /// removal message supersedes the buffered state).
    pub fn discard(&mut self, session_id: &str) {
        self.pending.remove(session_id);
    }

    /// Drain all pending updates for delivery.
    pub fn drain(&mut self) -> Vec<Box<Session>> {
        self.pending.drain().map(|(_, session)| session).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
