//! Session state shared between the dispatch loop, the receive loop and the
//! display side.
//!
//! Everything here lives behind one mutex. Nothing may hold that lock across
//! a network call.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::info;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    NotStarted,
    AwaitingExtensions,
    Running,
    Finished,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::NotStarted => "not-started",
            SessionState::AwaitingExtensions => "awaiting-extensions",
            SessionState::Running => "running",
            SessionState::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Counters for traffic and dropped data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Server frames delivered to the message queue.
    pub frames_received: u64,
    /// Server deliveries dropped because they could not be parsed.
    pub frames_discarded: u64,
    /// Bytes skipped because they did not start a known header.
    pub bytes_skipped: u64,
    /// Commands sent to the server.
    pub commands_sent: u64,
    /// User input lines rejected locally.
    pub commands_rejected: u64,
}

/// Receives display lines drained from the session.
pub trait DisplaySink {
    fn push_line(&mut self, line: &str);
}

impl DisplaySink for Vec<String> {
    fn push_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state: SessionState,
    pub(crate) started: bool,
    pub(crate) input: VecDeque<String>,
    pub(crate) messages: VecDeque<String>,
    pub(crate) output: VecDeque<String>,
    pub(crate) stats: SessionStats,
    pub(crate) terminal_error: Option<String>,
}

impl Shared {
    pub(crate) fn transition(&mut self, to: SessionState) {
        if self.state == to || self.state == SessionState::Finished {
            return;
        }
        info!(from = %self.state, to = %to, "session state changed");
        self.state = to;
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }
}

/// Cloneable handle to a session's shared state.
///
/// This is the whole surface the display side needs: submit input, ask the
/// session to end, poll for completion and drain display lines.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<Shared>>,
}

impl SessionHandle {
    /// Queue one line of user input for the dispatch loop.
    pub fn submit_input(&self, line: impl Into<String>) {
        self.lock().input.push_back(line.into());
    }

    /// Ask the session to finish. Idempotent.
    pub fn request_end(&self) {
        self.lock().transition(SessionState::Finished);
    }

    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Take every pending display line.
    pub fn drain_output(&self) -> Vec<String> {
        self.lock().output.drain(..).collect()
    }

    /// Drain pending display lines into `sink`, returning how many were pushed.
    ///
    /// Lines are taken under the lock and pushed after it is released.
    pub fn pump_output<S: DisplaySink + ?Sized>(&self, sink: &mut S) -> usize {
        let lines = self.drain_output();
        for line in &lines {
            sink.push_line(line);
        }
        lines.len()
    }

    pub fn stats(&self) -> SessionStats {
        self.lock().stats
    }

    /// The error that ended the session, if it ended on one.
    pub fn terminal_error(&self) -> Option<String> {
        self.lock().terminal_error.clone()
    }

    /// Whether a `start` command has been sent.
    pub fn has_started(&self) -> bool {
        self.lock().started
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        f(&mut *self.lock())
    }

    /// Finish the session on a fatal error and tell the display side why.
    pub(crate) fn fail(&self, reason: String) {
        let mut shared = self.lock();
        if shared.terminal_error.is_none() {
            shared.output.push_back(format!("Connection closed: {reason}"));
            shared.terminal_error = Some(reason);
        }
        shared.transition(SessionState::Finished);
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_is_terminal() {
        let handle = SessionHandle::default();
        assert_eq!(handle.state(), SessionState::NotStarted);

        handle.request_end();
        assert!(handle.is_finished());

        handle.with(|s| s.transition(SessionState::Running));
        assert_eq!(handle.state(), SessionState::Finished);
    }

    #[test]
    fn pump_output_preserves_order() {
        let handle = SessionHandle::default();
        handle.with(|s| {
            s.output.push_back("one".to_string());
            s.output.push_back("two".to_string());
        });

        let mut sink: Vec<String> = Vec::new();
        assert_eq!(handle.pump_output(&mut sink), 2);
        assert_eq!(sink, vec!["one", "two"]);
        assert_eq!(handle.pump_output(&mut sink), 0);
    }

    #[test]
    fn fail_records_first_error_only() {
        let handle = SessionHandle::default();
        handle.fail("connection closed by peer".to_string());
        handle.fail("second".to_string());

        assert!(handle.is_finished());
        assert_eq!(
            handle.terminal_error().as_deref(),
            Some("connection closed by peer")
        );
        assert_eq!(
            handle.drain_output(),
            vec!["Connection closed: connection closed by peer"]
        );
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&SessionState::AwaitingExtensions).unwrap();
        assert_eq!(json, "\"awaiting_extensions\"");
    }
}
