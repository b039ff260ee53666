//! Chat session state machine.
//!
//! `Idle -> Opening -> Streaming -> {Committing | Aborted | Failed} -> Idle`.
//! Every transport callback carries the `RunId` it belongs to; callbacks for a
//! run that is no longer current are dropped, so nothing that arrives after
//! an abort can touch history or the pending reply.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::constants::CURSOR_MARKER;
use crate::models::Message;
use crate::streaming::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Opening,
    Streaming,
    Committing,
    Aborted,
    Failed,
}

/// Generation counter for runs within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// What the view should render after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// History was replaced; scroll to the bottom
    HistoryLoaded { len: usize },
    /// User message appended and a run started
    RunStarted { run: RunId, prompt: String },
    /// Pending reply followed by the cursor marker
    ReplyUpdated { display: String },
    ReplyCommitted { thread_id: String, reply: String },
    /// `error` is what the error slot now shows, if anything
    RunFailed { error: Option<String> },
    /// Partial reply that was dropped
    RunAborted { partial: String },
    /// The transport broke; the caller receives the error itself
    RunInterrupted { reason: String },
}

pub type ReplyCommittedCallback = Box<dyn FnMut(&str, &str) + Send>;

pub struct ChatSession {
    assistant_id: Option<String>,
    thread_id: Option<String>,
    history: Vec<Message>,
    pending: Option<String>,
    error: Option<String>,
    state: RunState,
    last_outcome: Option<RunState>,
    current_run: Option<RunId>,
    next_run: u64,
    on_reply_committed: Option<ReplyCommittedCallback>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("assistant_id", &self.assistant_id)
            .field("thread_id", &self.thread_id)
            .field("history", &self.history.len())
            .field("state", &self.state)
            .field("current_run", &self.current_run)
            .finish()
    }
}

impl ChatSession {
    pub fn new(assistant_id: Option<String>, thread_id: Option<String>) -> Self {
        Self {
            assistant_id,
            thread_id,
            history: Vec::new(),
            pending: None,
            error: None,
            state: RunState::Idle,
            last_outcome: None,
            current_run: None,
            next_run: 0,
            on_reply_committed: None,
        }
    }

    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant_id.as_deref()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn pending_reply(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Pending reply with the trailing cursor, as shown while streaming
    pub fn pending_display(&self) -> Option<String> {
        self.pending
            .as_deref()
            .map(|reply| format!("{}{}", reply, CURSOR_MARKER))
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Terminal state the previous run passed through before returning to Idle
    pub fn last_outcome(&self) -> Option<RunState> {
        self.last_outcome
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.current_run
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, RunState::Opening | RunState::Streaming)
    }

    pub fn is_current(&self, run: RunId) -> bool {
        self.current_run == Some(run)
    }

    pub fn set_on_reply_committed<F>(&mut self, callback: F)
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.on_reply_committed = Some(Box::new(callback));
    }

    /// Replace history wholesale (oldest first)
    pub fn replace_history(&mut self, history: Vec<Message>) -> SessionEvent {
        self.history = history;
        SessionEvent::HistoryLoaded {
            len: self.history.len(),
        }
    }

    /// `Idle --submit--> Opening`. Returns `None` for an empty prompt, a missing
    /// assistant/thread id, or while another run is active.
    pub fn begin_submit(&mut self, prompt: Option<&str>) -> Option<RunId> {
        let prompt = prompt.filter(|p| !p.is_empty())?;
        if self.state != RunState::Idle {
            debug!(state = ?self.state, "submit ignored while generating");
            return None;
        }
        if self.assistant_id.is_none() || self.thread_id.is_none() {
            warn!("submit ignored: session has no assistant or thread");
            return None;
        }

        self.error = None;
        self.history.push(Message::user(prompt));

        let run = RunId(self.next_run);
        self.next_run += 1;
        self.current_run = Some(run);
        self.state = RunState::Opening;
        debug!(%run, "run opening");
        Some(run)
    }

    /// `Opening --transport-accepted--> Streaming`
    pub fn transport_accepted(&mut self, run: RunId) -> bool {
        if !self.is_current(run) || self.state != RunState::Opening {
            return false;
        }
        self.pending = Some(String::new());
        self.state = RunState::Streaming;
        debug!(%run, "run streaming");
        true
    }

    /// `Opening --transport-rejected--> Failed`. Client errors other than 429
    /// surface their status; anything else stops without a message.
    pub fn transport_rejected(&mut self, run: RunId, status: StatusCode) -> Option<SessionEvent> {
        if !self.is_current(run) || self.state != RunState::Opening {
            return None;
        }
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            self.error = Some(format!("Something wrong! ERR: {}", status));
        } else {
            warn!(%run, %status, "run rejected, not retrying");
        }
        Some(self.fail())
    }

    /// Saving the user message failed and the run must not proceed
    pub fn persist_failed(&mut self, run: RunId, reason: &str) -> Option<SessionEvent> {
        if !self.is_current(run) || self.state != RunState::Opening {
            return None;
        }
        self.error = Some(format!("Failed to save message: {}", reason));
        Some(self.fail())
    }

    /// No event arrived within `after`
    pub fn stream_timed_out(&mut self, run: RunId, after: Duration) -> Option<SessionEvent> {
        if !self.is_current(run) || self.state != RunState::Streaming {
            return None;
        }
        self.error = Some(format!("Stream idle timeout after {}s", after.as_secs()));
        Some(self.fail())
    }

    /// The transport itself broke. The session becomes usable again but the
    /// error slot is left alone; the caller gets the error instead.
    pub fn transport_failed(&mut self, run: RunId, reason: &str) -> Option<SessionEvent> {
        if !self.is_current(run) || !self.is_generating() {
            return None;
        }
        self.pending = None;
        self.finish(RunState::Failed);
        Some(SessionEvent::RunInterrupted {
            reason: reason.to_string(),
        })
    }

    /// Apply one stream event in arrival order
    pub fn apply(&mut self, run: RunId, event: StreamEvent) -> Option<SessionEvent> {
        if !self.is_current(run) || self.state != RunState::Streaming {
            debug!(%run, ?event, "dropping event for inactive run");
            return None;
        }

        match event {
            StreamEvent::Message(token) => {
                if token.is_empty() {
                    return None;
                }
                let pending = self.pending.get_or_insert_with(String::new);
                pending.push_str(&token);
                Some(SessionEvent::ReplyUpdated {
                    display: format!("{}{}", pending, CURSOR_MARKER),
                })
            }
            StreamEvent::Error(reason) => {
                self.error = Some(reason);
                Some(self.fail())
            }
            StreamEvent::Close => Some(self.commit()),
            StreamEvent::Unknown { event, data } => {
                warn!(%run, ?event, %data, "unknown stream event");
                None
            }
        }
    }

    /// Cancel the active run. Only valid while generating.
    pub fn abort(&mut self) -> Option<SessionEvent> {
        if !self.is_generating() {
            return None;
        }
        let partial = self.pending.take().unwrap_or_default();
        debug!(run = ?self.current_run, partial_len = partial.len(), "run aborted");
        self.finish(RunState::Aborted);
        Some(SessionEvent::RunAborted { partial })
    }

    fn commit(&mut self) -> SessionEvent {
        self.state = RunState::Committing;
        let reply = self.pending.take().unwrap_or_default();
        self.history.push(Message::assistant(reply.clone()));

        let thread_id = self.thread_id.clone().unwrap_or_default();
        if let Some(callback) = self.on_reply_committed.as_mut() {
            callback(&thread_id, &reply);
        }

        self.finish(RunState::Committing);
        SessionEvent::ReplyCommitted { thread_id, reply }
    }

    fn fail(&mut self) -> SessionEvent {
        self.pending = None;
        self.finish(RunState::Failed);
        SessionEvent::RunFailed {
            error: self.error.clone(),
        }
    }

    fn finish(&mut self, outcome: RunState) {
        self.last_outcome = Some(outcome);
        self.current_run = None;
        self.state = RunState::Idle;
    }
}
