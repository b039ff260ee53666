use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::state::{ChatSession, RunId, SessionEvent};
use crate::api::{ApiError, ChatBackend, RunOpen};
use crate::config::{CoreConfig, PersistPolicy};
use crate::models::{Message, MessageCreate, MessageRead, Role};
use crate::streaming::{EventStream, StreamEvent};

/// Cancels the current run of one session. Cloneable and usable from any task.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    current: Arc<Mutex<Option<CancellationToken>>>,
}

impl AbortHandle {
    /// Returns false when no run is in flight
    pub fn abort(&self) -> bool {
        match self.current.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.lock().is_some()
    }

    fn arm(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.current.lock() = Some(token.clone());
        token
    }

    fn disarm(&self) {
        *self.current.lock() = None;
    }
}

/// How a submitted prompt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Empty prompt, missing ids, or a run was already active
    Ignored,
    Committed(String),
    Failed(Option<String>),
    Aborted(String),
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub history_limit: u32,
    pub idle_timeout: Option<Duration>,
    pub persist_policy: PersistPolicy,
}

impl From<&CoreConfig> for RunnerOptions {
    fn from(config: &CoreConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            idle_timeout: config.stream_idle_timeout(),
            persist_policy: config.persist_policy,
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from(&CoreConfig::default())
    }
}

enum Next {
    Item(Option<Result<StreamEvent, ApiError>>),
    TimedOut(Duration),
}

/// Owns a `ChatSession` and drives it against a backend. It is the only
/// writer of the session; views follow along through `SessionEvent`s.
pub struct SessionRunner<B> {
    backend: B,
    session: ChatSession,
    options: RunnerOptions,
    events: mpsc::UnboundedSender<SessionEvent>,
    abort: AbortHandle,
}

impl<B: ChatBackend> SessionRunner<B> {
    pub fn new(
        backend: B,
        assistant_id: Option<String>,
        thread_id: Option<String>,
        options: RunnerOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let runner = Self {
            backend,
            session: ChatSession::new(assistant_id, thread_id),
            options,
            events,
            abort: AbortHandle::default(),
        };
        (runner, events_rx)
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn on_reply_committed<F>(&mut self, callback: F)
    where
        F: FnMut(&str, &str) + Send + 'static,
    {
        self.session.set_on_reply_committed(callback);
    }

    fn emit(&self, event: Option<SessionEvent>) -> Option<SessionEvent> {
        if let Some(event) = &event {
            // A closed receiver just means nobody is rendering
            let _ = self.events.send(event.clone());
        }
        event
    }

    /// Fetch the thread's messages and replace history, oldest first.
    /// Failures are logged and leave history untouched.
    pub async fn load_history(&mut self) {
        let (Some(_), Some(thread_id)) = (self.session.assistant_id(), self.session.thread_id())
        else {
            return;
        };
        let thread_id = thread_id.to_string();

        match self
            .backend
            .fetch_history(&thread_id, self.options.history_limit)
            .await
        {
            Ok(messages) => {
                let history: Vec<Message> =
                    messages.iter().rev().map(MessageRead::to_message).collect();
                let event = self.session.replace_history(history);
                self.emit(Some(event));
            }
            Err(e) => {
                warn!(thread_id = %thread_id, error = %e, "failed to load history");
            }
        }
    }

    /// Submit a prompt and drive its run to a terminal state.
    ///
    /// A transport failure returns the session to Idle and is returned as `Err`.
    pub async fn submit(&mut self, prompt: Option<&str>) -> Result<RunOutcome, ApiError> {
        let Some(run) = self.session.begin_submit(prompt) else {
            return Ok(RunOutcome::Ignored);
        };
        self.emit(Some(SessionEvent::RunStarted {
            run,
            prompt: prompt.unwrap_or_default().to_string(),
        }));

        let token = self.abort.arm();
        let result = self.drive(run, prompt.unwrap_or_default(), &token).await;
        self.abort.disarm();

        if let Err(e) = &result {
            let event = self.session.transport_failed(run, &e.to_string());
            self.emit(event);
        }
        result
    }

    /// Cancel the in-flight run, if any
    pub fn abort(&self) -> bool {
        self.abort.abort()
    }

    async fn drive(
        &mut self,
        run: RunId,
        prompt: &str,
        token: &CancellationToken,
    ) -> Result<RunOutcome, ApiError> {
        let assistant_id = self.session.assistant_id().unwrap_or_default().to_string();
        let thread_id = self.session.thread_id().unwrap_or_default().to_string();

        let message = MessageCreate {
            role: Role::User,
            content: prompt.to_string(),
        };
        let saved = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(self.aborted()),
            saved = self.backend.save_user_message(&thread_id, &message) => saved,
        };
        if let Err(e) = saved {
            match self.options.persist_policy {
                PersistPolicy::BestEffort => {
                    warn!(%run, error = %e, "failed to save user message, continuing");
                }
                PersistPolicy::Required => {
                    self.abort.disarm();
                    let event = self.session.persist_failed(run, &e.to_string());
                    return Ok(Self::outcome(self.emit(event)));
                }
            }
        }

        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(self.aborted()),
            opened = self.backend.open_run(&assistant_id, &thread_id) => opened?,
        };
        let mut stream = match opened {
            RunOpen::Accepted(stream) => {
                self.session.transport_accepted(run);
                stream
            }
            RunOpen::Rejected { status } => {
                self.abort.disarm();
                let event = self.session.transport_rejected(run, status);
                return Ok(Self::outcome(self.emit(event)));
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(self.aborted()),
                next = Self::next_event(&mut stream, self.options.idle_timeout) => next,
            };

            let event = match next {
                Next::Item(Some(Ok(event))) => event,
                Next::Item(Some(Err(e))) => return Err(e),
                // Streams from the decoder always end with Close, others might not
                Next::Item(None) => StreamEvent::Close,
                Next::TimedOut(after) => {
                    self.abort.disarm();
                    let event = self.session.stream_timed_out(run, after);
                    return Ok(Self::outcome(self.emit(event)));
                }
            };

            if token.is_cancelled() {
                return Ok(self.aborted());
            }
            // The run ends with this event; an abort from here on has nothing to cancel
            if matches!(event, StreamEvent::Close | StreamEvent::Error(_)) {
                self.abort.disarm();
            }

            let update = self.session.apply(run, event);
            let update = self.emit(update);
            if !self.session.is_current(run) {
                return Ok(Self::outcome(update));
            }
        }
    }

    async fn next_event(stream: &mut EventStream, idle_timeout: Option<Duration>) -> Next {
        match idle_timeout {
            Some(after) => match tokio::time::timeout(after, stream.next()).await {
                Ok(item) => Next::Item(item),
                Err(_) => Next::TimedOut(after),
            },
            None => Next::Item(stream.next().await),
        }
    }

    fn aborted(&mut self) -> RunOutcome {
        debug!("run cancelled by abort handle");
        let event = self.session.abort();
        Self::outcome(self.emit(event))
    }

    fn outcome(event: Option<SessionEvent>) -> RunOutcome {
        match event {
            Some(SessionEvent::ReplyCommitted { reply, .. }) => RunOutcome::Committed(reply),
            Some(SessionEvent::RunFailed { error }) => RunOutcome::Failed(error),
            Some(SessionEvent::RunAborted { partial }) => RunOutcome::Aborted(partial),
            _ => RunOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageContent, MessageText};
    use crate::session::RunState;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory backend. Each run pops the next scripted response.
    #[derive(Default)]
    struct FakeBackend {
        history: Option<Vec<MessageRead>>,
        save_fails: bool,
        runs: Mutex<Vec<FakeRun>>,
        saved: Mutex<Vec<String>>,
        opened: AtomicUsize,
    }

    enum FakeRun {
        Events(Vec<StreamEvent>),
        Channel(mpsc::UnboundedReceiver<StreamEvent>),
        Reject(StatusCode),
        Broken,
        /// Yields the events, then the connection drops
        Reset(Vec<StreamEvent>),
    }

    impl FakeBackend {
        fn with_run(run: FakeRun) -> Self {
            Self {
                runs: Mutex::new(vec![run]),
                ..Self::default()
            }
        }
    }

    impl ChatBackend for FakeBackend {
        async fn fetch_history(
            &self,
            _thread_id: &str,
            _limit: u32,
        ) -> Result<Vec<MessageRead>, ApiError> {
            self.history
                .clone()
                .ok_or_else(|| ApiError::Transport("history unavailable".to_string()))
        }

        async fn save_user_message(
            &self,
            _thread_id: &str,
            message: &MessageCreate,
        ) -> Result<(), ApiError> {
            if self.save_fails {
                return Err(ApiError::Transport("disk full".to_string()));
            }
            self.saved.lock().push(message.content.clone());
            Ok(())
        }

        async fn open_run(&self, _assistant_id: &str, _thread_id: &str) -> Result<RunOpen, ApiError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let run = self.runs.lock().remove(0);
            match run {
                FakeRun::Events(events) => Ok(RunOpen::Accepted(
                    futures::stream::iter(events.into_iter().map(Ok)).boxed(),
                )),
                FakeRun::Channel(rx) => Ok(RunOpen::Accepted(channel_stream(rx))),
                FakeRun::Reject(status) => Ok(RunOpen::Rejected { status }),
                FakeRun::Broken => Err(ApiError::Transport("connection refused".to_string())),
                FakeRun::Reset(events) => Ok(RunOpen::Accepted(
                    futures::stream::iter(
                        events
                            .into_iter()
                            .map(Ok)
                            .chain(std::iter::once(Err(ApiError::Transport(
                                "connection reset".to_string(),
                            )))),
                    )
                    .boxed(),
                )),
            }
        }
    }

    fn channel_stream(mut rx: mpsc::UnboundedReceiver<StreamEvent>) -> EventStream {
        futures::stream::poll_fn(move |cx| rx.poll_recv(cx).map(|e| e.map(Ok))).boxed()
    }

    fn wire(role: &str, text: &str) -> MessageRead {
        MessageRead {
            id: None,
            thread_id: Some("thread_1".to_string()),
            role: Some(role.to_string()),
            content: Some(vec![MessageContent {
                kind: Some("text".to_string()),
                text: Some(vec![MessageText {
                    value: text.to_string(),
                }]),
            }]),
            extra: None,
        }
    }

    fn runner(
        backend: FakeBackend,
    ) -> (SessionRunner<FakeBackend>, mpsc::UnboundedReceiver<SessionEvent>) {
        SessionRunner::new(
            backend,
            Some("asst_1".to_string()),
            Some("thread_1".to_string()),
            RunnerOptions::default(),
        )
    }

    fn tokens(parts: &[&str]) -> Vec<StreamEvent> {
        parts
            .iter()
            .map(|p| StreamEvent::Message(p.to_string()))
            .chain(std::iter::once(StreamEvent::Close))
            .collect()
    }

    #[tokio::test]
    async fn test_load_history_reverses_to_oldest_first() {
        let backend = FakeBackend {
            // Newest first, as the server returns them
            history: Some(vec![wire("assistant", "yo"), wire("user", "hi")]),
            ..FakeBackend::default()
        };
        let (mut runner, mut events) = runner(backend);
        runner.load_history().await;

        assert_eq!(
            runner.session().history(),
            &[Message::user("hi"), Message::assistant("yo")]
        );
        assert_eq!(events.recv().await, Some(SessionEvent::HistoryLoaded { len: 2 }));
    }

    #[tokio::test]
    async fn test_load_history_failure_is_silent() {
        let (mut runner, mut events) = runner(FakeBackend::default());
        runner.load_history().await;
        assert!(runner.session().history().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_load_history_without_thread_is_noop() {
        let backend = FakeBackend {
            history: Some(vec![wire("user", "hi")]),
            ..FakeBackend::default()
        };
        let (mut runner, _events) =
            SessionRunner::new(backend, Some("asst_1".to_string()), None, RunnerOptions::default());
        runner.load_history().await;
        assert!(runner.session().history().is_empty());
    }

    #[tokio::test]
    async fn test_submit_commits_streamed_reply() {
        let backend = FakeBackend::with_run(FakeRun::Events(tokens(&["Hi", " there"])));
        let (mut runner, mut events) = runner(backend);
        let committed = Arc::new(Mutex::new(Vec::new()));
        let sink = committed.clone();
        runner.on_reply_committed(move |thread_id, reply| {
            sink.lock().push(format!("{thread_id}:{reply}"));
        });

        let outcome = runner.submit(Some("Hello")).await.unwrap();

        assert_eq!(outcome, RunOutcome::Committed("Hi there".to_string()));
        assert_eq!(
            runner.session().history(),
            &[Message::user("Hello"), Message::assistant("Hi there")]
        );
        assert_eq!(*committed.lock(), vec!["thread_1:Hi there".to_string()]);
        assert_eq!(*runner.backend.saved.lock(), vec!["Hello".to_string()]);
        assert!(!runner.abort_handle().is_running());

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen[0], SessionEvent::RunStarted { .. }));
        assert_eq!(
            seen[1],
            SessionEvent::ReplyUpdated {
                display: "Hi\u{2581}".to_string()
            }
        );
        assert_eq!(
            seen[2],
            SessionEvent::ReplyUpdated {
                display: "Hi there\u{2581}".to_string()
            }
        );
        assert!(matches!(seen[3], SessionEvent::ReplyCommitted { .. }));
    }

    #[tokio::test]
    async fn test_empty_prompt_never_opens_transport() {
        let (mut runner, _events) = runner(FakeBackend::default());
        assert_eq!(runner.submit(Some("")).await.unwrap(), RunOutcome::Ignored);
        assert_eq!(runner.submit(None).await.unwrap(), RunOutcome::Ignored);
        assert_eq!(runner.backend.opened.load(Ordering::SeqCst), 0);
        assert!(runner.session().history().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_open_reports_status() {
        let backend = FakeBackend::with_run(FakeRun::Reject(StatusCode::NOT_FOUND));
        let (mut runner, _events) = runner(backend);

        let outcome = runner.submit(Some("X")).await.unwrap();

        match outcome {
            RunOutcome::Failed(Some(error)) => assert!(error.contains("404")),
            other => panic!("Expected failure with message, got {:?}", other),
        }
        assert!(!runner.session().is_generating());
        assert_eq!(runner.session().history(), &[Message::user("X")]);
    }

    #[tokio::test]
    async fn test_abort_mid_stream_discards_reply() {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = FakeBackend::with_run(FakeRun::Channel(rx));
        let (mut runner, mut events) = runner(backend);
        let abort = runner.abort_handle();

        let driver = tokio::spawn(async move {
            let outcome = runner.submit(Some("Hello")).await.unwrap();
            (runner, outcome)
        });

        tx.send(StreamEvent::Message("par".to_string())).unwrap();
        // Wait until the token has been applied
        loop {
            if let Some(SessionEvent::ReplyUpdated { .. }) = events.recv().await {
                break;
            }
        }
        assert!(abort.abort());
        // In flight after the abort
        let _ = tx.send(StreamEvent::Message("tial".to_string()));
        let _ = tx.send(StreamEvent::Close);

        let (runner, outcome) = driver.await.unwrap();
        assert_eq!(outcome, RunOutcome::Aborted("par".to_string()));
        assert_eq!(runner.session().history(), &[Message::user("Hello")]);
        assert_eq!(runner.session().pending_reply(), None);
        assert_eq!(runner.session().last_outcome(), Some(RunState::Aborted));
        assert!(!abort.abort());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_fails_run() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let backend = FakeBackend::with_run(FakeRun::Channel(rx));
        let options = RunnerOptions {
            idle_timeout: Some(Duration::from_secs(5)),
            ..RunnerOptions::default()
        };
        let (mut runner, _events) = SessionRunner::new(
            backend,
            Some("asst_1".to_string()),
            Some("thread_1".to_string()),
            options,
        );

        let outcome = runner.submit(Some("Hello")).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Failed(Some("Stream idle timeout after 5s".to_string()))
        );
        assert_eq!(runner.session().state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_required_persistence_blocks_stream() {
        let backend = FakeBackend {
            save_fails: true,
            runs: Mutex::new(vec![FakeRun::Events(tokens(&["never"]))]),
            ..FakeBackend::default()
        };
        let options = RunnerOptions {
            persist_policy: PersistPolicy::Required,
            ..RunnerOptions::default()
        };
        let (mut runner, _events) = SessionRunner::new(
            backend,
            Some("asst_1".to_string()),
            Some("thread_1".to_string()),
            options,
        );

        let outcome = runner.submit(Some("Hello")).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Failed(Some(
                "Failed to save message: Stream transport error: disk full".to_string()
            ))
        );
        assert_eq!(runner.backend.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_best_effort_persistence_continues() {
        let backend = FakeBackend {
            save_fails: true,
            runs: Mutex::new(vec![FakeRun::Events(tokens(&["ok"]))]),
            ..FakeBackend::default()
        };
        let (mut runner, _events) = runner(backend);
        let outcome = runner.submit(Some("Hello")).await.unwrap();
        assert_eq!(outcome, RunOutcome::Committed("ok".to_string()));
    }

    #[tokio::test]
    async fn test_transport_exception_propagates_and_resets() {
        let backend = FakeBackend {
            runs: Mutex::new(vec![FakeRun::Broken, FakeRun::Events(tokens(&["second"]))]),
            ..FakeBackend::default()
        };
        let (mut runner, mut events) = runner(backend);

        let err = runner.submit(Some("first")).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(runner.session().state(), RunState::Idle);
        assert_eq!(runner.session().error(), None);

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(SessionEvent::RunInterrupted {
                reason: err.to_string()
            })
        );

        let outcome = runner.submit(Some("again")).await.unwrap();
        assert_eq!(outcome, RunOutcome::Committed("second".to_string()));
    }

    #[tokio::test]
    async fn test_connection_drop_mid_stream_ends_the_run_for_views() {
        let backend = FakeBackend::with_run(FakeRun::Reset(vec![StreamEvent::Message(
            "par".to_string(),
        )]));
        let (mut runner, mut events) = runner(backend);

        assert!(runner.submit(Some("hi")).await.is_err());

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(matches!(seen.first(), Some(SessionEvent::RunStarted { .. })));
        assert_eq!(
            seen[1],
            SessionEvent::ReplyUpdated {
                display: "par\u{2581}".to_string()
            }
        );
        assert!(matches!(seen.last(), Some(SessionEvent::RunInterrupted { .. })));
        assert!(!runner.session().is_generating());
        assert_eq!(runner.session().history(), &[Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_abort_after_close_is_a_noop() {
        let backend = FakeBackend::with_run(FakeRun::Events(tokens(&["done"])));
        let (mut runner, _events) = runner(backend);
        let abort = runner.abort_handle();
        let aborted_in_commit = Arc::new(Mutex::new(None));
        let seen = aborted_in_commit.clone();
        runner.on_reply_committed(move |_, _| {
            *seen.lock() = Some(abort.abort());
        });

        let outcome = runner.submit(Some("Hello")).await.unwrap();

        assert_eq!(outcome, RunOutcome::Committed("done".to_string()));
        assert_eq!(*aborted_in_commit.lock(), Some(false));
        assert_eq!(runner.session().last_outcome(), Some(RunState::Committing));
    }

    #[tokio::test]
    async fn test_abort_after_rejection_is_a_noop() {
        let backend = FakeBackend::with_run(FakeRun::Reject(StatusCode::NOT_FOUND));
        let (mut runner, _events) = runner(backend);
        let abort = runner.abort_handle();

        assert!(matches!(
            runner.submit(Some("Hello")).await.unwrap(),
            RunOutcome::Failed(Some(_))
        ));
        assert!(!abort.abort());
    }
}
