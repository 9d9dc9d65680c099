//! Conversation state and streaming reconciliation.
//!
//! A [`Conversation`] owns one transcript and drives sends against a
//! [`ChatTransport`]: it appends the user message and an empty assistant
//! placeholder synchronously, consumes the reply's frame stream, folds each
//! sanitized frame into the placeholder, and normalizes the assembled
//! markdown once the stream settles. Completion is unconditional: success,
//! failure, and cancellation all clear the busy flag, adopt the resolved
//! session identifier, and refresh the session list, so a failed send
//! never wedges the caller.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::client::ChatTransport;
use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::transcript::Transcript;
use crate::types::Session;
use crate::{frame, observability, reflow};

/// The outcome of one send.
#[derive(Debug)]
pub enum SendStatus {
    /// The stream ran to completion (or was cancelled) and the transcript
    /// reflects everything that arrived.
    Completed {
        /// The session identifier the conversation is now bound to.
        session_id: u64,
    },

    /// The transport or stream failed. The busy flag is already cleared,
    /// the placeholder keeps whatever content arrived, and the
    /// conversation is immediately usable again.
    Failed(Error),

    /// A send was already in flight; nothing was appended.
    Busy,

    /// The input was empty after trimming; nothing was appended.
    EmptyInput,
}

/// One conversation against a chat backend.
///
/// Cheap to share behind an [`Arc`]; all state is interior. The busy flag
/// is the sole admission gate: it is claimed by compare-exchange at submit
/// time and released on every completion path.
pub struct Conversation<T: ChatTransport> {
    transport: Arc<T>,
    transcript: Transcript,
    session_id: AtomicU64,
    busy: AtomicBool,
    sessions: Mutex<Vec<Session>>,
    cancel: Mutex<Option<CancellationToken>>,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl<T: ChatTransport> Conversation<T> {
    /// Creates a conversation with no session bound yet.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            transcript: Transcript::new(),
            session_id: AtomicU64::new(0),
            busy: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
            cancel: Mutex::new(None),
            logger: None,
        }
    }

    /// Creates a conversation that reports completions to `logger`.
    pub fn with_logger(transport: Arc<T>, logger: Arc<dyn ClientLogger>) -> Self {
        let mut conversation = Self::new(transport);
        conversation.logger = Some(logger);
        conversation
    }

    /// A handle to this conversation's transcript.
    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    /// The session this conversation is bound to; zero means none yet.
    pub fn session_id(&self) -> u64 {
        self.session_id.load(Ordering::Acquire)
    }

    /// Returns true while a send is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// The session list from the last refresh.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sends a user message and streams the reply into the transcript.
    ///
    /// Each frame is rendered through `renderer` as it lands. Errors are
    /// reported in the returned [`SendStatus`] rather than propagated, so
    /// the caller's loop never has to unwind around a failed send.
    pub async fn send(&self, input: &str, renderer: &mut dyn Renderer) -> SendStatus {
        let question = input.trim();
        if question.is_empty() {
            return SendStatus::EmptyInput;
        }

        // The busy flag is the sole admission gate; a send racing another
        // send loses here and leaves the transcript untouched.
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            observability::SEND_REJECTED_BUSY.click();
            return SendStatus::Busy;
        }

        let start = Instant::now();
        self.transcript.push_user(question);
        self.transcript.push_assistant_placeholder();

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        let result = self.drive_stream(question, &cancel, renderer).await;

        // Completion is unconditional from here down.
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = None;
        let resolved = match &result {
            Ok(session_id) => *session_id,
            Err(_) => self.session_id.load(Ordering::Acquire),
        };
        self.session_id.store(resolved, Ordering::Release);
        if let Some(logger) = &self.logger {
            logger.log_completion(resolved);
        }
        match self.transport.list_sessions().await {
            Ok(sessions) => {
                *self.sessions.lock().unwrap_or_else(PoisonError::into_inner) = sessions;
            }
            Err(err) => renderer.print_info(&format!("session refresh failed: {err}")),
        }
        self.busy.store(false, Ordering::Release);
        observability::SEND_DURATION.add(start.elapsed().as_secs_f64());

        match result {
            Ok(_) => {
                renderer.finish_response();
                SendStatus::Completed {
                    session_id: resolved,
                }
            }
            Err(err) => {
                renderer.print_error(&err.to_string());
                SendStatus::Failed(err)
            }
        }
    }

    /// Consumes the reply stream, appending sanitized frames.
    ///
    /// Returns the resolved session identifier: the trailer value when the
    /// server announced one, otherwise the identifier the send was issued
    /// with. A mid-stream error is remembered and returned after the
    /// stream drains, so frames already buffered are never thrown away.
    async fn drive_stream(
        &self,
        question: &str,
        cancel: &CancellationToken,
        renderer: &mut dyn Renderer,
    ) -> Result<u64> {
        let session_id = self.session_id.load(Ordering::Acquire);
        let frames = self.transport.stream_chat(question, session_id).await?;

        let stop = cancel.clone();
        let frames = frames.take_until(async move { stop.cancelled().await });
        futures::pin_mut!(frames);

        let mut resolved = session_id;
        let mut failure: Option<Error> = None;

        while let Some(item) = frames.next().await {
            match item {
                Ok(raw) => {
                    let content = frame::sanitize(&raw);
                    if content.is_empty() {
                        continue;
                    }
                    if let Some(trailer) = frame::parse_trailer(&content) {
                        resolved = trailer.session_id();
                        continue;
                    }
                    if self.transcript.append_to_reply(&content) {
                        renderer.print_text(&content);
                    }
                }
                Err(err) => {
                    failure = Some(err);
                }
            }
        }

        // Chunks were appended verbatim; markdown fixes that span chunk
        // boundaries only work on the assembled reply.
        self.transcript.normalize_reply(reflow::reflow);

        if cancel.is_cancelled() {
            observability::SEND_CANCELLED.click();
            renderer.print_interrupted();
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(resolved),
        }
    }

    /// Cancels the in-flight stream, if any.
    ///
    /// The send still runs its completion path; content that already
    /// arrived stays in the transcript.
    pub fn cancel(&self) {
        if let Some(token) = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            token.cancel();
        }
    }

    /// Starts a fresh conversation: empties the transcript and unbinds the
    /// session.
    pub fn new_chat(&self) -> Result<()> {
        self.guard_not_busy()?;
        self.transcript.clear();
        self.session_id.store(0, Ordering::Release);
        Ok(())
    }

    /// Replaces the transcript with a stored session's history and binds
    /// to that session.
    pub async fn load_session(&self, session_id: u64) -> Result<()> {
        self.guard_not_busy()?;
        let history = self.transport.session_messages(session_id).await?;
        self.transcript.load_history(history);
        self.session_id.store(session_id, Ordering::Release);
        Ok(())
    }

    /// Fetches the session list from the server and caches it.
    pub async fn refresh_sessions(&self) -> Result<Vec<Session>> {
        let sessions = self.transport.list_sessions().await?;
        *self.sessions.lock().unwrap_or_else(PoisonError::into_inner) = sessions.clone();
        Ok(sessions)
    }

    fn guard_not_busy(&self) -> Result<()> {
        if self.is_busy() {
            return Err(Error::bad_request(
                "a response is still streaming",
                Some("busy".to_string()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use futures::stream;

    use crate::client::FrameStream;
    use crate::render::SilentRenderer;
    use crate::types::{MessageRole, SessionMessage};

    /// A transport that replays scripted frames and records call counts.
    struct ScriptedTransport {
        frames: Mutex<Vec<Vec<Result<String>>>>,
        sessions: Vec<Session>,
        history: Vec<SessionMessage>,
        stream_calls: AtomicUsize,
        list_calls: AtomicUsize,
        hang_stream: bool,
    }

    impl ScriptedTransport {
        fn new(frames: Vec<Vec<Result<String>>>) -> Self {
            Self {
                frames: Mutex::new(frames),
                sessions: Vec::new(),
                history: Vec::new(),
                stream_calls: AtomicUsize::new(0),
                list_calls: AtomicUsize::new(0),
                hang_stream: false,
            }
        }

        fn with_sessions(mut self, sessions: Vec<Session>) -> Self {
            self.sessions = sessions;
            self
        }

        fn with_history(mut self, history: Vec<SessionMessage>) -> Self {
            self.history = history;
            self
        }

        fn hanging() -> Self {
            let mut transport = Self::new(Vec::new());
            transport.hang_stream = true;
            transport
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn stream_chat(&self, _question: &str, _session_id: u64) -> Result<FrameStream> {
            self.stream_calls.fetch_add(1, Ordering::Relaxed);
            if self.hang_stream {
                return Ok(Box::pin(stream::pending()));
            }
            let mut scripts = self.frames.lock().unwrap();
            if scripts.is_empty() {
                return Err(Error::streaming("no scripted response", None));
            }
            Ok(Box::pin(stream::iter(scripts.remove(0))))
        }

        async fn list_sessions(&self) -> Result<Vec<Session>> {
            self.list_calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.sessions.clone())
        }

        async fn session_messages(&self, _session_id: u64) -> Result<Vec<SessionMessage>> {
            Ok(self.history.clone())
        }
    }

    fn frames(raw: &[&str]) -> Vec<Result<String>> {
        raw.iter().map(|f| Ok(f.to_string())).collect()
    }

    #[tokio::test]
    async fn streamed_reply_lands_in_placeholder() {
        let transport = Arc::new(ScriptedTransport::new(vec![frames(&[
            "data: Hel",
            "data: lo",
        ])]));
        let conversation = Conversation::new(transport.clone());

        let status = conversation.send("hi", &mut SilentRenderer).await;
        assert!(matches!(status, SendStatus::Completed { session_id: 0 }));

        let messages = conversation.transcript().snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Hello");
    }

    #[tokio::test]
    async fn sentinel_frames_never_reach_the_transcript() {
        let transport = Arc::new(ScriptedTransport::new(vec![frames(&[
            "data: None",
            "data: Hello",
        ])]));
        let conversation = Conversation::new(transport);

        conversation.send("hi", &mut SilentRenderer).await;
        assert_eq!(conversation.transcript().snapshot()[1].content, "Hello");
    }

    #[tokio::test]
    async fn trailer_resolves_the_session_id() {
        let transport = Arc::new(ScriptedTransport::new(vec![frames(&[
            "data: Hi there",
            r#"data: {"title_id": 42}"#,
        ])]));
        let conversation = Conversation::new(transport);

        let status = conversation.send("hello", &mut SilentRenderer).await;
        assert!(matches!(status, SendStatus::Completed { session_id: 42 }));
        assert_eq!(conversation.session_id(), 42);
        // The trailer is metadata, not content.
        assert_eq!(conversation.transcript().snapshot()[1].content, "Hi there");
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let conversation = Conversation::new(transport.clone());

        let status = conversation.send("   ", &mut SilentRenderer).await;
        assert!(matches!(status, SendStatus::EmptyInput));
        assert!(conversation.transcript().is_empty());
        assert_eq!(transport.stream_calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn reentrant_send_is_rejected_without_side_effects() {
        let transport = Arc::new(ScriptedTransport::hanging());
        let conversation = Arc::new(Conversation::new(transport.clone()));

        let background = conversation.clone();
        let in_flight = tokio::spawn(async move {
            background.send("first", &mut SilentRenderer).await
        });

        // Let the first send claim the busy flag and start streaming.
        while transport.stream_calls.load(Ordering::Relaxed) == 0 {
            tokio::task::yield_now().await;
        }

        let status = conversation.send("second", &mut SilentRenderer).await;
        assert!(matches!(status, SendStatus::Busy));
        // No duplicate user message or placeholder was appended.
        assert_eq!(conversation.transcript().len(), 2);

        conversation.cancel();
        let status = in_flight.await.unwrap();
        assert!(matches!(status, SendStatus::Completed { .. }));
        assert!(!conversation.is_busy());
    }

    #[tokio::test]
    async fn transport_failure_still_completes() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let conversation = Conversation::new(transport.clone());

        let status = conversation.send("hi", &mut SilentRenderer).await;
        assert!(matches!(status, SendStatus::Failed(_)));
        assert!(!conversation.is_busy());
        // The placeholder survives, empty, and the session list was still
        // refreshed exactly once.
        let messages = conversation.transcript().snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "");
        assert_eq!(transport.list_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_partial_content() {
        let transport = Arc::new(ScriptedTransport::new(vec![vec![
            Ok("data: partial".to_string()),
            Err(Error::streaming("connection reset", None)),
        ]]));
        let conversation = Conversation::new(transport.clone());

        let status = conversation.send("hi", &mut SilentRenderer).await;
        assert!(matches!(status, SendStatus::Failed(_)));
        assert_eq!(conversation.transcript().snapshot()[1].content, "partial");
        assert!(!conversation.is_busy());
    }

    #[tokio::test]
    async fn completion_refreshes_the_session_list() {
        let transport = Arc::new(
            ScriptedTransport::new(vec![frames(&["data: ok"])]).with_sessions(vec![Session {
                id: 3,
                title: "greetings".to_string(),
            }]),
        );
        let conversation = Conversation::new(transport.clone());

        conversation.send("hi", &mut SilentRenderer).await;
        assert_eq!(transport.list_calls.load(Ordering::Relaxed), 1);
        assert_eq!(conversation.sessions().len(), 1);
        assert_eq!(conversation.sessions()[0].id, 3);
    }

    #[tokio::test]
    async fn frames_append_in_arrival_order() {
        let transport = Arc::new(ScriptedTransport::new(vec![frames(&[
            "data: one ",
            "data: two ",
            "data: three",
        ])]));
        let conversation = Conversation::new(transport);

        conversation.send("hi", &mut SilentRenderer).await;
        assert_eq!(
            conversation.transcript().snapshot()[1].content,
            "onetwothree"
        );
    }

    #[tokio::test]
    async fn load_session_expands_history() {
        let transport = Arc::new(ScriptedTransport::new(vec![]).with_history(vec![
            SessionMessage {
                id: 1,
                user_message: "a".to_string(),
                ai_message: "b".to_string(),
            },
        ]));
        let conversation = Conversation::new(transport);

        conversation.load_session(9).await.unwrap();
        assert_eq!(conversation.session_id(), 9);
        let messages = conversation.transcript().snapshot();
        assert_eq!(messages[0].content, "a");
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].content, "b");
        assert_eq!(messages[1].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn new_chat_unbinds_the_session() {
        let transport = Arc::new(ScriptedTransport::new(vec![frames(&[
            "data: hi",
            r#"data: {"title_id": 5}"#,
        ])]));
        let conversation = Conversation::new(transport);

        conversation.send("hello", &mut SilentRenderer).await;
        assert_eq!(conversation.session_id(), 5);

        conversation.new_chat().unwrap();
        assert_eq!(conversation.session_id(), 0);
        assert!(conversation.transcript().is_empty());
    }

    #[tokio::test]
    async fn reflow_applies_to_streamed_markdown() {
        let transport = Arc::new(ScriptedTransport::new(vec![frames(&[
            "data: intro text",
            "data: ### Heading",
        ])]));
        let conversation = Conversation::new(transport);

        conversation.send("hi", &mut SilentRenderer).await;
        assert_eq!(
            conversation.transcript().snapshot()[1].content,
            "intro text\n\n### Heading"
        );
    }
}
