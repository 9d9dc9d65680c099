//! The conversation transcript: an ordered, shared sequence of messages.
//!
//! The transcript is the one piece of state that concurrent consumers see
//! mid-stream, so every mutation goes through this container and computes
//! from the latest contents under the lock. Callers never hold a reference
//! into the message list across a suspension point; they take snapshots.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{from_reader, to_writer_pretty};

use crate::types::{ChatMessage, MessageRole, SessionMessage};
use crate::{Error, Result};

/// A cloneable handle to one conversation's ordered message list.
///
/// While a response is streaming, the last entry is always an
/// assistant-role message and is the only entry that mutates; appends to it
/// are guarded so a stale callback can never corrupt an unrelated entry.
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    inner: Arc<TranscriptInner>,
}

#[derive(Debug, Default)]
struct TranscriptInner {
    messages: Mutex<Vec<ChatMessage>>,
    next_id: AtomicU64,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ChatMessage>> {
        self.inner
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Appends a user message and returns its identifier.
    pub fn push_user(&self, content: impl Into<String>) -> u64 {
        let id = self.next_id();
        self.lock().push(ChatMessage::user(id, content));
        id
    }

    /// Appends an empty assistant message that a stream will fill in.
    pub fn push_assistant_placeholder(&self) -> u64 {
        let id = self.next_id();
        self.lock().push(ChatMessage::assistant_placeholder(id));
        id
    }

    /// Appends `chunk` to the streaming reply.
    ///
    /// The append only happens when the transcript's last entry exists and
    /// is assistant-role; anything else is a guarded no-op. Returns whether
    /// the append happened.
    pub fn append_to_reply(&self, chunk: &str) -> bool {
        let mut messages = self.lock();
        match messages.last_mut() {
            Some(last) if last.role == MessageRole::Assistant => {
                last.content.push_str(chunk);
                true
            }
            _ => false,
        }
    }

    /// Rewrites the streaming reply with `f`, under the same guard as
    /// [`append_to_reply`](Self::append_to_reply).
    ///
    /// Chunks land verbatim during a stream; once it settles the whole
    /// reply is normalized in one pass, so fixes that span chunk
    /// boundaries still apply.
    pub fn normalize_reply<F: FnOnce(&str) -> String>(&self, f: F) -> bool {
        let mut messages = self.lock();
        match messages.last_mut() {
            Some(last) if last.role == MessageRole::Assistant => {
                last.content = f(&last.content);
                true
            }
            _ => false,
        }
    }

    /// Replaces the transcript with stored session history.
    ///
    /// Each stored row expands to a user entry followed by an assistant
    /// entry, preserving row order.
    pub fn load_history(&self, history: Vec<SessionMessage>) {
        let mut expanded = Vec::with_capacity(history.len() * 2);
        for row in history {
            expanded.push(ChatMessage::user(self.next_id(), row.user_message));
            let mut reply = ChatMessage::assistant_placeholder(self.next_id());
            reply.content = row.ai_message;
            expanded.push(reply);
        }
        *self.lock() = expanded;
    }

    /// Returns a snapshot of the current messages.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.lock().clone()
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if the transcript holds no messages.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes all messages.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Saves the transcript as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| Error::io(format!("cannot write {}", path.display()), e))?;
        to_writer_pretty(BufWriter::new(file), &self.snapshot())?;
        Ok(())
    }

    /// Loads a previously saved transcript, replacing current contents.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::io(format!("cannot open {}", path.display()), e))?;
        let messages: Vec<ChatMessage> = from_reader(BufReader::new(file))?;
        *self.lock() = messages;
        Ok(())
    }
}
