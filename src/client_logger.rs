//! Logging trait for chat client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to
//! capture all traffic passing through the [`ChatClient`](crate::ChatClient):
//! outgoing questions, every decoded frame, and stream completions.

/// A trait for logging chat client operations.
///
/// Implement this trait to capture and record API interactions. Frame
/// logging sees the raw decoded frame, before sanitization, which is what
/// you want when debugging protocol issues.
///
/// # Example
///
/// ```rust,ignore
/// use confab::ClientLogger;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_request(&self, question: &str) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "-> {question}").unwrap();
///     }
///
///     fn log_frame(&self, frame: &str) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "<- {frame}").unwrap();
///     }
///
///     fn log_completion(&self, session_id: u64) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "== done, session {session_id}").unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log an outgoing chat question.
    fn log_request(&self, question: &str);

    /// Log one decoded frame of a streaming response.
    ///
    /// Called for each frame as it is decoded, before sanitization.
    fn log_frame(&self, frame: &str);

    /// Log the completion of a streaming response.
    ///
    /// Called exactly once per send with the resolved session identifier.
    fn log_completion(&self, session_id: u64);
}
