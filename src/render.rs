//! Output rendering for the chat client.
//!
//! This module provides a trait-based rendering abstraction so the
//! conversation logic can stream text to a terminal, a test buffer, or
//! nothing at all without knowing the difference.

use std::io::{self, Stdout, Write};

/// ANSI escape code for dim text (used for informational messages).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Silent rendering for tests
pub trait Renderer: Send {
    /// Print a chunk of response text.
    ///
    /// This is called incrementally as frames are streamed from the server.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is cancelled by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            use_color: true,
        }
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        let mut handle = self.stdout.lock();
        let _ = write!(handle, "{text}");
        let _ = handle.flush();
    }

    fn print_error(&mut self, error: &str) {
        if self.use_color {
            eprintln!("{ANSI_RED}error: {error}{ANSI_RESET}");
        } else {
            eprintln!("error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }

    fn finish_response(&mut self) {
        let mut handle = self.stdout.lock();
        let _ = writeln!(handle);
        let _ = handle.flush();
    }

    fn print_interrupted(&mut self) {
        let mut handle = self.stdout.lock();
        let _ = writeln!(handle, "\n[interrupted]");
        let _ = handle.flush();
    }
}

/// A renderer that discards everything. Useful in tests and for headless
/// callers that only care about the transcript.
#[derive(Debug, Default)]
pub struct SilentRenderer;

impl Renderer for SilentRenderer {
    fn print_text(&mut self, _text: &str) {}
    fn print_error(&mut self, _error: &str) {}
    fn print_info(&mut self, _info: &str) {}
    fn finish_response(&mut self) {}
    fn print_interrupted(&mut self) {}
}
