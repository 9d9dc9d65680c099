//! Frame sanitization: protocol markers, sentinels, and metadata trailers.
//!
//! A decoded frame is still wire-flavored text: content lines carry a
//! `data:` prefix, the backend emits a literal `None` when it has no value,
//! and the final frames of a stream may carry JSON trailers identifying the
//! session. This module reduces a frame to displayable content and pulls
//! out the trailers.

use serde::Deserialize;

/// The content-line marker used by the chat backend.
const DATA_PREFIX: &str = "data:";

/// The backend's absence marker. Must never reach the transcript.
const SENTINEL: &str = "None";

/// Reduce one frame's raw text to its displayable content.
///
/// Lines carrying the `data:` marker contribute everything after the marker
/// with leading whitespace stripped; non-blank unmarked lines contribute
/// verbatim. Contributions are newline-joined in encounter order and
/// right-trimmed, then leading/trailing standalone `None` sentinels are
/// removed. A frame that is entirely sentinel or blank sanitizes to the
/// empty string, which callers must not append to a transcript.
pub fn sanitize(frame: &str) -> String {
    let mut content = String::new();
    for line in frame.split('\n') {
        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            content.push_str(rest.trim_start());
            content.push('\n');
        } else if !line.trim().is_empty() {
            content.push_str(line);
            content.push('\n');
        }
    }
    strip_sentinel(content.trim_end())
}

/// Remove the absence sentinel when it appears as a standalone leading or
/// trailing token. `NoneHello` is left alone; the sentinel only counts when
/// whitespace (or the text boundary) separates it from the rest.
fn strip_sentinel(text: &str) -> String {
    let mut text = text.trim();
    // Each strip can expose another standalone sentinel ("None None"
    // becomes "None"), so iterate to a fixed point.
    loop {
        if text == SENTINEL {
            return String::new();
        }
        let mut stripped = false;
        if let Some(rest) = text.strip_prefix(SENTINEL) {
            if rest.starts_with(char::is_whitespace) {
                text = rest.trim_start();
                stripped = true;
            }
        }
        if let Some(rest) = text.strip_suffix(SENTINEL) {
            if rest.ends_with(char::is_whitespace) {
                text = rest.trim_end();
                stripped = true;
            }
        }
        if !stripped {
            return text.to_string();
        }
    }
}

/// A metadata trailer resolved from a sanitized frame.
///
/// The backend reports session identity in-band: a JSON object with a
/// `title_id` field announces a freshly created session, one with `chat_id`
/// confirms an update to an existing session. Trailers are protocol
/// metadata, not content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTrailer {
    /// The server created a new session with this identifier.
    SessionCreated(u64),

    /// The server appended to an existing session with this identifier.
    SessionTouched(u64),
}

impl StreamTrailer {
    /// The session identifier this trailer carries.
    pub fn session_id(&self) -> u64 {
        match self {
            StreamTrailer::SessionCreated(id) | StreamTrailer::SessionTouched(id) => *id,
        }
    }
}

#[derive(Deserialize)]
struct TrailerWire {
    title_id: Option<u64>,
    chat_id: Option<u64>,
}

/// Try to interpret sanitized frame content as a metadata trailer.
///
/// Anything that is not a JSON object carrying `title_id` or `chat_id` is
/// plain content; malformed JSON never errors here.
pub fn parse_trailer(content: &str) -> Option<StreamTrailer> {
    let wire: TrailerWire = serde_json::from_str(content).ok()?;
    if let Some(id) = wire.title_id {
        Some(StreamTrailer::SessionCreated(id))
    } else {
        wire.chat_id.map(StreamTrailer::SessionTouched)
    }
}
