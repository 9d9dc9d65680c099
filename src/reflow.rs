//! Markdown reflow for partially streamed text.
//!
//! Streaming chunks routinely glue a heading onto the tail of the previous
//! sentence, or stack blank lines where chunk boundaries fell. Rendering
//! that fragment as markdown turns the heading into prose. This module
//! repairs the spacing with a single deterministic pass: a heading marker
//! (one to six `#` followed by a space) always ends up separated from
//! preceding text by exactly one blank line, and runs of three or more
//! newlines collapse to two.
//!
//! The transform is pure and idempotent; `reflow(reflow(x)) == reflow(x)`.

/// Maximum number of hash marks in an ATX heading.
const MAX_HEADING_LEVEL: usize = 6;

/// Normalize heading separation and newline runs in streamed markdown.
pub fn reflow(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut rest = text;

    while !rest.is_empty() {
        if starts_with_heading_marker(rest) {
            // Normalize whatever separation came before the heading down to
            // exactly one blank line.
            while out.ends_with('\n') {
                out.pop();
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            let line_end = rest.find('\n').unwrap_or(rest.len());
            out.push_str(&rest[..line_end]);
            rest = &rest[line_end..];
        } else if let Some((run, remainder)) = strip_newline_run(rest) {
            out.push_str(if run >= 2 { "\n\n" } else { "\n" });
            rest = remainder;
        } else if rest.starts_with('#') {
            // A hash run that is not a heading marker. Consume the whole run
            // so its tail is never re-tested as a shorter marker.
            let run = rest.chars().take_while(|c| *c == '#').count();
            out.push_str(&rest[..run]);
            rest = &rest[run..];
        } else {
            // Copy prose up to the next newline or heading candidate.
            let stop = rest.find(|c| c == '\n' || c == '#').unwrap_or(rest.len());
            out.push_str(&rest[..stop]);
            rest = &rest[stop..];
        }
    }

    out
}

/// Returns true if `text` begins with an ATX heading marker.
fn starts_with_heading_marker(text: &str) -> bool {
    let hashes = text.chars().take_while(|c| *c == '#').count();
    (1..=MAX_HEADING_LEVEL).contains(&hashes) && text[hashes..].starts_with(' ')
}

/// If `text` begins with newlines, returns the run length and the remainder.
fn strip_newline_run(text: &str) -> Option<(usize, &str)> {
    let run = text.chars().take_while(|c| *c == '\n').count();
    if run == 0 {
        None
    } else {
        Some((run, &text[run..]))
    }
}
