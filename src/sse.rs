//! Incremental decoding of chunked chat response streams.
//!
//! This module turns the raw byte stream of a `POST /chat/sse` response into
//! an ordered stream of decoded text frames. A frame is a maximal unit
//! terminated by a blank line (`\n\n`); chunk boundaries carry no meaning
//! and may fall anywhere, including inside a multi-byte UTF-8 sequence.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::{Error, Result};

/// The frame delimiter used by the chat backend.
const FRAME_DELIMITER: &str = "\n\n";

/// Decoder state threaded through the unfold loop.
struct DecodeState<S> {
    stream: S,
    /// Decoded text waiting for a delimiter.
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the last chunk.
    carry: Vec<u8>,
    /// Set once the source has reported end-of-stream.
    done: bool,
}

/// Process a stream of bytes into a stream of delimiter-terminated frames.
///
/// Frames are emitted strictly in arrival order, each exactly once, with no
/// byte dropped or duplicated across chunk boundaries. When the source ends
/// with a non-empty fragment still buffered (no final delimiter), that
/// fragment is emitted as a last frame. Transport and encoding failures are
/// surfaced as stream items so callers can log them; the stream always
/// terminates afterwards rather than leaving the caller suspended.
pub fn frame_stream<S>(byte_stream: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    // Convert reqwest errors to our error type
    let byte_stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let state = DecodeState {
        stream: byte_stream.fuse(),
        buffer: String::new(),
        carry: Vec::new(),
        done: false,
    };

    stream::unfold(state, move |mut state| async move {
        loop {
            // First drain any complete frame already buffered. Buffered
            // frames never suspend.
            if let Some((frame, remaining)) = extract_frame(&state.buffer) {
                state.buffer = remaining;
                return Some((Ok(frame), state));
            }

            if state.done {
                // Trailing fragment with no final delimiter.
                if !state.buffer.is_empty() {
                    let frame = std::mem::take(&mut state.buffer);
                    return Some((Ok(frame), state));
                }
                return None;
            }

            // Read more data
            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    if let Err(err) = decode_chunk(&mut state, &bytes) {
                        return Some((Err(err), state));
                    }
                }
                Some(Err(e)) => {
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    if !state.carry.is_empty() {
                        // The stream ended mid code point.
                        state.carry.clear();
                        return Some((
                            Err(Error::encoding(
                                "stream ended inside a multi-byte UTF-8 sequence",
                                None,
                            )),
                            state,
                        ));
                    }
                }
            }
        }
    })
}

/// Append one chunk of bytes to the decode buffer.
///
/// A trailing incomplete UTF-8 sequence is carried forward and prepended to
/// the next chunk, so code points split across chunk boundaries decode
/// correctly. Only a genuinely invalid sequence is reported as an error.
fn decode_chunk<S>(state: &mut DecodeState<S>, bytes: &[u8]) -> Result<()> {
    let mut pending = std::mem::take(&mut state.carry);
    pending.extend_from_slice(bytes);

    match std::str::from_utf8(&pending) {
        Ok(text) => {
            state.buffer.push_str(text);
            Ok(())
        }
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            let (valid, rest) = pending.split_at(valid_up_to);
            // from_utf8 already validated this prefix, so the conversion is
            // lossless.
            state.buffer.push_str(&String::from_utf8_lossy(valid));
            match e.error_len() {
                None => {
                    // Incomplete tail; wait for the next chunk.
                    state.carry = rest.to_vec();
                    Ok(())
                }
                Some(_) => Err(Error::encoding(
                    format!("invalid UTF-8 in stream at byte {valid_up_to}"),
                    Some(Box::new(e)),
                )),
            }
        }
    }
}

/// Extract a complete frame from the front of the buffer.
///
/// Returns the frame text (delimiter excluded) and the remaining buffer, or
/// `None` if no complete delimiter is present yet.
fn extract_frame(buffer: &str) -> Option<(String, String)> {
    let end = buffer.find(FRAME_DELIMITER)?;
    let frame = buffer[..end].to_string();
    let rest = buffer[end + FRAME_DELIMITER.len()..].to_string();
    Some((frame, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    async fn collect_frames(chunks: Vec<&'static [u8]>) -> Vec<Result<String>> {
        let stream = Box::pin(stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<std::result::Result<Bytes, reqwest::Error>>>(),
        ));
        frame_stream(stream).collect().await
    }

    #[tokio::test]
    async fn single_chunk_single_frame() {
        let frames = collect_frames(vec![b"data: hello\n\n"]).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap(), "data: hello");
    }

    #[tokio::test]
    async fn multiple_frames_in_one_chunk() {
        let frames = collect_frames(vec![b"data: a\n\ndata: b\n\n"]).await;
        let frames: Vec<String> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames, vec!["data: a", "data: b"]);
    }

    #[tokio::test]
    async fn frame_split_across_chunks() {
        let frames = collect_frames(vec![b"data: Hel", b"lo\n\n"]).await;
        let frames: Vec<String> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames, vec!["data: Hello"]);
    }

    #[tokio::test]
    async fn delimiter_split_across_chunks() {
        let frames = collect_frames(vec![b"data: a\n", b"\ndata: b\n\n"]).await;
        let frames: Vec<String> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames, vec!["data: a", "data: b"]);
    }

    #[tokio::test]
    async fn trailing_fragment_emitted_at_end() {
        let frames = collect_frames(vec![b"data: a\n\ndata: tail"]).await;
        let frames: Vec<String> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames, vec!["data: a", "data: tail"]);
    }

    #[tokio::test]
    async fn utf8_code_point_split_across_chunks() {
        // "é" is 0xC3 0xA9; split it between chunks.
        let frames = collect_frames(vec![b"data: caf\xc3", b"\xa9\n\n"]).await;
        let frames: Vec<String> = frames.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(frames, vec!["data: café"]);
    }

    #[tokio::test]
    async fn invalid_utf8_surfaces_error_but_keeps_frames() {
        // A valid frame, then a byte sequence that can never be valid UTF-8.
        let frames = collect_frames(vec![b"data: ok\n\n", b"\xff\xff"]).await;
        assert_eq!(frames[0].as_ref().unwrap(), "data: ok");
        assert!(frames[1].is_err());
    }

    #[tokio::test]
    async fn truncated_code_point_at_end_of_stream() {
        let frames = collect_frames(vec![b"data: ok\n\ndata: x\xc3"]).await;
        assert_eq!(frames[0].as_ref().unwrap(), "data: ok");
        // The carry can never complete, so the decoder reports it and still
        // flushes the text it had decoded.
        assert!(frames[1].is_err());
        assert_eq!(frames[2].as_ref().unwrap(), "data: x");
    }

    #[tokio::test]
    async fn chunk_boundary_independence() {
        let full: &[u8] = b"data: one\n\ndata: two\n\ndata: three\n\n";
        let whole = collect_frames(vec![full]).await;
        let expected: Vec<String> = whole.into_iter().map(|f| f.unwrap()).collect();

        for split in 1..full.len() {
            let (a, b) = full.split_at(split);
            let frames = collect_frames(vec![a, b]).await;
            let frames: Vec<String> = frames.into_iter().map(|f| f.unwrap()).collect();
            assert_eq!(frames, expected, "split at byte {split}");
        }
    }

    #[tokio::test]
    async fn empty_stream_produces_no_frames() {
        let frames = collect_frames(vec![]).await;
        assert!(frames.is_empty());
    }
}
