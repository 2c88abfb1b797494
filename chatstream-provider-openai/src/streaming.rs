//! SSE stream decoding for the OpenAI-compatible Chat Completions API.
//!
//! Turns the raw response byte stream into [`StreamEvent`]s. The wire format
//! is:
//!
//! ```text
//! data: {"id":"...","choices":[{"delta":{"content":"text"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Fragment extraction is a single explicit schema match with a fixed
//! fallback order: `choices[0].delta.content`, else
//! `choices[0].delta.reasoning_content` (emitted by reasoning models such as
//! DeepSeek R1). Anything else contributes no fragment.

use bytes::Bytes;
use chatstream_types::{StreamEvent, StreamHandle};
use futures::{Stream, StreamExt};
use reqwest::Response;

/// Wrap an HTTP response body into a [`StreamHandle`] that emits
/// [`StreamEvent`]s.
pub(crate) fn stream_completion(response: Response) -> StreamHandle {
    StreamHandle::new(decode_sse_stream(response.bytes_stream()))
}

/// Decode a raw byte stream into a stream of [`StreamEvent`]s.
///
/// The stream ends when the underlying reader ends; the `[DONE]` sentinel
/// only terminates extraction for its own line. A transport error mid-stream
/// yields one [`StreamEvent::Error`] and ends the stream.
fn decode_sse_stream(
    byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    async_stream::stream! {
        let mut lines = LineBuffer::new();
        let mut byte_stream = std::pin::pin!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(b) => b,
                Err(e) => {
                    yield StreamEvent::Error(format!("stream read error: {e}"));
                    return;
                }
            };

            for line in lines.push_chunk(&chunk) {
                match decode_line(&line) {
                    LineOutcome::Fragment(text) => yield StreamEvent::TextDelta(text),
                    LineOutcome::Error(msg) => {
                        yield StreamEvent::Error(msg);
                        return;
                    }
                    LineOutcome::Skip => {}
                }
            }
        }

        // An unterminated trailing line is still a complete line once the
        // reader ends.
        if let Some(line) = lines.flush() {
            match decode_line(&line) {
                LineOutcome::Fragment(text) => yield StreamEvent::TextDelta(text),
                LineOutcome::Error(msg) => yield StreamEvent::Error(msg),
                LineOutcome::Skip => {}
            }
        }
    }
}

/// Reassembles newline-delimited lines from arbitrary byte chunks.
///
/// Bytes accumulate until a `\n` arrives, so a fragment (or a single
/// multi-byte UTF-8 character) split across network chunks is never split
/// by the decoder. A completed line that is not valid UTF-8 is logged and
/// dropped.
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append a chunk and return all newly completed lines.
    fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop(); // the '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            match String::from_utf8(line) {
                Ok(s) => lines.push(s),
                Err(e) => {
                    tracing::warn!("dropping non-UTF-8 SSE line: {e}");
                }
            }
        }
        lines
    }

    /// Take any remaining bytes as a final line.
    fn flush(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(s) if !s.trim().is_empty() => Some(s),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("dropping non-UTF-8 SSE tail: {e}");
                None
            }
        }
    }
}

/// What one decoded SSE line contributes to the stream.
#[derive(Debug, PartialEq)]
enum LineOutcome {
    /// One extracted text fragment.
    Fragment(String),
    /// The endpoint reported an error inside the stream.
    Error(String),
    /// Nothing: blank, keep-alive, sentinel, or unusable payload.
    Skip,
}

/// Decode one complete SSE line.
///
/// Skipped without error: blank lines, comment/keep-alive lines (leading
/// `:`), lines without the `data:` prefix, the `[DONE]` sentinel, and
/// payloads that do not start with `{` (malformed or partial JSON guard).
/// A JSON parse failure is logged and skipped so one bad line never aborts
/// the stream.
fn decode_line(line: &str) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return LineOutcome::Skip;
    }
    let Some(payload) = line.strip_prefix("data:") else {
        return LineOutcome::Skip;
    };
    let payload = payload.trim();

    if payload == "[DONE]" || !payload.starts_with('{') {
        return LineOutcome::Skip;
    }

    let json: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("JSON parse error in SSE line, skipping: {e}");
            return LineOutcome::Skip;
        }
    };

    if let Some(error) = json.get("error") {
        let msg = error["message"]
            .as_str()
            .unwrap_or("unknown streaming error")
            .to_string();
        return LineOutcome::Error(msg);
    }

    let delta = &json["choices"][0]["delta"];

    if let Some(content) = delta["content"].as_str()
        && !content.is_empty()
    {
        return LineOutcome::Fragment(content.to_string());
    }

    if let Some(reasoning) = delta["reasoning_content"].as_str()
        && !reasoning.is_empty()
    {
        return LineOutcome::Fragment(reasoning.to_string());
    }

    LineOutcome::Skip
}

// ─── Tests ───────────────────────────────────────────────────────────────────
