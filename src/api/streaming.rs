//! Streaming Support
//!
//! Decodes the Server-Sent Events body of a streaming chat completion into
//! [`StreamEvent`]s. Chunks may end mid-line, so complete lines are split off a
//! byte buffer and the incomplete tail waits for the next read.

use crate::error::{Result, VivicaError};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// An event produced while decoding a streaming response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Emitted once, before the body is read
    #[serde(rename = "stream_start")]
    Start { is_code_request: Option<bool> },

    /// One decoded content delta
    #[serde(rename = "stream_content")]
    Content {
        content: String,
        is_code_request: Option<bool>,
    },
}

impl StreamEvent {
    /// Delta text, if this is a content event
    pub fn content(&self) -> Option<&str> {
        match self {
            StreamEvent::Content { content, .. } => Some(content),
            StreamEvent::Start { .. } => None,
        }
    }
}

/// A streaming chunk from the API. Only the delta text is needed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

/// A choice in a streaming chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

/// Delta content in a streaming chunk
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    /// Non-empty `choices[0].delta.content`
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|c| !c.is_empty())
    }
}

/// What a single SSE line means to the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A delta with text in it
    Content(String),

    /// `data: [DONE]`
    Done,

    /// Blank lines, comments, other fields, deltas without text
    Skip,
}

/// Parse one SSE line
pub fn parse_sse_line(line: &str) -> Result<SseLine> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Ok(SseLine::Skip);
    }

    let Some(data) = line.strip_prefix("data: ") else {
        // event:, id:, retry: and ": keep-alive" comments
        return Ok(SseLine::Skip);
    };

    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(data).map_err(|e| {
        VivicaError::MalformedStreamChunk(format!("{}. Data: {}", e, data))
    })?;

    Ok(chunk
        .delta_content()
        .map(|c| SseLine::Content(c.to_string()))
        .unwrap_or(SseLine::Skip))
}

/// Byte buffer that hands out complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,

    /// Bytes of `pending` already known to hold no newline
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every newline-terminated line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.pending[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
            from = start;
        }

        self.pending.drain(..start);
        self.scanned = self.pending.len();
        lines
    }

    /// Whatever is left once the body ends without a final newline
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.scanned = 0;
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Decode a streaming completion body into events.
///
/// `StreamStart` is yielded before the body is polled. `None` means the
/// response had no readable body and yields [`VivicaError::NoResponseBody`]
/// right after the start event. The body is dropped on every exit path:
/// `[DONE]`, end of stream, a transport error, or the caller dropping the
/// returned stream early.
pub fn decode_stream<S, E>(
    body: Option<S>,
    is_code_request: Option<bool>,
) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<VivicaError>,
{
    async_stream::stream! {
        yield Ok(StreamEvent::Start { is_code_request });

        let Some(body) = body else {
            yield Err(VivicaError::NoResponseBody);
            return;
        };
        futures::pin_mut!(body);

        let mut buffer = LineBuffer::new();
        loop {
            let (lines, finished) = match body.next().await {
                Some(Ok(bytes)) => (buffer.push(&bytes), false),
                Some(Err(e)) => {
                    yield Err(e.into());
                    return;
                }
                None => (buffer.finish().into_iter().collect(), true),
            };

            for line in lines {
                match parse_sse_line(&line) {
                    Ok(SseLine::Content(content)) => {
                        yield Ok(StreamEvent::Content { content, is_code_request });
                    }
                    Ok(SseLine::Done) => return,
                    Ok(SseLine::Skip) => {}
                    Err(e) => warn!(error = %e, "Failed to parse streaming response"),
                }
            }

            if finished {
                break;
            }
        }
    }
}
