//! Reader for the node's `text/event-stream` responses.
//!
//! Parses just enough of the SSE framing for tests: `data:` lines and
//! `:` comment lines, blocks separated by a blank line.

use std::time::Duration;

/// One block read from an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Joined `data:` lines of a message.
    Data(String),
    /// A comment line such as `: ping`, without the leading colon.
    Comment(String),
}

/// Splits raw event-stream bytes into frames.
///
/// Bytes are buffered until a block is complete, so a UTF-8 character split
/// across chunks is decoded whole.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. `\r` never occurs inside a multi-byte UTF-8 sequence,
    /// so dropping it turns CRLF framing into LF framing.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));
    }

    /// Next complete frame in the buffer, if any.
    pub fn next_frame(&mut self) -> Result<Option<SseFrame>, anyhow::Error> {
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let rest = self.buffer.split_off(end + 2);
            let mut block = std::mem::replace(&mut self.buffer, rest);
            block.truncate(end);
            let block = String::from_utf8(block)?;

            let mut data_lines = Vec::new();
            let mut comment = None;
            for line in block.lines() {
                if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
                } else if let Some(rest) = line.strip_prefix(':') {
                    comment = Some(rest.trim().to_string());
                }
            }

            if !data_lines.is_empty() {
                return Ok(Some(SseFrame::Data(data_lines.join("\n"))));
            }
            if let Some(comment) = comment {
                return Ok(Some(SseFrame::Comment(comment)));
            }
            // Blocks with only event/id/retry fields carry nothing for tests.
        }
        Ok(None)
    }
}

/// Incrementally reads frames from a streaming `reqwest::Response`.
pub struct EventStreamReader {
    response: reqwest::Response,
    decoder: FrameDecoder,
}

impl EventStreamReader {
    /// Open `GET {api_url}/events` and wait for the response headers.
    ///
    /// Once this returns the subscriber is registered on the node.
    pub async fn connect(api_url: &str) -> Result<Self, anyhow::Error> {
        let response = reqwest::Client::new()
            .get(format!("{}/events", api_url))
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        anyhow::ensure!(
            content_type.starts_with("text/event-stream"),
            "unexpected content type: {}",
            content_type
        );

        Ok(Self {
            response,
            decoder: FrameDecoder::new(),
        })
    }

    /// Next frame, or `None` once the server closed the stream.
    pub async fn next_frame(&mut self) -> Result<Option<SseFrame>, anyhow::Error> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(Some(frame));
            }

            match self.response.chunk().await? {
                Some(chunk) => self.decoder.push(&chunk),
                None => return Ok(None),
            }
        }
    }

    /// Next frame, failing if none arrives within `timeout`.
    pub async fn next_frame_within(&mut self, timeout: Duration) -> Result<SseFrame, anyhow::Error> {
        match tokio::time::timeout(timeout, self.next_frame()).await {
            Ok(Ok(Some(frame))) => Ok(frame),
            Ok(Ok(None)) => anyhow::bail!("event stream closed"),
            Ok(Err(e)) => Err(e),
            Err(_) => anyhow::bail!("no event stream frame within {:?}", timeout),
        }
    }

    /// Next data message parsed as JSON, skipping keep-alive comments.
    pub async fn next_event(&mut self, timeout: Duration) -> Result<serde_json::Value, anyhow::Error> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_frame_within(remaining).await? {
                SseFrame::Data(data) => return Ok(serde_json::from_str(&data)?),
                SseFrame::Comment(_) => continue,
            }
        }
    }
}
