//! Server-Sent Events framing for streamed provider responses.
//!
//! TCP chunks do not line up with SSE events: one chunk may carry several
//! events, and one event (or one UTF-8 character) may be split across chunks.
//! `SseLineBuffer` holds raw bytes until a full line is available.

use std::collections::VecDeque;

use anyhow::Result;
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Line-buffering SSE parser. Emits the joined `data:` payload of each event.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw chunk and return every event completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.handle_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the byte stream ends.
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest);
        let line = line.trim_end_matches(['\n', '\r']);
        if !line.is_empty() {
            if let Some(event) = self.handle_line(line) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.take_event();
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data_lines
                .push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        // `event:`, `id:`, `retry:` and `:` comments carry nothing we use.
        None
    }

    fn take_event(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        if data.trim().is_empty() {
            None
        } else {
            Some(data)
        }
    }
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    parser: SseLineBuffer,
    ready: VecDeque<String>,
    ended: bool,
}

/// Turn a raw HTTP byte stream into a stream of SSE `data` payloads.
///
/// The byte stream is only polled when no parsed event is waiting, so the
/// consumer's pace bounds how much is read from the network.
pub fn sse_data_stream<S>(bytes: S) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let state = SseState {
        bytes: bytes.boxed(),
        parser: SseLineBuffer::new(),
        ready: VecDeque::new(),
        ended: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((Ok(event), state));
            }
            if state.ended {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.ready.extend(state.parser.feed(&chunk));
                }
                Some(Err(e)) => {
                    state.ended = true;
                    let err = anyhow::Error::new(e).context("Provider stream interrupted");
                    return Some((Err(err), state));
                }
                None => {
                    state.ended = true;
                    state.ready.extend(state.parser.flush());
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut buf = SseLineBuffer::new();
        let events = buf.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(events, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.feed(b"data: {\"te").is_empty());
        assert!(buf.feed(b"xt\":\"hi\"}\r\n").is_empty());
        assert_eq!(buf.feed(b"\r\n"), vec![r#"{"text":"hi"}"#]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut buf = SseLineBuffer::new();
        let payload = "data: ok \u{1F60A}\n\n".as_bytes();
        let (head, tail) = payload.split_at(10);
        assert!(buf.feed(head).is_empty());
        assert_eq!(buf.feed(tail), vec!["ok \u{1F60A}"]);
    }

    #[test]
    fn test_comments_and_fields_ignored() {
        let mut buf = SseLineBuffer::new();
        let events = buf.feed(b": keep-alive\nevent: message\nid: 7\ndata: x\n\n");
        assert_eq!(events, vec!["x"]);
    }

    #[test]
    fn test_flush_emits_unterminated_event() {
        let mut buf = SseLineBuffer::new();
        assert!(buf.feed(b"data: tail").is_empty());
        assert_eq!(buf.flush().as_deref(), Some("tail"));
        assert_eq!(buf.flush(), None);
    }

    #[tokio::test]
    async fn test_data_stream_over_chunks() {
        let chunks: Vec<reqwest::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"data: one\n\nda")),
            Ok(Bytes::from_static(b"ta: two\n\n")),
        ];
        let events: Vec<String> = sse_data_stream(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(events, vec!["one", "two"]);
    }
}
