//! Stream adapter for parsing SSE (Server-Sent Events) from byte chunks.

use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use crate::Error;

const MAX_BUFFER_BYTES: usize = 1_000_000;

/// A Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, when the server names one.
    pub event_type: Option<String>,
    /// Data lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    /// The `[DONE]` sentinel that ends OpenAI-style streams.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    fn parse(text: &str) -> Option<Self> {
        let mut event_type = None;
        let mut data_lines = Vec::new();

        for line in text.lines() {
            // Comments start with ':'
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event_type = Some(value.to_string()),
                "data" => data_lines.push(value),
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return None;
        }
        Some(Self {
            event_type,
            data: data_lines.join("\n"),
        })
    }
}

/// Parses SSE events out of a byte stream, holding partial events across
/// chunk boundaries.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    events: VecDeque<SseEvent>,
    finder: memmem::Finder<'static>,
}

impl<S> SseStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
            finder: memmem::Finder::new(b"\n\n"),
        }
    }

    fn append(&mut self, chunk: &[u8]) {
        // CRLF framing is folded into LF so one separator search covers both.
        self.buffer
            .extend(chunk.iter().copied().filter(|&byte| byte != b'\r'));
    }

    fn parse_buffer(&mut self) -> Result<(), Error> {
        let mut start = 0;
        while let Some(pos) = self.finder.find(&self.buffer[start..]) {
            let end = start + pos;
            let text = std::str::from_utf8(&self.buffer[start..end])
                .map_err(|e| Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")))?;
            if let Some(event) = SseEvent::parse(text) {
                self.events.push_back(event);
            }
            start = end + 2;
        }
        if start > 0 {
            self.buffer.drain(..start);
        }
        Ok(())
    }

    /// Parse whatever remains once the upstream has ended.
    fn flush(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        std::str::from_utf8(&rest)
            .ok()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .and_then(SseEvent::parse)
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            let chunk = match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "Stream error: {}",
                        e.into()
                    )))));
                }
                // Servers may end without the final blank line.
                None => return Poll::Ready(self.flush().map(Ok)),
            };

            self.append(&chunk);
            if self.buffer.len() > MAX_BUFFER_BYTES {
                self.buffer.clear();
                return Poll::Ready(Some(Err(Error::streaming(
                    "SSE buffer exceeded maximum size",
                ))));
            }
            if let Err(e) = self.parse_buffer() {
                return Poll::Ready(Some(Err(e)));
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn events(parts: Vec<Vec<u8>>) -> SseStream<impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin> {
        stream::iter(parts.into_iter().map(|part| Ok(Bytes::from(part)))).sse_events()
    }

    #[tokio::test]
    async fn test_complete_events() {
        let mut sse = events(vec![b"data: Hello\n\ndata: World\n\n".to_vec()]);

        assert_eq!(sse.next().await.unwrap().unwrap().data, "Hello");
        assert_eq!(sse.next().await.unwrap().unwrap().data, "World");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_split_events() {
        let mut sse = events(vec![
            b"data: Hel".to_vec(),
            b"lo World\n\ndata: ".to_vec(),
            b"Second\n\n".to_vec(),
        ]);

        assert_eq!(sse.next().await.unwrap().unwrap().data, "Hello World");
        assert_eq!(sse.next().await.unwrap().unwrap().data, "Second");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_multiline_data_and_event_type() {
        let mut sse = events(vec![b"event: delta\ndata: Line 1\ndata: Line 2\n\n".to_vec()]);

        let event = sse.next().await.unwrap().unwrap();
        assert_eq!(event.event_type.as_deref(), Some("delta"));
        assert_eq!(event.data, "Line 1\nLine 2");
    }

    #[tokio::test]
    async fn test_comments_are_skipped() {
        let mut sse = events(vec![b": keep-alive\n\ndata: real\n\n".to_vec()]);

        assert_eq!(sse.next().await.unwrap().unwrap().data, "real");
        assert!(sse.next().await.is_none());
    }

    #[tokio::test]
    async fn test_crlf_framing() {
        let mut sse = events(vec![b"data: one\r\n\r\ndata: two\r\n\r\n".to_vec()]);

        assert_eq!(sse.next().await.unwrap().unwrap().data, "one");
        assert_eq!(sse.next().await.unwrap().unwrap().data, "two");
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        // '€' is E2 82 AC
        let euro = "€".as_bytes();
        let mut sse = events(vec![
            [b"data: Price: ".as_slice(), &euro[..2]].concat(),
            [&euro[2..], b"100\n\n"].concat(),
        ]);

        assert_eq!(sse.next().await.unwrap().unwrap().data, "Price: €100");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_an_error() {
        let mut sse = events(vec![b"data: bad \xFF\xFE bytes\n\n".to_vec()]);
        assert!(sse.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_final_event_without_blank_line() {
        let mut sse = events(vec![b"data: First\n\n".to_vec(), b"data: [DONE]".to_vec()]);

        assert_eq!(sse.next().await.unwrap().unwrap().data, "First");
        let last = sse.next().await.unwrap().unwrap();
        assert!(last.is_done());
        assert!(sse.next().await.is_none());
    }
}
