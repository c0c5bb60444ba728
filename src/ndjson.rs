//! Stream adapter splitting a byte stream into newline-delimited records.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;

use crate::Error;

const MAX_LINE_BYTES: usize = 1_000_000;

/// Yields each non-empty line of the underlying byte stream, without its
/// terminator. A final line lacking a newline is still yielded at the end.
pub struct NdjsonStream<S> {
    inner: S,
    buffer: BytesMut,
    lines: VecDeque<Bytes>,
    finished: bool,
}

impl<S> NdjsonStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: BytesMut::new(),
            lines: VecDeque::new(),
            finished: false,
        }
    }

    fn split_lines(&mut self) {
        while let Some(pos) = memchr::memchr(b'\n', &self.buffer) {
            let mut line = self.buffer.split_to(pos + 1);
            line.truncate(pos);
            self.push_line(line.freeze());
        }
    }

    fn push_line(&mut self, mut line: Bytes) {
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        if !line.iter().all(u8::is_ascii_whitespace) {
            self.lines.push_back(line);
        }
    }
}

impl<S, E> Stream for NdjsonStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<Bytes, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.split_lines();
                    if self.buffer.len() > MAX_LINE_BYTES {
                        self.buffer.clear();
                        return Poll::Ready(Some(Err(Error::streaming(
                            "NDJSON line exceeded maximum size",
                        ))));
                    }
                }
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "Stream error: {}",
                        e.into()
                    )))));
                }
                None => {
                    self.finished = true;
                    let rest = self.buffer.split().freeze();
                    self.push_line(rest);
                }
            }
        }
    }
}

/// Extension trait to add NDJSON splitting to byte streams.
pub trait NdjsonStreamExt: Stream {
    fn ndjson_lines(self) -> NdjsonStream<Self>
    where
        Self: Sized,
    {
        NdjsonStream::new(self)
    }
}

impl<S: Stream> NdjsonStreamExt for S {}
