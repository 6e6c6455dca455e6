//! Byte-oriented view of a pipe
//!
//! [`PipeReader`] lets code written against `tokio::io::AsyncBufRead` consume a
//! pipe unchanged: every transformed line comes out followed by `\n`.

use super::{PipeHandle, StreamingPipe};
use crate::error::Result;
use crate::transform::Line;
use futures::future::BoxFuture;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

type PendingRead = BoxFuture<'static, (StreamingPipe, Result<Option<Line>>)>;

pub struct PipeReader {
    pipe: Option<StreamingPipe>,
    /// In-flight read; owns the pipe until it resolves.
    pending: Option<PendingRead>,
    handle: PipeHandle,
    buf: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl PipeReader {
    pub(super) fn new(pipe: StreamingPipe) -> Self {
        let handle = pipe.handle();
        Self {
            pipe: Some(pipe),
            pending: None,
            handle,
            buf: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Close the underlying pipe and wait for its source to be released.
    pub async fn close(mut self) {
        self.handle.close();
        if let Some(pending) = self.pending.take() {
            // Resolves promptly: the read observes the cancellation.
            let (pipe, _) = pending.await;
            self.pipe = Some(pipe);
        }
        if let Some(mut pipe) = self.pipe.take() {
            pipe.close().await;
        }
    }

    fn start_read(pipe: StreamingPipe) -> PendingRead {
        let mut pipe = pipe;
        Box::pin(async move {
            let result = pipe.read_numbered().await;
            (pipe, result)
        })
    }
}

impl AsyncBufRead for PipeReader {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();

        while this.pos >= this.buf.len() && !this.eof {
            let mut pending = match this.pending.take() {
                Some(pending) => pending,
                None => match this.pipe.take() {
                    Some(pipe) => Self::start_read(pipe),
                    None => {
                        this.eof = true;
                        break;
                    }
                },
            };

            let (pipe, result) = match pending.as_mut().poll(cx) {
                Poll::Ready(output) => output,
                Poll::Pending => {
                    this.pending = Some(pending);
                    return Poll::Pending;
                }
            };
            this.pipe = Some(pipe);

            match result {
                Ok(Some(line)) => {
                    this.buf.clear();
                    this.buf.extend_from_slice(line.text().as_bytes());
                    this.buf.push(b'\n');
                    this.pos = 0;
                }
                Ok(None) => this.eof = true,
                Err(e) => return Poll::Ready(Err(e.into())),
            }
        }

        let start = this.pos.min(this.buf.len());
        Poll::Ready(Ok(&this.buf[start..]))
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        let this = self.get_mut();
        this.pos = (this.pos + amt).min(this.buf.len());
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let available = match self.as_mut().poll_fill_buf(cx) {
            Poll::Ready(Ok(data)) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                n
            }
            Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
            Poll::Pending => return Poll::Pending,
        };
        self.consume(available);
        Poll::Ready(Ok(()))
    }
}

impl std::fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReader")
            .field("eof", &self.eof)
            .field("buffered", &(self.buf.len() - self.pos.min(self.buf.len())))
            .finish()
    }
}
