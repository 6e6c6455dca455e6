//! Streaming transformation pipe
//!
//! A [`StreamingPipe`] owns a background producer task that reads lines from a
//! [`TextSource`], runs them through a composed transform and publishes them on
//! a bounded channel. The consumer pulls from the other end one line at a time.
//!
//! ```text
//!   TextSource ──▶ producer task ──▶ [mpsc, capacity N] ──▶ read_line()
//!                  ├── numbers lines 1, 2, 3, ...
//!                  ├── blocks when the channel is full (backpressure)
//!                  ├── EndOfStream / Failure travel on the same channel
//!                  └── close() cancels it and releases the source
//! ```
//!
//! The channel carries a tagged message, so "no line yet" and "finished" can
//! never be confused by the reader. Cancellation is a `watch` flag observed by
//! both sides: the producer selects on it while reading and while publishing,
//! and a reader blocked on an empty channel selects on it too.

mod reader;
mod stream;


pub use reader::PipeReader;
pub use stream::LineStream;

use crate::config::PipeConfig;
use crate::error::{PipeError, Result, TransformError};
use crate::source::{LineReader, ReaderSource, TextSource};
use crate::transform::{compose_all, Line, LineTransform, SharedTransform};
use async_trait::async_trait;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Default channel capacity: the producer stays at most one line ahead.
pub const DEFAULT_CAPACITY: usize = 1;

/// Lifecycle of a pipe as seen by its consumer.
#[derive(Debug, Clone)]
pub enum PipeState {
    Idle,
    Running,
    /// The source was exhausted and the end-of-stream marker was read.
    Completed,
    /// Closed by the consumer (or a [`PipeHandle`]) before completion.
    Closed,
    /// Terminal failure; every later read returns this error again.
    Failed(PipeError),
}

impl PipeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipeState::Completed | PipeState::Closed | PipeState::Failed(_)
        )
    }
}

/// What travels from producer to consumer.
#[derive(Debug)]
enum Message {
    Line(Line),
    EndOfStream,
    Failure(PipeError),
}

/// State shared by the pipe, its handles and the producer.
#[derive(Debug)]
struct Shared {
    closed: AtomicBool,
    cancel: watch::Sender<bool>,
}

impl Shared {
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.cancel.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Cloneable remote control for a pipe.
///
/// Closing through a handle cancels the producer and wakes a reader blocked
/// in [`StreamingPipe::read_line`], which then returns end-of-stream.
#[derive(Debug, Clone)]
pub struct PipeHandle {
    shared: Arc<Shared>,
}

impl PipeHandle {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Why the producer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerExit {
    Finished,
    Cancelled,
    ConsumerGone,
}

/// A source read through a chain of line transforms, one line at a time.
pub struct StreamingPipe {
    rx: mpsc::Receiver<Message>,
    state: PipeState,
    shared: Arc<Shared>,
    cancel_rx: watch::Receiver<bool>,
    producer: Option<JoinHandle<()>>,
    read_timeout: Option<Duration>,
}

impl StreamingPipe {
    /// Start a pipe applying `transforms` in order. An empty list passes lines
    /// through unchanged.
    ///
    /// Must be called from within a tokio runtime: the producer is spawned
    /// immediately.
    pub fn new<S, I>(source: S, transforms: I) -> Self
    where
        S: TextSource + 'static,
        I: IntoIterator<Item = SharedTransform>,
    {
        Self::spawn(
            source,
            SharedTransform::new(compose_all(transforms)),
            DEFAULT_CAPACITY,
            None,
        )
    }

    /// Start a pipe with a single (possibly already composed) transform.
    pub fn with_transform<S, T>(source: S, transform: T, capacity: usize) -> Self
    where
        S: TextSource + 'static,
        T: LineTransform + 'static,
    {
        Self::spawn(source, SharedTransform::new(transform), capacity, None)
    }

    /// Start a pipe with capacity, timeout and transforms taken from `config`.
    pub fn from_config<S>(source: S, config: &PipeConfig) -> Result<Self>
    where
        S: TextSource + 'static,
    {
        config.validate()?;
        Ok(Self::spawn(
            source,
            SharedTransform::new(config.build_chain()),
            config.capacity,
            config.read_timeout,
        ))
    }

    /// Start a pipe over a byte reader, decoding UTF-8 in `config.chunk_size` reads.
    pub fn from_reader<R>(reader: R, config: &PipeConfig) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self::from_config(ReaderSource::with_chunk_size(reader, config.chunk_size), config)
    }

    fn spawn<S>(
        source: S,
        transform: SharedTransform,
        capacity: usize,
        read_timeout: Option<Duration>,
    ) -> Self
    where
        S: TextSource + 'static,
    {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (cancel, cancel_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            closed: AtomicBool::new(false),
            cancel,
        });

        let mut pipe = Self {
            rx,
            state: PipeState::Idle,
            shared,
            cancel_rx: cancel_rx.clone(),
            producer: None,
            read_timeout,
        };

        debug!(capacity, "Starting pipe producer");
        pipe.producer = Some(tokio::spawn(produce(source, transform, tx, cancel_rx)));
        pipe.state = PipeState::Running;
        pipe
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &PipeState {
        &self.state
    }

    /// A handle that can close this pipe from another task.
    pub fn handle(&self) -> PipeHandle {
        PipeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Read the next transformed line, or `None` at end of stream.
    ///
    /// Uses the configured read timeout, if any.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self.read_numbered().await?.map(Line::into_text))
    }

    /// Like [`read_line`](Self::read_line) but keeps the line number.
    pub async fn read_numbered(&mut self) -> Result<Option<Line>> {
        self.read_with_limit(self.read_timeout).await
    }

    /// Wait at most `limit` for the next line.
    ///
    /// A timeout leaves the pipe running; a later read may still succeed.
    pub async fn read_line_timeout(&mut self, limit: Duration) -> Result<Option<String>> {
        Ok(self
            .read_with_limit(Some(limit))
            .await?
            .map(Line::into_text))
    }

    /// Drain the remaining lines into memory.
    pub async fn collect_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }

    async fn read_with_limit(&mut self, limit: Option<Duration>) -> Result<Option<Line>> {
        match &self.state {
            PipeState::Completed | PipeState::Closed => return Ok(None),
            PipeState::Failed(err) => return Err(err.clone()),
            PipeState::Idle | PipeState::Running => {}
        }

        let received = match limit {
            Some(limit) => match tokio::time::timeout(limit, self.receive()).await {
                Ok(received) => received,
                Err(_) => {
                    trace!(?limit, "Read timed out; pipe still running");
                    return Err(PipeError::Timeout(limit));
                }
            },
            None => self.receive().await,
        };

        match received {
            Received::Message(Message::Line(line)) => Ok(Some(line)),
            Received::Message(Message::EndOfStream) => {
                self.join_producer().await;
                self.state = PipeState::Completed;
                debug!("Pipe completed");
                Ok(None)
            }
            Received::Message(Message::Failure(err)) => {
                self.join_producer().await;
                warn!("Pipe failed: {}", err);
                self.state = PipeState::Failed(err.clone());
                Err(err)
            }
            Received::Cancelled => {
                self.rx.close();
                self.join_producer().await;
                self.state = PipeState::Closed;
                Ok(None)
            }
            Received::Disconnected => {
                if self.shared.is_closed() {
                    self.join_producer().await;
                    self.state = PipeState::Closed;
                    return Ok(None);
                }
                let reason = match self.producer.take() {
                    Some(handle) => match handle.await {
                        Err(e) if e.is_panic() => format!("producer panicked: {e}"),
                        Err(e) => e.to_string(),
                        Ok(()) => "channel closed".to_string(),
                    },
                    None => "channel closed".to_string(),
                };
                let err = PipeError::ProducerAborted(reason);
                warn!("Pipe failed: {}", err);
                self.state = PipeState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Wait for a message or for cancellation. Cancel-safe.
    async fn receive(&mut self) -> Received {
        tokio::select! {
            biased;
            _ = cancelled(&mut self.cancel_rx) => Received::Cancelled,
            message = self.rx.recv() => match message {
                Some(message) => Received::Message(message),
                None => Received::Disconnected,
            },
        }
    }

    /// Close the pipe: stop the producer and wait until it has released the
    /// source. Idempotent; closing a finished pipe leaves its state alone.
    pub async fn close(&mut self) {
        self.shared.close();
        self.rx.close();
        self.join_producer().await;
        if !self.state.is_terminal() {
            debug!("Pipe closed by consumer");
            self.state = PipeState::Closed;
        }
    }

    async fn join_producer(&mut self) {
        if let Some(handle) = self.producer.take() {
            if let Err(e) = handle.await {
                warn!("Pipe producer did not shut down cleanly: {}", e);
            }
        }
    }

    /// Consume the pipe as a `futures::Stream` of numbered lines.
    pub fn into_stream(self) -> LineStream {
        stream::line_stream(self)
    }

    /// Consume the pipe as a byte reader yielding `line\n` for every line.
    pub fn into_async_read(self) -> PipeReader {
        PipeReader::new(self)
    }
}

impl Drop for StreamingPipe {
    fn drop(&mut self) {
        // The producer notices the flag (or the dropped receiver) and closes
        // the source on its own.
        if self.producer.is_some() {
            self.shared.close();
        }
    }
}

impl std::fmt::Debug for StreamingPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingPipe")
            .field("state", &self.state)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// A pipe is itself a source, so pipes can be chained.
#[async_trait]
impl TextSource for StreamingPipe {
    async fn read_chunk(&mut self) -> io::Result<Option<String>> {
        match self.read_line().await {
            Ok(Some(mut line)) => {
                line.push('\n');
                Ok(Some(line))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        StreamingPipe::close(self).await;
        Ok(())
    }
}

enum Received {
    Message(Message),
    Cancelled,
    Disconnected,
}

/// Resolves once the pipe is closed. A dropped sender means the pipe itself
/// is gone, which counts as closed too.
async fn cancelled(flag: &mut watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            return;
        }
    }
}

async fn produce<S>(
    source: S,
    transform: SharedTransform,
    tx: mpsc::Sender<Message>,
    mut cancel: watch::Receiver<bool>,
) where
    S: TextSource,
{
    let mut lines = LineReader::new(source);
    let exit = pump(&mut lines, &transform, &tx, &mut cancel).await;
    drop(tx);

    if let Err(e) = lines.close().await {
        warn!("Failed to close pipe source: {}", e);
    }

    match exit {
        ProducerExit::Finished => debug!("Pipe producer finished"),
        ProducerExit::Cancelled => debug!("Pipe producer cancelled"),
        ProducerExit::ConsumerGone => debug!("Pipe consumer went away; producer stopping"),
    }
}

async fn pump<S>(
    lines: &mut LineReader<S>,
    transform: &SharedTransform,
    tx: &mpsc::Sender<Message>,
    cancel: &mut watch::Receiver<bool>,
) -> ProducerExit
where
    S: TextSource,
{
    let mut line_no = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancelled(cancel) => return ProducerExit::Cancelled,
            next = lines.next_line() => next,
        };

        let message = match next {
            Ok(Some(text)) => {
                line_no += 1;
                trace!(line = line_no, "Transforming line");
                match apply_guarded(transform, line_no, &text) {
                    Ok(rewritten) => Message::Line(Line::new(line_no, rewritten)),
                    Err(source) => Message::Failure(PipeError::Transform {
                        line: line_no,
                        source,
                    }),
                }
            }
            Ok(None) => {
                debug!(lines = line_no, "Pipe source exhausted");
                Message::EndOfStream
            }
            Err(e) => {
                warn!("Pipe source read failed after line {}: {}", line_no, e);
                Message::Failure(PipeError::source_read(e))
            }
        };

        let terminal = !matches!(message, Message::Line(_));
        tokio::select! {
            biased;
            _ = cancelled(cancel) => return ProducerExit::Cancelled,
            sent = tx.send(message) => {
                if sent.is_err() {
                    return ProducerExit::ConsumerGone;
                }
            }
        }

        if terminal {
            return ProducerExit::Finished;
        }
    }
}

/// Run a transform, turning a panic into a [`TransformError`].
fn apply_guarded(
    transform: &SharedTransform,
    line_no: usize,
    text: &str,
) -> std::result::Result<String, TransformError> {
    panic::catch_unwind(AssertUnwindSafe(|| transform.apply(line_no, text))).unwrap_or_else(
        |payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(TransformError::failed(format!("transform panicked: {reason}")))
        },
    )
}
