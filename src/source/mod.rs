//! Text sources feeding a pipe
//!
//! A [`TextSource`] hands out decoded text in arbitrary chunks and releases its
//! underlying resource on [`TextSource::close`]. Line framing happens on top of
//! it in [`lines`].

pub mod lines;

pub use lines::{LineReader, LineSplitter};

use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default read size for byte-backed sources.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Anything that can supply decoded text chunk by chunk.
#[async_trait]
pub trait TextSource: Send {
    /// The next chunk of text, or `None` once the input is exhausted.
    async fn read_chunk(&mut self) -> io::Result<Option<String>>;

    /// Release the underlying resource. Called once by the pipe.
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<S: TextSource + ?Sized> TextSource for Box<S> {
    async fn read_chunk(&mut self) -> io::Result<Option<String>> {
        (**self).read_chunk().await
    }

    async fn close(&mut self) -> io::Result<()> {
        (**self).close().await
    }
}

/// In-memory source, mostly useful for tests and small inputs.
#[derive(Debug, Clone)]
pub struct StrSource {
    text: String,
    pos: usize,
    chunk_chars: usize,
}

impl StrSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pos: 0,
            chunk_chars: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Hand out at most `chunk_chars` characters per read.
    pub fn with_chunk_size(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }
}

#[async_trait]
impl TextSource for StrSource {
    async fn read_chunk(&mut self) -> io::Result<Option<String>> {
        let rest = &self.text[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }
        let end = rest
            .char_indices()
            .nth(self.chunk_chars)
            .map_or(rest.len(), |(i, _)| i);
        let chunk = rest[..end].to_string();
        self.pos += end;
        Ok(Some(chunk))
    }
}

/// Decodes UTF-8 from any async byte reader.
///
/// Multi-byte sequences split across reads are carried over to the next
/// chunk. Invalid UTF-8, or input ending inside a sequence, is reported as
/// [`io::ErrorKind::InvalidData`]. Text decoded before an invalid byte is
/// still handed out first; the error comes on the following read.
pub struct ReaderSource<R> {
    reader: Option<R>,
    buf: Vec<u8>,
    carry: Vec<u8>,
    deferred: Option<io::Error>,
}

/// A file opened for streaming.
pub type FileSource = ReaderSource<File>;

impl<R> ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader: Some(reader),
            buf: vec![0; chunk_size.max(4)],
            carry: Vec::new(),
            deferred: None,
        }
    }

    /// Whether the underlying reader has been released.
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl ReaderSource<File> {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self::new(file))
    }
}

#[async_trait]
impl<R> TextSource for ReaderSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_chunk(&mut self) -> io::Result<Option<String>> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            let n = reader.read(&mut self.buf).await?;
            if n == 0 {
                if self.carry.is_empty() {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "input ended inside a UTF-8 sequence",
                ));
            }
            self.carry.extend_from_slice(&self.buf[..n]);

            match std::str::from_utf8(&self.carry) {
                Ok(text) => {
                    let chunk = text.to_owned();
                    self.carry.clear();
                    return Ok(Some(chunk));
                }
                Err(e) if e.error_len().is_some() => {
                    let valid = e.valid_up_to();
                    let err = io::Error::new(io::ErrorKind::InvalidData, e);
                    if valid == 0 {
                        self.carry.clear();
                        return Err(err);
                    }
                    self.carry.truncate(valid);
                    let head = std::mem::take(&mut self.carry);
                    self.deferred = Some(err);
                    return String::from_utf8(head)
                        .map(Some)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
                }
                Err(e) => {
                    // Incomplete trailing sequence: emit the valid prefix, keep the tail.
                    let valid = e.valid_up_to();
                    if valid == 0 {
                        continue;
                    }
                    let tail = self.carry.split_off(valid);
                    let head = std::mem::replace(&mut self.carry, tail);
                    return String::from_utf8(head)
                        .map(Some)
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
                }
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        self.reader.take();
        self.carry.clear();
        self.deferred = None;
        Ok(())
    }
}
