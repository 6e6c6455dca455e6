//! Line framing over chunked text
//!
//! Lines end at `\n`, `\r\n` or a lone `\r`; the terminator is stripped. A
//! `\r\n` split across two chunks still counts as one terminator. Text after
//! the last terminator becomes a final line if it is non-empty.

use super::TextSource;
use std::io;

/// Incremental, terminator-agnostic line splitter.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: String,
    start: usize,
    skip_lf: bool,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) {
        if self.start > 0 {
            self.buf.drain(..self.start);
            self.start = 0;
        }
        self.buf.push_str(chunk);
    }

    /// The next complete line, if one is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        if self.skip_lf {
            let rest = &self.buf[self.start..];
            if rest.is_empty() {
                // Can't tell yet whether the previous `\r` is followed by `\n`.
                return None;
            }
            if rest.starts_with('\n') {
                self.start += 1;
            }
            self.skip_lf = false;
        }

        let rest = &self.buf[self.start..];
        let end = rest.find(['\n', '\r'])?;
        let line = rest[..end].to_string();
        if rest.as_bytes()[end] == b'\r' {
            self.skip_lf = true;
        }
        self.start += end + 1;
        Some(line)
    }

    /// Flush the unterminated remainder at end of input.
    pub fn finish(&mut self) -> Option<String> {
        let rest = &self.buf[self.start..];
        let line = (!rest.is_empty()).then(|| rest.to_string());
        self.buf.clear();
        self.start = 0;
        self.skip_lf = false;
        line
    }
}

/// Reads whole lines from a [`TextSource`].
pub struct LineReader<S> {
    source: S,
    splitter: LineSplitter,
    exhausted: bool,
}

impl<S: TextSource> LineReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            splitter: LineSplitter::new(),
            exhausted: false,
        }
    }

    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.splitter.next_line() {
                return Ok(Some(line));
            }
            if self.exhausted {
                return Ok(self.splitter.finish());
            }
            match self.source.read_chunk().await? {
                Some(chunk) => self.splitter.push(&chunk),
                None => self.exhausted = true,
            }
        }
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.source.close().await
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}
