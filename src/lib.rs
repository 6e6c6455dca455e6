//! # linepipe
//!
//! Streaming line pipes with composable per-line transforms.
//!
//! A [`StreamingPipe`] reads text from a [`TextSource`], splits it into lines,
//! runs every line through a [`LineTransform`] and hands the results to the
//! consumer one line at a time. A background producer task stays at most
//! `capacity` lines ahead of the consumer; closing the pipe stops it and
//! releases the source.
//!
//! ```no_run
//! use linepipe::{ColumnTrim, Escape, LineTransformExt, StrSource, StreamingPipe};
//!
//! # async fn demo() -> linepipe::Result<()> {
//! let transform = ColumnTrim::new(0, 5).then(Escape);
//! let mut pipe = StreamingPipe::with_transform(StrSource::new("\"quoted\" text\n"), transform, 1);
//! while let Some(line) = pipe.read_line().await? {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `transform` - The `LineTransform` algebra and the reference transforms
//! - `source` - Text sources and terminator-agnostic line splitting
//! - `pipe` - The producer/consumer pipe and its stream and reader adapters
//! - `config` - TOML-loadable pipe configuration
//! - `error` - Error types
//! - `logging` - Subscriber setup for hosts that want it
pub mod config;
pub mod error;
pub mod logging;
pub mod pipe;
pub mod source;
pub mod transform;

pub use config::{DumpTarget, PipeConfig, TransformConfig};
pub use error::{PipeError, Result, TransformError, TransformResult};
pub use pipe::{LineStream, PipeHandle, PipeReader, PipeState, StreamingPipe};
pub use source::{FileSource, LineReader, ReaderSource, StrSource, TextSource};
pub use transform::{
    compose, compose_all, escape, fallible, unescape, ColumnTrim, Composed, DiagnosticSink,
    DumpTap, Escape, Identity, Line, LineTransform, LineTransformExt, MemorySink, SharedTransform,
    StdoutSink, TracingSink, TransformChain, Unescape,
};
