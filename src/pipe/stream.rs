use super::StreamingPipe;
use crate::error::Result;
use crate::transform::Line;
use futures::stream::{self, Stream};
use std::pin::Pin;

/// Numbered lines of a pipe as a `futures::Stream`.
///
/// A terminal error is yielded once and ends the stream; a read timeout is
/// yielded and the stream keeps going.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<Line>> + Send>>;

pub(super) fn line_stream(pipe: StreamingPipe) -> LineStream {
    Box::pin(stream::unfold(Some(pipe), |pipe| async move {
        let mut pipe = pipe?;
        match pipe.read_numbered().await {
            Ok(Some(line)) => Some((Ok(line), Some(pipe))),
            Ok(None) => None,
            Err(e) if e.is_recoverable() => Some((Err(e), Some(pipe))),
            Err(e) => Some((Err(e), None)),
        }
    }))
}
