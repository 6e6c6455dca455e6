//! Line transforms and their composition
//!
//! A transform rewrites the text of one line, given its 1-based line number.
//! Transforms are plain values: closures, the reference transforms in this
//! module, or anything implementing [`LineTransform`]. They compose with
//! [`compose`] / [`LineTransformExt::then`] and fold into a single
//! [`TransformChain`] with [`compose_all`].

pub mod column;
pub mod compose;
pub mod dump;
pub mod escape;

pub use column::ColumnTrim;
pub use compose::{compose, compose_all, Composed, Identity, LineTransformExt, TransformChain};
pub use dump::{DiagnosticSink, DumpEntry, DumpTap, MemorySink, StdoutSink, TracingSink};
pub use escape::{escape, unescape, Escape, Unescape};

use crate::error::TransformResult;
use std::fmt;
use std::sync::Arc;

/// A single line of text tagged with its position in the source.
///
/// The number is assigned once by the producer and never changes; only the
/// text is rewritten by transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    number: usize,
    text: String,
}

impl Line {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// 1-based line number.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Rewrites the text of one line.
///
/// Implementations must accept any text, including the empty string, and any
/// line number `>= 1`. Side effects are allowed as long as they do not change
/// the returned text.
pub trait LineTransform: Send + Sync {
    fn apply(&self, line_no: usize, line: &str) -> TransformResult<String>;
}

impl<F> LineTransform for F
where
    F: Fn(usize, &str) -> String + Send + Sync,
{
    fn apply(&self, line_no: usize, line: &str) -> TransformResult<String> {
        Ok(self(line_no, line))
    }
}

/// Adapter for closures that can fail.
pub struct FallibleFn<F>(F);

/// Wrap a fallible closure as a [`LineTransform`].
pub fn fallible<F>(f: F) -> FallibleFn<F>
where
    F: Fn(usize, &str) -> TransformResult<String> + Send + Sync,
{
    FallibleFn(f)
}

impl<F> LineTransform for FallibleFn<F>
where
    F: Fn(usize, &str) -> TransformResult<String> + Send + Sync,
{
    fn apply(&self, line_no: usize, line: &str) -> TransformResult<String> {
        (self.0)(line_no, line)
    }
}

/// Reference-counted, type-erased transform.
///
/// This is the unit a [`TransformChain`] stores and what the pipe's producer
/// task holds on to.
#[derive(Clone)]
pub struct SharedTransform(Arc<dyn LineTransform>);

impl SharedTransform {
    pub fn new<T: LineTransform + 'static>(transform: T) -> Self {
        Self(Arc::new(transform))
    }

    pub fn identity() -> Self {
        Self::new(Identity)
    }
}

impl LineTransform for SharedTransform {
    fn apply(&self, line_no: usize, line: &str) -> TransformResult<String> {
        self.0.apply(line_no, line)
    }
}

impl fmt::Debug for SharedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedTransform").finish()
    }
}

impl From<Arc<dyn LineTransform>> for SharedTransform {
    fn from(inner: Arc<dyn LineTransform>) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;

    #[test]
    fn test_closure_is_a_transform() {
        let upper = |_: usize, line: &str| line.to_uppercase();
        assert_eq!(upper.apply(1, "abc").unwrap(), "ABC");
    }

    #[test]
    fn test_closure_sees_line_number() {
        let numbered = |n: usize, line: &str| format!("{n}:{line}");
        assert_eq!(numbered.apply(7, "x").unwrap(), "7:x");
        assert_eq!(numbered.apply(1, "").unwrap(), "1:");
    }

    #[test]
    fn test_fallible_closure_propagates_error() {
        let strict = fallible(|n, line: &str| {
            if line.is_empty() {
                Err(TransformError::failed(format!("line {n} is empty")))
            } else {
                Ok(line.to_string())
            }
        });
        assert_eq!(strict.apply(1, "ok").unwrap(), "ok");
        assert_eq!(
            strict.apply(2, "").unwrap_err(),
            TransformError::Failed("line 2 is empty".to_string())
        );
    }

    #[test]
    fn test_shared_transform_delegates() {
        let shared = SharedTransform::new(|_: usize, line: &str| line.repeat(2));
        let copy = shared.clone();
        assert_eq!(shared.apply(1, "ab").unwrap(), "abab");
        assert_eq!(copy.apply(1, "c").unwrap(), "cc");
    }

    #[test]
    fn test_line_accessors() {
        let line = Line::new(3, "text");
        assert_eq!(line.number(), 3);
        assert_eq!(line.text(), "text");
        assert_eq!(line.to_string(), "text");
        assert_eq!(line.into_text(), "text");
    }
}
