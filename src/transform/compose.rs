//! Composition of line transforms
//!
//! Composition is sequencing: `compose(a, b)` feeds the output of `a` into `b`
//! for the same line number. It is associative and has [`Identity`] as its
//! neutral element, so any ordered list of transforms reduces to one value.
//! Composition is not commutative.

use super::{LineTransform, SharedTransform};
use crate::error::TransformResult;

/// The neutral transform: returns every line unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl LineTransform for Identity {
    fn apply(&self, _line_no: usize, line: &str) -> TransformResult<String> {
        Ok(line.to_owned())
    }
}

/// `first` followed by `second`.
#[derive(Debug, Clone)]
pub struct Composed<A, B> {
    first: A,
    second: B,
}

impl<A, B> LineTransform for Composed<A, B>
where
    A: LineTransform,
    B: LineTransform,
{
    fn apply(&self, line_no: usize, line: &str) -> TransformResult<String> {
        let intermediate = self.first.apply(line_no, line)?;
        self.second.apply(line_no, &intermediate)
    }
}

/// Sequence two transforms: `compose(a, b).apply(n, s) == b.apply(n, a.apply(n, s))`.
pub fn compose<A, B>(first: A, second: B) -> Composed<A, B>
where
    A: LineTransform,
    B: LineTransform,
{
    Composed { first, second }
}

/// Combinators available on every transform.
pub trait LineTransformExt: LineTransform + Sized {
    /// Run `self`, then `next` on its output.
    fn then<T: LineTransform>(self, next: T) -> Composed<Self, T> {
        compose(self, next)
    }

    /// Erase the concrete type.
    fn shared(self) -> SharedTransform
    where
        Self: 'static,
    {
        SharedTransform::new(self)
    }
}

impl<T: LineTransform> LineTransformExt for T {}

/// An ordered list of transforms applied left to right.
///
/// This is the left fold of [`compose`] over its stages; an empty chain is the
/// identity. Chains concatenate with [`TransformChain::combine`], which is
/// associative with the empty chain as its unit.
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    stages: Vec<SharedTransform>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage to the end of the chain.
    pub fn then<T: LineTransform + 'static>(mut self, next: T) -> Self {
        self.stages.push(SharedTransform::new(next));
        self
    }

    pub fn push(&mut self, stage: SharedTransform) {
        self.stages.push(stage);
    }

    /// Concatenate two chains: all of `self`'s stages run before `other`'s.
    pub fn combine(mut self, other: Self) -> Self {
        self.stages.extend(other.stages);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl LineTransform for TransformChain {
    fn apply(&self, line_no: usize, line: &str) -> TransformResult<String> {
        let Some((head, tail)) = self.stages.split_first() else {
            return Ok(line.to_owned());
        };

        let mut current = head.apply(line_no, line)?;
        for stage in tail {
            current = stage.apply(line_no, &current)?;
        }
        Ok(current)
    }
}

impl FromIterator<SharedTransform> for TransformChain {
    fn from_iter<I: IntoIterator<Item = SharedTransform>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}

impl Extend<SharedTransform> for TransformChain {
    fn extend<I: IntoIterator<Item = SharedTransform>>(&mut self, iter: I) {
        self.stages.extend(iter);
    }
}

/// Reduce an ordered list of transforms to one. `compose_all([])` is the identity.
pub fn compose_all<I>(transforms: I) -> TransformChain
where
    I: IntoIterator<Item = SharedTransform>,
{
    transforms.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use crate::transform::{fallible, ColumnTrim, Escape};
    use std::sync::{Arc, Mutex};

    fn suffix(tag: &'static str) -> SharedTransform {
        SharedTransform::new(move |_: usize, line: &str| format!("{line}{tag}"))
    }

    #[test]
    fn test_identity_returns_input() {
        assert_eq!(Identity.apply(1, "").unwrap(), "");
        assert_eq!(Identity.apply(42, "unchanged 世界").unwrap(), "unchanged 世界");
    }

    #[test]
    fn test_compose_applies_first_then_second() {
        let t = compose(suffix("a"), suffix("b"));
        assert_eq!(t.apply(1, "x").unwrap(), "xab");

        let reversed = compose(suffix("b"), suffix("a"));
        assert_eq!(reversed.apply(1, "x").unwrap(), "xba");
    }

    #[test]
    fn test_compose_all_empty_is_identity() {
        let chain = compose_all(Vec::new());
        assert!(chain.is_empty());
        assert_eq!(chain.apply(1, "as is").unwrap(), "as is");
        assert_eq!(chain.apply(2, "").unwrap(), "");
    }

    #[test]
    fn test_compose_all_matches_nested_compose() {
        let chain = compose_all(vec![suffix("1"), suffix("2"), suffix("3")]);
        let left = compose(compose(suffix("1"), suffix("2")), suffix("3"));
        let right = compose(suffix("1"), compose(suffix("2"), suffix("3")));

        for input in ["", "line", "日本"] {
            let expected = chain.apply(5, input).unwrap();
            assert_eq!(left.apply(5, input).unwrap(), expected);
            assert_eq!(right.apply(5, input).unwrap(), expected);
        }
        assert_eq!(chain.apply(1, "x").unwrap(), "x123");
    }

    #[test]
    fn test_every_stage_sees_same_line_number() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = |seen: Arc<Mutex<Vec<usize>>>| {
            SharedTransform::new(move |n: usize, line: &str| {
                seen.lock().unwrap().push(n);
                line.to_string()
            })
        };

        let chain = compose_all(vec![record(seen.clone()), record(seen.clone())]);
        chain.apply(9, "a").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![9, 9]);
    }

    #[test]
    fn test_order_matters_for_trim_and_escape() {
        let trim_then_escape = ColumnTrim::new(0, 5).then(Escape);
        let escape_then_trim = Escape.then(ColumnTrim::new(0, 5));

        let a = trim_then_escape.apply(1, "\"quoted\" text").unwrap();
        let b = escape_then_trim.apply(1, "\"quoted\" text").unwrap();
        assert_eq!(a, "\\\"quot");
        assert_eq!(b, "\\\"quo");
        assert_ne!(a, b);
    }

    #[test]
    fn test_error_short_circuits_later_stages() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let chain = TransformChain::new()
            .then(fallible(|_, _: &str| Err(TransformError::failed("nope"))))
            .then(move |_: usize, line: &str| {
                *counter.lock().unwrap() += 1;
                line.to_string()
            });

        assert!(chain.apply(1, "x").is_err());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_combine_is_concatenation() {
        let ab = compose_all(vec![suffix("a"), suffix("b")]);
        let c = compose_all(vec![suffix("c")]);
        let combined = ab.combine(c).combine(TransformChain::new());
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.apply(1, "").unwrap(), "abc");
    }
}
