//! Property tests for the transform algebra
//!
//! Verifies:
//! - Identity: identity ∘ f == f == f ∘ identity
//! - Associativity: (f ∘ g) ∘ h == f ∘ (g ∘ h)
//! - Chains fold the same way nested composition does
//! - Escape/unescape round-trip and column trim bounds

use linepipe::{
    compose, compose_all, escape, unescape, ColumnTrim, Escape, Identity, LineTransform,
    LineTransformExt, SharedTransform, TransformChain,
};
use proptest::prelude::*;

fn reverse(_: usize, line: &str) -> String {
    line.chars().rev().collect()
}

fn tag_number(n: usize, line: &str) -> String {
    format!("{n}:{line}")
}

/// A small menu of deterministic transforms to compose.
fn transform_strategy() -> impl Strategy<Value = SharedTransform> {
    prop_oneof![
        Just(Escape.shared()),
        Just(SharedTransform::new(reverse)),
        Just(SharedTransform::new(tag_number)),
        (0usize..6, 0usize..12).prop_map(|(from, to)| ColumnTrim::new(from, to).shared()),
    ]
}

fn line_strategy() -> impl Strategy<Value = String> {
    "[a-z \"\\\\\t日本😀]{0,20}"
}

proptest! {
    #[test]
    fn prop_identity_is_neutral(
        f in transform_strategy(),
        n in 1usize..10_000,
        line in line_strategy(),
    ) {
        let expected = f.apply(n, &line).unwrap();
        prop_assert_eq!(compose(Identity, f.clone()).apply(n, &line).unwrap(), expected.clone());
        prop_assert_eq!(compose(f, Identity).apply(n, &line).unwrap(), expected);
    }

    #[test]
    fn prop_composition_is_associative(
        f in transform_strategy(),
        g in transform_strategy(),
        h in transform_strategy(),
        n in 1usize..10_000,
        line in line_strategy(),
    ) {
        let left = compose(compose(f.clone(), g.clone()), h.clone());
        let right = compose(f, compose(g, h));
        prop_assert_eq!(left.apply(n, &line).unwrap(), right.apply(n, &line).unwrap());
    }

    #[test]
    fn prop_chain_matches_nested_compose(
        stages in prop::collection::vec(transform_strategy(), 0..6),
        n in 1usize..10_000,
        line in line_strategy(),
    ) {
        let chain = compose_all(stages.clone());
        let nested = stages
            .into_iter()
            .fold(SharedTransform::identity(), |acc, stage| acc.then(stage).shared());
        prop_assert_eq!(chain.apply(n, &line).unwrap(), nested.apply(n, &line).unwrap());
    }

    #[test]
    fn prop_chain_combine_is_concatenation(
        left in prop::collection::vec(transform_strategy(), 0..4),
        right in prop::collection::vec(transform_strategy(), 0..4),
        line in line_strategy(),
    ) {
        let combined = compose_all(left.clone()).combine(compose_all(right.clone()));
        let flat: TransformChain = left.into_iter().chain(right).collect();
        prop_assert_eq!(combined.apply(7, &line).unwrap(), flat.apply(7, &line).unwrap());
    }

    #[test]
    fn prop_escape_round_trips(line in any::<String>()) {
        prop_assert_eq!(unescape(&escape(&line)).unwrap(), line);
    }

    #[test]
    fn prop_escape_output_has_no_control_or_non_ascii(line in any::<String>()) {
        let escaped = escape(&line);
        prop_assert!(escaped.chars().all(|c| c.is_ascii() && c >= ' '));
    }

    #[test]
    fn prop_column_trim_is_a_char_window(
        line in line_strategy(),
        from in 0usize..30,
        to in 0usize..30,
    ) {
        let trimmed = ColumnTrim::new(from, to).apply(1, &line).unwrap();
        let len = line.chars().count();
        let expected_len = if to <= from { 0 } else { to.min(len).saturating_sub(from) };
        prop_assert_eq!(trimmed.chars().count(), expected_len);
        prop_assert!(line.contains(trimmed.as_str()));
    }
}

#[test]
fn test_empty_chain_is_identity() {
    let chain = TransformChain::new();
    assert_eq!(chain.apply(1, "unchanged").unwrap(), "unchanged");
}
