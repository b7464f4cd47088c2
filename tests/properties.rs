//! Property-based tests for occurrence matching.
//!
//! Uses proptest to check the partition invariants over arbitrary child
//! lists, including lists that do not match at all.

use compositor::compositor::{Group, Member, Occurs, Particle};
use compositor::definitions::SchemaDefinitions;
use compositor::{match_content, Guard, MatchError, ModelType, QName};
use proptest::prelude::*;

fn names(list: &[&str]) -> Vec<QName> {
    list.iter().map(|n| QName::local(*n)).collect()
}

fn sequence_model() -> Group {
    Group::sequence()
        .with_occurs(Occurs::new(1, Some(3)))
        .with_member(Member::element("A", Occurs::once()))
        .with_member(Member::element("B", Occurs::new(0, Some(2))))
        .with_member(Member::element("C", Occurs::optional()))
}

fn choice_model() -> Group {
    Group::choice()
        .with_occurs(Occurs::new(1, Some(4)))
        .with_member(Member::element("A", Occurs::new(1, Some(2))))
        .with_member(Member::element("B", Occurs::optional()))
        .with_member(Member::element("C", Occurs::once()))
}

fn all_model() -> Group {
    Group::all()
        .with_member(Member::element("P", Occurs::once()))
        .with_member(Member::element("Q", Occurs::optional()))
        .with_member(Member::element("R", Occurs::once()))
        .with_member(Member::element("S", Occurs::optional()))
}

fn children(alphabet: &'static [&'static str]) -> impl Strategy<Value = Vec<QName>> {
    prop::collection::vec(prop::sample::select(alphabet), 0..12)
        .prop_map(|picked| picked.into_iter().map(QName::local).collect())
}

fn snapshot(group: &Group, defs: &SchemaDefinitions, children: &[QName]) -> (Vec<std::ops::Range<usize>>, Result<(), MatchError>) {
    let result = match_content(group, defs, children);
    let spans = result.occurrences().iter().map(|o| o.span()).collect();
    (spans, result.verdict().clone())
}

/// Effective minimum: a choice with an optional alternative may be absent
fn effective_min(group: &Group) -> u32 {
    match group.model() {
        ModelType::Choice if group.members().iter().any(|m| m.min_occurs() == 0) => 0,
        _ => group.min_occurs(),
    }
}

// =============================================================================
// Determinism
// =============================================================================

proptest! {
    /// Matching the same children twice gives the same partition and verdict
    #[test]
    fn prop_matching_is_deterministic(kids in children(&["A", "B", "C", "Z"])) {
        let defs = SchemaDefinitions::default();
        for group in [sequence_model(), choice_model()] {
            prop_assert_eq!(snapshot(&group, &defs, &kids), snapshot(&group, &defs, &kids));
        }
    }
}

// =============================================================================
// Occurrence bounds
// =============================================================================

proptest! {
    /// A valid match has an occurrence count within the group's bounds
    #[test]
    fn prop_valid_matches_respect_bounds(kids in children(&["A", "B", "C"])) {
        let defs = SchemaDefinitions::default();
        for group in [sequence_model(), choice_model()] {
            let guard = Guard::new(&group, &defs, &kids);
            if guard.check_valid().is_ok() {
                let found = guard.occurrence_count() as u32;
                prop_assert!(found >= effective_min(&group));
                prop_assert!(group.max_occurs().map_or(true, |max| found <= max));
            }
        }
    }

    /// Occurrences tile the matched children without gaps or overlaps
    #[test]
    fn prop_occurrences_are_contiguous(kids in children(&["A", "B", "C"])) {
        let defs = SchemaDefinitions::default();
        for group in [sequence_model(), choice_model()] {
            let guard = Guard::new(&group, &defs, &kids);
            let mut next = 0;
            for occurrence in guard.occurrences() {
                prop_assert_eq!(occurrence.span().start, next);
                prop_assert!(!occurrence.is_empty());
                next = occurrence.span().end;
            }
            prop_assert_eq!(next, kids.len());
        }
    }

    /// A guard that already holds a partitioning error never accepts more
    #[test]
    fn prop_errors_block_insertion(kids in children(&["A", "B", "C", "Z"])) {
        let defs = SchemaDefinitions::default();
        let group = sequence_model();
        let guard = Guard::new(&group, &defs, &kids);
        if guard.error().is_some() {
            prop_assert!(!guard.accepts_new_member());
        }
    }
}

// =============================================================================
// Order sensitivity
// =============================================================================

proptest! {
    /// All groups do not care about order
    #[test]
    fn prop_all_is_permutation_invariant(
        order in Just(vec!["P", "Q", "R", "S"]).prop_shuffle(),
        keep in 2usize..=4,
    ) {
        let defs = SchemaDefinitions::default();
        let group = all_model();

        let mut picked: Vec<&str> = order.into_iter().take(keep).collect();
        let shuffled = names(&picked);
        picked.sort_unstable();
        let sorted = names(&picked);

        let left = match_content(&group, &defs, &shuffled);
        let right = match_content(&group, &defs, &sorted);
        prop_assert_eq!(left.verdict(), right.verdict());
        prop_assert_eq!(left.occurrences().len(), right.occurrences().len());
    }

    /// Swapping two sequence members that cannot repeat changes the partition
    #[test]
    fn prop_sequence_is_order_sensitive(prefix in 0usize..3) {
        let defs = SchemaDefinitions::default();
        let group = sequence_model();

        let mut forward = vec!["A"; prefix];
        forward.extend(["A", "C"]);
        let mut backward = vec!["A"; prefix];
        backward.extend(["C", "A"]);

        let forward = names(&forward);
        let backward = names(&backward);
        prop_assert_ne!(
            snapshot(&group, &defs, &forward).0,
            snapshot(&group, &defs, &backward).0
        );
    }
}
