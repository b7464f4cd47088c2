//! Sequence matching
//!
//! Order matters: walking the units left to right, a return to an earlier
//! member starts a new occurrence of the sequence, and so does a member
//! repeated past its maxOccurs.

use tracing::trace;

use crate::error::MatchError;
use crate::namespaces::QName;
use crate::resolver::Resolver;

use super::groups::Group;
use super::guards::{GuardCore, GuardOptions, Occurrence, Unit};
use super::particles::Particle;

/// Occurrence matcher for sequence groups
#[derive(Debug)]
pub struct SequenceGuard<'a> {
    pub(crate) core: GuardCore<'a>,
}

impl<'a> SequenceGuard<'a> {
    pub(crate) fn new(
        group: &'a Group,
        resolver: &'a dyn Resolver,
        children: &'a [QName],
        options: GuardOptions,
        depth: usize,
    ) -> Self {
        Self {
            core: GuardCore::partition(group, resolver, children, options, depth, place),
        }
    }

    /// Check the number of occurrences against the sequence's bounds
    pub fn check_valid(&self) -> Result<(), MatchError> {
        self.core.check_bounds(self.core.group.min_occurs())
    }

    /// Whether one more child could be added somewhere.
    ///
    /// A single-member sequence whose occurrences are all used up still
    /// accepts a child while its last occurrence has room for one.
    pub fn accepts_new_member(&self) -> bool {
        if self.core.error.is_some() {
            return false;
        }
        let group = self.core.group;
        let found = self.core.occurrences.len() as u32;
        if group.len() == 1 && group.max_occurs() == Some(found) {
            if let Some(last) = self.core.occurrences.last() {
                return !group.members()[0].occurs().is_over(last.member_count(0));
            }
        }
        !group.occurs().is_over(found)
    }

    /// Whether `name` could be inserted before position `at`.
    ///
    /// Besides extending a neighbouring occurrence, a child inserted at an
    /// occurrence boundary may open a new occurrence while the sequence
    /// has room for one.
    pub fn accepts_new_member_at(&self, name: &QName, at: usize) -> bool {
        self.core
            .accepts_at(name, at, || self.accepts_new_member())
            || self.opens_occurrence_at(name, at)
    }

    fn opens_occurrence_at(&self, name: &QName, at: usize) -> bool {
        let core = &self.core;
        if !core.has_room() {
            return false;
        }
        let Ok(index) = core.group.resolve_leaf(name, core.resolver) else {
            return false;
        };
        let at = at.min(core.children.len());
        if at == 0 {
            return true;
        }
        let Some(&before) = core.assignments.get(at - 1) else {
            return false;
        };
        // Splitting a nested run would change the nested partition.
        if core.assignments.get(at) == Some(&before)
            && matches!(core.group.members()[before].sub_group(core.resolver), Ok(Some(_)))
        {
            return false;
        }
        let opens = index <= before;
        trace!(index, at, opens, "boundary insertion");
        opens
    }
}

fn place(core: &GuardCore<'_>, occurrences: &mut Vec<Occurrence>, unit: &Unit) -> Result<(), MatchError> {
    let group = core.group;
    let member = &group.members()[unit.member];

    let continues = match occurrences.last() {
        None => false,
        Some(current) => {
            let last = current_member(current);
            if unit.member < last {
                trace!(member = %member.label(), "member index regressed, new occurrence");
                false
            } else if unit.member == last && member.occurs().is_over(current.member_count(last)) {
                trace!(member = %member.label(), "member maxOccurs reached, new occurrence");
                false
            } else {
                true
            }
        }
    };

    match occurrences.last_mut() {
        Some(current) if continues => current.push(unit),
        _ => occurrences.push(Occurrence::start(group.len(), unit)),
    }
    Ok(())
}

/// Highest member index present in the occurrence. Units are placed in
/// non-decreasing member order within a sequence occurrence.
fn current_member(occurrence: &Occurrence) -> usize {
    occurrence
        .counts()
        .iter()
        .rposition(|&count| count > 0)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{Guard, Member, Occurs};
    use crate::resolver::GlobalDef;

    struct Local;

    impl Resolver for Local {
        fn resolve_instance_name(&self, name: &str) -> Result<QName, MatchError> {
            Ok(QName::local(name))
        }

        fn lookup_global(&self, _name: &str) -> Option<GlobalDef> {
            None
        }
    }

    fn names(list: &[&str]) -> Vec<QName> {
        list.iter().map(|n| QName::local(*n)).collect()
    }

    fn abc() -> Group {
        Group::sequence()
            .with_occurs(Occurs::zero_or_more())
            .with_member(Member::element("a", Occurs::once()))
            .with_member(Member::element("b", Occurs::new(0, Some(2))))
            .with_member(Member::element("c", Occurs::optional()))
    }

    #[test]
    fn test_index_regression_starts_occurrence() {
        let group = abc();
        let children = names(&["a", "b", "c", "a", "c"]);
        let guard = Guard::new(&group, &Local, &children);
        let spans: Vec<_> = guard.occurrences().iter().map(Occurrence::span).collect();
        assert_eq!(spans, vec![0..3, 3..5]);
    }

    #[test]
    fn test_member_over_max_starts_occurrence() {
        let group = abc();
        let children = names(&["a", "b", "b", "b"]);
        let guard = Guard::new(&group, &Local, &children);
        assert_eq!(guard.occurrence_count(), 2);
        assert_eq!(guard.occurrences()[0].member_count(1), 2);
        assert_eq!(guard.occurrences()[1].member_count(1), 1);
    }

    #[test]
    fn test_skipped_members_continue_occurrence() {
        let group = abc();
        let children = names(&["a", "c"]);
        let guard = Guard::new(&group, &Local, &children);
        assert_eq!(guard.occurrence_count(), 1);
        assert!(guard.check_valid().is_ok());
    }

    #[test]
    fn test_too_few_occurrences() {
        let group = Group::sequence().with_member(Member::element("a", Occurs::once()));
        let guard = Guard::new(&group, &Local, &[]);
        assert_eq!(
            guard.check_valid(),
            Err(MatchError::TooFewOccurrences {
                compositor: "sequence".into(),
                min: 1,
                found: 0
            })
        );
        assert!(guard.accepts_new_member());
    }

    #[test]
    fn test_single_member_run_length() {
        let group = Group::sequence()
            .with_member(Member::element("item", Occurs::new(1, Some(3))));
        let item = QName::local("item");

        let two = names(&["item", "item"]);
        let guard = Guard::new(&group, &Local, &two);
        assert_eq!(guard.occurrence_count(), 1);
        assert!(guard.accepts_new_member());
        assert!(guard.accepts_new_member_at(&item, 0));

        let three = names(&["item", "item", "item"]);
        let guard = Guard::new(&group, &Local, &three);
        assert!(!guard.accepts_new_member());
        assert!(!guard.accepts_new_member_at(&item, 3));
    }

    #[test]
    fn test_boundary_insertion_opens_occurrence() {
        let group = abc();
        let a = QName::local("a");
        let children = names(&["a", "b", "a", "c"]);
        let guard = Guard::new(&group, &Local, &children);
        assert_eq!(guard.occurrence_count(), 2);

        for at in 0..=children.len() {
            assert!(guard.accepts_new_member_at(&a, at), "a before {}", at);
        }
        // Splitting after the first a gives a, a-b, a-c.
        let mut split = children.clone();
        split.insert(1, a.clone());
        assert!(Guard::new(&group, &Local, &split).check_valid().is_ok());

        let bounded = abc().with_occurs(Occurs::new(0, Some(2)));
        let guard = Guard::new(&bounded, &Local, &children);
        assert!(!guard.accepts_new_member_at(&a, 2));
        assert!(!guard.accepts_new_member_at(&a, 4));
    }

    #[test]
    fn test_order_sensitive() {
        let group = Group::sequence()
            .with_member(Member::element("a", Occurs::once()))
            .with_member(Member::element("b", Occurs::once()));
        let forward = names(&["a", "b"]);
        let backward = names(&["b", "a"]);
        assert_eq!(Guard::new(&group, &Local, &forward).occurrence_count(), 1);
        let guard = Guard::new(&group, &Local, &backward);
        assert_eq!(guard.occurrence_count(), 2);
        assert!(matches!(
            guard.check_valid(),
            Err(MatchError::TooManyOccurrences { max: 1, found: 2, .. })
        ));
    }
}
