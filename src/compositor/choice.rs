//! Choice matching
//!
//! Each unit is an occurrence of its own, except that consecutive units of
//! the same alternative accumulate into one occurrence up to that
//! alternative's maxOccurs.
//!
//! In mutually exclusive mode ([`GuardOptions::mutually_exclusive`]) each
//! alternative may be chosen at most once over the whole element. Some
//! metadata frameworks read a repeatable choice that way; it is not the
//! XML Schema meaning of choice, so it is only ever enabled by the caller.

use indexmap::IndexSet;
use tracing::trace;

use crate::error::MatchError;
use crate::namespaces::QName;
use crate::resolver::Resolver;

use super::groups::Group;
use super::guards::{GuardCore, GuardOptions, Occurrence, Unit};
use super::members::MemberKind;
use super::particles::Particle;

/// Occurrence matcher for choice groups
#[derive(Debug)]
pub struct ChoiceGuard<'a> {
    pub(crate) core: GuardCore<'a>,
}

impl<'a> ChoiceGuard<'a> {
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

    /// Whether the guard runs in mutually exclusive mode
    pub fn is_mutually_exclusive(&self) -> bool {
        self.core.options.mutually_exclusive
    }

    /// Effective minimum: zero when some alternative may itself be absent
    pub fn min_occurs(&self) -> u32 {
        let group = self.core.group;
        if group.members().iter().any(|m| m.min_occurs() == 0) {
            0
        } else {
            group.min_occurs()
        }
    }

    /// Check the number of occurrences against the effective bounds
    pub fn check_valid(&self) -> Result<(), MatchError> {
        self.core.check_bounds(self.min_occurs())
    }

    /// Whether the alternative at `index` could be chosen once more.
    ///
    /// The member's total over all occurrences is compared with its
    /// maxOccurs, which is stricter than validity: `(X|Y)*` holding
    /// `[X, X]` is valid, yet `X` is not offered again.
    pub fn accepts_member(&self, index: usize) -> bool {
        let group = self.core.group;
        let Some(member) = group.member_at(index) else {
            return false;
        };
        if group.occurs().is_over(self.core.occurrences.len() as u32) {
            return false;
        }
        let total = self.core.member_total(index);
        if self.is_mutually_exclusive() {
            total < 1
        } else {
            !member.occurs().is_over(total)
        }
    }

    /// Names that could be added to the element: every concrete name of an
    /// alternative that [`ChoiceGuard::accepts_member`] allows.
    /// Wildcard alternatives contribute nothing.
    pub fn acceptable_members(&self) -> IndexSet<QName> {
        let resolver = self.core.resolver;
        let mut accepted = IndexSet::new();
        for (index, member) in self.core.group.members().iter().enumerate() {
            if !self.accepts_member(index) {
                continue;
            }
            match member.kind() {
                MemberKind::Element | MemberKind::ElementRef => {
                    if let Ok(names) = member.direct_names(resolver) {
                        accepted.extend(names);
                    }
                }
                MemberKind::GroupRef | MemberKind::NestedGroup => {
                    if let Ok(Some(sub)) = member.sub_group(resolver) {
                        if let Ok(leaves) = sub.leaf_member_names(resolver) {
                            accepted.extend(leaves.iter().cloned());
                        }
                    }
                }
                MemberKind::Wildcard => {}
            }
        }
        accepted
    }

    /// Whether one more child could be added: the element must have room
    /// for an occurrence and some alternative must still be available
    pub fn accepts_new_member(&self) -> bool {
        self.core.has_room() && !self.acceptable_members().is_empty()
    }

    /// Whether `name` could be inserted before position `at`, either by
    /// extending the neighbouring occurrence of the same alternative or by
    /// starting a new one
    pub fn accepts_new_member_at(&self, name: &QName, at: usize) -> bool {
        let core = &self.core;
        let Ok(index) = core.group.resolve_leaf(name, core.resolver) else {
            return false;
        };
        let occurs = core.group.members()[index].occurs();
        let extends = !self.is_mutually_exclusive()
            && core
                .occurrences_around(at)
                .any(|o| o.member_count(index) > 0 && !occurs.is_over(o.member_count(index)));
        extends || self.accepts_member(index)
    }
}

fn place(core: &GuardCore<'_>, occurrences: &mut Vec<Occurrence>, unit: &Unit) -> Result<(), MatchError> {
    let group = core.group;
    let member = &group.members()[unit.member];
    match occurrences.last_mut() {
        Some(current)
            if current.member_count(unit.member) > 0
                && !member.occurs().is_over(current.member_count(unit.member)) =>
        {
            current.push(unit);
        }
        _ => {
            trace!(member = %member.label(), "new choice occurrence");
            occurrences.push(Occurrence::start(group.len(), unit));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::{Guard, Member, Occurs, Wildcard};
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

    fn xy(max: Option<u32>) -> Group {
        Group::choice()
            .with_occurs(Occurs::new(1, max))
            .with_member(Member::element("X", Occurs::once()))
            .with_member(Member::element("Y", Occurs::once()))
    }

    fn set(list: &[&str]) -> IndexSet<QName> {
        list.iter().map(|n| QName::local(*n)).collect()
    }

    #[test]
    fn test_repeats_accumulate_up_to_member_max() {
        let group = Group::choice()
            .with_occurs(Occurs::zero_or_more())
            .with_member(Member::element("X", Occurs::new(1, Some(2))))
            .with_member(Member::element("Y", Occurs::once()));
        let children = names(&["X", "X", "X", "Y", "X"]);
        let guard = Guard::new(&group, &Local, &children);
        let spans: Vec<_> = guard.occurrences().iter().map(Occurrence::span).collect();
        assert_eq!(spans, vec![0..2, 2..3, 3..4, 4..5]);
    }

    #[test]
    fn test_acceptable_members_single_choice() {
        let group = xy(Some(1));
        let children = names(&["X"]);
        let guard = Guard::new(&group, &Local, &children);
        assert!(guard.check_valid().is_ok());
        assert_eq!(guard.acceptable_members(), Some(IndexSet::new()));
        assert!(!guard.accepts_new_member());
    }

    #[test]
    fn test_acceptable_members_repeatable_choice() {
        let group = xy(Some(2));
        let children = names(&["X"]);
        let guard = Guard::new(&group, &Local, &children);
        assert_eq!(guard.acceptable_members(), Some(set(&["Y"])));
        assert!(guard.accepts_new_member());
    }

    #[test]
    fn test_acceptance_counts_totals() {
        let group = xy(None);
        let children = names(&["X", "X"]);
        let guard = Guard::new(&group, &Local, &children);
        assert!(guard.check_valid().is_ok());
        assert_eq!(guard.occurrence_count(), 2);
        assert_eq!(guard.acceptable_members(), Some(set(&["Y"])));
    }

    #[test]
    fn test_mutually_exclusive_mode() {
        let group = Group::choice()
            .with_occurs(Occurs::zero_or_more())
            .with_member(Member::element("X", Occurs::new(0, Some(5))))
            .with_member(Member::element("Y", Occurs::new(0, Some(5))));
        let children = names(&["X", "X"]);

        let standard = Guard::new(&group, &Local, &children);
        assert_eq!(standard.acceptable_members(), Some(set(&["X", "Y"])));
        assert!(standard.accepts_new_member_at(&QName::local("X"), 2));

        let options = GuardOptions::new().mutually_exclusive(true);
        let exclusive = Guard::with_options(&group, &Local, &children, options);
        assert!(exclusive.as_choice().unwrap().is_mutually_exclusive());
        assert_eq!(exclusive.acceptable_members(), Some(set(&["Y"])));
        assert!(!exclusive.accepts_new_member_at(&QName::local("X"), 2));
        assert!(exclusive.accepts_new_member_at(&QName::local("Y"), 2));
    }

    #[test]
    fn test_effective_minimum() {
        let strict = xy(Some(1));
        let guard = Guard::new(&strict, &Local, &[]);
        assert!(matches!(
            guard.check_valid(),
            Err(MatchError::TooFewOccurrences { min: 1, .. })
        ));

        let relaxed = Group::choice()
            .with_member(Member::element("X", Occurs::once()))
            .with_member(Member::element("Y", Occurs::optional()));
        assert!(Guard::new(&relaxed, &Local, &[]).check_valid().is_ok());
    }

    #[test]
    fn test_too_many_occurrences_message() {
        let group = xy(Some(3));
        let children = names(&["X", "Y", "X", "Y"]);
        let err = Guard::new(&group, &Local, &children).check_valid().unwrap_err();
        assert_eq!(err.to_string(), "choice may not occur more than 3 times");
    }

    #[test]
    fn test_unexpected_child() {
        let group = xy(None);
        let children = names(&["X", "W"]);
        let guard = Guard::new(&group, &Local, &children);
        assert_eq!(guard.error(), Some(&MatchError::unexpected("W")));
        assert_eq!(guard.occurrence_count(), 1);
    }

    #[test]
    fn test_nested_and_wildcard_alternatives() {
        let group = Group::choice()
            .with_occurs(Occurs::zero_or_more())
            .with_member(Member::nested(
                Group::sequence()
                    .with_occurs(Occurs::zero_or_more())
                    .with_member(Member::element("p", Occurs::once()))
                    .with_member(Member::element("q", Occurs::once())),
            ))
            .with_member(Member::wildcard(Wildcard::any(), Occurs::once()));
        let children = names(&["p", "q", "z", "p", "q"]);
        let guard = Guard::new(&group, &Local, &children);

        assert_eq!(guard.error(), None);
        assert_eq!(guard.occurrence_count(), 3);
        assert_eq!(guard.acceptable_members(), Some(set(&["p", "q"])));
    }
}
