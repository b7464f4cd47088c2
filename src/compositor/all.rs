//! All matching
//!
//! An all group occurs at most once, and within that occurrence each member
//! appears at most its maxOccurs times, in any order.

use tracing::trace;

use crate::error::MatchError;
use crate::namespaces::QName;
use crate::resolver::Resolver;

use super::groups::Group;
use super::guards::{GuardCore, GuardOptions, Occurrence, Unit};
use super::particles::Particle;

/// Occurrence matcher for all groups
#[derive(Debug)]
pub struct AllGuard<'a> {
    pub(crate) core: GuardCore<'a>,
}

impl<'a> AllGuard<'a> {
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

    /// Check the number of occurrences against the group's bounds
    pub fn check_valid(&self) -> Result<(), MatchError> {
        self.core.check_bounds(self.core.group.min_occurs())
    }

    /// Whether the element could take one more occurrence
    pub fn accepts_new_member(&self) -> bool {
        self.core.has_room()
    }

    /// Whether `name` could be inserted, which for an all group only
    /// depends on how often its member already appears
    pub fn accepts_new_member_at(&self, name: &QName, at: usize) -> bool {
        self.core.accepts_at(name, at, || self.accepts_new_member())
    }
}

fn place(core: &GuardCore<'_>, occurrences: &mut Vec<Occurrence>, unit: &Unit) -> Result<(), MatchError> {
    let group = core.group;
    let member = &group.members()[unit.member];
    match occurrences.last_mut() {
        None => occurrences.push(Occurrence::start(group.len(), unit)),
        Some(current) => {
            if member.occurs().is_over(current.member_count(unit.member)) {
                let name = &core.children[unit.span.start];
                trace!(member = %member.label(), child = %name, "repeated member of all group");
                return Err(MatchError::DuplicateMember {
                    name: name.to_string(),
                });
            }
            current.push(unit);
        }
    }
    Ok(())
}
