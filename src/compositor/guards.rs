//! Occurrence matching
//!
//! A guard partitions the ordered children of one instance element into
//! occurrences of a group, then answers validity and insertion queries
//! about that partition. Guards are built per call and never shared.
//!
//! Partitioning runs in two passes. Every child is first resolved to the
//! direct member controlling it, and contiguous children controlled by the
//! same member form a run. A run controlled by a nested group (or a group
//! reference) is matched recursively and contributes one unit per nested
//! occurrence; any other child is a unit of its own. The kind-specific
//! placement then distributes the units over occurrences.
//!
//! Failures are recorded on the guard instead of being returned, so that
//! advisory queries keep working on an instance that is currently invalid.
//! [`Guard::check_valid`] is the single place they become errors.

use std::ops::Range;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::MatchError;
use crate::limits::Limits;
use crate::namespaces::QName;
use crate::resolver::Resolver;

use super::all::AllGuard;
use super::choice::ChoiceGuard;
use super::groups::{Group, ModelType};
use super::particles::{MaxOccurs, Particle};
use super::sequence::SequenceGuard;

/// Caller-selected matching options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardOptions {
    /// Choice groups let each alternative be chosen at most once in total,
    /// whatever its maxOccurs
    pub mutually_exclusive: bool,
    /// Bounds on nesting and on the number of children matched
    pub limits: Limits,
}

impl GuardOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the mutually exclusive choice mode
    pub fn mutually_exclusive(mut self, enabled: bool) -> Self {
        self.mutually_exclusive = enabled;
        self
    }

    /// Replace the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// One repetition of a group as realized by a contiguous run of children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    span: Range<usize>,
    counts: Vec<u32>,
}

impl Occurrence {
    pub(crate) fn start(members: usize, unit: &Unit) -> Self {
        let mut occurrence = Self {
            span: unit.span.start..unit.span.start,
            counts: vec![0; members],
        };
        occurrence.push(unit);
        occurrence
    }

    pub(crate) fn push(&mut self, unit: &Unit) {
        self.span.end = unit.span.end;
        self.counts[unit.member] += 1;
    }

    /// Positions of the children making up the occurrence
    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    /// Number of children in the occurrence
    pub fn len(&self) -> usize {
        self.span.len()
    }

    /// Whether the occurrence holds no child
    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// Whether the child at `position` belongs to the occurrence
    pub fn contains(&self, position: usize) -> bool {
        self.span.contains(&position)
    }

    /// How many times the member at `index` occurs in this repetition. A
    /// nested member counts its own occurrences, not its children.
    pub fn member_count(&self, index: usize) -> u32 {
        self.counts.get(index).copied().unwrap_or(0)
    }

    /// Per-member counts, indexed like the group's members
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }
}

/// A share of the children attributed to one occurrence of a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unit {
    pub member: usize,
    pub span: Range<usize>,
}

/// Kind-specific placement of units into occurrences
pub(crate) type Placement =
    fn(&GuardCore<'_>, &mut Vec<Occurrence>, &Unit) -> Result<(), MatchError>;

/// State shared by the three guard kinds
#[derive(Debug)]
pub(crate) struct GuardCore<'a> {
    pub group: &'a Group,
    pub resolver: &'a dyn Resolver,
    pub options: GuardOptions,
    pub children: &'a [QName],
    pub assignments: Vec<usize>,
    pub occurrences: Vec<Occurrence>,
    pub error: Option<MatchError>,
}

impl<'a> GuardCore<'a> {
    pub(crate) fn partition(
        group: &'a Group,
        resolver: &'a dyn Resolver,
        children: &'a [QName],
        options: GuardOptions,
        depth: usize,
        place: Placement,
    ) -> Self {
        let mut core = Self {
            group,
            resolver,
            options,
            children,
            assignments: Vec::with_capacity(children.len()),
            occurrences: Vec::new(),
            error: None,
        };

        if let Err(err) = options
            .limits
            .check_nesting_depth(depth)
            .and_then(|_| options.limits.check_children(children.len()))
        {
            core.error = Some(err);
            return core;
        }

        let resolution_error = core.assign_members();
        let (units, unit_error) = core.collect_units(depth);

        let mut occurrences = Vec::new();
        let mut place_error = None;
        for unit in &units {
            if let Err(err) = place(&core, &mut occurrences, unit) {
                place_error = Some(err);
                break;
            }
        }
        core.occurrences = occurrences;
        core.error = place_error.or(unit_error).or(resolution_error);

        debug!(
            group = %group.label(),
            depth,
            children = children.len(),
            occurrences = core.occurrences.len(),
            error = ?core.error,
            "partitioned children"
        );
        core
    }

    fn assign_members(&mut self) -> Option<MatchError> {
        for name in self.children {
            match self.group.resolve_leaf(name, self.resolver) {
                Ok(index) => self.assignments.push(index),
                Err(err) => return Some(err),
            }
        }
        None
    }

    fn collect_units(&self, depth: usize) -> (Vec<Unit>, Option<MatchError>) {
        let mut units = Vec::new();
        let mut start = 0;
        while start < self.assignments.len() {
            let member_index = self.assignments[start];
            let end = self.assignments[start..]
                .iter()
                .position(|&m| m != member_index)
                .map_or(self.assignments.len(), |len| start + len);

            if let Err(err) = self.collect_run(member_index, start..end, depth, &mut units) {
                return (units, Some(err));
            }
            start = end;
        }
        (units, None)
    }

    fn collect_run(
        &self,
        member_index: usize,
        run: Range<usize>,
        depth: usize,
        units: &mut Vec<Unit>,
    ) -> Result<(), MatchError> {
        let member = &self.group.members()[member_index];
        let Some(sub_group) = member.sub_group(self.resolver)? else {
            units.extend(run.map(|position| Unit {
                member: member_index,
                span: position..position + 1,
            }));
            return Ok(());
        };

        let sub = Guard::build(
            sub_group,
            self.resolver,
            &self.children[run.clone()],
            self.options,
            depth + 1,
        );
        if let Some(err) = sub.error() {
            if err.is_schema_defect() {
                return Err(err.clone());
            }
            return Err(MatchError::CannotNormalize {
                member: member.label(),
                reason: err.to_string(),
            });
        }
        let found = sub.occurrence_count();
        if member.occurs().is_exceeded(found as u32) {
            return Err(MatchError::CannotNormalize {
                member: member.label(),
                reason: format!(
                    "{} occurrences found, maxOccurs is {}",
                    found,
                    MaxOccurs(member.max_occurs())
                ),
            });
        }
        units.extend(sub.occurrences().iter().map(|o| Unit {
            member: member_index,
            span: run.start + o.span.start..run.start + o.span.end,
        }));
        Ok(())
    }

    /// Occurrence count checked against `[min, group max]`
    pub(crate) fn check_bounds(&self, min: u32) -> Result<(), MatchError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let found = self.occurrences.len();
        if (found as u64) < u64::from(min) {
            return Err(MatchError::TooFewOccurrences {
                compositor: self.group.label(),
                min,
                found,
            });
        }
        if let Some(max) = self.group.max_occurs() {
            if found as u64 > u64::from(max) {
                return Err(MatchError::TooManyOccurrences {
                    compositor: self.group.label(),
                    max,
                    found,
                });
            }
        }
        Ok(())
    }

    /// No recorded failure and room for one more occurrence
    pub(crate) fn has_room(&self) -> bool {
        self.error.is_none() && !self.group.occurs().is_over(self.occurrences.len() as u32)
    }

    /// Occurrences bordering the insertion point `at`
    pub(crate) fn occurrences_around(&self, at: usize) -> impl Iterator<Item = &Occurrence> {
        let at = at.min(self.children.len());
        self.occurrences
            .iter()
            .filter(move |o| o.contains(at) || (at > 0 && o.contains(at - 1)))
    }

    /// Shared per-name insertion check. `fallback` answers when the group
    /// has a single member or no occurrence borders the insertion point.
    pub(crate) fn accepts_at(&self, name: &QName, at: usize, fallback: impl Fn() -> bool) -> bool {
        let Ok(index) = self.group.resolve_leaf(name, self.resolver) else {
            return false;
        };
        if self.group.len() == 1 {
            return fallback();
        }
        if self
            .group
            .occurs()
            .is_exceeded(self.occurrences.len() as u32)
        {
            return false;
        }
        let occurs = self.group.members()[index].occurs();
        let mut around = self.occurrences_around(at).peekable();
        if around.peek().is_none() {
            return fallback();
        }
        around.any(|o| !occurs.is_over(o.member_count(index)))
    }

    /// Units of the member at `index` over every occurrence
    pub(crate) fn member_total(&self, index: usize) -> u32 {
        self.occurrences.iter().map(|o| o.member_count(index)).sum()
    }
}

/// Occurrence matcher for one group kind
#[derive(Debug)]
pub enum Guard<'a> {
    /// Matcher for sequence groups
    Sequence(SequenceGuard<'a>),
    /// Matcher for choice groups
    Choice(ChoiceGuard<'a>),
    /// Matcher for all groups
    All(AllGuard<'a>),
}

impl<'a> Guard<'a> {
    /// Partition `children` into occurrences of `group`
    pub fn new(group: &'a Group, resolver: &'a dyn Resolver, children: &'a [QName]) -> Self {
        Self::with_options(group, resolver, children, GuardOptions::default())
    }

    /// Partition `children` with explicit options
    pub fn with_options(
        group: &'a Group,
        resolver: &'a dyn Resolver,
        children: &'a [QName],
        options: GuardOptions,
    ) -> Self {
        Self::build(group, resolver, children, options, 0)
    }

    pub(crate) fn build(
        group: &'a Group,
        resolver: &'a dyn Resolver,
        children: &'a [QName],
        options: GuardOptions,
        depth: usize,
    ) -> Self {
        match group.model() {
            ModelType::Sequence => Self::Sequence(SequenceGuard::new(
                group, resolver, children, options, depth,
            )),
            ModelType::Choice => {
                Self::Choice(ChoiceGuard::new(group, resolver, children, options, depth))
            }
            ModelType::All => Self::All(AllGuard::new(group, resolver, children, options, depth)),
        }
    }

    fn core(&self) -> &GuardCore<'a> {
        match self {
            Self::Sequence(g) => &g.core,
            Self::Choice(g) => &g.core,
            Self::All(g) => &g.core,
        }
    }

    /// Compositor kind of the matched group
    pub fn kind(&self) -> ModelType {
        self.core().group.model()
    }

    /// The matched group
    pub fn group(&self) -> &'a Group {
        self.core().group
    }

    /// Options the guard was built with
    pub fn options(&self) -> GuardOptions {
        self.core().options
    }

    /// The partition. When partitioning failed this holds the occurrences
    /// found before the failure.
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.core().occurrences
    }

    /// Number of occurrences
    pub fn occurrence_count(&self) -> usize {
        self.core().occurrences.len()
    }

    /// Failure recorded while partitioning
    pub fn error(&self) -> Option<&MatchError> {
        self.core().error.as_ref()
    }

    /// Index of the direct member controlling each child, for the children
    /// that could be resolved
    pub fn member_indices(&self) -> &[usize] {
        &self.core().assignments
    }

    /// Check the partition against the group's occurrence bounds
    pub fn check_valid(&self) -> Result<(), MatchError> {
        match self {
            Self::Sequence(g) => g.check_valid(),
            Self::Choice(g) => g.check_valid(),
            Self::All(g) => g.check_valid(),
        }
    }

    /// Whether the instance element could take one more occurrence
    pub fn accepts_new_member(&self) -> bool {
        match self {
            Self::Sequence(g) => g.accepts_new_member(),
            Self::Choice(g) => g.accepts_new_member(),
            Self::All(g) => g.accepts_new_member(),
        }
    }

    /// Whether a child named `name` could be inserted before the child at
    /// position `at` (`at == children.len()` appends)
    pub fn accepts_new_member_at(&self, name: &QName, at: usize) -> bool {
        match self {
            Self::Sequence(g) => g.accepts_new_member_at(name, at),
            Self::Choice(g) => g.accepts_new_member_at(name, at),
            Self::All(g) => g.accepts_new_member_at(name, at),
        }
    }

    /// Names that could be added to a choice. `None` for other kinds.
    pub fn acceptable_members(&self) -> Option<IndexSet<QName>> {
        self.as_choice().map(ChoiceGuard::acceptable_members)
    }

    /// The choice matcher, if the group is a choice
    pub fn as_choice(&self) -> Option<&ChoiceGuard<'a>> {
        match self {
            Self::Choice(g) => Some(g),
            Self::Sequence(_) | Self::All(_) => None,
        }
    }

    /// Number of children named `name` among those the guard resolved
    pub fn member_count(&self, name: &QName) -> usize {
        let core = self.core();
        core.children[..core.assignments.len()]
            .iter()
            .filter(|child| *child == name)
            .count()
    }

    /// The occurrence holding the `ordinal`-th child (from 0) controlled by
    /// the member `name` resolves to
    pub fn find_occurrence(&self, name: &QName, ordinal: usize) -> Option<&Occurrence> {
        let core = self.core();
        let index = core.group.resolve_leaf(name, core.resolver).ok()?;
        let position = core
            .assignments
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == index)
            .nth(ordinal)?
            .0;
        core.occurrences.iter().find(|o| o.contains(position))
    }

    /// Short report of the partition
    pub fn describe(&self) -> String {
        let core = self.core();
        let mut report = format!(
            "\"{}\" guard\n\toccurrences: {}\n\t{}",
            core.group.label(),
            core.occurrences.len(),
            core.group.occurs().occurs_info()
        );
        for (i, occurrence) in core.occurrences.iter().enumerate() {
            report.push_str(&format!(
                "\n\t[{}] children {}..{}",
                i, occurrence.span.start, occurrence.span.end
            ));
        }
        if let Some(err) = &core.error {
            report.push_str(&format!("\n\terror: {}", err));
        }
        report
    }
}

/// Outcome of matching one element's children against a group
#[derive(Debug)]
pub struct MatchResult<'a> {
    guard: Guard<'a>,
    verdict: Result<(), MatchError>,
}

impl<'a> MatchResult<'a> {
    /// Whether the children satisfy the group
    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }

    /// The verdict, with the reason when invalid
    pub fn verdict(&self) -> &Result<(), MatchError> {
        &self.verdict
    }

    /// The guard, for further queries
    pub fn guard(&self) -> &Guard<'a> {
        &self.guard
    }

    /// The partition
    pub fn occurrences(&self) -> &[Occurrence] {
        self.guard.occurrences()
    }

    /// Take the guard
    pub fn into_guard(self) -> Guard<'a> {
        self.guard
    }
}

/// Match the children of an instance element against a group
pub fn match_content<'a>(
    group: &'a Group,
    resolver: &'a dyn Resolver,
    children: &'a [QName],
) -> MatchResult<'a> {
    match_content_with(group, resolver, children, GuardOptions::default())
}

/// Match with explicit options
pub fn match_content_with<'a>(
    group: &'a Group,
    resolver: &'a dyn Resolver,
    children: &'a [QName],
    options: GuardOptions,
) -> MatchResult<'a> {
    let guard = Guard::with_options(group, resolver, children, options);
    let verdict = guard.check_valid();
    MatchResult { guard, verdict }
}

/// Whether a child named `new_name` could be inserted at position `at`
pub fn can_insert(
    group: &Group,
    resolver: &dyn Resolver,
    children: &[QName],
    new_name: &QName,
    at: usize,
) -> bool {
    can_insert_with(group, resolver, children, new_name, at, GuardOptions::default())
}

/// Insertion check with explicit options
pub fn can_insert_with(
    group: &Group,
    resolver: &dyn Resolver,
    children: &[QName],
    new_name: &QName,
    at: usize,
    options: GuardOptions,
) -> bool {
    Guard::with_options(group, resolver, children, options).accepts_new_member_at(new_name, at)
}
