//! Content-model groups
//!
//! This module implements the three compositors of XSD content models:
//! - xs:sequence - ordered content
//! - xs:choice - alternative content
//! - xs:all - unordered content
//!
//! A [`Group`] owns its members, and through them any nested anonymous
//! group. Named groups are shared behind an `Arc` by the resolver that
//! defines them. No node points back at its parent.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Model_Groups

use indexmap::IndexSet;
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::MatchError;
use crate::namespaces::QName;
use crate::resolver::Resolver;

use super::members::{Member, MemberKind};
use super::particles::{Occurs, OccursCalculator, Particle};
use super::wildcards::{NamespaceConstraint, Wildcard};

/// Model group compositor type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelType {
    /// Ordered sequence of particles
    #[default]
    Sequence,
    /// One of multiple alternatives
    Choice,
    /// Unordered set of particles
    All,
}

impl ModelType {
    /// Parse from element tag name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" | "{http://www.w3.org/2001/XMLSchema}sequence" => Some(Self::Sequence),
            "choice" | "{http://www.w3.org/2001/XMLSchema}choice" => Some(Self::Choice),
            "all" | "{http://www.w3.org/2001/XMLSchema}all" => Some(Self::All),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// Flattened set of names that may appear as direct children of an
/// instance element governed by a group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafNames {
    names: IndexSet<QName>,
    wildcards: Vec<NamespaceConstraint>,
}

impl LeafNames {
    /// Whether a child with this name is a leaf member, either by name or
    /// through a wildcard
    pub fn contains(&self, name: &QName) -> bool {
        self.contains_name(name) || self.admits_by_wildcard(name)
    }

    /// Whether the name is one of the concrete leaf names
    pub fn contains_name(&self, name: &QName) -> bool {
        self.names.contains(name)
    }

    /// Whether some wildcard reachable from the group admits the name
    pub fn admits_by_wildcard(&self, name: &QName) -> bool {
        self.wildcards
            .iter()
            .any(|c| c.is_allowed(name.namespace_or_empty()))
    }

    /// Concrete names, in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &QName> {
        self.names.iter()
    }

    /// Number of concrete names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there is no concrete name and no wildcard
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.wildcards.is_empty()
    }

    /// Whether a wildcard was reached during expansion
    pub fn has_wildcard(&self) -> bool {
        !self.wildcards.is_empty()
    }

    /// Namespace constraints of the reachable wildcards
    pub fn wildcards(&self) -> &[NamespaceConstraint] {
        &self.wildcards
    }

    fn add_wildcard(&mut self, constraint: &NamespaceConstraint) {
        if !self.wildcards.contains(constraint) {
            self.wildcards.push(constraint.clone());
        }
    }

    fn merge(&mut self, other: &LeafNames) {
        self.names.extend(other.names.iter().cloned());
        for constraint in &other.wildcards {
            self.add_wildcard(constraint);
        }
    }
}

/// A content-model group (sequence, choice or all)
#[derive(Debug)]
pub struct Group {
    model: ModelType,
    occurs: Occurs,
    members: Vec<Member>,
    name: Option<QName>,
    leaf_names: OnceCell<LeafNames>,
    max_instance_elements: OnceCell<Option<u32>>,
}

impl Group {
    /// Create an empty group occurring exactly once
    pub fn new(model: ModelType) -> Self {
        Self {
            model,
            occurs: Occurs::once(),
            members: Vec::new(),
            name: None,
            leaf_names: OnceCell::new(),
            max_instance_elements: OnceCell::new(),
        }
    }

    /// Create a sequence group
    pub fn sequence() -> Self {
        Self::new(ModelType::Sequence)
    }

    /// Create a choice group
    pub fn choice() -> Self {
        Self::new(ModelType::Choice)
    }

    /// Create an all group
    pub fn all() -> Self {
        Self::new(ModelType::All)
    }

    /// Set the group's own occurrence bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.occurs = occurs;
        self
    }

    /// Label the group with the name of the definition it belongs to
    pub fn named(mut self, name: QName) -> Self {
        self.name = Some(name);
        self
    }

    /// Append a member
    pub fn with_member(mut self, member: Member) -> Self {
        self.add_member(member);
        self
    }

    /// Append a member. Only valid while the tree is being built.
    pub fn add_member(&mut self, member: Member) {
        self.members.push(member);
        self.leaf_names = OnceCell::new();
        self.max_instance_elements = OnceCell::new();
    }

    /// Compositor kind
    pub fn model(&self) -> ModelType {
        self.model
    }

    /// Name of the definition the group belongs to, if any
    pub fn name(&self) -> Option<&QName> {
        self.name.as_ref()
    }

    /// Direct members in declaration order
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Returns true if the group has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns the number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Member at a position
    pub fn member_at(&self, index: usize) -> Option<&Member> {
        self.members.get(index)
    }

    /// Label used in messages: the group name, or the compositor kind
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.model, name),
            None => self.model.to_string(),
        }
    }

    /// Instance names of the element members, in declaration order
    pub fn member_names(&self, resolver: &dyn Resolver) -> Result<Vec<QName>, MatchError> {
        let mut names = Vec::new();
        for member in &self.members {
            if matches!(member.kind(), MemberKind::Element | MemberKind::ElementRef) {
                if let Some(name) = member.instance_qualified_name(resolver)? {
                    names.push(name.clone());
                }
            }
        }
        Ok(names)
    }

    /// Names of the direct members that are not groups, with substitution
    /// group heads replaced by the names that may stand for them
    pub fn instance_names(&self, resolver: &dyn Resolver) -> Result<Vec<QName>, MatchError> {
        let mut names = Vec::new();
        for member in &self.members {
            names.extend(member.direct_names(resolver)?);
        }
        Ok(names)
    }

    /// Index of the direct member an instance name stands for
    pub fn index_of(&self, name: &QName, resolver: &dyn Resolver) -> Result<Option<usize>, MatchError> {
        for (index, member) in self.members.iter().enumerate() {
            if member.matches_directly(name, resolver)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// The direct member an instance name stands for
    pub fn member(&self, name: &QName, resolver: &dyn Resolver) -> Result<Option<&Member>, MatchError> {
        Ok(self.index_of(name, resolver)?.map(|index| &self.members[index]))
    }

    /// Whether an instance name stands for a direct member
    pub fn has_member(&self, name: &QName, resolver: &dyn Resolver) -> Result<bool, MatchError> {
        Ok(self.index_of(name, resolver)?.is_some())
    }

    /// The first direct wildcard member and its index
    pub fn wildcard_member(&self) -> Option<(usize, &Member)> {
        self.members
            .iter()
            .enumerate()
            .find(|(_, m)| m.kind() == MemberKind::Wildcard)
    }

    /// Upper bound on the instance children one occurrence of the group
    /// can hold, `None` when unbounded
    pub fn max_instance_elements(&self, resolver: &dyn Resolver) -> Result<Option<u32>, MatchError> {
        self.max_elements_within(resolver, &mut Vec::new())
    }

    pub(crate) fn max_elements_within<'a>(
        &'a self,
        resolver: &dyn Resolver,
        path: &mut Vec<&'a Group>,
    ) -> Result<Option<u32>, MatchError> {
        if let Some(max) = self.max_instance_elements.get() {
            return Ok(*max);
        }
        if path.iter().any(|g| std::ptr::eq(*g, self)) {
            warn!(group = %self.label(), "circular group reference");
            return Err(MatchError::MalformedContentModel(format!(
                "{} refers to itself",
                self.label()
            )));
        }

        path.push(self);
        let summed = self.sum_member_maxima(resolver, path);
        path.pop();
        let max = summed?;
        Ok(*self.max_instance_elements.get_or_init(|| max))
    }

    fn sum_member_maxima<'a>(
        &'a self,
        resolver: &dyn Resolver,
        path: &mut Vec<&'a Group>,
    ) -> Result<Option<u32>, MatchError> {
        let mut calc = OccursCalculator::new();
        for member in &self.members {
            calc.add(member.max_elements_within(resolver, path)?);
            if calc.max_occurs.is_none() {
                break;
            }
        }
        Ok(calc.max_occurs)
    }

    /// Every name that may appear as a direct child of an instance element
    /// governed by this group, after expanding group references,
    /// substitution groups and nested groups.
    ///
    /// Computed once and cached. A group that reaches itself through
    /// references is a [`MatchError::MalformedContentModel`].
    pub fn leaf_member_names(&self, resolver: &dyn Resolver) -> Result<&LeafNames, MatchError> {
        self.leaf_names_within(resolver, &mut Vec::new())
    }

    fn leaf_names_within<'a>(
        &'a self,
        resolver: &dyn Resolver,
        path: &mut Vec<&'a Group>,
    ) -> Result<&'a LeafNames, MatchError> {
        if let Some(names) = self.leaf_names.get() {
            return Ok(names);
        }
        if path.iter().any(|g| std::ptr::eq(*g, self)) {
            warn!(group = %self.label(), "circular group reference");
            return Err(MatchError::MalformedContentModel(format!(
                "{} refers to itself",
                self.label()
            )));
        }

        path.push(self);
        let expanded = self.expand_leaf_names(resolver, path);
        path.pop();
        let names = expanded?;

        debug!(
            group = %self.label(),
            names = names.len(),
            wildcard = names.has_wildcard(),
            "expanded leaf member names"
        );
        // A concurrent caller may have published first; both values are equal.
        Ok(self.leaf_names.get_or_init(|| names))
    }

    fn expand_leaf_names<'a>(
        &'a self,
        resolver: &dyn Resolver,
        path: &mut Vec<&'a Group>,
    ) -> Result<LeafNames, MatchError> {
        let mut leaves = LeafNames::default();
        for member in &self.members {
            match member.kind() {
                MemberKind::Element | MemberKind::ElementRef => {
                    leaves.names.extend(member.direct_names(resolver)?);
                }
                MemberKind::GroupRef | MemberKind::NestedGroup => {
                    let sub = member.sub_group(resolver)?.ok_or_else(|| {
                        MatchError::MalformedContentModel(format!(
                            "{} has no group to expand",
                            member.label()
                        ))
                    })?;
                    leaves.merge(sub.leaf_names_within(resolver, path)?);
                }
                MemberKind::Wildcard => {
                    let wildcard = member.as_wildcard().ok_or_else(|| {
                        MatchError::MalformedContentModel("wildcard member without wildcard".into())
                    })?;
                    leaves.add_wildcard(&wildcard.constraint);
                }
            }
        }
        Ok(leaves)
    }

    /// Index of the direct member that controls an instance child.
    ///
    /// A member naming the child directly wins over a group containing it,
    /// and both win over a wildcard.
    pub fn resolve_leaf(&self, name: &QName, resolver: &dyn Resolver) -> Result<usize, MatchError> {
        if let Some(index) = self.index_of(name, resolver)? {
            return Ok(index);
        }
        for (index, member) in self.members.iter().enumerate() {
            if let Some(sub) = member.sub_group(resolver)? {
                if sub.leaf_member_names(resolver)?.contains_name(name) {
                    return Ok(index);
                }
            }
        }
        for (index, member) in self.members.iter().enumerate() {
            if member.as_wildcard().is_some_and(|w: &Wildcard| w.matches(name)) {
                return Ok(index);
            }
        }
        for (index, member) in self.members.iter().enumerate() {
            if let Some(sub) = member.sub_group(resolver)? {
                if sub.leaf_member_names(resolver)?.admits_by_wildcard(name) {
                    return Ok(index);
                }
            }
        }
        Err(MatchError::unexpected(name))
    }

    /// Resolve every name and reference below this group and compute the
    /// cached leaf names, surfacing schema defects before any matching
    pub fn prepare(&self, resolver: &dyn Resolver) -> Result<(), MatchError> {
        self.leaf_member_names(resolver)?;
        for member in &self.members {
            member.instance_qualified_name(resolver)?;
            member.is_substitution_head(resolver)?;
            if let Some(sub) = member.sub_group(resolver)? {
                if member.kind() == MemberKind::NestedGroup {
                    sub.prepare(resolver)?;
                }
            }
        }
        self.max_instance_elements(resolver)?;
        Ok(())
    }
}

impl Particle for Group {
    fn occurs(&self) -> Occurs {
        self.occurs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{GlobalDef, GlobalElementInfo};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct Defs {
        globals: HashMap<String, GlobalDef>,
    }

    impl Defs {
        fn element(mut self, name: &str, is_abstract: bool, members: &[&str]) -> Self {
            self.globals.insert(
                name.to_string(),
                GlobalDef::Element(GlobalElementInfo {
                    name: QName::local(name),
                    is_abstract,
                    substitution_group_members: members.iter().map(|m| QName::local(*m)).collect(),
                }),
            );
            self
        }

        fn group(mut self, name: &str, group: Group) -> Self {
            self.globals
                .insert(name.to_string(), GlobalDef::Group(Arc::new(group)));
            self
        }
    }

    impl Resolver for Defs {
        fn resolve_instance_name(&self, name: &str) -> Result<QName, MatchError> {
            Ok(QName::local(name))
        }

        fn lookup_global(&self, name: &str) -> Option<GlobalDef> {
            self.globals.get(name).cloned()
        }
    }

    fn q(name: &str) -> QName {
        QName::local(name)
    }

    #[test]
    fn test_model_type_from_tag() {
        assert_eq!(ModelType::from_tag("choice"), Some(ModelType::Choice));
        assert_eq!(
            ModelType::from_tag("{http://www.w3.org/2001/XMLSchema}all"),
            Some(ModelType::All)
        );
        assert_eq!(ModelType::from_tag("element"), None);
        assert_eq!(ModelType::Sequence.to_string(), "sequence");
    }

    #[test]
    fn test_leaf_names_through_group_ref() {
        let defs = Defs::default().group(
            "commonFields",
            Group::sequence()
                .with_member(Member::element("foo", Occurs::once()))
                .with_member(Member::element("bar", Occurs::optional())),
        );
        let group = Group::sequence()
            .with_member(Member::element("id", Occurs::once()))
            .with_member(Member::group_ref("commonFields", Occurs::once()));

        let leaves = group.leaf_member_names(&defs).unwrap();
        let names: Vec<_> = leaves.iter().cloned().collect();
        assert_eq!(names, vec![q("id"), q("foo"), q("bar")]);
        assert!(!leaves.contains(&q("commonFields")));
    }

    #[test]
    fn test_leaf_names_substitution_and_wildcard() {
        let defs = Defs::default().element("shape", true, &["circle", "square"]);
        let group = Group::choice()
            .with_member(Member::element_ref("shape", Occurs::once()))
            .with_member(Member::nested(
                Group::sequence().with_member(Member::wildcard(Wildcard::any(), Occurs::once())),
            ));

        let leaves = group.leaf_member_names(&defs).unwrap();
        assert!(leaves.contains_name(&q("circle")));
        assert!(leaves.contains_name(&q("square")));
        assert!(!leaves.contains_name(&q("shape")));
        assert!(leaves.has_wildcard());
        assert!(leaves.contains(&q("anything")));
    }

    #[test]
    fn test_leaf_names_cached() {
        let defs = Defs::default();
        let group = Group::sequence().with_member(Member::element("a", Occurs::once()));
        let first = group.leaf_member_names(&defs).unwrap() as *const LeafNames;
        let second = group.leaf_member_names(&defs).unwrap() as *const LeafNames;
        assert_eq!(first, second);
    }

    #[test]
    fn test_circular_group_reference() {
        let defs = Defs::default().group(
            "loop",
            Group::sequence()
                .with_member(Member::element("a", Occurs::once()))
                .with_member(Member::group_ref("loop", Occurs::optional())),
        );
        let group = Group::sequence().with_member(Member::group_ref("loop", Occurs::once()));
        assert!(matches!(
            group.leaf_member_names(&defs),
            Err(MatchError::MalformedContentModel(_))
        ));
    }

    #[test]
    fn test_circular_group_bound() {
        let defs = Defs::default().group(
            "loop",
            Group::sequence()
                .with_member(Member::element("a", Occurs::once()))
                .with_member(Member::group_ref("loop", Occurs::optional())),
        );
        let group = Group::sequence().with_member(Member::group_ref("loop", Occurs::once()));
        assert!(matches!(
            group.max_instance_elements(&defs),
            Err(MatchError::MalformedContentModel(_))
        ));
        // No partial value is published; asking again gives the same answer.
        assert!(matches!(
            group.max_instance_elements(&defs),
            Err(MatchError::MalformedContentModel(_))
        ));
    }

    #[test]
    fn test_max_instance_elements_through_group_ref() {
        let defs = Defs::default().group(
            "pair",
            Group::sequence()
                .with_member(Member::element("a", Occurs::once()))
                .with_member(Member::element("b", Occurs::new(0, Some(3)))),
        );
        let group = Group::sequence()
            .with_member(Member::element("head", Occurs::once()))
            .with_member(Member::group_ref("pair", Occurs::once()));
        assert_eq!(group.max_instance_elements(&defs).unwrap(), Some(5));

        let open = Group::choice()
            .with_member(Member::group_ref("pair", Occurs::once()))
            .with_member(Member::element("rest", Occurs::zero_or_more()));
        assert_eq!(open.max_instance_elements(&defs).unwrap(), None);
    }

    #[test]
    fn test_resolve_leaf_precedence() {
        let group = Group::sequence()
            .with_member(Member::wildcard(Wildcard::any(), Occurs::zero_or_more()))
            .with_member(Member::nested(
                Group::choice().with_member(Member::element("inner", Occurs::once())),
            ))
            .with_member(Member::element("direct", Occurs::once()));
        let defs = Defs::default();

        assert_eq!(group.resolve_leaf(&q("direct"), &defs).unwrap(), 2);
        assert_eq!(group.resolve_leaf(&q("inner"), &defs).unwrap(), 1);
        assert_eq!(group.resolve_leaf(&q("other"), &defs).unwrap(), 0);
    }

    #[test]
    fn test_resolve_leaf_unexpected() {
        let group = Group::sequence().with_member(Member::element("a", Occurs::once()));
        assert_eq!(
            group.resolve_leaf(&q("b"), &Defs::default()),
            Err(MatchError::unexpected("b"))
        );
    }

    #[test]
    fn test_member_helpers() {
        let defs = Defs::default().element("figure", false, &["sketch"]);
        let group = Group::sequence()
            .with_member(Member::element("a", Occurs::once()))
            .with_member(Member::element_ref("figure", Occurs::optional()))
            .with_member(Member::wildcard(Wildcard::any(), Occurs::optional()));

        assert_eq!(group.member_names(&defs).unwrap(), vec![q("a"), q("figure")]);
        assert_eq!(
            group.instance_names(&defs).unwrap(),
            vec![q("a"), q("sketch"), q("figure")]
        );
        assert_eq!(group.index_of(&q("sketch"), &defs).unwrap(), Some(1));
        assert!(group.has_member(&q("a"), &defs).unwrap());
        assert!(group.member(&q("zzz"), &defs).unwrap().is_none());
        assert_eq!(group.wildcard_member().map(|(i, _)| i), Some(2));
        assert_eq!(group.member_at(0).unwrap().label(), "a");
        assert_eq!(group.max_instance_elements(&defs).unwrap(), Some(3));
    }

    #[test]
    fn test_label() {
        assert_eq!(Group::choice().label(), "choice");
        assert_eq!(Group::all().named(q("addr")).label(), "all addr");
    }

    #[test]
    fn test_prepare_surfaces_unresolved() {
        let group = Group::sequence()
            .with_member(Member::nested(
                Group::choice().with_member(Member::element_ref("ghost", Occurs::once())),
            ));
        assert!(matches!(
            group.prepare(&Defs::default()),
            Err(MatchError::UnresolvedReference { .. })
        ));
    }
}
