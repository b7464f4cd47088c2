//! Namespace and reference resolution
//!
//! The compositor engine never reads a schema itself. Whoever built the
//! particle tree also provides a [`Resolver`]: it turns declared names and
//! references into the names an instance document uses, and exposes the
//! global element and group definitions that references point at.

use std::sync::Arc;

use crate::compositor::Group;
use crate::error::MatchError;
use crate::namespaces::QName;

/// What the engine needs to know about a global element declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalElementInfo {
    /// Instance-qualified name of the element
    pub name: QName,
    /// Whether the element is declared abstract
    pub is_abstract: bool,
    /// Instance-qualified names of the elements declaring this one as their
    /// substitution group head
    pub substitution_group_members: Vec<QName>,
}

impl GlobalElementInfo {
    /// A plain, non-abstract element with no substitution group
    pub fn new(name: QName) -> Self {
        Self {
            name,
            is_abstract: false,
            substitution_group_members: Vec::new(),
        }
    }
}

/// A global definition a reference may point at
#[derive(Debug, Clone)]
pub enum GlobalDef {
    /// Global element declaration
    Element(GlobalElementInfo),
    /// Named model group; the group's own top-level compositor
    Group(Arc<Group>),
}

impl GlobalDef {
    /// Whether this is a global element declaration
    pub fn is_global_element(&self) -> bool {
        matches!(self, Self::Element(_))
    }

    /// Whether this is an element heading a non-empty substitution group
    pub fn has_substitution_group(&self) -> bool {
        match self {
            Self::Element(info) => !info.substitution_group_members.is_empty(),
            Self::Group(_) => false,
        }
    }

    /// Substitution group members (empty for groups and plain elements)
    pub fn substitution_group_members(&self) -> &[QName] {
        match self {
            Self::Element(info) => &info.substitution_group_members,
            Self::Group(_) => &[],
        }
    }

    /// Whether this is an abstract element
    pub fn is_abstract(&self) -> bool {
        matches!(self, Self::Element(info) if info.is_abstract)
    }

    /// The named group's compositor, if this is a group
    pub fn group(&self) -> Option<&Arc<Group>> {
        match self {
            Self::Group(group) => Some(group),
            Self::Element(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Element(_) => "element",
            Self::Group(_) => "group",
        }
    }
}

/// External name and reference resolution.
///
/// Implementations are shared by every matching call for the lifetime of
/// the loaded schema, hence `Send + Sync`. All methods must be pure: the
/// engine memoizes their answers.
pub trait Resolver: Send + Sync {
    /// Instance-qualified name for a declared local name or a reference
    fn resolve_instance_name(&self, local_or_ref_name: &str) -> Result<QName, MatchError>;

    /// Look up the global definition a reference points at
    fn lookup_global(&self, ref_name: &str) -> Option<GlobalDef>;

    /// Look up a global element. Schemas keep elements and groups in
    /// separate symbol spaces; implementations that do so should override
    /// this and [`Resolver::lookup_group`].
    fn lookup_element(&self, ref_name: &str) -> Option<GlobalElementInfo> {
        match self.lookup_global(ref_name)? {
            GlobalDef::Element(info) => Some(info),
            GlobalDef::Group(_) => None,
        }
    }

    /// Look up a named model group
    fn lookup_group(&self, ref_name: &str) -> Option<Arc<Group>> {
        match self.lookup_global(ref_name)? {
            GlobalDef::Group(group) => Some(group),
            GlobalDef::Element(_) => None,
        }
    }
}

impl std::fmt::Debug for dyn Resolver + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Resolver")
    }
}

/// Resolve an element reference, telling a dangling reference apart from a
/// reference to the wrong kind of definition.
pub(crate) fn require_element(
    resolver: &dyn Resolver,
    reference: &str,
) -> Result<GlobalElementInfo, MatchError> {
    if let Some(info) = resolver.lookup_element(reference) {
        return Ok(info);
    }
    match resolver.lookup_global(reference) {
        Some(other) => Err(MatchError::MalformedContentModel(format!(
            "element reference \"{}\" points at a {}",
            reference,
            other.kind()
        ))),
        None => Err(MatchError::unresolved(reference)),
    }
}

/// Resolve a group reference, telling a dangling reference apart from a
/// reference to the wrong kind of definition.
pub(crate) fn require_group(
    resolver: &dyn Resolver,
    reference: &str,
) -> Result<Arc<Group>, MatchError> {
    if let Some(group) = resolver.lookup_group(reference) {
        return Ok(group);
    }
    match resolver.lookup_global(reference) {
        Some(other) => Err(MatchError::MalformedContentModel(format!(
            "group reference \"{}\" points at a {}",
            reference,
            other.kind()
        ))),
        None => Err(MatchError::unresolved(reference)),
    }
}
