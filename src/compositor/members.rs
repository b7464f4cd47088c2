//! Compositor members
//!
//! A [`Member`] is one child specification of a sequence, choice or all
//! group: a local element, a reference to a global element, a reference to
//! a named group, a nested anonymous group, or a wildcard. Members are built
//! once with the schema and only ever read afterwards; the names they
//! resolve to are computed on first use and published through write-once
//! cells, so concurrent readers never see a partial value.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::MatchError;
use crate::namespaces::QName;
use crate::resolver::{require_element, require_group, Resolver};

use super::groups::Group;
use super::particles::{Occurs, Particle};
use super::wildcards::Wildcard;

/// Kind of a compositor member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Local element declaration
    Element,
    /// Reference to a global element
    ElementRef,
    /// Reference to a named model group
    GroupRef,
    /// Anonymous sequence, choice or all nested in the parent group
    NestedGroup,
    /// Element wildcard (xs:any)
    Wildcard,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Element => write!(f, "element"),
            Self::ElementRef => write!(f, "element ref"),
            Self::GroupRef => write!(f, "group ref"),
            Self::NestedGroup => write!(f, "nested group"),
            Self::Wildcard => write!(f, "any"),
        }
    }
}

/// What a member stands for. Exactly one of name, reference, nested group
/// or wildcard, by construction.
#[derive(Debug)]
pub enum Term {
    /// Local element declared with this name
    Element(String),
    /// Reference to a global element
    ElementRef(String),
    /// Reference to a named group
    GroupRef(String),
    /// Nested anonymous group, owned by this member
    Nested(Box<Group>),
    /// Wildcard
    Wildcard(Wildcard),
}

/// Substitution-group expansion of an element reference
#[derive(Debug, Default)]
struct Substitution {
    head: bool,
    names: Vec<QName>,
}

/// One member of a content-model group
#[derive(Debug)]
pub struct Member {
    term: Term,
    occurs: Occurs,
    instance_name: OnceCell<Option<QName>>,
    substitution: OnceCell<Substitution>,
    referenced_group: OnceCell<Arc<Group>>,
    max_instance_elements: OnceCell<Option<u32>>,
}

impl Member {
    fn with_term(term: Term, occurs: Occurs) -> Self {
        Self {
            term,
            occurs,
            instance_name: OnceCell::new(),
            substitution: OnceCell::new(),
            referenced_group: OnceCell::new(),
            max_instance_elements: OnceCell::new(),
        }
    }

    /// Local element member
    pub fn element(name: impl Into<String>, occurs: Occurs) -> Self {
        Self::with_term(Term::Element(name.into()), occurs)
    }

    /// Reference to a global element
    pub fn element_ref(reference: impl Into<String>, occurs: Occurs) -> Self {
        Self::with_term(Term::ElementRef(reference.into()), occurs)
    }

    /// Reference to a named group; `occurs` are those written on the reference
    pub fn group_ref(reference: impl Into<String>, occurs: Occurs) -> Self {
        Self::with_term(Term::GroupRef(reference.into()), occurs)
    }

    /// Nested anonymous group. Its occurrence bounds are the group's own.
    pub fn nested(group: Group) -> Self {
        let occurs = group.occurs();
        Self::with_term(Term::Nested(Box::new(group)), occurs)
    }

    /// Wildcard member
    pub fn wildcard(wildcard: Wildcard, occurs: Occurs) -> Self {
        Self::with_term(Term::Wildcard(wildcard), occurs)
    }

    /// The member's term
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// The member's kind
    pub fn kind(&self) -> MemberKind {
        match &self.term {
            Term::Element(_) => MemberKind::Element,
            Term::ElementRef(_) => MemberKind::ElementRef,
            Term::GroupRef(_) => MemberKind::GroupRef,
            Term::Nested(_) => MemberKind::NestedGroup,
            Term::Wildcard(_) => MemberKind::Wildcard,
        }
    }

    /// Human readable label: the declared name or reference, the compositor
    /// name of a nested group, or `any`
    pub fn label(&self) -> String {
        match &self.term {
            Term::Element(name) | Term::ElementRef(name) | Term::GroupRef(name) => name.clone(),
            Term::Nested(group) => group.model().to_string(),
            Term::Wildcard(_) => "any".to_string(),
        }
    }

    /// The wildcard, for wildcard members
    pub fn as_wildcard(&self) -> Option<&Wildcard> {
        match &self.term {
            Term::Wildcard(w) => Some(w),
            _ => None,
        }
    }

    /// Whether partitioning must descend into a group for this member
    pub fn has_sub_group(&self) -> bool {
        matches!(self.term, Term::Nested(_) | Term::GroupRef(_))
    }

    /// Instance-qualified name of the member.
    ///
    /// `None` for nested groups and wildcards, which have no single name.
    /// Group references resolve to the group's qualified name, which never
    /// appears in an instance but identifies the member.
    pub fn instance_qualified_name(
        &self,
        resolver: &dyn Resolver,
    ) -> Result<Option<&QName>, MatchError> {
        self.instance_name
            .get_or_try_init(|| match &self.term {
                Term::Element(name) | Term::ElementRef(name) | Term::GroupRef(name) => {
                    let qname = resolver.resolve_instance_name(name)?;
                    debug!(member = %name, resolved = %qname, "resolved instance name");
                    Ok(Some(qname))
                }
                Term::Nested(_) | Term::Wildcard(_) => Ok(None),
            })
            .map(Option::as_ref)
    }

    fn substitution(&self, resolver: &dyn Resolver) -> Result<&Substitution, MatchError> {
        // Computed on demand: the referenced element may be defined after
        // the group that refers to it.
        self.substitution.get_or_try_init(|| {
            let Term::ElementRef(reference) = &self.term else {
                return Ok(Substitution::default());
            };
            let info = require_element(resolver, reference).map_err(|err| {
                warn!(reference = %reference, error = %err, "cannot resolve element reference");
                err
            })?;
            if info.substitution_group_members.is_empty() {
                return Ok(Substitution::default());
            }
            let mut names = info.substitution_group_members.clone();
            if !info.is_abstract {
                names.push(info.name.clone());
            }
            debug!(head = %info.name, members = names.len(), "expanded substitution group");
            Ok(Substitution { head: true, names })
        })
    }

    /// Whether this member references the head of a substitution group
    pub fn is_substitution_head(&self, resolver: &dyn Resolver) -> Result<bool, MatchError> {
        Ok(self.substitution(resolver)?.head)
    }

    /// Names that may stand for this member when it references a
    /// substitution group head: every group member, plus the head itself
    /// unless it is abstract. Empty for any other member.
    pub fn substitution_group_names(&self, resolver: &dyn Resolver) -> Result<&[QName], MatchError> {
        Ok(&self.substitution(resolver)?.names)
    }

    /// Names an instance child may carry to be this member directly, i.e.
    /// without descending into a group. Empty for groups and wildcards.
    pub fn direct_names(&self, resolver: &dyn Resolver) -> Result<Vec<QName>, MatchError> {
        match &self.term {
            Term::Element(_) => Ok(self.instance_qualified_name(resolver)?.cloned().into_iter().collect()),
            Term::ElementRef(_) => {
                if self.is_substitution_head(resolver)? {
                    Ok(self.substitution_group_names(resolver)?.to_vec())
                } else {
                    Ok(self.instance_qualified_name(resolver)?.cloned().into_iter().collect())
                }
            }
            Term::GroupRef(_) | Term::Nested(_) | Term::Wildcard(_) => Ok(Vec::new()),
        }
    }

    /// Whether an instance child with this name is this member directly
    pub fn matches_directly(&self, name: &QName, resolver: &dyn Resolver) -> Result<bool, MatchError> {
        match &self.term {
            Term::Element(_) => Ok(self.instance_qualified_name(resolver)? == Some(name)),
            Term::ElementRef(_) => {
                if self.is_substitution_head(resolver)? {
                    Ok(self.substitution_group_names(resolver)?.contains(name))
                } else {
                    Ok(self.instance_qualified_name(resolver)? == Some(name))
                }
            }
            Term::GroupRef(_) | Term::Nested(_) | Term::Wildcard(_) => Ok(false),
        }
    }

    /// The group this member expands to: the nested group it owns, or the
    /// named group it references
    pub fn sub_group(&self, resolver: &dyn Resolver) -> Result<Option<&Group>, MatchError> {
        match &self.term {
            Term::Nested(group) => Ok(Some(group)),
            Term::GroupRef(reference) => {
                let group = self
                    .referenced_group
                    .get_or_try_init(|| require_group(resolver, reference))
                    .map_err(|err| {
                        warn!(reference = %reference, error = %err, "cannot resolve group reference");
                        err
                    })?;
                Ok(Some(group.as_ref()))
            }
            Term::Element(_) | Term::ElementRef(_) | Term::Wildcard(_) => Ok(None),
        }
    }

    /// Upper bound on the instance children this member can contribute.
    ///
    /// For a simple member this is its maxOccurs; for a group it is the sum
    /// of the group members' bounds, unbounded if any of them is.
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
        let max = match self.sub_group(resolver)? {
            Some(group) => group.max_elements_within(resolver, path)?,
            None => self.occurs.max,
        };
        Ok(*self.max_instance_elements.get_or_init(|| max))
    }
}

impl Particle for Member {
    fn occurs(&self) -> Occurs {
        self.occurs
    }
}
