//! # xmlschema-compositor
//!
//! Incremental matching of XML Schema content models.
//!
//! Given a content model (`sequence`, `choice` or `all`, with element
//! references, substitution groups, group references, nested groups and
//! wildcards) and the ordered children of an instance element, this crate
//! tells whether the children satisfy the model's occurrence constraints
//! and whether one more child of a given name could be inserted, without
//! requiring the instance to be valid first.
//!
//! ## Features
//!
//! - Partitioning of instance children into occurrences of a group
//! - Validity verdicts with user-facing reasons
//! - "Can I add X here?" queries for interactive editors
//! - Leaf name expansion through group references, substitution groups and
//!   nested groups, computed once and shared between threads
//! - JSON schema definitions and an instance document reader
//!
//! ## Example
//!
//! ```rust
//! use compositor::compositor::{can_insert, match_content, Group, Member, Occurs};
//! use compositor::definitions::SchemaDefinitions;
//! use compositor::namespaces::QName;
//!
//! let defs = SchemaDefinitions::default();
//! let group = Group::sequence()
//!     .with_member(Member::element("A", Occurs::once()))
//!     .with_member(Member::element("B", Occurs::new(0, Some(3))));
//!
//! let children = vec![QName::local("A"), QName::local("B")];
//! assert!(match_content(&group, &defs, &children).is_valid());
//! assert!(can_insert(&group, &defs, &children, &QName::local("B"), 2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;

// Names
pub mod namespaces;
pub mod names;

// Matching
pub mod compositor;
pub mod resolver;

// Collaborators
pub mod definitions;
pub mod documents;

// Re-exports for convenience
pub use compositor::{
    can_insert, match_content, Group, Guard, GuardOptions, MatchResult, Member, ModelType,
    Occurrence, Occurs,
};
pub use error::{Error, MatchError, Result};
pub use namespaces::QName;
pub use resolver::{GlobalDef, GlobalElementInfo, Resolver};

/// Version of the xmlschema-compositor library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
