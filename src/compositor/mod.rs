//! Content-model matching
//!
//! This module decides, for a content model and the ordered children of an
//! instance element, whether the children satisfy the model's occurrence
//! constraints and whether one more child of a given name could be
//! inserted. It works on partially valid instances, which is what an
//! interactive editor needs.
//!
//! ## Structure
//!
//! - [`particles`] - occurrence bounds
//! - [`wildcards`] - xs:any namespace constraints
//! - [`members`] - the members of a group
//! - [`groups`] - sequence, choice and all groups, leaf name expansion
//! - [`guards`] - partitioning of instance children into occurrences
//! - [`sequence`], [`choice`], [`all`] - the kind-specific matchers

pub mod all;
pub mod choice;
pub mod groups;
pub mod guards;
pub mod members;
pub mod particles;
pub mod sequence;
pub mod wildcards;

pub use all::AllGuard;
pub use choice::ChoiceGuard;
pub use groups::{Group, LeafNames, ModelType};
pub use guards::{
    can_insert, can_insert_with, match_content, match_content_with, Guard, GuardOptions,
    MatchResult, Occurrence,
};
pub use members::{Member, MemberKind, Term};
pub use particles::{parse_occurs, MaxOccurs, Occurs, OccursCalculator, Particle};
pub use sequence::SequenceGuard;
pub use wildcards::{NamespaceConstraint, Wildcard};
