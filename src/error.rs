//! Error types for xmlschema-compositor
//!
//! This module defines all error types used throughout the library.
//! [`MatchError`] carries the content-model failure kinds; [`Error`] wraps it
//! together with the I/O, JSON and XML failures of the surrounding layers.

use thiserror::Error;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for compositor operations
#[derive(Error, Debug)]
pub enum Error {
    /// Content-model matching error
    #[error("match error: {0}")]
    Match(#[from] MatchError),

    /// Invalid schema definitions (loading, not matching)
    #[error("definition error: {0}")]
    Definition(String),

    /// Namespace error
    #[error("namespace error: {0}")]
    Namespace(String),

    /// Name error (invalid XML name)
    #[error("name error: {0}")]
    Name(String),

    /// Limit exceeded error
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML parsing error
    #[error("XML error: {0}")]
    Xml(String),
}

/// Failure kinds produced while matching instance children against a
/// content model.
///
/// The first five describe an instance that does not fit the model; the
/// last three describe a schema (or configuration) defect discovered while
/// matching. See [`MatchError::is_schema_defect`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// A child is not a leaf member of the group and no wildcard absorbs it
    #[error("Unexpected child element: \"{name}\"")]
    UnexpectedChild {
        /// Instance name of the child
        name: String,
    },

    /// Fewer occurrences than the group's minOccurs
    #[error("{compositor} must occur at least {min} times")]
    TooFewOccurrences {
        /// Group label: the compositor kind, followed by the group name if any
        compositor: String,
        /// Effective minimum
        min: u32,
        /// Occurrences found
        found: usize,
    },

    /// More occurrences than the group's maxOccurs
    #[error("{compositor} may not occur more than {max} times")]
    TooManyOccurrences {
        /// Group label: the compositor kind, followed by the group name if any
        compositor: String,
        /// Group maximum
        max: u32,
        /// Occurrences found
        found: usize,
    },

    /// A member of an all group appears more than once
    #[error("\"{name}\" may appear only once in an all group")]
    DuplicateMember {
        /// Instance name of the repeated child
        name: String,
    },

    /// The run of children controlled by a nested group cannot be
    /// partitioned within that member's bounds
    #[error("children of {member} cannot be normalized: {reason}")]
    CannotNormalize {
        /// Label of the nested member
        member: String,
        /// Why the nested run was rejected
        reason: String,
    },

    /// A reference target is missing from the global definitions
    #[error("unresolved reference: \"{reference}\"")]
    UnresolvedReference {
        /// The reference as written in the schema
        reference: String,
    },

    /// The content model itself is not well formed
    #[error("malformed content model: {0}")]
    MalformedContentModel(String),

    /// A configured limit was exceeded while matching
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl MatchError {
    /// Whether the error describes a defect in the schema or configuration
    /// rather than a mismatch of the instance document.
    pub fn is_schema_defect(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. }
                | Self::MalformedContentModel(_)
                | Self::LimitExceeded(_)
        )
    }

    /// Shorthand for an unexpected child
    pub fn unexpected(name: impl ToString) -> Self {
        Self::UnexpectedChild {
            name: name.to_string(),
        }
    }

    /// Shorthand for an unresolved reference
    pub fn unresolved(reference: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            reference: reference.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurrence_messages() {
        let err = MatchError::TooManyOccurrences {
            compositor: "choice".to_string(),
            max: 3,
            found: 4,
        };
        assert_eq!(err.to_string(), "choice may not occur more than 3 times");

        let err = MatchError::TooFewOccurrences {
            compositor: "sequence".to_string(),
            min: 1,
            found: 0,
        };
        assert_eq!(err.to_string(), "sequence must occur at least 1 times");
    }

    #[test]
    fn test_schema_defect_classification() {
        assert!(MatchError::unresolved("ns:missing").is_schema_defect());
        assert!(MatchError::MalformedContentModel("bad".into()).is_schema_defect());
        assert!(!MatchError::unexpected("foo").is_schema_defect());
        assert!(!MatchError::DuplicateMember { name: "p".into() }.is_schema_defect());
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = MatchError::unexpected("foo").into();
        assert!(matches!(err, Error::Match(MatchError::UnexpectedChild { .. })));
        assert!(err.to_string().contains("Unexpected child element: \"foo\""));
    }
}
