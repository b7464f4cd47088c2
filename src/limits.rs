//! Limits and constraints for content-model matching
//!
//! This module defines limits that keep matching bounded even when the
//! definitions or the instance document are hostile or simply very large.

use crate::error::{Error, MatchError, Result};

/// Global limits configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum depth of nested groups (inline groups and group references)
    pub max_nesting_depth: usize,

    /// Maximum number of instance children matched for one element
    pub max_children: usize,

    /// Maximum size of a definitions file in bytes
    pub max_definition_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_nesting_depth: 64,
            max_children: 100_000,
            max_definition_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_nesting_depth: 16,
            max_children: 10_000,
            max_definition_size: 1024 * 1024, // 1 MB
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_nesting_depth: 1024,
            max_children: 10_000_000,
            max_definition_size: 512 * 1024 * 1024, // 512 MB
        }
    }

    /// Check if group nesting depth is within limits
    pub fn check_nesting_depth(&self, depth: usize) -> std::result::Result<(), MatchError> {
        if depth > self.max_nesting_depth {
            Err(MatchError::LimitExceeded(format!(
                "group nesting depth {} exceeds maximum {}",
                depth, self.max_nesting_depth
            )))
        } else {
            Ok(())
        }
    }

    /// Check if the number of children is within limits
    pub fn check_children(&self, count: usize) -> std::result::Result<(), MatchError> {
        if count > self.max_children {
            Err(MatchError::LimitExceeded(format!(
                "child count {} exceeds maximum {}",
                count, self.max_children
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a definitions file size is within limits
    pub fn check_definition_size(&self, size: usize) -> Result<()> {
        if size > self.max_definition_size {
            Err(Error::LimitExceeded(format!(
                "definition size {} bytes exceeds maximum {} bytes",
                size, self.max_definition_size
            )))
        } else {
            Ok(())
        }
    }
}
