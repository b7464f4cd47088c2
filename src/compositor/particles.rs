//! Occurrence bounds for content-model particles
//!
//! Particles define occurrence constraints (minOccurs, maxOccurs) for
//! compositor members and for the compositors themselves.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#p

use crate::error::{Error, Result};
use std::fmt;

/// Occurrence bounds for a particle (minOccurs, maxOccurs)
/// None for max_occurs means unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurs {
    /// Minimum number of occurrences (default 1)
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded, default 1)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Default occurrence (1, 1)
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// One or more (1, unbounded)
    pub fn one_or_more() -> Self {
        Self { min: 1, max: None }
    }

    /// Check if this particle can be empty (minOccurs == 0)
    pub fn is_emptiable(&self) -> bool {
        self.min == 0
    }

    /// Check if this particle is empty (maxOccurs == 0)
    pub fn is_empty(&self) -> bool {
        self.max == Some(0)
    }

    /// Check if occurrence count is under the minimum
    pub fn is_missing(&self, count: u32) -> bool {
        count < self.min
    }

    /// Check if occurrence count is at or over the maximum, i.e. one more
    /// occurrence would not fit
    pub fn is_over(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count >= max,
            None => false,
        }
    }

    /// Check if occurrence count exceeds the maximum
    pub fn is_exceeded(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count > max,
            None => false,
        }
    }

    /// Render as schema attributes, e.g. `minOccurs="0"  maxOccurs="unbounded"`
    pub fn occurs_info(&self) -> String {
        format!("minOccurs=\"{}\"  maxOccurs=\"{}\"", self.min, MaxOccurs(self.max))
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Display adapter for an optional maximum (`None` renders as `unbounded`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxOccurs(pub Option<u32>);

impl fmt::Display for MaxOccurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(max) => write!(f, "{}", max),
            None => write!(f, "unbounded"),
        }
    }
}

/// Trait for content-model components that have particle semantics
pub trait Particle {
    /// Get the occurrence bounds
    fn occurs(&self) -> Occurs;

    /// Get minimum occurrences
    fn min_occurs(&self) -> u32 {
        self.occurs().min
    }

    /// Get maximum occurrences (None = unbounded)
    fn max_occurs(&self) -> Option<u32> {
        self.occurs().max
    }

    /// Check if this particle can be empty
    fn is_emptiable(&self) -> bool {
        self.occurs().is_emptiable()
    }
}

/// Parse minOccurs/maxOccurs from attribute values
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<u32>().map_err(|_| {
            Error::Definition(format!(
                "minOccurs value '{}' is not a valid non-negative integer",
                min_str
            ))
        })?;
    }

    match max_occurs.map(str::trim) {
        Some("unbounded") => occurs.max = None,
        Some(max_str) => {
            let max = max_str.parse::<u32>().map_err(|_| {
                Error::Definition(format!(
                    "maxOccurs value '{}' must be a non-negative integer or 'unbounded'",
                    max_str
                ))
            })?;
            if occurs.min > max {
                return Err(Error::Definition(
                    "maxOccurs must be 'unbounded' or greater than minOccurs".to_string(),
                ));
            }
            occurs.max = Some(max);
        }
        None => {
            // Default maxOccurs is 1, but must be >= minOccurs
            if occurs.min > 1 {
                return Err(Error::Definition(
                    "minOccurs must be lesser or equal than maxOccurs".to_string(),
                ));
            }
        }
    }

    Ok(occurs)
}

/// Accumulates maximum instance-element counts, saturating at unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccursCalculator {
    /// Calculated maximum (None = unbounded)
    pub max_occurs: Option<u32>,
}

impl Default for OccursCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl OccursCalculator {
    /// Create a new calculator initialized to 0
    pub fn new() -> Self {
        Self {
            max_occurs: Some(0),
        }
    }

    /// Add a maximum; once unbounded, stays unbounded
    pub fn add(&mut self, max: Option<u32>) {
        self.max_occurs = match (self.max_occurs, max) {
            (Some(a), Some(b)) => a.checked_add(b),
            _ => None,
        };
    }
}
