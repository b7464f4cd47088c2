//! Element wildcards (xs:any)
//!
//! A wildcard member absorbs instance children that no concrete member
//! names, provided their namespace passes the wildcard's constraint.
//!
//! Reference: https://www.w3.org/TR/xmlschema11-1/#Wildcards

use crate::error::{Error, Result};
use crate::namespaces::QName;
use std::collections::BTreeSet;
use std::fmt;

/// Namespace constraint for wildcards
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceConstraint {
    /// Any namespace is allowed (##any)
    #[default]
    Any,
    /// Any namespace except target namespace and no namespace (##other)
    Other {
        /// The target namespace to exclude
        target_namespace: Option<String>,
    },
    /// Specific set of allowed namespaces; "" stands for no namespace
    Enumeration(BTreeSet<String>),
    /// XSD 1.1: Set of disallowed namespaces (notNamespace)
    Not(BTreeSet<String>),
}

impl NamespaceConstraint {
    /// Create from namespace attribute value
    pub fn from_namespace_attr(value: &str, target_namespace: Option<&str>) -> Result<Self> {
        match value.trim() {
            "##any" => Ok(Self::Any),
            "##other" => Ok(Self::Other {
                target_namespace: target_namespace.map(String::from),
            }),
            list => Ok(Self::Enumeration(parse_namespace_list(
                list,
                target_namespace,
                "namespace",
            )?)),
        }
    }

    /// Create from notNamespace attribute (XSD 1.1)
    pub fn from_not_namespace_attr(value: &str, target_namespace: Option<&str>) -> Result<Self> {
        Ok(Self::Not(parse_namespace_list(
            value,
            target_namespace,
            "notNamespace",
        )?))
    }

    /// Check if a namespace ("" for none) is allowed by this constraint
    pub fn is_allowed(&self, namespace: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Other { target_namespace } => {
                !namespace.is_empty() && target_namespace.as_deref() != Some(namespace)
            }
            Self::Enumeration(set) => set.contains(namespace),
            Self::Not(set) => !set.contains(namespace),
        }
    }
}

fn parse_namespace_list(
    value: &str,
    target_namespace: Option<&str>,
    attribute: &str,
) -> Result<BTreeSet<String>> {
    let mut namespaces = BTreeSet::new();
    for ns in value.split_whitespace() {
        match ns {
            "##local" => {
                namespaces.insert(String::new());
            }
            "##targetNamespace" => {
                namespaces.insert(target_namespace.unwrap_or_default().to_string());
            }
            s if s.starts_with("##") => {
                return Err(Error::Definition(format!(
                    "wrong value '{}' in '{}' attribute",
                    s, attribute
                )));
            }
            uri => {
                namespaces.insert(uri.to_string());
            }
        }
    }
    Ok(namespaces)
}

impl fmt::Display for NamespaceConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "##any"),
            Self::Other { .. } => write!(f, "##other"),
            Self::Enumeration(set) | Self::Not(set) => {
                let list: Vec<&str> = set
                    .iter()
                    .map(|ns| if ns.is_empty() { "##local" } else { ns.as_str() })
                    .collect();
                if matches!(self, Self::Not(_)) {
                    write!(f, "not({})", list.join(" "))
                } else {
                    write!(f, "{}", list.join(" "))
                }
            }
        }
    }
}

/// Element wildcard
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Wildcard {
    /// Which namespaces the wildcard admits
    pub constraint: NamespaceConstraint,
}

impl Wildcard {
    /// A wildcard admitting every element (`##any`)
    pub fn any() -> Self {
        Self::default()
    }

    /// A wildcard with the given constraint
    pub fn new(constraint: NamespaceConstraint) -> Self {
        Self { constraint }
    }

    /// Whether an instance child with this name is absorbed
    pub fn matches(&self, name: &QName) -> bool {
        self.constraint.is_allowed(name.namespace_or_empty())
    }
}
