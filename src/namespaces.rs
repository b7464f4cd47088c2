//! XML namespace handling
//!
//! This module provides qualified names (QNames) and namespace prefix
//! mappings. Instance children and schema particles are compared as
//! expanded names, so the prefix an instance document happens to use never
//! affects matching.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Parse Clark notation (`{uri}local` or plain `local`)
    pub fn from_clark(value: &str) -> Result<Self> {
        match value.strip_prefix('{') {
            Some(rest) => {
                let (ns, local) = rest.split_once('}').ok_or_else(|| {
                    Error::Name(format!("unterminated namespace in '{}'", value))
                })?;
                if local.is_empty() {
                    return Err(Error::Name(format!("missing local name in '{}'", value)));
                }
                Ok(Self::namespaced(ns, local))
            }
            None => Ok(Self::local(value)),
        }
    }

    /// The namespace URI, with the empty string standing for no namespace
    pub fn namespace_or_empty(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace context for resolving prefixes
#[derive(Debug, Clone, Default)]
pub struct NamespaceContext {
    /// Mapping from prefix to namespace URI
    prefixes: HashMap<Prefix, NamespaceUri>,
    /// Default namespace (no prefix)
    default_namespace: Option<NamespaceUri>,
}

impl NamespaceContext {
    /// Create a new empty namespace context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a namespace prefix mapping
    pub fn add_prefix(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.prefixes.insert(prefix.into(), namespace.into());
    }

    /// Set the default namespace
    pub fn set_default_namespace(&mut self, namespace: impl Into<String>) {
        self.default_namespace = Some(namespace.into());
    }

    /// Get the namespace for a prefix
    pub fn get_namespace(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(|s| s.as_str())
    }

    /// Get the default namespace
    pub fn get_default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Whether this context declares nothing
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty() && self.default_namespace.is_none()
    }

    /// Resolve a prefixed name to a QName
    pub fn resolve(&self, prefixed_name: &str) -> Result<QName> {
        if let Some((prefix, local)) = prefixed_name.split_once(':') {
            let namespace = self
                .get_namespace(prefix)
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix)))?;
            Ok(QName::namespaced(namespace, local))
        } else {
            Ok(QName::new(self.default_namespace.clone(), prefixed_name))
        }
    }
}

/// Stack of in-scope namespace declarations while walking a document.
///
/// Inner scopes shadow outer ones; an empty default namespace declaration
/// (`xmlns=""`) undeclares the default namespace.
#[derive(Debug, Default)]
pub struct NamespaceScopes {
    scopes: Vec<NamespaceContext>,
}

impl NamespaceScopes {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter an element's declarations
    pub fn push(&mut self, context: NamespaceContext) {
        self.scopes.push(context);
    }

    /// Leave the innermost element
    pub fn pop(&mut self) -> Option<NamespaceContext> {
        self.scopes.pop()
    }

    /// Resolve an element name against every scope, innermost first
    pub fn resolve_element(&self, prefixed_name: &str) -> Result<QName> {
        match prefixed_name.split_once(':') {
            Some((prefix, local)) => self
                .scopes
                .iter()
                .rev()
                .find_map(|ctx| ctx.get_namespace(prefix))
                .map(|ns| QName::namespaced(ns, local))
                .ok_or_else(|| Error::Namespace(format!("Unknown prefix: {}", prefix))),
            None => {
                let default = self
                    .scopes
                    .iter()
                    .rev()
                    .find_map(|ctx| ctx.get_default_namespace())
                    .filter(|ns| !ns.is_empty());
                Ok(QName::new(default, prefixed_name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qname_creation() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.namespace, Some("http://example.com".to_string()));
        assert_eq!(qname.local_name, "element");
    }

    #[test]
    fn test_qname_display() {
        let qname = QName::namespaced("http://example.com", "element");
        assert_eq!(qname.to_string(), "{http://example.com}element");

        let qname_local = QName::local("element");
        assert_eq!(qname_local.to_string(), "element");
    }

    #[test]
    fn test_qname_from_clark() {
        let qname = QName::from_clark("{urn:a}b").unwrap();
        assert_eq!(qname, QName::namespaced("urn:a", "b"));
        assert_eq!(QName::from_clark("plain").unwrap(), QName::local("plain"));
        assert!(QName::from_clark("{urn:a").is_err());
        assert!(QName::from_clark("{urn:a}").is_err());
    }

    #[test]
    fn test_resolve_prefixed_name() {
        let mut ctx = NamespaceContext::new();
        ctx.add_prefix("adn", "http://adn.dlese.org");
        ctx.set_default_namespace("http://example.com");

        let qname = ctx.resolve("adn:title").unwrap();
        assert_eq!(qname, QName::namespaced("http://adn.dlese.org", "title"));
        assert_eq!(
            ctx.resolve("title").unwrap(),
            QName::namespaced("http://example.com", "title")
        );
        assert!(ctx.resolve("nope:title").is_err());
    }

    #[test]
    fn test_scopes_shadowing() {
        let mut outer = NamespaceContext::new();
        outer.set_default_namespace("urn:outer");
        outer.add_prefix("p", "urn:p1");
        let mut inner = NamespaceContext::new();
        inner.add_prefix("p", "urn:p2");

        let mut scopes = NamespaceScopes::new();
        scopes.push(outer);
        scopes.push(inner);
        assert_eq!(scopes.resolve_element("p:x").unwrap(), QName::namespaced("urn:p2", "x"));
        assert_eq!(scopes.resolve_element("x").unwrap(), QName::namespaced("urn:outer", "x"));

        scopes.pop();
        assert_eq!(scopes.resolve_element("p:x").unwrap(), QName::namespaced("urn:p1", "x"));
    }

    #[test]
    fn test_scopes_undeclared_default() {
        let mut outer = NamespaceContext::new();
        outer.set_default_namespace("urn:outer");
        let mut inner = NamespaceContext::new();
        inner.set_default_namespace("");

        let mut scopes = NamespaceScopes::new();
        scopes.push(outer);
        scopes.push(inner);
        assert_eq!(scopes.resolve_element("x").unwrap(), QName::local("x"));
    }
}
