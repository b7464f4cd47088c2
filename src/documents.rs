//! Instance document reading
//!
//! The matcher only ever looks at the names of an element's direct
//! children. This module reads an XML document with quick-xml, resolves
//! every element name against the namespace declarations in scope, and
//! keeps the element tree with nothing but names.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, NamespaceScopes, QName};

/// An element of an instance document, reduced to its name and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Namespace-resolved name
    pub name: QName,
    /// Child elements in document order
    pub children: Vec<Element>,
}

impl Element {
    /// Create a childless element
    pub fn new(name: QName) -> Self {
        Self {
            name,
            children: Vec::new(),
        }
    }

    /// Names of the direct children, in document order
    pub fn child_names(&self) -> Vec<QName> {
        self.children.iter().map(|c| c.name.clone()).collect()
    }

    /// The `nth` child (from 1) with this local name
    pub fn find_child(&self, local_name: &str, nth: usize) -> Option<&Element> {
        self.children
            .iter()
            .filter(|c| c.name.local_name == local_name)
            .nth(nth.checked_sub(1)?)
    }
}

/// A parsed instance document
#[derive(Debug, Clone)]
pub struct InstanceDocument {
    root: Element,
}

impl InstanceDocument {
    /// Parse a document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse a document from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Parse a document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut scopes = NamespaceScopes::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    scopes.push(declarations(&e)?);
                    stack.push(Element::new(element_name(&e, &scopes)?));
                }
                Ok(Event::Empty(e)) => {
                    scopes.push(declarations(&e)?);
                    let element = Element::new(element_name(&e, &scopes)?);
                    scopes.pop();
                    attach(element, &mut stack, &mut root)?;
                }
                Ok(Event::End(_)) => {
                    scopes.pop();
                    if let Some(element) = stack.pop() {
                        attach(element, &mut stack, &mut root)?;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // text, comments and processing instructions carry no names
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(Error::Xml("unexpected end of document".to_string()));
        }
        let root = root.ok_or_else(|| Error::Xml("document has no root element".to_string()))?;
        Ok(Self { root })
    }

    /// The document element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Find an element by a simple path such as `/record/general/title[2]`.
    ///
    /// Steps match local names, prefixes are ignored, and `[n]` selects the
    /// n-th (from 1) sibling of that name. `/` or the empty path is the root.
    pub fn find(&self, path: &str) -> Result<&Element> {
        let mut steps = path.split('/').filter(|s| !s.is_empty());
        let Some(first) = steps.next() else {
            return Ok(&self.root);
        };
        let (local, nth) = parse_step(first)?;
        if local != self.root.name.local_name || nth != 1 {
            return Err(Error::Xml(format!("path '{}' does not start at the root", path)));
        }

        let mut current = &self.root;
        for step in steps {
            let (local, nth) = parse_step(step)?;
            current = current
                .find_child(local, nth)
                .ok_or_else(|| Error::Xml(format!("no element '{}' in path '{}'", step, path)))?;
        }
        Ok(current)
    }
}

fn attach(element: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(Error::Xml("multiple root elements".to_string())),
    }
    Ok(())
}

/// Namespace declarations made on an element
fn declarations(start: &BytesStart) -> Result<NamespaceContext> {
    let mut context = NamespaceContext::new();
    for attr_result in start.attributes() {
        let attr =
            attr_result.map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?;
        if key != "xmlns" && !key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?;
        match key.strip_prefix("xmlns:") {
            Some(prefix) => context.add_prefix(prefix, &*value),
            None => context.set_default_namespace(&*value),
        }
    }
    Ok(context)
}

fn element_name(start: &BytesStart, scopes: &NamespaceScopes) -> Result<QName> {
    let name = start.name();
    let raw = std::str::from_utf8(name.as_ref())
        .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?;
    scopes.resolve_element(raw)
}

fn parse_step(step: &str) -> Result<(&str, usize)> {
    let (name, nth) = match step.split_once('[') {
        Some((name, rest)) => {
            let index = rest
                .strip_suffix(']')
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|&n| n > 0)
                .ok_or_else(|| Error::Xml(format!("invalid path step '{}'", step)))?;
            (name, index)
        }
        None => (step, 1),
    };
    let local = name.split_once(':').map_or(name, |(_, local)| local);
    Ok((local, nth))
}
