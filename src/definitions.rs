//! In-memory schema definitions
//!
//! [`SchemaDefinitions`] is a small registry of global elements, named
//! groups and named complex types, loaded from JSON. It implements
//! [`Resolver`], so the content models it builds can be matched directly.
//!
//! ```json
//! {
//!   "targetNamespace": "urn:shapes",
//!   "namespaces": { "s": "urn:shapes" },
//!   "elements": [
//!     { "name": "shape", "abstract": true },
//!     { "name": "circle", "substitutionGroup": "s:shape" },
//!     { "name": "drawing", "type": "s:drawingType" }
//!   ],
//!   "groups": [
//!     { "name": "meta", "model": { "kind": "sequence", "members": [
//!       { "kind": "element", "name": "title" }
//!     ] } }
//!   ],
//!   "types": [
//!     { "name": "drawingType", "model": { "kind": "sequence", "members": [
//!       { "kind": "group", "ref": "s:meta" },
//!       { "kind": "element", "ref": "s:shape", "maxOccurs": "unbounded" }
//!     ] } }
//!   ]
//! }
//! ```
//!
//! Unprefixed names, local element names included, are taken to be in the
//! target namespace.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::compositor::{
    parse_occurs, Group, Member, ModelType, NamespaceConstraint, Occurs, Wildcard,
};
use crate::error::{Error, MatchError, Result};
use crate::limits::Limits;
use crate::names::{split_qname, validate_ncname, validate_qname};
use crate::namespaces::{NamespaceContext, QName};
use crate::resolver::{GlobalDef, GlobalElementInfo, Resolver};

/// An occurrence attribute: a number or `"unbounded"`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OccursValue {
    /// Plain number
    Number(u32),
    /// Textual form, as written in a schema
    Text(String),
}

impl OccursValue {
    fn as_attribute(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Kind of a particle definition
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticleKind {
    /// Local element or element reference
    Element,
    /// Named group reference
    Group,
    /// Element wildcard
    Any,
    /// Sequence compositor
    Sequence,
    /// Choice compositor
    Choice,
    /// All compositor
    All,
}

impl ParticleKind {
    fn model(self) -> Option<ModelType> {
        match self {
            Self::Sequence => Some(ModelType::Sequence),
            Self::Choice => Some(ModelType::Choice),
            Self::All => Some(ModelType::All),
            Self::Element | Self::Group | Self::Any => None,
        }
    }
}

/// A particle as written in a definitions file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParticleDef {
    /// What the particle is
    pub kind: ParticleKind,
    /// Name of a local element
    #[serde(default)]
    pub name: Option<String>,
    /// Reference to a global element or named group
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    /// minOccurs, default 1
    #[serde(default)]
    pub min_occurs: Option<OccursValue>,
    /// maxOccurs, default 1
    #[serde(default)]
    pub max_occurs: Option<OccursValue>,
    /// Members of a compositor
    #[serde(default)]
    pub members: Vec<ParticleDef>,
    /// Wildcard namespace attribute
    #[serde(default)]
    pub namespace: Option<String>,
    /// Wildcard notNamespace attribute
    #[serde(default)]
    pub not_namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ElementDef {
    name: String,
    #[serde(default, rename = "abstract")]
    is_abstract: bool,
    #[serde(default)]
    substitution_group: Option<String>,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    model: Option<ParticleDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedModelDef {
    name: String,
    model: ParticleDef,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DefinitionsFile {
    #[serde(default)]
    target_namespace: Option<String>,
    #[serde(default)]
    namespaces: BTreeMap<String, String>,
    #[serde(default)]
    elements: Vec<ElementDef>,
    #[serde(default)]
    groups: Vec<NamedModelDef>,
    #[serde(default)]
    types: Vec<NamedModelDef>,
}

/// A global element declaration
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// Name, abstractness and substitution group members
    pub info: GlobalElementInfo,
    /// Head of the substitution group this element belongs to
    pub substitution_head: Option<QName>,
    /// Named type of the element
    pub type_name: Option<QName>,
    /// Anonymous content model of the element
    pub model: Option<Arc<Group>>,
}

/// Loaded schema definitions
#[derive(Debug, Default)]
pub struct SchemaDefinitions {
    target_namespace: Option<String>,
    namespaces: NamespaceContext,
    elements: IndexMap<QName, ElementDecl>,
    groups: IndexMap<QName, Arc<Group>>,
    types: IndexMap<QName, Arc<Group>>,
}

impl SchemaDefinitions {
    /// Load definitions from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: DefinitionsFile = serde_json::from_str(json)?;
        Self::build(file)
    }

    /// Load definitions from a JSON file with default limits
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_file_with_limits(path, &Limits::default())
    }

    /// Load definitions from a JSON file, refusing files over the size limit
    pub fn from_file_with_limits(path: impl AsRef<Path>, limits: &Limits) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        limits.check_definition_size(usize::try_from(size).unwrap_or(usize::MAX))?;
        let json = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = size, "loading definitions");
        Self::from_json_str(&json)
    }

    fn build(file: DefinitionsFile) -> Result<Self> {
        let mut defs = Self {
            target_namespace: file.target_namespace.filter(|ns| !ns.is_empty()),
            ..Self::default()
        };
        for (prefix, uri) in &file.namespaces {
            validate_ncname(prefix)?;
            defs.namespaces.add_prefix(prefix, uri);
        }

        for group in &file.groups {
            let name = defs.global_name(&group.name)?;
            let model = defs.build_model(&group.model)?.named(name.clone());
            if defs.groups.insert(name.clone(), Arc::new(model)).is_some() {
                return Err(Error::Definition(format!("duplicate group '{}'", name)));
            }
        }
        for ty in &file.types {
            let name = defs.global_name(&ty.name)?;
            let model = defs.build_model(&ty.model)?.named(name.clone());
            if defs.types.insert(name.clone(), Arc::new(model)).is_some() {
                return Err(Error::Definition(format!("duplicate type '{}'", name)));
            }
        }
        for element in &file.elements {
            let decl = defs.build_element(element)?;
            let name = decl.info.name.clone();
            if defs.elements.insert(name.clone(), decl).is_some() {
                return Err(Error::Definition(format!("duplicate element '{}'", name)));
            }
        }
        defs.link_substitution_groups()?;

        debug!(
            elements = defs.elements.len(),
            groups = defs.groups.len(),
            types = defs.types.len(),
            "loaded definitions"
        );
        Ok(defs)
    }

    fn build_element(&self, def: &ElementDef) -> Result<ElementDecl> {
        let name = self.global_name(&def.name)?;
        let substitution_head = def
            .substitution_group
            .as_deref()
            .map(|head| self.qualify(head))
            .transpose()?;
        let type_name = def
            .type_name
            .as_deref()
            .map(|ty| self.qualify(ty))
            .transpose()?;
        if type_name.is_some() && def.model.is_some() {
            return Err(Error::Definition(format!(
                "element '{}' has both a type and a model",
                def.name
            )));
        }
        let model = match &def.model {
            Some(particle) => Some(Arc::new(self.build_model(particle)?.named(name.clone()))),
            None => None,
        };
        Ok(ElementDecl {
            info: GlobalElementInfo {
                name,
                is_abstract: def.is_abstract,
                substitution_group_members: Vec::new(),
            },
            substitution_head,
            type_name,
            model,
        })
    }

    /// Record every element under each of its (transitive) heads
    fn link_substitution_groups(&mut self) -> Result<()> {
        let mut links = Vec::new();
        for (name, decl) in &self.elements {
            let mut seen = HashSet::new();
            let mut head = decl.substitution_head.clone();
            while let Some(current) = head {
                if !seen.insert(current.clone()) || &current == name {
                    return Err(Error::Definition(format!(
                        "circular substitution group through '{}'",
                        current
                    )));
                }
                let head_decl = self.elements.get(&current).ok_or_else(|| {
                    Error::Definition(format!(
                        "substitution group head '{}' of '{}' is not declared",
                        current, name
                    ))
                })?;
                links.push((current.clone(), name.clone()));
                head = head_decl.substitution_head.clone();
            }
        }
        for (head, member) in links {
            if let Some(decl) = self.elements.get_mut(&head) {
                decl.info.substitution_group_members.push(member);
            }
        }
        Ok(())
    }

    /// Build the top-level group of a named definition
    fn build_model(&self, particle: &ParticleDef) -> Result<Group> {
        let Some(model) = particle.kind.model() else {
            return Err(Error::Definition(
                "a content model must be a sequence, choice or all".to_string(),
            ));
        };
        let occurs = self.occurs_of(particle)?;
        let mut group = Group::new(model).with_occurs(occurs);
        for member in &particle.members {
            group.add_member(self.build_member(member)?);
        }
        Ok(group)
    }

    fn build_member(&self, particle: &ParticleDef) -> Result<Member> {
        match particle.kind {
            ParticleKind::Sequence | ParticleKind::Choice | ParticleKind::All => {
                Ok(Member::nested(self.build_model(particle)?))
            }
            ParticleKind::Element => {
                let occurs = self.leaf_occurs(particle)?;
                match (&particle.name, &particle.reference) {
                    (Some(name), None) => {
                        validate_ncname(name)?;
                        Ok(Member::element(name.as_str(), occurs))
                    }
                    (None, Some(reference)) => {
                        validate_qname(reference)?;
                        Ok(Member::element_ref(reference.as_str(), occurs))
                    }
                    _ => Err(Error::Definition(
                        "an element particle needs exactly one of 'name' and 'ref'".to_string(),
                    )),
                }
            }
            ParticleKind::Group => {
                let occurs = self.leaf_occurs(particle)?;
                match (&particle.name, &particle.reference) {
                    (None, Some(reference)) => {
                        validate_qname(reference)?;
                        Ok(Member::group_ref(reference.as_str(), occurs))
                    }
                    _ => Err(Error::Definition(
                        "a group particle needs a 'ref' and no 'name'".to_string(),
                    )),
                }
            }
            ParticleKind::Any => {
                let occurs = self.leaf_occurs(particle)?;
                let target = self.target_namespace.as_deref();
                let constraint = match (&particle.namespace, &particle.not_namespace) {
                    (Some(_), Some(_)) => {
                        return Err(Error::Definition(
                            "'namespace' and 'notNamespace' are mutually exclusive".to_string(),
                        ))
                    }
                    (Some(ns), None) => NamespaceConstraint::from_namespace_attr(ns, target)?,
                    (None, Some(ns)) => NamespaceConstraint::from_not_namespace_attr(ns, target)?,
                    (None, None) => NamespaceConstraint::Any,
                };
                Ok(Member::wildcard(Wildcard::new(constraint), occurs))
            }
        }
    }

    /// Occurrence bounds of a particle that cannot have members
    fn leaf_occurs(&self, particle: &ParticleDef) -> Result<Occurs> {
        if !particle.members.is_empty() {
            return Err(Error::Definition(format!(
                "{:?} particles cannot have members",
                particle.kind
            )));
        }
        self.occurs_of(particle)
    }

    fn occurs_of(&self, particle: &ParticleDef) -> Result<Occurs> {
        let min = particle.min_occurs.as_ref().map(OccursValue::as_attribute);
        let max = particle.max_occurs.as_ref().map(OccursValue::as_attribute);
        parse_occurs(min.as_deref(), max.as_deref())
    }

    fn global_name(&self, name: &str) -> Result<QName> {
        validate_ncname(name)?;
        Ok(QName::new(self.target_namespace.clone(), name))
    }

    /// Resolve a possibly prefixed name written in the definitions
    pub fn qualify(&self, name: &str) -> Result<QName> {
        validate_qname(name)?;
        match split_qname(name) {
            (Some(prefix), local) => {
                let ns = self.namespaces.get_namespace(prefix).ok_or_else(|| {
                    Error::Namespace(format!("Unknown prefix: {}", prefix))
                })?;
                Ok(QName::namespaced(ns, local))
            }
            (None, local) => Ok(QName::new(self.target_namespace.clone(), local)),
        }
    }

    /// Target namespace of the definitions
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Global element declarations
    pub fn elements(&self) -> impl Iterator<Item = &ElementDecl> {
        self.elements.values()
    }

    /// Names of the named complex types
    pub fn type_names(&self) -> impl Iterator<Item = &QName> {
        self.types.keys()
    }

    /// Names of the named groups
    pub fn group_names(&self) -> impl Iterator<Item = &QName> {
        self.groups.keys()
    }

    /// Content model of a named type
    pub fn type_model(&self, name: &str) -> Option<&Arc<Group>> {
        let qname = self.qualify(name).ok()?;
        self.types.get(&qname)
    }

    /// Content model of a named group
    pub fn group_model(&self, name: &str) -> Option<&Arc<Group>> {
        let qname = self.qualify(name).ok()?;
        self.groups.get(&qname)
    }

    /// Content model of a global element, through its type or its own model
    pub fn element_model(&self, name: &QName) -> Option<&Arc<Group>> {
        let decl = self.elements.get(name)?;
        match (&decl.model, &decl.type_name) {
            (Some(model), _) => Some(model),
            (None, Some(type_name)) => self.types.get(type_name),
            (None, None) => None,
        }
    }

    /// Resolve every reference in every content model, reporting the first
    /// schema defect found
    pub fn check(&self) -> std::result::Result<(), MatchError> {
        for decl in self.elements.values() {
            if let Some(type_name) = &decl.type_name {
                if !self.types.contains_key(type_name) {
                    warn!(element = %decl.info.name, type_name = %type_name, "undeclared type");
                    return Err(MatchError::unresolved(type_name.to_string()));
                }
            }
        }
        let models = self
            .types
            .values()
            .chain(self.groups.values())
            .chain(self.elements.values().filter_map(|d| d.model.as_ref()));
        for model in models {
            model.prepare(self)?;
        }
        Ok(())
    }

    fn lookup_qname(&self, ref_name: &str) -> Option<QName> {
        match self.qualify(ref_name) {
            Ok(qname) => Some(qname),
            Err(err) => {
                debug!(reference = ref_name, error = %err, "cannot qualify reference");
                None
            }
        }
    }
}

impl Resolver for SchemaDefinitions {
    fn resolve_instance_name(&self, local_or_ref_name: &str) -> std::result::Result<QName, MatchError> {
        self.qualify(local_or_ref_name)
            .map_err(|_| MatchError::unresolved(local_or_ref_name))
    }

    fn lookup_global(&self, ref_name: &str) -> Option<GlobalDef> {
        self.lookup_element(ref_name)
            .map(GlobalDef::Element)
            .or_else(|| self.lookup_group(ref_name).map(GlobalDef::Group))
    }

    fn lookup_element(&self, ref_name: &str) -> Option<GlobalElementInfo> {
        let qname = self.lookup_qname(ref_name)?;
        self.elements.get(&qname).map(|decl| decl.info.clone())
    }

    fn lookup_group(&self, ref_name: &str) -> Option<Arc<Group>> {
        let qname = self.lookup_qname(ref_name)?;
        self.groups.get(&qname).cloned()
    }
}
