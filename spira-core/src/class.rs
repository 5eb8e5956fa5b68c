use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::identifier;
use crate::term::Iri;

/// Whether a property holds one value or a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Multi,
}

/// One declared property of a resource class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    name: String,
    predicate: Iri,
    type_tag: String,
    cardinality: Cardinality,
}

impl PropertySchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self) -> &Iri {
        &self.predicate
    }

    /// The codec tag or related class name values are converted with.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_multi(&self) -> bool {
        self.cardinality == Cardinality::Multi
    }
}

/// The effective schema of a registered class.
///
/// Computed once at registration by folding the parent's schema and
/// overlaying the class's own declarations.
#[derive(Debug, Clone)]
pub struct ClassSchema {
    name: String,
    ancestors: Vec<String>,
    base_uri: Option<String>,
    vocabulary: Option<Iri>,
    types: Vec<Iri>,
    properties: IndexMap<String, PropertySchema>,
}

impl ClassSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent first, root last.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    pub fn vocabulary(&self) -> Option<&Iri> {
        self.vocabulary.as_ref()
    }

    pub fn types(&self) -> &[Iri] {
        &self.types
    }

    /// Properties in declaration order (inherited ones first).
    pub fn properties(&self) -> impl Iterator<Item = &PropertySchema> {
        self.properties.values()
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.get(name)
    }

    /// Like `property`, failing with `UnknownProperty`.
    pub fn require(&self, name: &str) -> Result<&PropertySchema, Error> {
        self.property(name).ok_or_else(|| Error::UnknownProperty {
            class: self.name.clone(),
            property: name.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
struct PropertyDecl {
    name: String,
    predicate: Option<String>,
    type_tag: String,
    cardinality: Cardinality,
}

/// Declares a class for registration in a [`ClassRegistry`].
///
/// ```
/// use spira_core::{ClassBuilder, ClassRegistry};
///
/// let mut classes = ClassRegistry::new();
/// classes
///     .register(
///         ClassBuilder::new("Person")
///             .base_uri("http://example.org/people/")
///             .vocabulary("http://xmlns.com/foaf/0.1/")
///             .rdf_type("http://xmlns.com/foaf/0.1/Person")
///             .property("name", "http://www.w3.org/2000/01/rdf-schema#label", "string")
///             .vocabulary_property("age", "integer"),
///     )
///     .unwrap();
///
/// let person = classes.get("Person").unwrap();
/// assert_eq!(
///     person.property("age").unwrap().predicate().as_str(),
///     "http://xmlns.com/foaf/0.1/age"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    parent: Option<String>,
    base_uri: Option<String>,
    vocabulary: Option<String>,
    types: Vec<String>,
    replace_types: bool,
    properties: Vec<PropertyDecl>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ClassBuilder {
            name: name.into(),
            parent: None,
            base_uri: None,
            vocabulary: None,
            types: Vec::new(),
            replace_types: false,
            properties: Vec::new(),
        }
    }

    /// Inherits properties, base URI, vocabulary and types from a registered class.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn base_uri(mut self, base: impl Into<String>) -> Self {
        self.base_uri = Some(base.into());
        self
    }

    /// Predicates of properties declared without one are formed from this IRI.
    pub fn vocabulary(mut self, vocabulary: impl Into<String>) -> Self {
        self.vocabulary = Some(vocabulary.into());
        self
    }

    /// Adds an RDF type written on save and used for existence checks.
    pub fn rdf_type(mut self, iri: impl Into<String>) -> Self {
        self.types.push(iri.into());
        self
    }

    /// Uses only this class's own types instead of adding to the parent's.
    pub fn replace_types(mut self) -> Self {
        self.replace_types = true;
        self
    }

    pub fn property(
        self,
        name: impl Into<String>,
        predicate: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Self {
        self.declare(name.into(), Some(predicate.into()), type_tag.into(), Cardinality::Single)
    }

    /// A single-valued property whose predicate comes from the vocabulary.
    pub fn vocabulary_property(self, name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        self.declare(name.into(), None, type_tag.into(), Cardinality::Single)
    }

    /// A set-valued property.
    pub fn has_many(
        self,
        name: impl Into<String>,
        predicate: impl Into<String>,
        type_tag: impl Into<String>,
    ) -> Self {
        self.declare(name.into(), Some(predicate.into()), type_tag.into(), Cardinality::Multi)
    }

    pub(crate) fn declare(
        mut self,
        name: String,
        predicate: Option<String>,
        type_tag: String,
        cardinality: Cardinality,
    ) -> Self {
        self.properties.push(PropertyDecl {
            name,
            predicate,
            type_tag,
            cardinality,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

/// Registered classes, keyed by name.
///
/// Names may be `::`-separated paths. Type tags naming a class are resolved
/// relative to the requesting class's namespace, innermost first.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, Arc<ClassSchema>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Composes and registers a class. The parent must already be registered.
    pub fn register(&mut self, builder: ClassBuilder) -> Result<Arc<ClassSchema>, Error> {
        if self.classes.contains_key(&builder.name) {
            return Err(Error::Schema(format!("class {} is already registered", builder.name)));
        }
        let parent = match &builder.parent {
            Some(name) => Some(
                self.classes
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownClass(name.clone()))?,
            ),
            None => None,
        };

        let base_uri = builder
            .base_uri
            .or_else(|| parent.as_ref().and_then(|p| p.base_uri.clone()));
        let vocabulary = match builder.vocabulary {
            Some(v) => Some(Iri::new(v)?),
            None => parent.as_ref().and_then(|p| p.vocabulary.clone()),
        };

        let mut types = match (&parent, builder.replace_types) {
            (Some(p), false) => p.types.clone(),
            _ => Vec::new(),
        };
        for t in builder.types {
            let iri = Iri::new(t)?;
            if !types.contains(&iri) {
                types.push(iri);
            }
        }

        let mut properties = parent
            .as_ref()
            .map(|p| p.properties.clone())
            .unwrap_or_default();
        for decl in builder.properties {
            let predicate = match (decl.predicate, &vocabulary) {
                (Some(p), _) => Iri::new(p)?,
                (None, Some(vocab)) => Iri::new(identifier::join(vocab.as_str(), &decl.name))?,
                (None, None) => {
                    return Err(Error::Schema(format!(
                        "{}.{} has no predicate and the class has no vocabulary",
                        builder.name, decl.name
                    )));
                }
            };
            properties.insert(
                decl.name.clone(),
                PropertySchema {
                    name: decl.name,
                    predicate,
                    type_tag: decl.type_tag,
                    cardinality: decl.cardinality,
                },
            );
        }

        let ancestors = match &parent {
            Some(p) => std::iter::once(p.name.clone())
                .chain(p.ancestors.iter().cloned())
                .collect(),
            None => Vec::new(),
        };

        let schema = Arc::new(ClassSchema {
            name: builder.name.clone(),
            ancestors,
            base_uri,
            vocabulary,
            types,
            properties,
        });
        self.classes.insert(builder.name, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ClassSchema>> {
        self.classes.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Arc<ClassSchema>, Error> {
        self.get(name).ok_or_else(|| Error::UnknownClass(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Finds a class by a tag used inside `from_class`.
    ///
    /// For `from_class = "app::models::Person"` and `tag = "Address"` this
    /// tries `app::models::Address`, then `app::Address`, then `Address`.
    pub fn lookup(&self, tag: &str, from_class: &str) -> Option<Arc<ClassSchema>> {
        let mut namespace = from_class.rsplit_once("::").map(|(ns, _)| ns);
        while let Some(ns) = namespace {
            if let Some(class) = self.classes.get(&format!("{ns}::{tag}")) {
                return Some(Arc::clone(class));
            }
            namespace = ns.rsplit_once("::").map(|(outer, _)| outer);
        }
        self.get(tag)
    }

    /// True if `class` is `ancestor` or descends from it.
    pub fn is_a(&self, class: &str, ancestor: &str) -> bool {
        class == ancestor
            || self
                .classes
                .get(class)
                .is_some_and(|c| c.ancestors.iter().any(|a| a == ancestor))
    }
}
