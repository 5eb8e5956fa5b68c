use indexmap::IndexMap;
use std::cell::{Cell, Ref, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::cache::AttributeCache;
use crate::class::{ClassRegistry, ClassSchema, PropertySchema};
use crate::codec::{Codec, CodecRegistry, RelationCodec};
use crate::error::{Error, PersistError, StoreFailure};
use crate::identifier::{self, Identifier};
use crate::persistence::{self, DestroyMode};
use crate::scope::LoadScope;
use crate::store::GraphStore;
use crate::term::{BlankNode, Iri, Pattern, Subject, Term, Triple};
use crate::value::{Attribute, ResourceRef, Value};
use crate::vocab::rdf;

/// Everything a resource needs from its surroundings: the store handle, the
/// codec registry and the class registry.
///
/// Cloning is cheap; clones share the same store.
pub struct Repository<S> {
    inner: Arc<RepositoryInner<S>>,
}

struct RepositoryInner<S> {
    store: S,
    codecs: CodecRegistry,
    classes: Arc<ClassRegistry>,
}

impl<S> Clone for Repository<S> {
    fn clone(&self) -> Self {
        Repository {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: GraphStore> Repository<S> {
    pub fn new(store: S, codecs: CodecRegistry, classes: ClassRegistry) -> Self {
        Repository {
            inner: Arc::new(RepositoryInner {
                store,
                codecs,
                classes: Arc::new(classes),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.inner.codecs
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.inner.classes
    }

    /// Returns an instance of `class` for an identifier. Nothing is read yet.
    pub fn for_subject(&self, class: &str, identifier: impl Into<Identifier>) -> Result<Resource<S>, Error> {
        let class = self.classes().require(class)?;
        let subject = identifier::resolve(identifier, class.base_uri())?;
        Ok(Resource::new(self.clone(), class, subject))
    }

    /// Returns an instance with constructor-supplied attribute values.
    ///
    /// The values are a baseline: they are not reported dirty, but the next
    /// save writes them.
    pub fn build<K, V>(
        &self,
        class: &str,
        identifier: impl Into<Identifier>,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Resource<S>, Error>
    where
        K: AsRef<str>,
        V: Into<Attribute>,
    {
        let resource = self.for_subject(class, identifier)?;
        for (name, value) in attributes {
            let property = resource.class().require(name.as_ref())?;
            let value = conform(property, value.into())?;
            resource.inner.cache.borrow_mut().set_baseline(property.name(), value);
        }
        Ok(resource)
    }

    /// Returns an instance of `class` for a fresh blank node.
    pub fn anonymous(&self, class: &str) -> Result<Resource<S>, Error> {
        self.for_subject(class, BlankNode::fresh())
    }

    /// Every subject carrying all of the class's declared types.
    pub fn each(&self, class: &str) -> Result<Vec<Resource<S>>, Error> {
        let schema = self.classes().require(class)?;
        let Some((first, rest)) = schema.types().split_first() else {
            return Err(Error::Schema(format!("{class} declares no RDF types")));
        };
        let pattern = Pattern::any()
            .with_predicate(rdf::type_())
            .with_object(first.clone());
        let mut subjects = BTreeSet::new();
        for triple in self.store().query(&pattern).map_err(|e| StoreFailure::new("query", e))? {
            subjects.insert(triple.subject);
        }
        let mut resources = Vec::with_capacity(subjects.len());
        'subjects: for subject in subjects {
            for other in rest {
                let pattern = Pattern::subject(subject.clone())
                    .with_predicate(rdf::type_())
                    .with_object(other.clone());
                let count = self
                    .store()
                    .count_matching(&pattern)
                    .map_err(|e| StoreFailure::new("count", e))?;
                if count == 0 {
                    continue 'subjects;
                }
            }
            resources.push(Resource::new(self.clone(), Arc::clone(&schema), subject));
        }
        Ok(resources)
    }

    pub fn count(&self, class: &str) -> Result<usize, Error> {
        Ok(self.each(class)?.len())
    }

    /// The codec for a property: a registered codec tag, or a relation to a
    /// class found relative to the declaring class.
    pub(crate) fn codec(&self, class: &ClassSchema, property: &PropertySchema) -> Result<Arc<dyn Codec>, Error> {
        let tag = property.type_tag();
        if let Some(codec) = self.codecs().get(tag) {
            return Ok(codec);
        }
        match self.inner.classes.lookup(tag, class.name()) {
            Some(target) => Ok(Arc::new(RelationCodec::new(target, Arc::clone(&self.inner.classes)))),
            None => Err(Error::UnknownType {
                tag: tag.to_string(),
                class: class.name().to_string(),
            }),
        }
    }
}

/// One instance of a class, projecting a single subject.
///
/// Attribute values are loaded lazily: nothing is read until the first `get`,
/// which loads every declared property with one query. Assignments stay in
/// memory until `save`.
///
/// A `Resource` is a handle; clones refer to the same instance. Equality
/// compares class and subject, `ptr_eq` compares instances.
pub struct Resource<S> {
    inner: Rc<ResourceInner<S>>,
}

pub(crate) struct ResourceInner<S> {
    subject: Subject,
    class: Arc<ClassSchema>,
    repository: Repository<S>,
    cache: RefCell<AttributeCache>,
    scope: RefCell<Rc<LoadScope<S>>>,
    errors: RefCell<Vec<PersistError>>,
    destroyed: Cell<bool>,
}

impl<S> Clone for Resource<S> {
    fn clone(&self) -> Self {
        Resource {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> PartialEq for Resource<S> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.class.name() == other.inner.class.name() && self.inner.subject == other.inner.subject
    }
}

impl<S> fmt::Debug for Resource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("class", &self.inner.class.name())
            .field("subject", &self.inner.subject)
            .finish()
    }
}

impl<S: GraphStore> Resource<S> {
    /// A new instance heading its own load tree.
    pub(crate) fn new(repository: Repository<S>, class: Arc<ClassSchema>, subject: Subject) -> Self {
        Self::in_scope(repository, class, subject, LoadScope::new())
    }

    /// A new unloaded instance registered in an existing load tree.
    pub(crate) fn in_scope(
        repository: Repository<S>,
        class: Arc<ClassSchema>,
        subject: Subject,
        scope: Rc<LoadScope<S>>,
    ) -> Self {
        let resource = Resource {
            inner: Rc::new(ResourceInner {
                cache: RefCell::new(AttributeCache::new(&class)),
                subject,
                class,
                repository,
                scope: RefCell::new(Rc::clone(&scope)),
                errors: RefCell::new(Vec::new()),
                destroyed: Cell::new(false),
            }),
        };
        scope.register(&resource);
        resource
    }

    pub(crate) fn downgrade(&self) -> Weak<ResourceInner<S>> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<ResourceInner<S>>) -> Option<Self> {
        weak.upgrade().map(|inner| Resource { inner })
    }

    pub(crate) fn cache(&self) -> &RefCell<AttributeCache> {
        &self.inner.cache
    }

    pub fn subject(&self) -> &Subject {
        &self.inner.subject
    }

    pub fn class(&self) -> &ClassSchema {
        &self.inner.class
    }

    pub fn repository(&self) -> &Repository<S> {
        &self.inner.repository
    }

    /// The subject relative to the class base URI, if it lies under it.
    pub fn id(&self) -> Option<String> {
        identifier::relative_id(self.subject(), self.class().base_uri()?)
    }

    /// A reference to this instance, suitable as a relation value.
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(self.subject().clone(), self.class().name())
    }

    /// True if both handles refer to the same instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Reads a property, loading all properties on the first read.
    pub fn get(&self, name: &str) -> Result<Attribute, Error> {
        let property = self.class().require(name)?;
        let needs_load = self.inner.cache.borrow().needs_load(name);
        if needs_load {
            self.load_all()?;
        }
        let cache = self.inner.cache.borrow();
        Ok(cache
            .get(name)
            .cloned()
            .unwrap_or_else(|| Attribute::empty(property.is_multi())))
    }

    /// Assigns a property. Nothing is written until `save`.
    ///
    /// A single value assigned to a set-valued property becomes a one-element
    /// set; a set assigned to a single-valued property is a type mismatch.
    pub fn set(&self, name: &str, value: impl Into<Attribute>) -> Result<(), Error> {
        let property = self.class().require(name)?;
        let value = conform(property, value.into())?;
        self.inner.cache.borrow_mut().set(name, value);
        Ok(())
    }

    /// See [`AttributeCache::is_dirty`]. A name the class does not declare is
    /// never dirty; use `get` to have it rejected.
    pub fn is_dirty(&self, name: Option<&str>) -> bool {
        self.inner.cache.borrow().is_dirty(name)
    }

    /// Names of properties whose assigned value differs from the stored one.
    pub fn changed(&self) -> Vec<String> {
        self.inner
            .cache
            .borrow()
            .changed()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Discards unsaved values and starts a new identity cache scope.
    pub fn reload(&self) {
        self.inner.cache.borrow_mut().reset();
        let scope = LoadScope::new();
        scope.register(self);
        *self.inner.scope.borrow_mut() = scope;
    }

    /// Writes changed properties and the class's types.
    ///
    /// Not atomic: properties are written one at a time in declaration order,
    /// so on failure earlier properties may already be in the store.
    pub fn save(&self) -> Result<(), Error> {
        persistence::persist(self).map_err(|err| Error::RecordNotSaved {
            subject: self.subject().clone(),
            source: Box::new(err),
        })?;
        self.inner.destroyed.set(false);
        Ok(())
    }

    /// Like `save`, but reports failure as `false` and keeps the error in
    /// [`errors`](Self::errors).
    pub fn save_soft(&self) -> bool {
        match persistence::persist(self) {
            Ok(()) => {
                self.inner.errors.borrow_mut().clear();
                self.inner.destroyed.set(false);
                true
            }
            Err(err) => {
                warn!(subject = %self.subject(), error = %err, "save failed");
                self.inner.errors.borrow_mut().push(err);
                false
            }
        }
    }

    /// Failures recorded by `save_soft` since the last successful save.
    pub fn errors(&self) -> Ref<'_, [PersistError]> {
        Ref::map(self.inner.errors.borrow(), Vec::as_slice)
    }

    /// Deletes this instance's triples according to `mode`.
    ///
    /// Returns whether anything was removed; `ModelOnly` always reports
    /// success. After a successful destroy the in-memory values are gone and
    /// the next read loads again.
    pub fn destroy(&self, mode: DestroyMode) -> Result<bool, Error> {
        let removed = persistence::destroy(self, mode)?;
        self.inner.cache.borrow_mut().reset();
        self.inner.destroyed.set(true);
        Ok(removed)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// True if the store declares this subject with every type of the class.
    pub fn exists(&self) -> Result<bool, Error> {
        persistence::exists(self)
    }

    /// Materializes a single-valued relation through the identity cache.
    pub fn related(&self, name: &str) -> Result<Option<Resource<S>>, Error> {
        match self.get(name)? {
            Attribute::Single(None) => Ok(None),
            Attribute::Single(Some(Value::Resource(reference))) => self.resolve(&reference).map(Some),
            other => Err(not_a_relation(self.class().require(name)?, &other)),
        }
    }

    /// Materializes every value of a set-valued relation.
    pub fn related_all(&self, name: &str) -> Result<Vec<Resource<S>>, Error> {
        let attribute = self.get(name)?;
        attribute
            .iter()
            .map(|value| match value {
                Value::Resource(reference) => self.resolve(reference),
                _ => Err(not_a_relation(self.class().require(name)?, &attribute)),
            })
            .collect()
    }

    fn resolve(&self, reference: &ResourceRef) -> Result<Resource<S>, Error> {
        let scope = Rc::clone(&self.inner.scope.borrow());
        scope.resolve(self.repository(), reference)
    }

    /// A new instance for another subject holding this instance's values as
    /// its baseline. Nothing is written.
    pub fn copy_to(&self, identifier: impl Into<Identifier>) -> Result<Resource<S>, Error> {
        let subject = identifier::resolve(identifier, self.class().base_uri())?;
        let copy = Resource::new(self.repository().clone(), Arc::clone(&self.inner.class), subject);
        for property in self.class().properties() {
            let value = self.get(property.name())?;
            copy.inner.cache.borrow_mut().set_baseline(property.name(), value);
        }
        Ok(copy)
    }

    /// Moves this instance to a new subject.
    ///
    /// Saves a copy under the new subject, points triples that referenced the
    /// old subject at the new one, then destroys the old subject completely.
    /// The subject of an instance never changes; the renamed instance is
    /// returned.
    #[instrument(skip(self, identifier), fields(subject = %self.subject()))]
    pub fn rename(&self, identifier: impl Into<Identifier>) -> Result<Resource<S>, Error> {
        let renamed = self.copy_to(identifier)?;
        renamed.save()?;

        let store = self.repository().store();
        let inbound: Vec<Triple> = store
            .query(&Pattern::object(self.subject().clone()))
            .map_err(|e| StoreFailure::new("query", e))?
            .into_iter()
            .filter(|t| t.subject != *self.subject())
            .collect();
        if !inbound.is_empty() {
            let repointed: Vec<Triple> = inbound
                .iter()
                .map(|t| Triple::new(t.subject.clone(), t.predicate.clone(), renamed.subject().clone()))
                .collect();
            store.delete(&inbound).map_err(|e| StoreFailure::new("delete", e))?;
            store.insert(&repointed).map_err(|e| StoreFailure::new("insert", e))?;
            debug!(count = repointed.len(), to = %renamed.subject(), "repointed references");
        }

        self.destroy(DestroyMode::Completely)?;
        Ok(renamed)
    }

    /// Loads every declared property with a single subject-bound query.
    #[instrument(skip(self), fields(subject = %self.subject()))]
    fn load_all(&self) -> Result<(), Error> {
        let triples = self
            .repository()
            .store()
            .query(&Pattern::subject(self.subject().clone()))
            .map_err(|e| StoreFailure::new("query", e))?;

        let mut by_predicate: HashMap<&Iri, Vec<&Term>> = HashMap::new();
        for triple in &triples {
            by_predicate.entry(&triple.predicate).or_default().push(&triple.object);
        }

        let mut loaded = IndexMap::new();
        for property in self.class().properties() {
            let codec = self.repository().codec(self.class(), property)?;
            let mut values = by_predicate
                .get(property.predicate())
                .into_iter()
                .flatten()
                .map(|term| decode(codec.as_ref(), property, term));
            let attribute = if property.is_multi() {
                Attribute::Multi(values.collect())
            } else {
                Attribute::Single(values.next())
            };
            loaded.insert(property.name().to_string(), attribute);
        }
        debug!(triples = triples.len(), "loaded attributes");

        self.inner.cache.borrow_mut().fill(loaded);
        Ok(())
    }
}

/// Decodes a stored term, keeping it raw if the codec cannot read it.
fn decode(codec: &dyn Codec, property: &PropertySchema, term: &Term) -> Value {
    codec.unserialize(term).unwrap_or_else(|err| {
        warn!(property = property.name(), %term, error = %err, "keeping undecodable term");
        Value::Term(term.clone())
    })
}

/// Brings an assigned value into the property's shape.
fn conform(property: &PropertySchema, value: Attribute) -> Result<Attribute, Error> {
    match (property.is_multi(), value) {
        (false, Attribute::Multi(_)) => Err(Error::TypeMismatch {
            tag: property.type_tag().to_string(),
            message: format!("{} is single-valued, got a set", property.name()),
        }),
        (false, single) => Ok(single),
        (true, Attribute::Single(None)) => Ok(Attribute::empty(true)),
        (true, Attribute::Single(Some(value))) => Ok(Attribute::Multi(std::iter::once(value).collect())),
        (true, multi) => Ok(multi),
    }
}

fn not_a_relation(property: &PropertySchema, value: &Attribute) -> Error {
    Error::TypeMismatch {
        tag: property.type_tag().to_string(),
        message: format!("{} does not hold resources: {value:?}", property.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::store::MemoryGraph;
    use crate::term::Literal;
    use crate::value::ValueSet;
    use crate::vocab::xsd;

    const BASE: &str = "http://example.org/people/";

    fn repository(triples: impl IntoIterator<Item = Triple>) -> Repository<MemoryGraph> {
        let mut classes = ClassRegistry::new();
        classes
            .register(
                ClassBuilder::new("Person")
                    .base_uri(BASE)
                    .rdf_type("http://xmlns.com/foaf/0.1/Person")
                    .property("name", "http://www.w3.org/2000/01/rdf-schema#label", "string")
                    .property("age", "http://xmlns.com/foaf/0.1/age", "integer")
                    .property("friend", "http://xmlns.com/foaf/0.1/knows", "Person")
                    .has_many("nicks", "http://xmlns.com/foaf/0.1/nick", "string"),
            )
            .unwrap();
        Repository::new(MemoryGraph::with_triples(triples), CodecRegistry::new(), classes)
    }

    fn person(name: &str) -> Subject {
        Subject::Iri(Iri::new(format!("{BASE}{name}")).unwrap())
    }

    fn age(name: &str, age: i64) -> Triple {
        Triple::new(
            person(name),
            Iri::new("http://xmlns.com/foaf/0.1/age").unwrap(),
            Literal::typed(age.to_string(), xsd::integer()),
        )
    }

    #[test]
    fn first_read_loads_everything_once() {
        let repo = repository([age("alice", 15)]);
        let alice = repo.for_subject("Person", "alice").unwrap();
        assert_eq!(repo.store().query_count(), 0);

        assert_eq!(alice.get("age").unwrap(), Attribute::from(15));
        assert_eq!(repo.store().query_count(), 1);

        assert_eq!(alice.get("name").unwrap(), Attribute::ABSENT);
        assert_eq!(alice.get("nicks").unwrap(), Attribute::Multi(ValueSet::new()));
        assert_eq!(repo.store().query_count(), 1);
    }

    #[test]
    fn set_does_not_touch_the_store() {
        let repo = repository([]);
        let alice = repo.for_subject("Person", "alice").unwrap();
        alice.set("name", "Alice").unwrap();
        assert_eq!(alice.get("name").unwrap(), Attribute::from("Alice"));
        assert_eq!(repo.store().query_count(), 0);
        assert!(alice.is_dirty(Some("name")));
    }

    #[test]
    fn unknown_property() {
        let repo = repository([]);
        let alice = repo.for_subject("Person", "alice").unwrap();
        assert!(matches!(
            alice.get("shoe_size"),
            Err(Error::UnknownProperty { property, .. }) if property == "shoe_size"
        ));
        assert!(alice.set("shoe_size", 44).is_err());
    }

    #[test]
    fn shapes_are_conformed() {
        let repo = repository([]);
        let alice = repo.for_subject("Person", "alice").unwrap();

        alice.set("nicks", "ally").unwrap();
        assert_eq!(
            alice.get("nicks").unwrap(),
            Attribute::from(vec![Value::from("ally")])
        );

        let err = alice.set("name", vec![Value::from("a"), Value::from("b")]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn build_sets_a_baseline() {
        let repo = repository([]);
        let bob = repo
            .build("Person", "bob", [("name", Attribute::from("Bob")), ("age", Attribute::from(30))])
            .unwrap();
        assert!(!bob.is_dirty(None));
        assert!(!bob.is_dirty(Some("name")));
        assert_eq!(bob.get("name").unwrap(), Attribute::from("Bob"));

        bob.save().unwrap();
        assert!(repo.store().contains(&age("bob", 30)));
    }

    #[test]
    fn id_and_anonymous() {
        let repo = repository([]);
        let alice = repo.for_subject("Person", "alice").unwrap();
        assert_eq!(alice.id().as_deref(), Some("alice"));

        let anon = repo.anonymous("Person").unwrap();
        assert!(anon.subject().is_blank());
        assert_eq!(anon.id(), None);
    }

    #[test]
    fn relation_resolves_to_same_instance() {
        let knows = Iri::new("http://xmlns.com/foaf/0.1/knows").unwrap();
        let repo = repository([
            Triple::new(person("a"), knows.clone(), person("b")),
            Triple::new(person("b"), knows, person("a")),
        ]);
        let a = repo.for_subject("Person", "a").unwrap();
        let b = a.related("friend").unwrap().unwrap();
        assert_eq!(b.subject(), &person("b"));

        let back = b.related("friend").unwrap().unwrap();
        assert!(Resource::ptr_eq(&a, &back));
        assert_eq!(repo.store().query_count(), 2);
    }

    #[test]
    fn reload_discards_changes() {
        let repo = repository([age("alice", 15)]);
        let alice = repo.for_subject("Person", "alice").unwrap();
        alice.set("age", 99).unwrap();
        alice.reload();
        assert!(!alice.is_dirty(None));
        assert_eq!(alice.get("age").unwrap(), Attribute::from(15));
    }
}
