use tracing::{debug, instrument};

use crate::class::PropertySchema;
use crate::codec;
use crate::error::{BoxError, DestroyError, Error, PersistError, StoreFailure};
use crate::resource::Resource;
use crate::store::GraphStore;
use crate::term::{Pattern, Subject, Triple};
use crate::value::{Attribute, Value};
use crate::vocab::rdf;

/// Which triples `destroy` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyMode {
    /// Triples whose predicate is a declared property, plus the declared type
    /// triples when `types` is set. Everything else about the subject stays.
    ModelOnly { types: bool },
    /// Every triple with the subject in subject position.
    AsSubject,
    /// Every triple with the subject in object position.
    AsObject,
    /// `AsSubject` and `AsObject` together.
    Completely,
}

impl Default for DestroyMode {
    fn default() -> Self {
        DestroyMode::ModelOnly { types: true }
    }
}

/// Writes every property that needs writing, then the type triples.
///
/// Every pending value is serialized before anything is written, so a codec
/// error leaves the store untouched. Each property is then written as a
/// delete of `(s, p, *)` followed by an insert of the new triples, and is
/// marked saved only after both succeed. A store failure midway leaves the
/// earlier properties written.
#[instrument(skip(resource), fields(subject = %resource.subject()))]
pub(crate) fn persist<S: GraphStore>(resource: &Resource<S>) -> Result<(), PersistError> {
    let subject = resource.subject();
    let store = resource.repository().store();

    let mut pending = Vec::new();
    for property in resource.class().properties() {
        let name = property.name();
        let value = {
            let mut cache = resource.cache().borrow_mut();
            if !cache.needs_write(name) {
                cache.settle(name);
                continue;
            }
            cache
                .get(name)
                .cloned()
                .unwrap_or_else(|| Attribute::empty(property.is_multi()))
        };
        pending.push((property, serialize(resource, property, &value)?));
    }

    for (property, triples) in pending {
        let name = property.name();
        let pattern = Pattern::subject(subject.clone()).with_predicate(property.predicate().clone());
        let removed = store
            .delete_matching(&pattern)
            .map_err(|e| write_failure(subject, Some(name), e))?;
        if !triples.is_empty() {
            store
                .insert(&triples)
                .map_err(|e| write_failure(subject, Some(name), e))?;
        }
        resource.cache().borrow_mut().mark_saved(name);
        debug!(property = name, removed, inserted = triples.len(), "wrote property");
    }

    let types: Vec<Triple> = resource
        .class()
        .types()
        .iter()
        .map(|ty| Triple::new(subject.clone(), rdf::type_(), ty.clone()))
        .collect();
    if !types.is_empty() {
        store.insert(&types).map_err(|e| write_failure(subject, None, e))?;
    }
    Ok(())
}

/// Triples for one property. Raw terms are written as they are.
fn serialize<S: GraphStore>(
    resource: &Resource<S>,
    property: &PropertySchema,
    value: &Attribute,
) -> Result<Vec<Triple>, PersistError> {
    let unserializable = |source: Error| PersistError::Serialize {
        subject: resource.subject().clone(),
        property: property.name().to_string(),
        source: Box::new(source),
    };

    let codec = resource
        .repository()
        .codec(resource.class(), property)
        .map_err(unserializable)?;
    value
        .iter()
        .map(|v| {
            let object = match v {
                Value::Term(term) => term.clone(),
                v => codec
                    .serialize(v)
                    .map_err(|err| unserializable(codec::mismatch(property.type_tag(), err)))?,
            };
            Ok(Triple::new(
                resource.subject().clone(),
                property.predicate().clone(),
                object,
            ))
        })
        .collect()
}

fn write_failure(subject: &Subject, property: Option<&str>, source: impl Into<BoxError>) -> PersistError {
    PersistError::StoreFailure {
        subject: subject.clone(),
        property: property.map(str::to_string),
        source: source.into(),
    }
}

/// True if every declared type triple is present. A class without types
/// counts any triple about the subject.
pub(crate) fn exists<S: GraphStore>(resource: &Resource<S>) -> Result<bool, Error> {
    let store = resource.repository().store();
    let subject = resource.subject();
    let types = resource.class().types();

    if types.is_empty() {
        let count = store
            .count_matching(&Pattern::subject(subject.clone()))
            .map_err(|e| StoreFailure::new("count", e))?;
        return Ok(count > 0);
    }

    for ty in types {
        let pattern = Pattern::subject(subject.clone())
            .with_predicate(rdf::type_())
            .with_object(ty.clone());
        let count = store
            .count_matching(&pattern)
            .map_err(|e| StoreFailure::new("count", e))?;
        if count == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Deletes triples according to `mode`; returns whether anything was removed.
#[instrument(skip(resource), fields(subject = %resource.subject()))]
pub(crate) fn destroy<S: GraphStore>(resource: &Resource<S>, mode: DestroyMode) -> Result<bool, DestroyError> {
    let store = resource.repository().store();
    let subject = resource.subject();
    let failed = |source: S::Error| DestroyError::StoreFailure {
        subject: subject.clone(),
        source: source.into(),
    };

    let removed = match mode {
        DestroyMode::ModelOnly { types } => {
            let mut removed = 0;
            for property in resource.class().properties() {
                let pattern = Pattern::subject(subject.clone()).with_predicate(property.predicate().clone());
                removed += store.delete_matching(&pattern).map_err(failed)?;
            }
            if types {
                for ty in resource.class().types() {
                    let pattern = Pattern::subject(subject.clone())
                        .with_predicate(rdf::type_())
                        .with_object(ty.clone());
                    removed += store.delete_matching(&pattern).map_err(failed)?;
                }
            }
            debug!(removed, "destroyed model triples");
            return Ok(true);
        }
        DestroyMode::AsSubject => store
            .delete_matching(&Pattern::subject(subject.clone()))
            .map_err(failed)?,
        DestroyMode::AsObject => store
            .delete_matching(&Pattern::object(subject.clone()))
            .map_err(failed)?,
        DestroyMode::Completely => {
            store
                .delete_matching(&Pattern::subject(subject.clone()))
                .map_err(failed)?
                + store
                    .delete_matching(&Pattern::object(subject.clone()))
                    .map_err(failed)?
        }
    };
    debug!(?mode, removed, "destroyed");
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassBuilder, ClassRegistry};
    use crate::codec::CodecRegistry;
    use crate::resource::Repository;
    use crate::store::MemoryGraph;
    use crate::term::{Iri, Literal, Term};
    use crate::vocab::xsd;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicBool, Ordering};

    const NAME: &str = "http://example.org/name";
    const SCORE: &str = "http://example.org/score";
    const THING: &str = "http://example.org/Thing";

    fn classes() -> ClassRegistry {
        let mut classes = ClassRegistry::new();
        classes
            .register(
                ClassBuilder::new("Thing")
                    .base_uri("http://example.org/things/")
                    .rdf_type(THING)
                    .property("name", NAME, "string")
                    .property("score", SCORE, "integer"),
            )
            .unwrap();
        classes
    }

    fn subject(name: &str) -> Subject {
        Subject::Iri(Iri::new(format!("http://example.org/things/{name}")).unwrap())
    }

    fn iri(iri: &str) -> Iri {
        Iri::new(iri).unwrap()
    }

    /// Rejects inserts once armed, or after a number of successful ones.
    #[derive(Default)]
    struct FlakyGraph {
        graph: MemoryGraph,
        broken: AtomicBool,
        inserts_left: Cell<Option<usize>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire")]
    struct Broken;

    impl GraphStore for FlakyGraph {
        type Error = Broken;

        fn query(&self, pattern: &Pattern) -> Result<Vec<Triple>, Broken> {
            Ok(self.graph.query(pattern).unwrap_or_default())
        }

        fn insert(&self, triples: &[Triple]) -> Result<(), Broken> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(Broken);
            }
            if let Some(left) = self.inserts_left.get() {
                if left == 0 {
                    return Err(Broken);
                }
                self.inserts_left.set(Some(left - 1));
            }
            self.graph.insert(triples).map_err(|never| match never {})
        }

        fn delete(&self, triples: &[Triple]) -> Result<usize, Broken> {
            self.graph.delete(triples).map_err(|never| match never {})
        }
    }

    #[test]
    fn save_writes_only_changed_properties_and_types() {
        let repo = Repository::new(MemoryGraph::new(), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        thing.set("score", 3).unwrap();
        persist(&thing).unwrap();

        let triples = repo.store().triples();
        assert_eq!(triples.len(), 2);
        assert!(repo.store().contains(&Triple::new(
            subject("a"),
            iri(SCORE),
            Literal::typed("3", xsd::integer())
        )));
        assert!(repo.store().contains(&Triple::new(subject("a"), rdf::type_(), iri(THING))));
        assert!(!thing.is_dirty(None));
    }

    #[test]
    fn serialize_failure_leaves_property_untouched() {
        let original = Triple::new(subject("a"), iri(SCORE), Literal::typed("3", xsd::integer()));
        let repo = Repository::new(
            MemoryGraph::with_triples([original.clone()]),
            CodecRegistry::new(),
            classes(),
        );
        let thing = repo.for_subject("Thing", "a").unwrap();
        thing.set("name", "A").unwrap();
        thing.set("score", "three").unwrap();

        let err = persist(&thing).unwrap_err();
        assert!(matches!(err, PersistError::Serialize { .. }));
        assert_eq!(err.property(), Some("score"));
        assert_eq!(repo.store().triples(), [original]);
        assert!(thing.is_dirty(Some("name")));
        assert!(thing.is_dirty(Some("score")));
    }

    #[test]
    fn store_failure_keeps_earlier_properties_written() {
        let repo = Repository::new(FlakyGraph::default(), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        thing.set("name", "A").unwrap();
        thing.set("score", 3).unwrap();
        repo.store().inserts_left.set(Some(1));

        let err = persist(&thing).unwrap_err();
        assert_eq!(err.property(), Some("score"));
        assert!(repo.store().graph.contains(&Triple::new(subject("a"), iri(NAME), Literal::string("A"))));
        assert_eq!(repo.store().graph.len(), 1);
        assert!(!thing.is_dirty(Some("name")));
        assert!(thing.is_dirty(Some("score")));
        assert_eq!(thing.changed(), ["score"]);
    }

    #[test]
    fn reassigned_stored_value_is_settled() {
        let name = Triple::new(subject("a"), iri(NAME), Literal::string("A"));
        let repo = Repository::new(MemoryGraph::with_triples([name.clone()]), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        thing.get("name").unwrap();
        thing.set("name", "A").unwrap();
        assert!(thing.is_dirty(None));

        persist(&thing).unwrap();
        assert!(!thing.is_dirty(None));
        assert!(repo.store().contains(&name));
    }

    #[test]
    fn raw_terms_are_written_unchanged() {
        let odd = Literal::typed("fifteen", xsd::integer());
        let repo = Repository::new(MemoryGraph::new(), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        thing.set("score", Term::from(odd.clone())).unwrap();

        persist(&thing).unwrap();
        assert!(repo.store().contains(&Triple::new(subject("a"), iri(SCORE), odd)));
    }

    #[test]
    fn store_failure_names_subject_and_property() {
        let repo = Repository::new(FlakyGraph::default(), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        thing.set("name", "A").unwrap();
        repo.store().broken.store(true, Ordering::SeqCst);

        let err = persist(&thing).unwrap_err();
        assert_eq!(err.subject(), &subject("a"));
        assert_eq!(err.property(), Some("name"));
        assert!(thing.is_dirty(Some("name")));
    }

    #[test]
    fn exists_requires_every_type() {
        let repo = Repository::new(MemoryGraph::new(), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        assert!(!exists(&thing).unwrap());

        repo.store()
            .insert(&[Triple::new(subject("a"), iri(NAME), Literal::string("A"))])
            .unwrap();
        assert!(!exists(&thing).unwrap());

        repo.store()
            .insert(&[Triple::new(subject("a"), rdf::type_(), iri(THING))])
            .unwrap();
        assert!(exists(&thing).unwrap());
    }

    #[test]
    fn destroy_modes() {
        let other = iri("http://example.org/other");
        let triples = [
            Triple::new(subject("a"), iri(NAME), Literal::string("A")),
            Triple::new(subject("a"), rdf::type_(), iri(THING)),
            Triple::new(subject("a"), other.clone(), Literal::string("kept")),
            Triple::new(subject("b"), other.clone(), Term::from(subject("a"))),
        ];

        let repo = Repository::new(MemoryGraph::with_triples(triples.clone()), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        assert!(destroy(&thing, DestroyMode::ModelOnly { types: false }).unwrap());
        assert_eq!(repo.store().len(), 3);
        assert!(destroy(&thing, DestroyMode::ModelOnly { types: true }).unwrap());
        assert_eq!(repo.store().len(), 2);
        assert!(destroy(&thing, DestroyMode::ModelOnly { types: true }).unwrap());

        assert!(destroy(&thing, DestroyMode::AsObject).unwrap());
        assert!(!destroy(&thing, DestroyMode::AsObject).unwrap());
        assert!(destroy(&thing, DestroyMode::AsSubject).unwrap());
        assert!(repo.store().is_empty());

        let repo = Repository::new(MemoryGraph::with_triples(triples), CodecRegistry::new(), classes());
        let thing = repo.for_subject("Thing", "a").unwrap();
        assert!(destroy(&thing, DestroyMode::Completely).unwrap());
        assert!(repo.store().is_empty());
        assert!(!destroy(&thing, DestroyMode::Completely).unwrap());
    }
}
