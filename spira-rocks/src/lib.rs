//! RocksDB-backed graph store for Spira.
//!
//! Every triple is written twice, under a subject-index key and an
//! object-index key:
//!
//! ```text
//! [family: 1][term length: u32 BE][term: N-Triples][blake3(triple line): 32]
//! ```
//!
//! Both entries hold the CBOR-encoded triple. Patterns with a subject or an
//! object are prefix scans; anything else scans the subject index.

use std::collections::HashSet;
use std::fmt::Display;
use std::io;
use std::path::Path;

use rocksdb::{DB, Direction, IteratorMode, Options, WriteBatch};
use spira_core::{GraphStore, Pattern, Triple};
use thiserror::Error;
use tracing::debug;

const SUBJECT_INDEX: u8 = b's';
const OBJECT_INDEX: u8 = b'o';

#[derive(Debug, Error)]
pub enum RocksError {
    #[error("RocksDB error: {0}")]
    Db(#[from] rocksdb::Error),
    #[error("cannot encode triple: {0}")]
    Encode(#[from] ciborium::ser::Error<io::Error>),
    #[error("cannot decode triple: {0}")]
    Decode(#[from] ciborium::de::Error<io::Error>),
}

/// A persistent triple store backed by RocksDB.
pub struct RocksGraph {
    db: DB,
}

impl RocksGraph {
    /// Opens a RocksDB graph at the given path.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    fn scan(&self, prefix: &[u8], pattern: &Pattern) -> Result<Vec<Triple>, RocksError> {
        let mut found = Vec::new();
        for entry in self.db.iterator(IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            let triple: Triple = ciborium::from_reader(&value[..])?;
            if pattern.matches(&triple) {
                found.push(triple);
            }
        }
        Ok(found)
    }
}

/// Family byte plus the length-prefixed term.
fn prefix(family: u8, term: &impl Display) -> Vec<u8> {
    let term = term.to_string();
    let mut key = Vec::with_capacity(5 + term.len() + blake3::OUT_LEN);
    key.push(family);
    key.extend_from_slice(&(term.len() as u32).to_be_bytes());
    key.extend_from_slice(term.as_bytes());
    key
}

fn key(family: u8, term: &impl Display, digest: &blake3::Hash) -> Vec<u8> {
    let mut key = prefix(family, term);
    key.extend_from_slice(digest.as_bytes());
    key
}

fn digest(triple: &Triple) -> blake3::Hash {
    blake3::hash(triple.to_string().as_bytes())
}

impl GraphStore for RocksGraph {
    type Error = RocksError;

    fn query(&self, pattern: &Pattern) -> Result<Vec<Triple>, Self::Error> {
        match (&pattern.subject, &pattern.object) {
            (Some(subject), _) => self.scan(&prefix(SUBJECT_INDEX, subject), pattern),
            (None, Some(object)) => self.scan(&prefix(OBJECT_INDEX, object), pattern),
            (None, None) => self.scan(&[SUBJECT_INDEX], pattern),
        }
    }

    fn insert(&self, triples: &[Triple]) -> Result<(), Self::Error> {
        let mut batch = WriteBatch::default();
        for triple in triples {
            let digest = digest(triple);
            let mut value = Vec::new();
            ciborium::into_writer(triple, &mut value)?;
            batch.put(key(SUBJECT_INDEX, &triple.subject, &digest), &value);
            batch.put(key(OBJECT_INDEX, &triple.object, &digest), &value);
        }
        self.db.write(batch)?;
        debug!(count = triples.len(), "inserted triples");
        Ok(())
    }

    fn delete(&self, triples: &[Triple]) -> Result<usize, Self::Error> {
        let mut batch = WriteBatch::default();
        let mut seen = HashSet::new();
        let mut removed = 0;
        for triple in triples {
            let digest = digest(triple);
            if !seen.insert(digest) {
                continue;
            }
            let subject_key = key(SUBJECT_INDEX, &triple.subject, &digest);
            if self.db.get_pinned(&subject_key)?.is_none() {
                continue;
            }
            removed += 1;
            batch.delete(subject_key);
            batch.delete(key(OBJECT_INDEX, &triple.object, &digest));
        }
        self.db.write(batch)?;
        debug!(removed, "deleted triples");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spira_core::{
        Attribute, ClassBuilder, ClassRegistry, CodecRegistry, Iri, Literal, Repository, Subject, Term,
    };
    use tempfile::TempDir;

    fn temp_graph() -> (RocksGraph, TempDir) {
        let dir = TempDir::new().unwrap();
        let graph = RocksGraph::open(dir.path()).unwrap();
        (graph, dir)
    }

    fn subject(name: &str) -> Subject {
        Subject::Iri(Iri::new(format!("http://example.org/{name}")).unwrap())
    }

    fn knows(a: &str, b: &str) -> Triple {
        Triple::new(
            subject(a),
            Iri::new("http://xmlns.com/foaf/0.1/knows").unwrap(),
            subject(b),
        )
    }

    fn label(a: &str, text: &str) -> Triple {
        Triple::new(
            subject(a),
            Iri::new("http://www.w3.org/2000/01/rdf-schema#label").unwrap(),
            Literal::string(text),
        )
    }

    #[test]
    fn insert_query_by_subject() {
        let (graph, _dir) = temp_graph();
        graph
            .insert(&[knows("a", "b"), label("a", "A"), label("ab", "AB")])
            .unwrap();

        let mut found = graph.query(&Pattern::subject(subject("a"))).unwrap();
        found.sort();
        let mut expected = vec![knows("a", "b"), label("a", "A")];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn query_by_object_and_any() {
        let (graph, _dir) = temp_graph();
        graph
            .insert(&[knows("a", "b"), knows("c", "b"), knows("b", "a")])
            .unwrap();

        let found = graph.query(&Pattern::object(Term::from(subject("b")))).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|t| t.object == Term::from(subject("b"))));

        assert_eq!(graph.query(&Pattern::any()).unwrap().len(), 3);
        assert_eq!(graph.count_matching(&Pattern::any()).unwrap(), 3);
    }

    #[test]
    fn insert_is_idempotent() {
        let (graph, _dir) = temp_graph();
        graph.insert(&[label("a", "A")]).unwrap();
        graph.insert(&[label("a", "A"), label("a", "A")]).unwrap();
        assert_eq!(graph.query(&Pattern::any()).unwrap(), vec![label("a", "A")]);
    }

    #[test]
    fn delete_counts_present_triples() {
        let (graph, _dir) = temp_graph();
        graph.insert(&[knows("a", "b"), label("a", "A")]).unwrap();

        let removed = graph
            .delete(&[knows("a", "b"), knows("a", "b"), label("z", "Z")])
            .unwrap();
        assert_eq!(removed, 1);
        assert!(graph.query(&Pattern::object(Term::from(subject("b")))).unwrap().is_empty());
        assert_eq!(graph.delete_matching(&Pattern::subject(subject("a"))).unwrap(), 1);
        assert!(graph.query(&Pattern::any()).unwrap().is_empty());
    }

    #[test]
    fn persistence() {
        let dir = TempDir::new().unwrap();

        {
            let graph = RocksGraph::open(dir.path()).unwrap();
            graph.insert(&[label("a", "survives restart")]).unwrap();
        }

        {
            let graph = RocksGraph::open(dir.path()).unwrap();
            let found = graph.query(&Pattern::subject(subject("a"))).unwrap();
            assert_eq!(found, vec![label("a", "survives restart")]);
        }
    }

    #[test]
    fn resources_over_rocks() {
        let dir = TempDir::new().unwrap();
        let classes = || {
            let mut classes = ClassRegistry::new();
            classes
                .register(
                    ClassBuilder::new("Person")
                        .base_uri("http://example.org/")
                        .rdf_type("http://xmlns.com/foaf/0.1/Person")
                        .property("name", "http://www.w3.org/2000/01/rdf-schema#label", "string")
                        .property("age", "http://xmlns.com/foaf/0.1/age", "integer"),
                )
                .unwrap();
            classes
        };

        {
            let repo = Repository::new(RocksGraph::open(dir.path()).unwrap(), CodecRegistry::new(), classes());
            let alice = repo.for_subject("Person", "alice").unwrap();
            alice.set("name", "Alice").unwrap();
            alice.set("age", 15).unwrap();
            alice.save().unwrap();
            alice.set("age", 16).unwrap();
            alice.save().unwrap();
        }

        let repo = Repository::new(RocksGraph::open(dir.path()).unwrap(), CodecRegistry::new(), classes());
        let alice = repo.for_subject("Person", "alice").unwrap();
        assert!(alice.exists().unwrap());
        assert_eq!(alice.get("name").unwrap(), Attribute::from("Alice"));
        assert_eq!(alice.get("age").unwrap(), Attribute::from(16));
        assert_eq!(repo.store().query(&Pattern::subject(subject("alice"))).unwrap().len(), 3);
    }
}
