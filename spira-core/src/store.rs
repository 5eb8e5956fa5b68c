use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::term::{Pattern, Triple};

/// A triple store.
///
/// Stores know nothing about classes, codecs or dirty tracking; the resource
/// layer drives them with plain triple reads and writes. Any call may block.
///
/// All methods take `&self` to support stores with internal locking (e.g., RocksDB).
pub trait GraphStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns every triple matching the pattern, in no particular order.
    fn query(&self, pattern: &Pattern) -> Result<Vec<Triple>, Self::Error>;

    /// Adds triples. Inserting a triple that is already present is a no-op.
    fn insert(&self, triples: &[Triple]) -> Result<(), Self::Error>;

    /// Removes triples, returning how many were present.
    fn delete(&self, triples: &[Triple]) -> Result<usize, Self::Error>;

    /// Counts the triples matching the pattern.
    fn count_matching(&self, pattern: &Pattern) -> Result<usize, Self::Error> {
        Ok(self.query(pattern)?.len())
    }

    /// Removes every triple matching the pattern, returning how many were removed.
    fn delete_matching(&self, pattern: &Pattern) -> Result<usize, Self::Error> {
        let matching = self.query(pattern)?;
        if matching.is_empty() {
            return Ok(0);
        }
        self.delete(&matching)
    }
}

/// An in-memory triple store backed by a BTreeSet.
///
/// Useful for testing and as a reference implementation. Counts calls to
/// `query` so tests can observe how often the resource layer reads.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    triples: RwLock<BTreeSet<Triple>>,
    queries: AtomicUsize,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        MemoryGraph {
            triples: RwLock::new(triples.into_iter().collect()),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.triples.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.read().unwrap().contains(triple)
    }

    /// A sorted copy of the current contents.
    pub fn triples(&self) -> Vec<Triple> {
        self.triples.read().unwrap().iter().cloned().collect()
    }

    /// Number of `query` calls made so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl GraphStore for MemoryGraph {
    type Error = Infallible;

    fn query(&self, pattern: &Pattern) -> Result<Vec<Triple>, Self::Error> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .triples
            .read()
            .unwrap()
            .iter()
            .filter(|t| pattern.matches(t))
            .cloned()
            .collect())
    }

    fn insert(&self, triples: &[Triple]) -> Result<(), Self::Error> {
        self.triples.write().unwrap().extend(triples.iter().cloned());
        Ok(())
    }

    fn delete(&self, triples: &[Triple]) -> Result<usize, Self::Error> {
        let mut data = self.triples.write().unwrap();
        Ok(triples.iter().filter(|t| data.remove(*t)).count())
    }

    fn count_matching(&self, pattern: &Pattern) -> Result<usize, Self::Error> {
        Ok(self.triples.read().unwrap().iter().filter(|t| pattern.matches(t)).count())
    }

    fn delete_matching(&self, pattern: &Pattern) -> Result<usize, Self::Error> {
        let mut data = self.triples.write().unwrap();
        let before = data.len();
        data.retain(|t| !pattern.matches(t));
        Ok(before - data.len())
    }
}
