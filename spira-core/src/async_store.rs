use std::future::Future;

use crate::GraphStore;
use crate::term::{Pattern, Triple};

/// Async triple store.
///
/// Mirrors the `GraphStore` trait but with async methods, for callers driving
/// a store from async code or wrapping a network-backed store. Methods are
/// prefixed with `async_` to avoid name collisions when a type implements both
/// `GraphStore` and `AsyncGraphStore`.
pub trait AsyncGraphStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn async_query(&self, pattern: &Pattern) -> impl Future<Output = Result<Vec<Triple>, Self::Error>> + Send;
    fn async_insert(&self, triples: &[Triple]) -> impl Future<Output = Result<(), Self::Error>> + Send;
    fn async_delete(&self, triples: &[Triple]) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Count - default impl queries and counts the results.
    fn async_count_matching(
        &self,
        pattern: &Pattern,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send {
        let pattern = pattern.clone();
        async move { Ok(self.async_query(&pattern).await?.len()) }
    }

    /// Delete by pattern - default impl queries, then deletes what it found.
    fn async_delete_matching(
        &self,
        pattern: &Pattern,
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send {
        let pattern = pattern.clone();
        async move {
            let matching = self.async_query(&pattern).await?;
            if matching.is_empty() {
                return Ok(0);
            }
            self.async_delete(&matching).await
        }
    }
}

/// Blanket impl: any sync `GraphStore` is also an `AsyncGraphStore`.
impl<S: GraphStore + Send + Sync> AsyncGraphStore for S {
    type Error = S::Error;

    async fn async_query(&self, pattern: &Pattern) -> Result<Vec<Triple>, Self::Error> {
        self.query(pattern)
    }

    async fn async_insert(&self, triples: &[Triple]) -> Result<(), Self::Error> {
        self.insert(triples)
    }

    async fn async_delete(&self, triples: &[Triple]) -> Result<usize, Self::Error> {
        self.delete(triples)
    }

    async fn async_count_matching(&self, pattern: &Pattern) -> Result<usize, Self::Error> {
        self.count_matching(pattern)
    }

    async fn async_delete_matching(&self, pattern: &Pattern) -> Result<usize, Self::Error> {
        self.delete_matching(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryGraph;
    use crate::term::{Iri, Literal, Subject};

    fn subject() -> Subject {
        Subject::Iri(Iri::new("http://ex.org/a").unwrap())
    }

    #[tokio::test]
    async fn graph_store_as_async_store_basic() {
        let store = MemoryGraph::new();
        let triple = Triple::new(subject(), Iri::new("http://ex.org/p").unwrap(), Literal::string("x"));

        store.async_insert(&[triple.clone()]).await.unwrap();
        let found = store.async_query(&Pattern::subject(subject())).await.unwrap();
        assert_eq!(found, vec![triple]);
        assert_eq!(store.async_count_matching(&Pattern::any()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn graph_store_as_async_store_delete() {
        let store = MemoryGraph::new();
        let triples: Vec<Triple> = (0..3)
            .map(|i| {
                Triple::new(
                    subject(),
                    Iri::new("http://ex.org/p").unwrap(),
                    Literal::string(i.to_string()),
                )
            })
            .collect();

        store.async_insert(&triples).await.unwrap();
        assert_eq!(store.async_delete(&triples[..1]).await.unwrap(), 1);
        assert_eq!(store.async_delete_matching(&Pattern::subject(subject())).await.unwrap(), 2);
        assert!(store.is_empty());
    }
}
