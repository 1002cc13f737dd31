use super::filter::Filter;
use crate::core::{Entity, FactError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

/// Position at which the next page of a query starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Continuation {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entities: Vec<Entity>,
    pub continuation: Option<Continuation>,
}

/// Lazy sequence of entities produced by [`query_stream`].
pub type EntityStream<'a> = BoxStream<'a, Result<Entity>>;

/// Entity store trait - generic CRUD over partitioned key/value rows.
///
/// The managed table service is one implementation; the in-memory and file
/// stores implement the same contract for tests and offline use.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one page of entities matching `filter`, in store iteration order.
    async fn query_page(&self, filter: &Filter, continuation: Option<Continuation>) -> Result<Page>;

    /// Get a single entity by partition and row key.
    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<Entity>>;

    /// Insert a new entity. Fails with `AlreadyExists` if the key is taken.
    async fn create(&self, entity: Entity) -> Result<()>;

    /// Replace an existing entity wholesale. Properties missing from
    /// `entity` are dropped. Fails with `NotFound` if the key is absent.
    async fn update(&self, entity: Entity) -> Result<()>;

    /// Delete an entity. Fails with `NotFound` if the key is absent.
    async fn delete(&self, partition: &str, row_key: &str) -> Result<()>;
}

/// Stream every entity matching `filter`, following continuations page by
/// page. Each call starts a fresh scan.
pub fn query_stream<'a, S>(store: &'a S, filter: Filter) -> EntityStream<'a>
where
    S: EntityStore + ?Sized,
{
    // `None` marks an exhausted scan; `Some(None)` is the first page.
    let pages = stream::try_unfold(Some(None), move |cursor: Option<Option<Continuation>>| {
        let filter = filter.clone();
        async move {
            let Some(continuation) = cursor else {
                return Ok(None);
            };
            let page = store.query_page(&filter, continuation).await?;
            Ok::<_, FactError>(Some((page.entities, page.continuation.map(Some))))
        }
    });

    pages
        .map_ok(|entities| stream::iter(entities.into_iter().map(Ok::<Entity, FactError>)))
        .try_flatten()
        .boxed()
}

/// Collect every entity matching `filter`.
pub async fn query_all<S>(store: &S, filter: &Filter) -> Result<Vec<Entity>>
where
    S: EntityStore + ?Sized,
{
    query_stream(store, filter.clone()).try_collect().await
}
