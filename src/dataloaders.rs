//! DataLoader utilities for batch loading
//!
//! - [`DataLoader`] loads single records by key, batching and caching per request
//!   so resolvers do not issue one query per parent (N+1).
//! - [`ConnectionLoader`] binds a [`ConnectionPaginator`] to the acting user and a
//!   collection filter, so resolvers only pass pagination arguments.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::auth::RequestContext;
use crate::executor::{QueryExecutor, StoreError};
use crate::logging::{FailureStage, LoadContext, PaginationLogger, TracingLogger};
use crate::memory::MemoryExecutor;
use crate::order::{Record, RecordKey};
use crate::pagination::{Connection, PageArgs};
use crate::paginator::ConnectionPaginator;
use crate::PaginationError;

/// Batch loader trait for loading multiple items at once
#[async_trait]
pub trait BatchLoader<K, V>: Send + Sync
where
    K: Send + Sync + Clone + Eq + Hash,
    V: Send + Sync + Clone,
{
    /// Load batch of items by keys
    ///
    /// Keys with no stored value are simply absent from the returned map.
    async fn load_batch(&self, keys: &[K]) -> Result<HashMap<K, V>, StoreError>;
}

/// DataLoader with caching and batching
pub struct DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
    L: BatchLoader<K, V> + 'static,
{
    name: String,
    loader: Arc<L>,
    cache: Arc<Mutex<HashMap<K, V>>>,
    context: RequestContext,
    logger: Arc<dyn PaginationLogger>,
}

impl<K, V, L> DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + std::fmt::Debug + 'static,
    V: Send + Sync + Clone + 'static,
    L: BatchLoader<K, V> + 'static,
{
    /// Create a loader for the `name` collection on behalf of `context`'s user
    pub fn new(name: impl Into<String>, loader: L, context: RequestContext) -> Self {
        Self {
            name: name.into(),
            loader: Arc::new(loader),
            cache: Arc::new(Mutex::new(HashMap::new())),
            context,
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn PaginationLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Load a single item by key
    pub async fn load(&self, key: K) -> crate::Result<Option<V>> {
        let mut found = self.load_many(vec![key.clone()]).await?;
        Ok(found.remove(&key))
    }

    /// Load multiple items by keys
    ///
    /// Cached keys are served from the cache, the rest are fetched in one batch.
    pub async fn load_many(&self, keys: Vec<K>) -> crate::Result<HashMap<K, V>> {
        let mut result = HashMap::new();
        let mut uncached_keys = Vec::new();

        {
            let cache = self.cache.lock().await;
            for key in keys {
                if let Some(value) = cache.get(&key) {
                    result.insert(key, value.clone());
                } else if !uncached_keys.contains(&key) {
                    uncached_keys.push(key);
                }
            }
        }

        if uncached_keys.is_empty() {
            return Ok(result);
        }

        let batch_results = match self.loader.load_batch(&uncached_keys).await {
            Ok(found) => found,
            Err(err) => {
                let ctx = LoadContext {
                    connection: self.name.clone(),
                    operation: format!("load_{}_by_keys", self.name),
                    user_id: self.context.user_id,
                    parameters: format!("keys: {:?}", uncached_keys),
                };
                self.logger.storage_failed(&ctx, FailureStage::Dispatch, &err);
                return Err(PaginationError::StorageUnavailable {
                    connection: self.name.clone(),
                });
            }
        };

        {
            let mut cache = self.cache.lock().await;
            for (k, v) in batch_results {
                cache.insert(k.clone(), v.clone());
                result.insert(k, v);
            }
        }

        Ok(result)
    }

    /// Clear the cache
    pub async fn clear(&self) {
        let mut cache = self.cache.lock().await;
        cache.clear();
    }

    /// Prime the cache with a value
    ///
    /// Useful for seeding the cache with records a connection page already returned.
    pub async fn prime(&self, key: K, value: V) {
        let mut cache = self.cache.lock().await;
        cache.insert(key, value);
    }
}

impl<K, V, L> Clone for DataLoader<K, V, L>
where
    K: Send + Sync + Clone + Eq + Hash + 'static,
    V: Send + Sync + Clone + 'static,
    L: BatchLoader<K, V> + 'static,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            loader: self.loader.clone(),
            cache: self.cache.clone(),
            context: self.context,
            logger: self.logger.clone(),
        }
    }
}

/// Loads records by key from an in-memory collection
pub struct RecordBatchLoader<R> {
    executor: MemoryExecutor<R>,
}

impl<R: Record> RecordBatchLoader<R> {
    pub fn new(executor: MemoryExecutor<R>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<R: Record> BatchLoader<RecordKey, R> for RecordBatchLoader<R> {
    async fn load_batch(&self, keys: &[RecordKey]) -> Result<HashMap<RecordKey, R>, StoreError> {
        Ok(keys
            .iter()
            .filter_map(|key| self.executor.get(*key).map(|record| (*key, record.clone())))
            .collect())
    }
}

/// Connection loader for one collection subset and one request
///
/// ```rust,ignore
/// let scan = MemoryFilter::new("scan 1", |r| r.scan == 1);
/// let loader = ConnectionLoader::new(paginator, ctx, scan);
/// let page = loader.load(&PageArgs::first(5)).await?;
/// ```
pub struct ConnectionLoader<E: QueryExecutor> {
    paginator: Arc<ConnectionPaginator<E>>,
    context: RequestContext,
    filter: E::Filter,
}

impl<E: QueryExecutor> ConnectionLoader<E> {
    pub fn new(
        paginator: Arc<ConnectionPaginator<E>>,
        context: RequestContext,
        filter: E::Filter,
    ) -> Self {
        Self {
            paginator,
            context,
            filter,
        }
    }

    /// Load a page of the bound collection subset
    pub async fn load(
        &self,
        args: &PageArgs<<E::Record as Record>::Field>,
    ) -> crate::Result<Connection<E::Record>> {
        self.paginator
            .paginate(&self.context, self.filter.clone(), args)
            .await
    }

    /// Load a page for a GraphQL resolver, with errors in the request's language
    pub async fn resolve(
        &self,
        args: &PageArgs<<E::Record as Record>::Field>,
    ) -> async_graphql::Result<Connection<E::Record>> {
        let locale = self
            .context
            .locale_or(self.paginator.config().default_locale);
        self.load(args)
            .await
            .map_err(|err| err.to_graphql_error(locale))
    }
}

impl<E: QueryExecutor> Clone for ConnectionLoader<E> {
    fn clone(&self) -> Self {
        Self {
            paginator: self.paginator.clone(),
            context: self.context,
            filter: self.filter.clone(),
        }
    }
}
