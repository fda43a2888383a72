//! Query execution contract
//!
//! The paginator never talks to a database directly. It describes the page it needs
//! as a [`ConnectionQuery`] and hands it to a [`QueryExecutor`], which answers with a
//! [`ResultSequence`] whose first item is the [`PageSnapshot`].

use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::order::{OrderBy, Record, RecordKey};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Direction the backing store walks the ordering in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    /// Logical order, used for `first`.
    Forward,
    /// Reverse of the logical order, used for `last`.
    Backward,
}

/// Description of a single page request against a collection
#[derive(Debug, Clone)]
pub struct ConnectionQuery<F, Q> {
    pub collection: String,
    pub filter: Q,
    pub order_by: Option<OrderBy<F>>,
    pub scan: ScanDirection,
    /// Only records strictly after the record with this key.
    pub after: Option<RecordKey>,
    /// Only records strictly before the record with this key.
    pub before: Option<RecordKey>,
    pub limit: usize,
}

/// Page returned by an executor
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot<R> {
    /// Page records in scan order.
    pub records: Vec<R>,
    /// Records matching the filter, ignoring cursors and limit.
    pub total_count: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl<R> PageSnapshot<R> {
    pub fn empty(total_count: u64) -> Self {
        Self {
            records: Vec::new(),
            total_count,
            has_next_page: false,
            has_previous_page: false,
        }
    }
}

/// Failure reported by an executor or its result sequence
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Asynchronously consumed query results
#[async_trait]
pub trait ResultSequence<T: Send>: Send {
    /// Next item, or `None` once the sequence is exhausted.
    async fn next(&mut self) -> Result<Option<T>, StoreError>;
}

/// Runs connection queries against a backing store
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    type Record: Record;
    /// Collection-specific selection, opaque to the paginator.
    type Filter: Clone + fmt::Debug + Send + Sync;
    type Rows: ResultSequence<PageSnapshot<Self::Record>>;

    async fn execute(
        &self,
        query: &ConnectionQuery<<Self::Record as Record>::Field, Self::Filter>,
    ) -> Result<Self::Rows, StoreError>;
}

/// Result sequence over already materialized items
#[derive(Debug, Clone)]
pub struct VecSequence<T> {
    items: VecDeque<T>,
}

impl<T> From<Vec<T>> for VecSequence<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

#[async_trait]
impl<T: Send> ResultSequence<T> for VecSequence<T> {
    async fn next(&mut self) -> Result<Option<T>, StoreError> {
        Ok(self.items.pop_front())
    }
}
