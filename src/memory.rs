//! In-memory collections
//!
//! [`MemoryExecutor`] answers connection queries over a shared, read-only set of
//! records. It is the reference behaviour for every other executor and is used by
//! tests and small fixed collections.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::executor::{
    ConnectionQuery, PageSnapshot, QueryExecutor, ScanDirection, StoreError, VecSequence,
};
use crate::order::{compare_records, OrderBy, Record, RecordKey};

type Predicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// Record selection for a [`MemoryExecutor`]
pub struct MemoryFilter<R> {
    label: String,
    predicate: Predicate<R>,
}

impl<R> MemoryFilter<R> {
    /// Select every record.
    pub fn all() -> Self {
        Self {
            label: "all".to_string(),
            predicate: Arc::new(|_| true),
        }
    }

    /// Select records matching `predicate`; `label` is what shows up in logs.
    pub fn new(
        label: impl Into<String>,
        predicate: impl Fn(&R) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, record: &R) -> bool {
        (self.predicate)(record)
    }
}

impl<R> Clone for MemoryFilter<R> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<R> fmt::Debug for MemoryFilter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFilter").field("label", &self.label).finish()
    }
}

/// Query executor over records held in memory
pub struct MemoryExecutor<R> {
    records: Arc<Vec<R>>,
    by_key: Arc<HashMap<RecordKey, usize>>,
}

impl<R: Record> MemoryExecutor<R> {
    pub fn new(records: impl IntoIterator<Item = R>) -> Self {
        let records: Vec<R> = records.into_iter().collect();
        let by_key = records
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.key(), idx))
            .collect();
        Self {
            records: Arc::new(records),
            by_key: Arc::new(by_key),
        }
    }

    pub fn get(&self, key: RecordKey) -> Option<&R> {
        self.by_key.get(&key).map(|&idx| &self.records[idx])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `record` lies strictly on the `wanted` side of the record keyed `anchor`.
    ///
    /// Key ordering compares against the key directly. Field ordering needs the anchor
    /// record's field value; an anchor that no longer exists matches nothing.
    fn beyond(
        &self,
        record: &R,
        anchor: RecordKey,
        order_by: Option<&OrderBy<R::Field>>,
        wanted: Ordering,
    ) -> bool {
        match order_by {
            None => record.key().cmp(&anchor) == wanted,
            Some(_) => match self.get(anchor) {
                Some(anchor) => compare_records(record, anchor, order_by) == wanted,
                None => false,
            },
        }
    }

    fn snapshot(&self, query: &ConnectionQuery<R::Field, MemoryFilter<R>>) -> PageSnapshot<R> {
        let order_by = query.order_by.as_ref();

        let mut matching: Vec<&R> = self
            .records
            .iter()
            .filter(|r| query.filter.matches(r))
            .collect();
        matching.sort_by(|a, b| compare_records(*a, *b, order_by));
        let total_count = matching.len() as u64;

        let window = matching.iter().copied().filter(|r| {
            let after_ok = query
                .after
                .map_or(true, |key| self.beyond(r, key, order_by, Ordering::Greater));
            let before_ok = query
                .before
                .map_or(true, |key| self.beyond(r, key, order_by, Ordering::Less));
            after_ok && before_ok
        });

        let page: Vec<&R> = match query.scan {
            ScanDirection::Forward => window.take(query.limit).collect(),
            ScanDirection::Backward => {
                let window: Vec<&R> = window.collect();
                window.into_iter().rev().take(query.limit).collect()
            }
        };

        let (first, last) = match query.scan {
            ScanDirection::Forward => (page.first(), page.last()),
            ScanDirection::Backward => (page.last(), page.first()),
        };
        let (Some(first), Some(last)) = (first, last) else {
            return PageSnapshot::empty(total_count);
        };

        let has_next_page = matching
            .iter()
            .any(|r| compare_records(*r, *last, order_by) == Ordering::Greater);
        let has_previous_page = matching
            .iter()
            .any(|r| compare_records(*r, *first, order_by) == Ordering::Less);

        PageSnapshot {
            records: page.into_iter().cloned().collect(),
            total_count,
            has_next_page,
            has_previous_page,
        }
    }
}

impl<R> Clone for MemoryExecutor<R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            by_key: self.by_key.clone(),
        }
    }
}

#[async_trait]
impl<R: Record> QueryExecutor for MemoryExecutor<R> {
    type Record = R;
    type Filter = MemoryFilter<R>;
    type Rows = VecSequence<PageSnapshot<R>>;

    async fn execute(
        &self,
        query: &ConnectionQuery<R::Field, MemoryFilter<R>>,
    ) -> Result<Self::Rows, StoreError> {
        Ok(VecSequence::from(vec![self.snapshot(query)]))
    }
}
