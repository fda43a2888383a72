//! Connection paginator
//!
//! Turns a collection filter and Relay pagination arguments into a [`Connection`].
//! Arguments are validated before anything is sent to the store; store failures are
//! logged in full and reported to the caller as [`PaginationError::StorageUnavailable`].

use std::sync::Arc;

use crate::auth::RequestContext;
use crate::config::PaginatorConfig;
use crate::executor::{ConnectionQuery, QueryExecutor, ResultSequence, ScanDirection};
use crate::logging::{FailureStage, LoadContext, PaginationLogger, TracingLogger};
use crate::order::Record;
use crate::pagination::{Connection, CursorCodec, LimitArgument, PageArgs};
use crate::PaginationError;

type FieldOf<E> = <<E as QueryExecutor>::Record as Record>::Field;

/// Paginates one collection through a [`QueryExecutor`]
pub struct ConnectionPaginator<E: QueryExecutor> {
    collection: String,
    executor: E,
    config: PaginatorConfig,
    logger: Arc<dyn PaginationLogger>,
}

impl<E: QueryExecutor> ConnectionPaginator<E> {
    /// Create a paginator for `collection`, the name cursors are minted for.
    pub fn new(collection: impl Into<String>, executor: E) -> Self {
        Self {
            collection: collection.into(),
            executor,
            config: PaginatorConfig::default(),
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_config(mut self, config: PaginatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn PaginationLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn config(&self) -> &PaginatorConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Load one page of the records selected by `filter`.
    ///
    /// Cursors name a record by key. Under the default key ordering a cursor stays
    /// usable after its record is deleted, since the bound only needs the key. Under an
    /// `orderBy` field the bound needs the record's field value, so a cursor whose record
    /// no longer exists matches nothing: the page is empty, with `hasNextPage` and
    /// `hasPreviousPage` both false. Clients recover by paging again without the cursor.
    pub async fn paginate(
        &self,
        request: &RequestContext,
        filter: E::Filter,
        args: &PageArgs<FieldOf<E>>,
    ) -> crate::Result<Connection<E::Record>> {
        let log_ctx = LoadContext {
            connection: self.collection.clone(),
            operation: format!("load_{}_connection", self.collection),
            user_id: request.user_id,
            parameters: format!("filter: {:?}, args: {:?}", filter, args),
        };

        let query = match self.build_query(filter, args) {
            Ok(query) => query,
            Err(err) => {
                self.logger.validation_failed(&log_ctx, &err);
                return Err(err);
            }
        };

        self.logger.query_dispatched(&log_ctx);

        let mut rows = match self.executor.execute(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                self.logger.storage_failed(&log_ctx, FailureStage::Dispatch, &err);
                return Err(self.unavailable());
            }
        };

        let snapshot = match rows.next().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.logger.storage_failed(&log_ctx, FailureStage::Iteration, &err);
                return Err(self.unavailable());
            }
        };

        let mut snapshot = match snapshot {
            Some(snapshot) if !snapshot.records.is_empty() => snapshot,
            Some(snapshot) if self.config.count_on_empty_page => {
                return Ok(Connection::empty_with_count(snapshot.total_count))
            }
            _ => return Ok(Connection::empty()),
        };

        if query.scan == ScanDirection::Backward {
            snapshot.records.reverse();
        }

        Ok(Connection::from_records(
            &self.collection,
            snapshot.records,
            snapshot.total_count,
            snapshot.has_next_page,
            snapshot.has_previous_page,
        ))
    }

    fn build_query(
        &self,
        filter: E::Filter,
        args: &PageArgs<FieldOf<E>>,
    ) -> crate::Result<ConnectionQuery<FieldOf<E>, E::Filter>> {
        let window = args.window(&self.collection, self.config.max_page_size)?;

        let after = args
            .after
            .as_deref()
            .map(|cursor| CursorCodec::decode_for(&self.collection, cursor))
            .transpose()?;
        let before = args
            .before
            .as_deref()
            .map(|cursor| CursorCodec::decode_for(&self.collection, cursor))
            .transpose()?;

        let scan = match window.argument {
            LimitArgument::First => ScanDirection::Forward,
            LimitArgument::Last => ScanDirection::Backward,
        };

        Ok(ConnectionQuery {
            collection: self.collection.clone(),
            filter,
            order_by: args.order_by,
            scan,
            after,
            before,
            limit: window.count,
        })
    }

    fn unavailable(&self) -> PaginationError {
        PaginationError::StorageUnavailable {
            connection: self.collection.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{PageSnapshot, StoreError, VecSequence};
    use crate::logging::{CapturingLogger, LogEntry};
    use crate::memory::{MemoryExecutor, MemoryFilter};
    use crate::order::{FieldValue, OrderDirection, OrderField, RecordKey};
    use crate::types::PageLimit;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum OrgField {
        Acronym,
    }

    impl OrderField for OrgField {
        fn name(self) -> &'static str {
            "acronym"
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Org {
        key: RecordKey,
        acronym: &'static str,
    }

    impl Record for Org {
        type Field = OrgField;

        fn key(&self) -> RecordKey {
            self.key
        }

        fn field(&self, field: OrgField) -> FieldValue {
            match field {
                OrgField::Acronym => self.acronym.into(),
            }
        }
    }

    fn orgs() -> MemoryExecutor<Org> {
        MemoryExecutor::new(vec![
            Org { key: 1, acronym: "TBS" },
            Org { key: 2, acronym: "CSE" },
            Org { key: 3, acronym: "TBS" },
        ])
    }

    fn keys(conn: &Connection<Org>) -> Vec<RecordKey> {
        conn.nodes().map(|o| o.key).collect()
    }

    /// Executor that fails at a chosen stage and counts calls
    struct BrokenExecutor {
        stage: FailureStage,
        calls: AtomicUsize,
    }

    struct BrokenRows;

    #[async_trait]
    impl ResultSequence<PageSnapshot<Org>> for BrokenRows {
        async fn next(&mut self) -> Result<Option<PageSnapshot<Org>>, StoreError> {
            Err(StoreError::new("cursor lost"))
        }
    }

    enum TestRows {
        Broken(BrokenRows),
        Empty(VecSequence<PageSnapshot<Org>>),
    }

    #[async_trait]
    impl ResultSequence<PageSnapshot<Org>> for TestRows {
        async fn next(&mut self) -> Result<Option<PageSnapshot<Org>>, StoreError> {
            match self {
                TestRows::Broken(rows) => rows.next().await,
                TestRows::Empty(rows) => rows.next().await,
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for BrokenExecutor {
        type Record = Org;
        type Filter = String;
        type Rows = TestRows;

        async fn execute(
            &self,
            _query: &ConnectionQuery<OrgField, String>,
        ) -> Result<TestRows, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.stage {
                FailureStage::Dispatch => Err(StoreError::new("connection refused")),
                FailureStage::Iteration => Ok(TestRows::Broken(BrokenRows)),
            }
        }
    }

    fn broken(stage: FailureStage) -> BrokenExecutor {
        BrokenExecutor {
            stage,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_first_and_last_pages() {
        let paginator = ConnectionPaginator::new("organization", orgs());
        let ctx = RequestContext::anonymous();

        let first = paginator
            .paginate(&ctx, MemoryFilter::all(), &PageArgs::first(2))
            .await
            .unwrap();
        assert_eq!(keys(&first), vec![1, 2]);
        assert_eq!(first.total_count, 3);
        assert!(first.page_info.has_next_page);
        assert!(!first.page_info.has_previous_page);
        assert_eq!(first.page_info.start_cursor, CursorCodec::encode("organization", 1));
        assert_eq!(first.page_info.end_cursor, CursorCodec::encode("organization", 2));

        let last = paginator
            .paginate(&ctx, MemoryFilter::all(), &PageArgs::last(2))
            .await
            .unwrap();
        assert_eq!(keys(&last), vec![2, 3]);
        assert!(!last.page_info.has_next_page);
        assert!(last.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_order_by_desc_with_tie_break() {
        let paginator = ConnectionPaginator::new("organization", orgs());
        let args = PageArgs::first(10).order_by(OrgField::Acronym, OrderDirection::Desc);
        let conn = paginator
            .paginate(&RequestContext::anonymous(), MemoryFilter::all(), &args)
            .await
            .unwrap();
        assert_eq!(keys(&conn), vec![1, 3, 2]);

        let args = PageArgs::last(2).order_by(OrgField::Acronym, OrderDirection::Desc);
        let conn = paginator
            .paginate(&RequestContext::anonymous(), MemoryFilter::all(), &args)
            .await
            .unwrap();
        assert_eq!(keys(&conn), vec![3, 2]);
        assert!(conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_after_and_before_window() {
        let paginator = ConnectionPaginator::new("organization", orgs());
        let args = PageArgs::first(10)
            .after(CursorCodec::encode("organization", 1))
            .before(CursorCodec::encode("organization", 3));
        let conn = paginator
            .paginate(&RequestContext::anonymous(), MemoryFilter::all(), &args)
            .await
            .unwrap();
        assert_eq!(keys(&conn), vec![2]);
        assert!(conn.page_info.has_next_page);
        assert!(conn.page_info.has_previous_page);
        assert_eq!(conn.total_count, 3);
    }

    #[tokio::test]
    async fn test_deleted_cursor_record() {
        let paginator = ConnectionPaginator::new("organization", orgs());
        let gone = CursorCodec::encode("organization", 99);
        let ctx = RequestContext::anonymous();

        let by_key = PageArgs::first(10).before(gone.clone());
        let conn = paginator
            .paginate(&ctx, MemoryFilter::all(), &by_key)
            .await
            .unwrap();
        assert_eq!(keys(&conn), vec![1, 2, 3]);

        let by_field = PageArgs::first(10)
            .after(gone)
            .order_by(OrgField::Acronym, OrderDirection::Asc);
        let conn = paginator
            .paginate(&ctx, MemoryFilter::all(), &by_field)
            .await
            .unwrap();
        assert_eq!(conn, Connection::empty());
        assert!(!conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_validation_is_logged_with_user() {
        let logger = Arc::new(CapturingLogger::new());
        let paginator =
            ConnectionPaginator::new("organization", orgs()).with_logger(logger.clone());
        let user = Uuid::new_v4();

        let err = paginator
            .paginate(&RequestContext::for_user(user), MemoryFilter::all(), &PageArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::MissingLimit { .. }));

        match logger.entries().as_slice() {
            [LogEntry::Validation { ctx, message }] => {
                assert_eq!(ctx.user_id, Some(user));
                assert_eq!(ctx.connection, "organization");
                assert_eq!(message, &err.to_string());
            }
            other => panic!("unexpected log entries: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cursor_from_other_connection_is_rejected() {
        let logger = Arc::new(CapturingLogger::new());
        let paginator =
            ConnectionPaginator::new("organization", orgs()).with_logger(logger.clone());
        let args = PageArgs::first(1).after(CursorCodec::encode("dkimResults", 1));
        let err = paginator
            .paginate(&RequestContext::anonymous(), MemoryFilter::all(), &args)
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
        assert_eq!(logger.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_generic() {
        let logger = Arc::new(CapturingLogger::new());
        let paginator = ConnectionPaginator::new("organization", broken(FailureStage::Dispatch))
            .with_logger(logger.clone());

        let err = paginator
            .paginate(&RequestContext::anonymous(), "orgs of user".to_string(), &PageArgs::first(5))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unable to load organization data. Please try again.");
        assert!(!err.to_string().contains("connection refused"));

        match logger.entries().as_slice() {
            [LogEntry::Storage { ctx, stage, message }] => {
                assert_eq!(*stage, FailureStage::Dispatch);
                assert_eq!(message, "connection refused");
                assert!(ctx.parameters.contains("orgs of user"));
            }
            other => panic!("unexpected log entries: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_iteration_failure_is_generic() {
        let logger = Arc::new(CapturingLogger::new());
        let paginator = ConnectionPaginator::new("organization", broken(FailureStage::Iteration))
            .with_logger(logger.clone());

        let err = paginator
            .paginate(&RequestContext::anonymous(), String::new(), &PageArgs::last(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::StorageUnavailable { .. }));
        assert!(matches!(
            logger.entries().as_slice(),
            [LogEntry::Storage {
                stage: FailureStage::Iteration,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_no_query_on_invalid_arguments() {
        let paginator = ConnectionPaginator::new("organization", broken(FailureStage::Dispatch));
        let args = PageArgs::<OrgField> {
            first: Some(PageLimit::Int(1)),
            last: Some(PageLimit::Int(1)),
            ..PageArgs::default()
        };
        let err = paginator
            .paginate(&RequestContext::anonymous(), String::new(), &args)
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::BothLimitsSet { .. }));
        assert_eq!(paginator.executor().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_page_count_setting() {
        let args = PageArgs::first(5).after(CursorCodec::encode("organization", 3));

        let literal = ConnectionPaginator::new("organization", orgs());
        let conn = literal
            .paginate(&RequestContext::anonymous(), MemoryFilter::all(), &args)
            .await
            .unwrap();
        assert_eq!(conn, Connection::empty());

        let counting =
            ConnectionPaginator::new("organization", orgs()).with_config(PaginatorConfig {
                count_on_empty_page: true,
                ..PaginatorConfig::default()
            });
        let conn = counting
            .paginate(&RequestContext::anonymous(), MemoryFilter::all(), &args)
            .await
            .unwrap();
        assert!(conn.edges.is_empty());
        assert_eq!(conn.total_count, 3);
        assert!(!conn.page_info.has_previous_page);
    }

    #[tokio::test]
    async fn test_exhausted_sequence_is_empty_page() {
        struct NoRows;

        #[async_trait]
        impl QueryExecutor for NoRows {
            type Record = Org;
            type Filter = ();
            type Rows = TestRows;

            async fn execute(
                &self,
                _query: &ConnectionQuery<OrgField, ()>,
            ) -> Result<TestRows, StoreError> {
                Ok(TestRows::Empty(VecSequence::from(Vec::new())))
            }
        }

        let paginator = ConnectionPaginator::new("organization", NoRows);
        let conn = paginator
            .paginate(&RequestContext::anonymous(), (), &PageArgs::first(1))
            .await
            .unwrap();
        assert_eq!(conn, Connection::empty());
    }

    #[tokio::test]
    async fn test_configured_page_size() {
        let paginator =
            ConnectionPaginator::new("organization", orgs()).with_config(PaginatorConfig {
                max_page_size: 2,
                ..PaginatorConfig::default()
            });
        let err = paginator
            .paginate(&RequestContext::anonymous(), MemoryFilter::all(), &PageArgs::first(3))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds limit of 2 records"));
    }
}
