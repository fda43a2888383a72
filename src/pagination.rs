//! Relay-style cursor pagination

use std::fmt;

use async_graphql::{InputObject, Object, SimpleObject};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;

use crate::order::{OrderBy, OrderDirection, Record, RecordKey};
use crate::types::PageLimit;
use crate::PaginationError;

/// Page information
#[derive(SimpleObject, Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    /// Cursor of the first edge, empty when the page is empty
    pub start_cursor: String,
    /// Cursor of the last edge, empty when the page is empty
    pub end_cursor: String,
}

/// Edge in a connection
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
}

#[Object]
impl<T: async_graphql::OutputType> Edge<T> {
    async fn cursor(&self) -> &str {
        &self.cursor
    }

    async fn node(&self) -> &T {
        &self.node
    }
}

/// Connection (paginated result)
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub total_count: u64,
    pub page_info: PageInfo,
}

#[Object]
impl<T: async_graphql::OutputType> Connection<T> {
    async fn edges(&self) -> &[Edge<T>] {
        &self.edges
    }

    async fn total_count(&self) -> u64 {
        self.total_count
    }

    async fn page_info(&self) -> &PageInfo {
        &self.page_info
    }
}

impl<T> Connection<T> {
    /// Create a connection from edges already in page order
    pub fn new(edges: Vec<Edge<T>>, total_count: u64, has_next: bool, has_previous: bool) -> Self {
        let start_cursor = edges.first().map(|e| e.cursor.clone()).unwrap_or_default();
        let end_cursor = edges.last().map(|e| e.cursor.clone()).unwrap_or_default();

        Self {
            edges,
            total_count,
            page_info: PageInfo {
                has_next_page: has_next,
                has_previous_page: has_previous,
                start_cursor,
                end_cursor,
            },
        }
    }

    /// Create empty connection
    pub fn empty() -> Self {
        Self::empty_with_count(0)
    }

    pub(crate) fn empty_with_count(total_count: u64) -> Self {
        Self {
            edges: Vec::new(),
            total_count,
            page_info: PageInfo::default(),
        }
    }

    /// Map every node, keeping cursors and page info.
    ///
    /// This is where callers project stored records into their API shape, e.g.
    /// resolving translated fields for the request language.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Connection<U> {
        Connection {
            edges: self
                .edges
                .into_iter()
                .map(|edge| Edge {
                    cursor: edge.cursor,
                    node: f(edge.node),
                })
                .collect(),
            total_count: self.total_count,
            page_info: self.page_info,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }
}

impl<R: Record> Connection<R> {
    /// Build a connection from records in page order, minting cursors for `collection`.
    pub fn from_records(
        collection: &str,
        records: Vec<R>,
        total_count: u64,
        has_next: bool,
        has_previous: bool,
    ) -> Self {
        let edges = records
            .into_iter()
            .map(|node| Edge {
                cursor: CursorCodec::encode(collection, node.key()),
                node,
            })
            .collect();
        Self::new(edges, total_count, has_next, has_previous)
    }
}

/// Cursor encoding/decoding
///
/// A cursor is `base64("<collection>:<key>")`.
pub struct CursorCodec;

impl CursorCodec {
    /// Encode a collection-qualified key
    pub fn encode(collection: &str, key: RecordKey) -> String {
        BASE64.encode(format!("{}:{}", collection, key).as_bytes())
    }

    /// Decode a cursor into its collection and key
    pub fn decode(cursor: &str) -> crate::Result<(String, RecordKey)> {
        let bytes = BASE64
            .decode(cursor.as_bytes())
            .map_err(|e| PaginationError::InvalidCursor(e.to_string()))?;
        let text =
            String::from_utf8(bytes).map_err(|e| PaginationError::InvalidCursor(e.to_string()))?;
        let (collection, key) = text.rsplit_once(':').ok_or_else(|| {
            PaginationError::InvalidCursor(format!("`{}` is not a cursor", cursor))
        })?;
        let key = key.parse::<RecordKey>().map_err(|_| {
            PaginationError::InvalidCursor(format!("`{}` is not a numeric key", key))
        })?;
        Ok((collection.to_string(), key))
    }

    /// Decode a cursor that must belong to `collection`
    pub fn decode_for(collection: &str, cursor: &str) -> crate::Result<RecordKey> {
        let (found, key) = Self::decode(cursor)?;
        if found != collection {
            return Err(PaginationError::InvalidCursor(format!(
                "cursor belongs to the `{}` connection, not `{}`",
                found, collection
            )));
        }
        Ok(key)
    }
}

/// Which limit argument was supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitArgument {
    First,
    Last,
}

impl fmt::Display for LimitArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitArgument::First => f.write_str("first"),
            LimitArgument::Last => f.write_str("last"),
        }
    }
}

/// Validated page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub argument: LimitArgument,
    pub count: usize,
}

/// Pagination input for GraphQL queries
///
/// Follows the Relay Cursor Connections Specification:
/// https://relay.dev/graphql/connections.htm
#[derive(InputObject, Debug, Clone, Default)]
pub struct PaginationInput {
    /// Number of items to return (forward pagination)
    pub first: Option<PageLimit>,

    /// Cursor to start from (forward pagination)
    pub after: Option<String>,

    /// Number of items to return (backward pagination)
    pub last: Option<PageLimit>,

    /// Cursor to start from (backward pagination)
    pub before: Option<String>,
}

impl PaginationInput {
    /// Combine with the connection's own ordering argument.
    pub fn into_args<F>(self, order_by: Option<OrderBy<F>>) -> PageArgs<F> {
        PageArgs {
            first: self.first,
            last: self.last,
            after: self.after,
            before: self.before,
            order_by,
        }
    }
}

/// Pagination arguments for a single connection request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArgs<F> {
    #[serde(default)]
    pub first: Option<PageLimit>,
    #[serde(default)]
    pub last: Option<PageLimit>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default = "no_order")]
    pub order_by: Option<OrderBy<F>>,
}

fn no_order<F>() -> Option<OrderBy<F>> {
    None
}

impl<F> Default for PageArgs<F> {
    fn default() -> Self {
        Self {
            first: None,
            last: None,
            after: None,
            before: None,
            order_by: None,
        }
    }
}

impl<F> PageArgs<F> {
    pub fn first(count: i64) -> Self {
        Self {
            first: Some(PageLimit::Int(count)),
            ..Self::default()
        }
    }

    pub fn last(count: i64) -> Self {
        Self {
            last: Some(PageLimit::Int(count)),
            ..Self::default()
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn order_by(mut self, field: F, direction: OrderDirection) -> Self {
        self.order_by = Some(OrderBy::new(field, direction));
        self
    }

    /// Validate the limit arguments
    ///
    /// Checks run in a fixed order and the first failure is returned: a limit must be
    /// present, only one of `first`/`last` may be given, it must be an integer, not
    /// negative, and not above `max`.
    pub fn window(&self, connection: &str, max: u32) -> crate::Result<PageWindow> {
        let (argument, limit) = match (&self.first, &self.last) {
            (None, None) => {
                return Err(PaginationError::MissingLimit {
                    connection: connection.to_string(),
                })
            }
            (Some(_), Some(_)) => {
                return Err(PaginationError::BothLimitsSet {
                    connection: connection.to_string(),
                })
            }
            (Some(first), None) => (LimitArgument::First, first),
            (None, Some(last)) => (LimitArgument::Last, last),
        };

        let negative = || PaginationError::NegativeLimit {
            connection: connection.to_string(),
            argument,
        };
        let exceeded = |requested: String| PaginationError::LimitExceeded {
            connection: connection.to_string(),
            argument,
            requested,
            max,
        };

        let requested = match limit {
            PageLimit::Int(n) => *n,
            PageLimit::OutOfRange { negative: true, .. } => return Err(negative()),
            PageLimit::OutOfRange { value, .. } => return Err(exceeded(value.to_string())),
            PageLimit::Invalid { kind } => {
                return Err(PaginationError::NonNumericLimit {
                    argument,
                    actual: kind.clone(),
                })
            }
        };

        if requested < 0 {
            return Err(negative());
        }

        if requested > i64::from(max) {
            return Err(exceeded(requested.to_string()));
        }

        Ok(PageWindow {
            argument,
            count: requested as usize,
        })
    }
}
