//! # tracker-graphql-helpers
//!
//! GraphQL building blocks for the domain posture tracker API.
//!
//! ## Features
//!
//! - **Cursor Pagination** - Relay-style connections with stable ordering
//! - **Connection Paginator** - validation, cursor bounds and page metadata over any
//!   [`QueryExecutor`]
//! - **Query Rendering** - AQL fragments for document-database backed collections
//! - **DataLoader** - batch loading by key and per-request connection loaders
//! - **Request Context** - acting user and locale extracted from HTTP headers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tracker_graphql_helpers::{ConnectionPaginator, MemoryExecutor, MemoryFilter, PageArgs};
//!
//! let paginator = ConnectionPaginator::new("dkimResults", MemoryExecutor::new(results));
//! let connection = paginator
//!     .paginate(&ctx, MemoryFilter::all(), &PageArgs::first(10))
//!     .await?;
//! ```

pub mod aql;
pub mod auth;
pub mod config;
pub mod dataloaders;
pub mod executor;
pub mod logging;
pub mod memory;
pub mod order;
pub mod pagination;
pub mod paginator;
pub mod types;

pub use auth::{extract_request_context, graphql_handler, request_context, RequestContext};
pub use config::PaginatorConfig;
pub use dataloaders::{BatchLoader, ConnectionLoader, DataLoader, RecordBatchLoader};
pub use executor::{ConnectionQuery, PageSnapshot, QueryExecutor, ResultSequence, StoreError};
pub use logging::{PaginationLogger, TracingLogger};
pub use memory::{MemoryExecutor, MemoryFilter};
pub use order::{FieldValue, OrderBy, OrderDirection, OrderField, Record, RecordKey};
pub use pagination::{
    Connection, CursorCodec, Edge, LimitArgument, PageArgs, PageInfo, PaginationInput,
};
pub use paginator::ConnectionPaginator;
pub use types::{Locale, PageLimit};

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Pagination errors
///
/// Every variant except [`PaginationError::StorageUnavailable`] and
/// [`PaginationError::Config`] describes a caller mistake and carries a message that is
/// safe to show to the end user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaginationError {
    #[error(
        "You must provide a `first` or `last` value to properly paginate the `{connection}` connection."
    )]
    MissingLimit { connection: String },

    #[error(
        "Passing both `first` and `last` to paginate the `{connection}` connection is not supported."
    )]
    BothLimitsSet { connection: String },

    #[error("`{argument}` must be of type `number` not `{actual}`.")]
    NonNumericLimit {
        argument: LimitArgument,
        actual: String,
    },

    #[error("`{argument}` on the `{connection}` connection cannot be less than zero.")]
    NegativeLimit {
        connection: String,
        argument: LimitArgument,
    },

    #[error("Requesting `{requested}` records on the `{connection}` connection exceeds limit of {max} records for `{argument}`.")]
    LimitExceeded {
        connection: String,
        argument: LimitArgument,
        /// Caller's value as sent, which may lie outside the `i64` range.
        requested: String,
        max: u32,
    },

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Unable to load {connection} data. Please try again.")]
    StorageUnavailable { connection: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PaginationError {
    /// Whether the error was caused by the request arguments rather than the backend.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::StorageUnavailable { .. } | Self::Config(_))
    }

    /// Message shown to the end user in the requested locale.
    pub fn user_message(&self, locale: Locale) -> String {
        match locale {
            Locale::En => self.to_string(),
            Locale::Fr => match self {
                Self::MissingLimit { connection } => format!(
                    "Vous devez fournir une valeur `first` ou `last` pour paginer correctement la connexion `{connection}`."
                ),
                Self::BothLimitsSet { connection } => format!(
                    "Passer à la fois `first` et `last` pour paginer la connexion `{connection}` n'est pas supporté."
                ),
                Self::NonNumericLimit { argument, actual } => {
                    format!("`{argument}` doit être de type `number` et non `{actual}`.")
                }
                Self::NegativeLimit {
                    connection,
                    argument,
                } => format!(
                    "`{argument}` sur la connexion `{connection}` ne peut être inférieur à zéro."
                ),
                Self::LimitExceeded {
                    connection,
                    argument,
                    requested,
                    max,
                } => format!(
                    "La demande de `{requested}` enregistrements sur la connexion `{connection}` dépasse la limite de {max} enregistrements pour `{argument}`."
                ),
                Self::InvalidCursor(detail) => format!("Curseur invalide : {detail}"),
                Self::StorageUnavailable { connection } => {
                    format!("Impossible de charger les données {connection}. Veuillez réessayer.")
                }
                Self::Config(detail) => format!("Configuration invalide : {detail}"),
            },
        }
    }

    /// GraphQL error carrying the localized message and a `code` extension.
    pub fn to_graphql_error(&self, locale: Locale) -> async_graphql::Error {
        let code = if self.is_user_error() {
            "BAD_USER_INPUT"
        } else {
            "INTERNAL_SERVER_ERROR"
        };
        async_graphql::Error::new(self.user_message(locale))
            .extend_with(|_, e| e.set("code", code))
    }
}

/// English GraphQL error with the `code` extension.
///
/// A bare `?` inside a resolver goes through async-graphql's `Display` conversion and
/// loses the extension, so resolvers call `.extend()` on the error (or on the result via
/// [`async_graphql::ResultExt`]), or use [`ConnectionLoader::resolve`] for the request
/// locale.
impl ErrorExtensions for PaginationError {
    fn extend(&self) -> async_graphql::Error {
        self.to_graphql_error(Locale::En)
    }
}

/// Result type for pagination operations
pub type Result<T> = std::result::Result<T, PaginationError>;
