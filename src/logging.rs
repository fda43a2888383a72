//! Structured logging for paginated loads
//!
//! The paginator reports through a [`PaginationLogger`] handed to it at construction.
//! [`TracingLogger`] forwards to `tracing`; [`CapturingLogger`] keeps entries in
//! memory for assertions.

use std::error::Error;
use std::fmt;
use std::sync::Mutex;

use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::executor::StoreError;
use crate::PaginationError;

/// Who asked for what
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadContext {
    pub connection: String,
    pub operation: String,
    pub user_id: Option<Uuid>,
    /// Rendered filter and pagination arguments
    pub parameters: String,
}

/// Suspension point at which the store failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Sending the query
    Dispatch,
    /// Reading results back
    Iteration,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Dispatch => f.write_str("dispatch"),
            FailureStage::Iteration => f.write_str("iteration"),
        }
    }
}

pub trait PaginationLogger: Send + Sync {
    /// A request was rejected before any query ran.
    fn validation_failed(&self, ctx: &LoadContext, error: &PaginationError);

    /// The backing store failed while loading a page.
    fn storage_failed(&self, ctx: &LoadContext, stage: FailureStage, error: &StoreError);

    fn query_dispatched(&self, _ctx: &LoadContext) {}
}

/// Logger backed by `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl PaginationLogger for TracingLogger {
    fn validation_failed(&self, ctx: &LoadContext, error: &PaginationError) {
        warn!(
            connection = %ctx.connection,
            operation = %ctx.operation,
            user_id = ?ctx.user_id,
            error = %error,
            "User attempted to paginate a connection with invalid arguments"
        );
    }

    fn storage_failed(&self, ctx: &LoadContext, stage: FailureStage, error: &StoreError) {
        error!(
            connection = %ctx.connection,
            operation = %ctx.operation,
            user_id = ?ctx.user_id,
            parameters = %ctx.parameters,
            stage = %stage,
            error = %error_chain(error),
            "Database error occurred while loading connection"
        );
    }

    fn query_dispatched(&self, ctx: &LoadContext) {
        debug!(
            connection = %ctx.connection,
            operation = %ctx.operation,
            parameters = %ctx.parameters,
            "Loading connection page"
        );
    }
}

/// Captured log entry
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Validation {
        ctx: LoadContext,
        message: String,
    },
    Storage {
        ctx: LoadContext,
        stage: FailureStage,
        message: String,
    },
}

/// Logger that records entries in memory
#[derive(Debug, Default)]
pub struct CapturingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn push(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }
}

impl PaginationLogger for CapturingLogger {
    fn validation_failed(&self, ctx: &LoadContext, error: &PaginationError) {
        self.push(LogEntry::Validation {
            ctx: ctx.clone(),
            message: error.to_string(),
        });
    }

    fn storage_failed(&self, ctx: &LoadContext, stage: FailureStage, error: &StoreError) {
        self.push(LogEntry::Storage {
            ctx: ctx.clone(),
            stage,
            message: error_chain(error),
        });
    }
}

/// Error message followed by each of its sources, separated by `: `
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

/// Install a global `tracing` subscriber
///
/// `filter` uses `EnvFilter` syntax and falls back to `info` when it does not parse.
pub fn init_tracing(filter: &str, json: bool) -> crate::Result<()> {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).try_init()
    };

    installed.map_err(|e| {
        PaginationError::Config(format!("unable to install tracing subscriber: {}", e))
    })
}
