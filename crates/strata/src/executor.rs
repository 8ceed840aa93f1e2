//! Execution-boundary contracts.
//!
//! The access layer builds statements; an injected executor owns
//! connections and runs them. Executors are expected to wrap the real
//! driver and, for [`Executor::insert`], perform the engine's
//! "identity of the row just inserted" retrieval (see
//! [`crate::Dialect::identity_fetch_sql`]).

use std::sync::Arc;
use std::time::Duration;

use crate::error::BoxError;
use crate::value::{Row, SqlValue};

/// A compiled statement: SQL text plus its ordered named parameters.
///
/// Emitted to the logger hook immediately before execution; purely
/// observational.
#[derive(Debug, Clone)]
pub struct SqlInfo {
    /// Statement text with named placeholders.
    pub sql: String,
    /// Bind parameters in placeholder order, names without prefix.
    pub params: Vec<(String, SqlValue)>,
}

impl SqlInfo {
    /// Bundles statement text and parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<(String, SqlValue)>) -> Self {
        Self { sql: sql.into(), params }
    }
}

/// Observer invoked with every statement before it executes.
pub type SqlLogger = Arc<dyn Fn(&SqlInfo) + Send + Sync>;

/// Synchronous statement execution.
pub trait Executor {
    /// Runs a row-returning statement.
    fn query(&self, statement: &SqlInfo, timeout: Option<Duration>) -> Result<Vec<Row>, BoxError>;

    /// Runs a statement returning a single scalar, `None` on empty result.
    fn query_scalar(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> Result<Option<SqlValue>, BoxError>;

    /// Runs a non-returning statement, yielding affected rows.
    fn execute(&self, statement: &SqlInfo, timeout: Option<Duration>) -> Result<u64, BoxError>;

    /// Runs an INSERT and retrieves the generated identity, reading the
    /// named sequence on sequence-based engines.
    fn insert(
        &self, statement: &SqlInfo, sequence: Option<&str>, timeout: Option<Duration>,
    ) -> Result<i64, BoxError>;
}

/// Asynchronous statement execution. Completion is signaled through
/// standard futures; the access layer never blocks inside these calls.
pub trait AsyncExecutor {
    /// Runs a row-returning statement.
    fn query(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Vec<Row>, BoxError>>;

    /// Runs a statement returning a single scalar, `None` on empty result.
    fn query_scalar(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> impl Future<Output = Result<Option<SqlValue>, BoxError>>;

    /// Runs a non-returning statement, yielding affected rows.
    fn execute(
        &self, statement: &SqlInfo, timeout: Option<Duration>,
    ) -> impl Future<Output = Result<u64, BoxError>>;

    /// Runs an INSERT and retrieves the generated identity.
    fn insert(
        &self, statement: &SqlInfo, sequence: Option<&str>, timeout: Option<Duration>,
    ) -> impl Future<Output = Result<i64, BoxError>>;
}
