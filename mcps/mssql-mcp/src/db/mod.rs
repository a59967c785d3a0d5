//! Connection provider
//!
//! One [`Connection`] trait with an implementation per backend. Callers
//! never branch on which backend they hold; the only backend-specific
//! thing they ask for is the parameter placeholder style.

pub mod native;
#[cfg(feature = "odbc")]
pub mod odbc;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};
use crate::plan::{Backend, ConnectionPlan};

/// A row keyed by column name, in column order
pub type Record = Map<String, Value>;

/// Rows as a backend hands them back, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum RawRows {
    /// Rows already keyed by column name (native backend)
    Keyed(Vec<Record>),
    /// Positional rows plus the statement's column description (ODBC backend)
    Positional {
        description: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

/// How a backend spells statement parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `@P1`, `@P2`, ... (TDS RPC)
    Named,
    /// `?` (ODBC)
    Positional,
}

impl PlaceholderStyle {
    /// Placeholder for the 1-based parameter `position`
    pub fn bind(&self, position: usize) -> String {
        match self {
            PlaceholderStyle::Named => format!("@P{}", position),
            PlaceholderStyle::Positional => "?".to_string(),
        }
    }
}

/// An open database connection with cursor-like semantics
///
/// `execute` runs a statement and buffers its outcome; `fetch_all` and
/// `row_count` read that outcome back.
#[async_trait]
pub trait Connection: Send {
    fn placeholder_style(&self) -> PlaceholderStyle;

    async fn execute(&mut self, sql: &str, params: &[&str]) -> GatewayResult<()>;

    /// Whether the last statement produced a result set description
    fn has_result_description(&self) -> bool;

    /// Take the rows of the last statement
    fn fetch_all(&mut self) -> RawRows;

    /// Rows affected by the last non-row-returning statement
    fn row_count(&self) -> u64;

    async fn commit(&mut self) -> GatewayResult<()>;

    /// Disconnect; uncommitted work is rolled back
    async fn release(self: Box<Self>) -> GatewayResult<()>;
}

/// Opens connections for a plan
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn open(&self, plan: &ConnectionPlan) -> GatewayResult<Box<dyn Connection>>;
}

/// Provider that dispatches to the backend named in the plan
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendProvider;

#[async_trait]
impl ConnectionProvider for BackendProvider {
    async fn open(&self, plan: &ConnectionPlan) -> GatewayResult<Box<dyn Connection>> {
        match plan.backend {
            Backend::Native => Ok(Box::new(native::NativeConnection::open(plan).await?)),
            #[cfg(feature = "odbc")]
            Backend::Odbc => Ok(Box::new(odbc::OdbcConnection::open(plan).await?)),
            #[cfg(not(feature = "odbc"))]
            Backend::Odbc => Err(GatewayError::BackendUnavailable(
                "ODBC backend is not compiled into this build".to_string(),
            )),
        }
    }
}

/// Whether the ODBC backend is compiled in
pub fn odbc_available() -> bool {
    cfg!(feature = "odbc")
}

/// Run `work` on `conn`, then release the connection exactly once
///
/// Release happens whether `work` succeeds or fails. A release failure is
/// logged and never replaces the outcome of `work`. If `work` panics,
/// release is skipped and cleanup relies on the connection's `Drop`: the
/// native socket closes, and the ODBC worker rolls back once its command
/// channel is dropped.
pub async fn with_connection<T, F>(mut conn: Box<dyn Connection>, work: F) -> GatewayResult<T>
where
    F: for<'c> FnOnce(&'c mut Box<dyn Connection>) -> BoxFuture<'c, GatewayResult<T>>,
{
    let outcome = work(&mut conn).await;
    let released = conn.release().await;

    if let Err(release_err) = released {
        warn!(error = %release_err, "failed to release connection");
    }
    outcome
}

/// Map a connect-phase failure
pub(crate) fn connection_error(context: &str, err: impl std::fmt::Display) -> GatewayError {
    GatewayError::Connection(format!("{}: {}", context, err))
}
