//! Gateway operations
//!
//! Every operation reads settings, resolves a plan, opens one connection,
//! does its work and releases the connection before returning.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::SettingsSource;
use crate::db::{with_connection, BackendProvider, Connection, ConnectionProvider};
use crate::error::GatewayResult;
use crate::executor;
use crate::metadata;
use crate::plan::{self, Platform};
use crate::types::{ColumnDescriptor, IndexesAndForeignKeys, QueryOutcome};

#[derive(Clone)]
pub struct Gateway {
    source: SettingsSource,
    provider: Arc<dyn ConnectionProvider>,
    platform: Platform,
}

impl Gateway {
    /// Gateway over the process environment and the compiled-in backends
    pub fn new() -> Self {
        Self::with_provider(
            SettingsSource::Environment,
            Arc::new(BackendProvider),
            Platform::current(),
        )
    }

    pub fn with_provider(
        source: SettingsSource,
        provider: Arc<dyn ConnectionProvider>,
        platform: Platform,
    ) -> Self {
        Self {
            source,
            provider,
            platform,
        }
    }

    async fn connect(&self) -> GatewayResult<Box<dyn Connection>> {
        let settings = self.source.load()?;
        let plan = plan::resolve(&settings, self.platform)?;
        info!(
            backend = plan.backend.as_str(),
            host = %plan.host,
            database = %plan.database,
            auth = ?plan.auth.mode(),
            "opening connection"
        );
        self.provider.open(&plan).await
    }

    #[instrument(skip_all)]
    pub async fn run_query(&self, sql: &str) -> GatewayResult<QueryOutcome> {
        let conn = self.connect().await?;
        let sql = sql.to_string();
        with_connection(conn, move |c| {
            Box::pin(async move { executor::run(c, &sql).await })
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn describe_table(
        &self,
        schema: &str,
        table: &str,
    ) -> GatewayResult<Vec<ColumnDescriptor>> {
        let conn = self.connect().await?;
        let (schema, table) = (schema.to_string(), table.to_string());
        with_connection(conn, move |c| {
            Box::pin(async move { metadata::describe_columns(c, &schema, &table).await })
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn describe_indexes_and_foreign_keys(
        &self,
        schema: &str,
        table: &str,
    ) -> GatewayResult<IndexesAndForeignKeys> {
        let conn = self.connect().await?;
        let (schema, table) = (schema.to_string(), table.to_string());
        with_connection(conn, move |c| {
            Box::pin(async move {
                metadata::describe_indexes_and_foreign_keys(c, &schema, &table).await
            })
        })
        .await
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}
