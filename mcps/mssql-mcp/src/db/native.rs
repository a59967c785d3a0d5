//! Native TDS backend (tiberius)
//!
//! Rows come back already keyed by column name. Implicit transactions are
//! switched on at login, so writes stay pending until `commit`.

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use secrecy::ExposeSecret;
use serde_json::Value;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Row, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, instrument};

use super::{connection_error, Connection, PlaceholderStyle, RawRows, Record};
use crate::error::{GatewayError, GatewayResult};
use crate::plan::{Authentication, ConnectionPlan, DEFAULT_PORT};

type TdsClient = Client<Compat<TcpStream>>;

enum Pending {
    None,
    Rows(Vec<Record>),
    Affected(u64),
}

pub struct NativeConnection {
    client: TdsClient,
    pending: Pending,
}

impl NativeConnection {
    #[instrument(skip(plan), fields(host = %plan.host, database = %plan.database))]
    pub async fn open(plan: &ConnectionPlan) -> GatewayResult<Self> {
        let config = tds_config(plan)?;

        let client = tokio::time::timeout(plan.connect_timeout, connect(config))
            .await
            .map_err(|_| {
                GatewayError::Connection(format!(
                    "timed out after {}s connecting to {}",
                    plan.connect_timeout.as_secs(),
                    plan.host
                ))
            })??;

        let mut conn = Self {
            client,
            pending: Pending::None,
        };
        conn.batch("SET IMPLICIT_TRANSACTIONS ON")
            .await
            .map_err(|e| connection_error("session setup failed", e))?;

        debug!("native connection open");
        Ok(conn)
    }

    async fn batch(&mut self, sql: &str) -> tiberius::Result<()> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn last_row_count(&mut self) -> GatewayResult<u64> {
        let row = self
            .client
            .simple_query("SELECT CAST(@@ROWCOUNT AS bigint)")
            .await
            .map_err(query_error)?
            .into_row()
            .await
            .map_err(query_error)?;

        let count = row
            .and_then(|r| r.try_get::<i64, _>(0).ok().flatten())
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }
}

async fn connect(config: Config) -> GatewayResult<TdsClient> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| connection_error("tcp connect failed", e))?;
    tcp.set_nodelay(true)
        .map_err(|e| connection_error("failed to set TCP_NODELAY", e))?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| connection_error("login failed", e))
}

fn tds_config(plan: &ConnectionPlan) -> GatewayResult<Config> {
    let mut config = Config::new();
    config.host(&plan.host);
    config.port(plan.port.unwrap_or(DEFAULT_PORT));
    config.database(&plan.database);
    config.application_name("mssql-mcp");
    config.encryption(EncryptionLevel::Off);
    config.trust_cert();

    match &plan.auth {
        Authentication::SqlLogin(creds) => {
            config.authentication(AuthMethod::sql_server(
                &creds.username,
                creds.password.expose_secret(),
            ));
        }
        Authentication::Integrated => integrated_auth(&mut config)?,
    }

    Ok(config)
}

#[cfg(windows)]
fn integrated_auth(config: &mut Config) -> GatewayResult<()> {
    config.authentication(AuthMethod::Integrated);
    Ok(())
}

#[cfg(not(windows))]
fn integrated_auth(_config: &mut Config) -> GatewayResult<()> {
    Err(GatewayError::Connection(
        "windows auth over the native backend needs a Windows host; set MSSQL_USE_ODBC=1"
            .to_string(),
    ))
}

#[async_trait]
impl Connection for NativeConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Named
    }

    #[instrument(skip_all, fields(params = params.len()))]
    async fn execute(&mut self, sql: &str, params: &[&str]) -> GatewayResult<()> {
        self.pending = Pending::None;

        let mut stream = if params.is_empty() {
            self.client.simple_query(sql).await
        } else {
            let bound: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
            self.client.query(sql, &bound).await
        }
        .map_err(query_error)?;

        let has_description = stream.columns().await.map_err(query_error)?.is_some();

        if has_description {
            let rows = stream.into_first_result().await.map_err(query_error)?;
            debug!(rows = rows.len(), "fetched result set");
            self.pending = Pending::Rows(rows.into_iter().map(keyed_record).collect());
        } else {
            stream.into_results().await.map_err(query_error)?;
            let affected = self.last_row_count().await?;
            debug!(affected, "statement completed");
            self.pending = Pending::Affected(affected);
        }

        Ok(())
    }

    fn has_result_description(&self) -> bool {
        matches!(self.pending, Pending::Rows(_))
    }

    fn fetch_all(&mut self) -> RawRows {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Rows(rows) => RawRows::Keyed(rows),
            _ => RawRows::Keyed(Vec::new()),
        }
    }

    fn row_count(&self) -> u64 {
        match self.pending {
            Pending::Affected(count) => count,
            _ => 0,
        }
    }

    async fn commit(&mut self) -> GatewayResult<()> {
        self.batch("IF @@TRANCOUNT > 0 COMMIT TRANSACTION")
            .await
            .map_err(query_error)
    }

    async fn release(self: Box<Self>) -> GatewayResult<()> {
        self.client
            .close()
            .await
            .map_err(|e| connection_error("disconnect failed", e))
    }
}

fn query_error(err: tiberius::error::Error) -> GatewayError {
    match &err {
        tiberius::error::Error::Server(token) => GatewayError::Query {
            message: token.message().to_string(),
            code: Some(i64::from(token.code())),
        },
        _ => GatewayError::query(err.to_string()),
    }
}

fn keyed_record(row: Row) -> Record {
    let names: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    names
        .into_iter()
        .zip(row.into_iter().map(cell_value))
        .collect()
}

fn cell_value(data: ColumnData<'static>) -> Value {
    let value = match data {
        ColumnData::U8(v) => v.map(Value::from),
        ColumnData::I16(v) => v.map(Value::from),
        ColumnData::I32(v) => v.map(Value::from),
        ColumnData::I64(v) => v.map(Value::from),
        ColumnData::F32(v) => v.map(|f| float(f64::from(f))),
        ColumnData::F64(v) => v.map(float),
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::String(g.to_string())),
        ColumnData::Binary(v) => v.map(|b| Value::String(BASE64_STANDARD.encode(b.as_ref()))),
        ColumnData::Numeric(v) => v.map(|n| Value::String(n.to_string())),
        ColumnData::Xml(v) => v.map(|x| Value::String(x.into_owned().into_string())),
        other => temporal(&other),
    };
    value.unwrap_or(Value::Null)
}

/// Date and time columns as ISO-8601 text
fn temporal(data: &ColumnData<'static>) -> Option<Value> {
    let text = match data {
        ColumnData::Date(_) => NaiveDate::from_sql(data).ok().flatten().map(|d| d.to_string()),
        ColumnData::Time(_) => NaiveTime::from_sql(data).ok().flatten().map(|t| t.to_string()),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)
            .ok()
            .flatten()
            .map(|dt| dt.to_rfc3339()),
        _ => NaiveDateTime::from_sql(data)
            .ok()
            .flatten()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    };
    text.map(Value::String)
}

fn float(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
