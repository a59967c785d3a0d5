//! ODBC backend (odbc-api)
//!
//! Rows come back positionally alongside the cursor's column description.
//!
//! ODBC handles are blocking and not `Send`, so each connection lives on its
//! own worker thread together with its environment. The async side sends
//! commands over a channel and awaits the replies.

use std::sync::mpsc;
use std::thread;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use odbc_api::{
    escape_attribute_value, ConnectionOptions, Cursor, CursorRow, DataType, Environment,
    IntoParameter, Nullable, ResultSetMetadata,
};
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

use super::{connection_error, Connection, PlaceholderStyle, RawRows};
use crate::error::{GatewayError, GatewayResult};
use crate::plan::{Authentication, ConnectionPlan};

type Reply<T> = oneshot::Sender<GatewayResult<T>>;

enum Command {
    Execute {
        sql: String,
        params: Vec<String>,
        reply: Reply<Outcome>,
    },
    Commit {
        reply: Reply<()>,
    },
    Release {
        reply: Reply<()>,
    },
}

enum Outcome {
    Rows {
        description: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Affected(u64),
}

struct DialParams {
    driver: String,
    conn_str: String,
    login_timeout_sec: u32,
}

pub struct OdbcConnection {
    commands: mpsc::Sender<Command>,
    pending: Option<Outcome>,
}

impl OdbcConnection {
    #[instrument(skip(plan), fields(server = %plan.odbc_server(), database = %plan.database))]
    pub async fn open(plan: &ConnectionPlan) -> GatewayResult<Self> {
        let dial = DialParams {
            driver: plan.driver.clone(),
            conn_str: connection_string(plan),
            login_timeout_sec: plan.connect_timeout.as_secs() as u32,
        };
        let (commands, inbox) = mpsc::channel();
        let (opened_tx, opened_rx) = oneshot::channel();

        thread::Builder::new()
            .name("mssql-odbc".to_string())
            .spawn(move || worker(dial, inbox, opened_tx))
            .map_err(|e| connection_error("failed to start ODBC worker", e))?;

        opened_rx
            .await
            .map_err(|_| GatewayError::Connection("ODBC worker exited during connect".to_string()))??;

        debug!("odbc connection open");
        Ok(Self {
            commands,
            pending: None,
        })
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> GatewayResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| GatewayError::Connection("ODBC connection is closed".to_string()))?;
        response
            .await
            .map_err(|_| GatewayError::Connection("ODBC worker exited".to_string()))?
    }
}

#[async_trait]
impl Connection for OdbcConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Positional
    }

    #[instrument(skip_all, fields(params = params.len()))]
    async fn execute(&mut self, sql: &str, params: &[&str]) -> GatewayResult<()> {
        self.pending = None;
        let sql = sql.to_string();
        let params = params.iter().map(|p| p.to_string()).collect();

        let outcome = self
            .request(|reply| Command::Execute { sql, params, reply })
            .await?;
        self.pending = Some(outcome);
        Ok(())
    }

    fn has_result_description(&self) -> bool {
        matches!(self.pending, Some(Outcome::Rows { .. }))
    }

    fn fetch_all(&mut self) -> RawRows {
        match self.pending.take() {
            Some(Outcome::Rows { description, rows }) => RawRows::Positional { description, rows },
            _ => RawRows::Positional {
                description: Vec::new(),
                rows: Vec::new(),
            },
        }
    }

    fn row_count(&self) -> u64 {
        match self.pending {
            Some(Outcome::Affected(count)) => count,
            _ => 0,
        }
    }

    async fn commit(&mut self) -> GatewayResult<()> {
        self.request(|reply| Command::Commit { reply }).await
    }

    async fn release(self: Box<Self>) -> GatewayResult<()> {
        self.request(|reply| Command::Release { reply }).await
    }
}

/// ODBC connection string; contains the password under SQL auth
fn connection_string(plan: &ConnectionPlan) -> String {
    let mut parts = vec![
        format!("Driver={}", escape_attribute_value(&plan.driver)),
        format!("Server={}", escape_attribute_value(&plan.odbc_server())),
        format!("Database={}", escape_attribute_value(&plan.database)),
    ];

    match &plan.auth {
        Authentication::Integrated => parts.push("Trusted_Connection=yes".to_string()),
        Authentication::SqlLogin(creds) => {
            parts.push(format!("UID={}", escape_attribute_value(&creds.username)));
            parts.push(format!(
                "PWD={}",
                escape_attribute_value(creds.password.expose_secret())
            ));
        }
    }

    parts.push(format!("Encrypt={}", yes_no(plan.tls.encrypt)));
    parts.push(format!(
        "TrustServerCertificate={}",
        yes_no(plan.tls.trust_server_certificate)
    ));

    parts.join(";") + ";"
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

// ============================================================================
// Worker thread
// ============================================================================

fn worker(dial: DialParams, inbox: mpsc::Receiver<Command>, opened: Reply<()>) {
    let env = match Environment::new() {
        Ok(env) => env,
        Err(e) => {
            let _ = opened.send(Err(GatewayError::BackendUnavailable(format!(
                "ODBC driver manager unavailable: {}",
                e
            ))));
            return;
        }
    };

    let conn = match connect(&env, &dial) {
        Ok(conn) => conn,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };
    if opened.send(Ok(())).is_err() {
        rollback(&conn);
        return;
    }

    // A dropped sender means the connection was abandoned without release.
    while let Ok(command) = inbox.recv() {
        match command {
            Command::Execute { sql, params, reply } => {
                let _ = reply.send(run_statement(&conn, &sql, &params));
            }
            Command::Commit { reply } => {
                let _ = reply.send(conn.commit().map_err(query_error));
            }
            Command::Release { reply } => {
                let _ = reply.send(conn.rollback().map_err(query_error));
                return;
            }
        }
    }
    rollback(&conn);
}

fn connect<'env>(
    env: &'env Environment,
    dial: &DialParams,
) -> GatewayResult<odbc_api::Connection<'env>> {
    let drivers = env.drivers().map_err(|e| {
        GatewayError::BackendUnavailable(format!("failed to list ODBC drivers: {}", e))
    })?;
    if !drivers.iter().any(|d| d.description == dial.driver) {
        return Err(GatewayError::BackendUnavailable(format!(
            "ODBC driver '{}' is not installed",
            dial.driver
        )));
    }

    let conn = env
        .connect_with_connection_string(
            &dial.conn_str,
            ConnectionOptions {
                login_timeout_sec: Some(dial.login_timeout_sec),
                ..Default::default()
            },
        )
        .map_err(|e| connection_error("connection failed", e))?;
    conn.set_autocommit(false)
        .map_err(|e| connection_error("failed to disable autocommit", e))?;
    Ok(conn)
}

fn rollback(conn: &odbc_api::Connection<'_>) {
    if let Err(e) = conn.rollback() {
        warn!(error = %e, "rollback on abandoned ODBC connection failed");
    }
}

fn run_statement(
    conn: &odbc_api::Connection<'_>,
    sql: &str,
    params: &[String],
) -> GatewayResult<Outcome> {
    let bound: Vec<_> = params.iter().map(|p| p.as_str().into_parameter()).collect();
    let mut statement = conn.preallocate().map_err(query_error)?;

    let rows = match statement.execute(sql, &bound[..]).map_err(query_error)? {
        Some(mut cursor) => Some(read_cursor(&mut cursor)?),
        None => None,
    };

    match rows {
        Some((description, rows)) => {
            debug!(rows = rows.len(), "fetched result set");
            Ok(Outcome::Rows { description, rows })
        }
        None => {
            let affected = statement.row_count().map_err(query_error)?.unwrap_or(0) as u64;
            debug!(affected, "statement completed");
            Ok(Outcome::Affected(affected))
        }
    }
}

fn read_cursor(cursor: &mut impl Cursor) -> GatewayResult<(Vec<String>, Vec<Vec<Value>>)> {
    let description = cursor
        .column_names()
        .map_err(query_error)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(query_error)?;

    let mut types = Vec::with_capacity(description.len());
    for index in 1..=description.len() as u16 {
        types.push(cursor.col_data_type(index).map_err(query_error)?);
    }

    let mut rows = Vec::new();
    let mut bufs = CellBuffers::default();
    while let Some(mut row) = cursor.next_row().map_err(query_error)? {
        let mut values = Vec::with_capacity(types.len());
        for (offset, data_type) in types.iter().enumerate() {
            values.push(cell_value(&mut row, offset as u16 + 1, data_type, &mut bufs)?);
        }
        rows.push(values);
    }

    Ok((description, rows))
}

#[derive(Default)]
struct CellBuffers {
    binary: Vec<u8>,
    wide: Vec<u16>,
}

fn cell_value(
    row: &mut CursorRow<'_>,
    col: u16,
    data_type: &DataType,
    bufs: &mut CellBuffers,
) -> GatewayResult<Value> {
    let value = match data_type {
        DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => {
            let mut v = Nullable::<i64>::null();
            row.get_data(col, &mut v).map_err(query_error)?;
            v.into_opt().map(Value::from)
        }
        DataType::Bit => {
            let mut v = Nullable::<u8>::null();
            row.get_data(col, &mut v).map_err(query_error)?;
            v.into_opt().map(|b| Value::Bool(b != 0))
        }
        DataType::Real | DataType::Float { .. } | DataType::Double => {
            let mut v = Nullable::<f64>::null();
            row.get_data(col, &mut v).map_err(query_error)?;
            v.into_opt()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        }
        DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::LongVarbinary { .. } => {
            bufs.binary.clear();
            row.get_binary(col, &mut bufs.binary)
                .map_err(query_error)?
                .then(|| Value::String(BASE64_STANDARD.encode(&bufs.binary[..])))
        }
        // Text is fetched as UTF-16 so the driver never narrows it to a code
        // page. Decimals and temporals arrive as the driver's canonical text.
        _ => {
            bufs.wide.clear();
            row.get_wide_text(col, &mut bufs.wide)
                .map_err(query_error)?
                .then(|| Value::String(decode_wide(&bufs.wide)))
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn decode_wide(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

fn query_error(err: odbc_api::Error) -> GatewayError {
    match &err {
        odbc_api::Error::Diagnostics { record, .. } => GatewayError::Query {
            message: err.to_string(),
            code: Some(i64::from(record.native_error)),
        },
        _ => GatewayError::query(err.to_string()),
    }
}
