//! Scripted in-memory connection for tests
//!
//! Each `execute` consumes the next [`Step`]; everything the code under test
//! does to the connection is written to a shared [`Journal`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{Connection, ConnectionProvider, PlaceholderStyle, RawRows, Record};
use crate::error::{GatewayError, GatewayResult};
use crate::plan::ConnectionPlan;

/// Scripted outcome of one `execute`
#[derive(Debug, Clone)]
pub enum Step {
    Rows(RawRows),
    Affected(u64),
    Fail { message: String, code: Option<i64> },
}

impl Step {
    pub fn affected(count: u64) -> Self {
        Step::Affected(count)
    }

    pub fn fail(message: &str, code: Option<i64>) -> Self {
        Step::Fail {
            message: message.to_string(),
            code,
        }
    }

    pub fn keyed(rows: Vec<Value>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                other => panic!("keyed rows must be objects, got {}", other),
            })
            .collect::<Vec<Record>>();
        Step::Rows(RawRows::Keyed(records))
    }

    pub fn positional(description: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Step::Rows(RawRows::Positional {
            description: description.iter().map(|s| s.to_string()).collect(),
            rows,
        })
    }
}

#[derive(Debug, Default)]
pub struct Journal {
    /// Statements in execution order, with their parameters
    pub executed: Vec<(String, Vec<String>)>,
    pub opens: usize,
    pub commits: usize,
    pub releases: usize,
    /// Connections dropped, released or not
    pub drops: usize,
    pub fail_release: bool,
}

pub type SharedJournal = Arc<Mutex<Journal>>;

enum Pending {
    None,
    Rows(RawRows),
    Affected(u64),
}

pub struct FakeConnection {
    steps: VecDeque<Step>,
    style: PlaceholderStyle,
    pending: Pending,
    journal: SharedJournal,
}

impl FakeConnection {
    pub fn scripted(steps: Vec<Step>) -> (Box<dyn Connection>, SharedJournal) {
        let journal = SharedJournal::default();
        let conn = Self::with_journal(steps, PlaceholderStyle::Named, journal.clone());
        (Box::new(conn), journal)
    }

    fn with_journal(steps: Vec<Step>, style: PlaceholderStyle, journal: SharedJournal) -> Self {
        Self {
            steps: steps.into(),
            style,
            pending: Pending::None,
            journal,
        }
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> GatewayResult<()> {
        self.journal.lock().unwrap().executed.push((
            sql.to_string(),
            params.iter().map(|p| p.to_string()).collect(),
        ));

        match self.steps.pop_front() {
            Some(Step::Rows(rows)) => self.pending = Pending::Rows(rows),
            Some(Step::Affected(count)) => self.pending = Pending::Affected(count),
            Some(Step::Fail { message, code }) => {
                self.pending = Pending::None;
                return Err(GatewayError::Query { message, code });
            }
            None => return Err(GatewayError::query("unexpected statement")),
        }
        Ok(())
    }

    fn has_result_description(&self) -> bool {
        matches!(self.pending, Pending::Rows(_))
    }

    fn fetch_all(&mut self) -> RawRows {
        match std::mem::replace(&mut self.pending, Pending::None) {
            Pending::Rows(rows) => rows,
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
        self.journal.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn release(self: Box<Self>) -> GatewayResult<()> {
        let mut journal = self.journal.lock().unwrap();
        journal.releases += 1;
        if journal.fail_release {
            return Err(GatewayError::Connection("socket already closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.drops += 1;
        }
    }
}

/// Provider handing out one scripted connection per `open`
pub struct FakeProvider {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    style: PlaceholderStyle,
    open_error: Option<String>,
    journal: SharedJournal,
}

impl FakeProvider {
    pub fn new(scripts: Vec<Vec<Step>>) -> (Self, SharedJournal) {
        Self::with_style(scripts, PlaceholderStyle::Named)
    }

    pub fn with_style(scripts: Vec<Vec<Step>>, style: PlaceholderStyle) -> (Self, SharedJournal) {
        let journal = SharedJournal::default();
        let provider = Self {
            scripts: Mutex::new(scripts.into()),
            style,
            open_error: None,
            journal: journal.clone(),
        };
        (provider, journal)
    }

    pub fn refusing(message: &str) -> (Self, SharedJournal) {
        let (mut provider, journal) = Self::new(vec![]);
        provider.open_error = Some(message.to_string());
        (provider, journal)
    }
}

#[async_trait]
impl ConnectionProvider for FakeProvider {
    async fn open(&self, _plan: &ConnectionPlan) -> GatewayResult<Box<dyn Connection>> {
        if let Some(message) = &self.open_error {
            return Err(GatewayError::Connection(message.clone()));
        }
        self.journal.lock().unwrap().opens += 1;
        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(FakeConnection::with_journal(
            steps,
            self.style,
            self.journal.clone(),
        )))
    }
}
