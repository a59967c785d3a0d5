//! Query execution
//!
//! SQL is passed through verbatim. A statement that produces a result set
//! is read and normalized; anything else is committed and reported by
//! affected-row count.

use tracing::{debug, instrument};

use crate::db::Connection;
use crate::error::GatewayResult;
use crate::normalize::normalize;
use crate::types::{QueryOutcome, WriteResult};

#[instrument(skip_all, fields(sql_len = sql.len()))]
pub async fn run(conn: &mut Box<dyn Connection>, sql: &str) -> GatewayResult<QueryOutcome> {
    conn.execute(sql, &[]).await?;

    if conn.has_result_description() {
        let result = normalize(conn.fetch_all());
        debug!(rows = result.rows.len(), columns = result.columns.len(), "query returned rows");
        return Ok(QueryOutcome::Rows(result));
    }

    conn.commit().await?;
    let rows_affected = conn.row_count();
    debug!(rows_affected, "statement committed");
    Ok(QueryOutcome::Affected(WriteResult { rows_affected }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fake::{FakeConnection, SharedJournal, Step};
    use crate::db::with_connection;
    use crate::error::GatewayError;
    use serde_json::json;

    async fn run_scripted(
        sql: &'static str,
        steps: Vec<Step>,
    ) -> (GatewayResult<QueryOutcome>, SharedJournal) {
        let (conn, journal) = FakeConnection::scripted(steps);
        let result = with_connection(conn, |c| Box::pin(async move { run(c, sql).await })).await;
        (result, journal)
    }

    #[tokio::test]
    async fn test_write_statement_commits_and_reports_count() {
        let (result, journal) =
            run_scripted("UPDATE t SET a = 1 WHERE b = 2", vec![Step::affected(3)]).await;

        assert_eq!(
            result.unwrap(),
            QueryOutcome::Affected(WriteResult { rows_affected: 3 })
        );
        let journal = journal.lock().unwrap();
        assert_eq!(journal.commits, 1);
        assert_eq!(journal.releases, 1);
        assert_eq!(journal.executed[0].0, "UPDATE t SET a = 1 WHERE b = 2");
        assert!(journal.executed[0].1.is_empty());
    }

    #[tokio::test]
    async fn test_select_never_commits() {
        let (result, journal) = run_scripted(
            "SELECT 1 AS x",
            vec![Step::keyed(vec![json!({ "x": 1 })])],
        )
        .await;

        match result.unwrap() {
            QueryOutcome::Rows(rows) => {
                assert_eq!(rows.columns, vec!["x"]);
                assert_eq!(rows.rows.len(), 1);
            }
            other => panic!("expected rows, got {:?}", other),
        }
        let journal = journal.lock().unwrap();
        assert_eq!(journal.commits, 0);
        assert_eq!(journal.releases, 1);
    }

    #[tokio::test]
    async fn test_empty_select_is_still_rows() {
        let (result, journal) = run_scripted(
            "SELECT id FROM t WHERE 1 = 0",
            vec![Step::positional(&["id"], vec![])],
        )
        .await;

        match result.unwrap() {
            QueryOutcome::Rows(rows) => {
                assert_eq!(rows.columns, vec!["id"]);
                assert!(rows.rows.is_empty());
            }
            other => panic!("expected rows, got {:?}", other),
        }
        assert_eq!(journal.lock().unwrap().commits, 0);
    }

    #[tokio::test]
    async fn test_failure_surfaces_server_code_and_releases() {
        let (result, journal) = run_scripted(
            "SELECT * FROM nope",
            vec![Step::fail("Invalid object name 'nope'.", Some(208))],
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, GatewayError::Query { .. }));
        assert_eq!(err.to_string(), "Invalid object name 'nope'.");
        assert_eq!(err.code(), Some(208));

        let journal = journal.lock().unwrap();
        assert_eq!(journal.commits, 0);
        assert_eq!(journal.releases, 1);
    }
}
