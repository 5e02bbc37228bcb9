use crate::db::executor::ResultRow;
use crate::error::PipelineError;
use duckdb::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A processed request about to be appended to history.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub session_id: String,
    pub natural_query: String,
    pub sql_query: String,
    pub explanation: String,
    pub result: Vec<ResultRow>,
    pub title: Option<String>,
}

/// A history row as read back from the store. `query_result` is the parsed
/// result snapshot; legacy plain-text snapshots come back as a JSON string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub session_id: String,
    pub natural_query: String,
    pub sql_query: String,
    pub explanation: String,
    pub query_result: Value,
    pub title: Option<String>,
    pub created_at: String,
}

/// Read-time grouping of history entries sharing a session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub queries: Vec<HistoryEntry>,
}

/// Append-only log of processed requests, kept in its own DuckDB file.
/// Every call opens a scoped connection; entries are never updated or
/// deleted.
#[derive(Clone)]
pub struct HistoryStore {
    connection_string: String,
}

const HISTORY_DDL: &str = "
CREATE SEQUENCE IF NOT EXISTS query_history_id_seq;
CREATE TABLE IF NOT EXISTS query_history (
    id            BIGINT PRIMARY KEY DEFAULT nextval('query_history_id_seq'),
    session_id    TEXT NOT NULL,
    natural_query TEXT NOT NULL,
    sql_query     TEXT NOT NULL,
    explanation   TEXT NOT NULL,
    query_result  TEXT NOT NULL,
    title         TEXT,
    created_at    TIMESTAMP NOT NULL DEFAULT current_timestamp
);
";

const ENTRY_COLUMNS: &str = "id, session_id, natural_query, sql_query, explanation, \
                             query_result, title, CAST(created_at AS VARCHAR)";

impl HistoryStore {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
        }
    }

    /// Fresh globally-unique opaque session token.
    pub fn generate_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    fn connect(&self) -> Result<Connection, duckdb::Error> {
        Connection::open(&self.connection_string)
    }

    /// Creates the history schema. Run once at startup.
    pub async fn initialize(&self) -> Result<(), PipelineError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = store
                .connect()
                .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?;
            conn.execute_batch(HISTORY_DDL)
                .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))
        })
        .await
        .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?
    }

    /// Appends one entry. The result snapshot is stored as JSON text and
    /// the timestamp is assigned by the store at write time.
    pub async fn record(&self, record: QueryRecord) -> Result<(), PipelineError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let persist_err =
                |e: &dyn std::fmt::Display| PipelineError::PersistenceError(e.to_string());

            let snapshot =
                serde_json::to_string(&record.result).map_err(|e| persist_err(&e))?;

            let conn = store.connect().map_err(|e| persist_err(&e))?;
            conn.execute(
                "INSERT INTO query_history (
                     session_id, natural_query, sql_query, explanation, query_result, title
                 ) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    record.session_id,
                    record.natural_query,
                    record.sql_query,
                    record.explanation,
                    snapshot,
                    record.title,
                ],
            )
            .map_err(|e| persist_err(&e))?;

            Ok(())
        })
        .await
        .map_err(|e| PipelineError::PersistenceError(e.to_string()))?
    }

    /// Every session with its queries, grouped in first-encounter order,
    /// most recent query first within a session.
    pub async fn all_sessions(&self) -> Result<Vec<Session>, PipelineError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = store.connect().map_err(read_err)?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM query_history ORDER BY session_id, created_at DESC",
                    ENTRY_COLUMNS
                ))
                .map_err(read_err)?;

            let entries = stmt
                .query_map([], row_to_entry)
                .map_err(read_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read_err)?;

            let mut sessions: Vec<Session> = Vec::new();
            for entry in entries {
                match sessions.last_mut() {
                    Some(session) if session.id == entry.session_id => {
                        session.queries.push(entry)
                    }
                    _ => sessions.push(Session {
                        id: entry.session_id.clone(),
                        queries: vec![entry],
                    }),
                }
            }

            Ok(sessions)
        })
        .await
        .map_err(read_err)?
    }

    /// One session's entries in chronological order.
    pub async fn session_entries(
        &self,
        session_id: &str,
    ) -> Result<Vec<HistoryEntry>, PipelineError> {
        let store = self.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = store.connect().map_err(read_err)?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM query_history WHERE session_id = ? ORDER BY created_at",
                    ENTRY_COLUMNS
                ))
                .map_err(read_err)?;

            stmt.query_map(params![session_id], row_to_entry)
                .map_err(read_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(read_err)
        })
        .await
        .map_err(read_err)?
    }
}

fn read_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::StoreUnavailable(e.to_string())
}

fn row_to_entry(row: &duckdb::Row<'_>) -> duckdb::Result<HistoryEntry> {
    Ok(HistoryEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        natural_query: row.get(2)?,
        sql_query: row.get(3)?,
        explanation: row.get(4)?,
        query_result: parse_result_snapshot(&row.get::<_, String>(5)?),
        title: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Snapshots are JSON today, but early records were stored as display text.
/// Those are returned as an opaque string rather than an error.
fn parse_result_snapshot(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store(name: &str) -> HistoryStore {
        let path = std::env::temp_dir().join(format!(
            "nl_sql_history_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db.wal"));
        HistoryStore::new(path.to_str().unwrap())
    }

    fn sample_rows() -> Vec<ResultRow> {
        let mut row = ResultRow::new();
        row.insert("StoreID".to_string(), json!("STO123"));
        row.insert("State".to_string(), json!("NY"));
        row.insert("ZipCode".to_string(), json!(10001));
        row.insert("Note".to_string(), Value::Null);
        vec![row]
    }

    fn sample_record(session_id: &str, question: &str) -> QueryRecord {
        QueryRecord {
            session_id: session_id.to_string(),
            natural_query: question.to_string(),
            sql_query: "SELECT * FROM Stores WHERE State = 'NY'".to_string(),
            explanation: "Filtered by state code.".to_string(),
            result: sample_rows(),
            title: Some(question.to_string()),
        }
    }

    #[tokio::test]
    async fn snapshot_round_trips_row_for_row() {
        let store = temp_store("roundtrip");
        store.initialize().await.unwrap();
        store
            .record(sample_record("session-1", "Show NY stores"))
            .await
            .unwrap();

        let sessions = store.all_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions[0].queries[0].query_result,
            serde_json::to_value(sample_rows()).unwrap()
        );
    }

    #[tokio::test]
    async fn groups_entries_by_session() {
        let store = temp_store("grouping");
        store.initialize().await.unwrap();
        store.record(sample_record("a", "first")).await.unwrap();
        store.record(sample_record("a", "second")).await.unwrap();
        store.record(sample_record("b", "third")).await.unwrap();

        let sessions = store.all_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
        let by_id = |id: &str| sessions.iter().find(|s| s.id == id).unwrap();
        assert_eq!(by_id("a").queries.len(), 2);
        assert_eq!(by_id("b").queries.len(), 1);
    }

    #[tokio::test]
    async fn session_entries_come_back_chronologically() {
        let store = temp_store("chronological");
        store.initialize().await.unwrap();
        store.record(sample_record("s", "first")).await.unwrap();
        store.record(sample_record("s", "second")).await.unwrap();

        let entries = store.session_entries("s").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].id < entries[1].id);
        assert_eq!(store.session_entries("absent").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn legacy_plain_text_snapshots_are_tolerated() {
        let store = temp_store("legacy");
        store.initialize().await.unwrap();

        let conn = store.connect().unwrap();
        conn.execute(
            "INSERT INTO query_history (
                 session_id, natural_query, sql_query, explanation, query_result
             ) VALUES (?, ?, ?, ?, ?)",
            params!["old", "q", "SELECT 1", "e", "not json at all"],
        )
        .unwrap();
        drop(conn);

        let sessions = store.all_sessions().await.unwrap();
        assert_eq!(
            sessions[0].queries[0].query_result,
            json!("not json at all")
        );
    }

    #[test]
    fn session_ids_are_unique() {
        let first = HistoryStore::generate_session_id();
        let second = HistoryStore::generate_session_id();
        assert_ne!(first, second);
        assert!(!first.is_empty());
    }
}
