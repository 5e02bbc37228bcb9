use crate::db::db_pool::DataStoreConnectionManager;
use crate::error::PipelineError;
use duckdb::Connection;
use r2d2::Pool;

/// Reads the structural metadata of the data store and renders it as a text
/// block for prompt inclusion. No caching: the description is regenerated
/// from the live store on every call, so its staleness window is one
/// request.
#[derive(Clone)]
pub struct SchemaInspector {
    pool: Pool<DataStoreConnectionManager>,
}

impl SchemaInspector {
    pub fn new(pool: Pool<DataStoreConnectionManager>) -> Self {
        Self { pool }
    }

    /// Concatenates every table's DDL in store-enumeration order and, when
    /// a `column_descriptions` side table exists, appends its per-column
    /// notes grouped by table.
    pub async fn describe(&self) -> Result<String, PipelineError> {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?;

            let mut description = read_table_ddl(&conn)?;

            if let Some(notes) = read_column_notes(&conn)? {
                description.push_str("\n\n");
                description.push_str(&notes);
            }

            Ok(description)
        })
        .await
        .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?
    }
}

fn store_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::StoreUnavailable(e.to_string())
}

fn read_table_ddl(conn: &Connection) -> Result<String, PipelineError> {
    let mut stmt = conn
        .prepare("SELECT sql FROM sqlite_master WHERE type='table'")
        .map_err(store_err)?;

    let fragments: Vec<String> = stmt
        .query_map([], |row| row.get::<_, Option<String>>(0))
        .map_err(store_err)?
        .filter_map(Result::ok)
        .flatten()
        .collect();

    Ok(fragments.join("\n"))
}

fn read_column_notes(conn: &Connection) -> Result<Option<String>, PipelineError> {
    let annotated: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='column_descriptions'",
            [],
            |row| row.get(0),
        )
        .map_err(store_err)?;

    if annotated == 0 {
        return Ok(None);
    }

    let mut stmt = conn
        .prepare(
            "SELECT table_name, column_name, description
             FROM column_descriptions
             ORDER BY table_name, column_name",
        )
        .map_err(store_err)?;

    let notes: Vec<(String, String, String)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .map_err(store_err)?
        .filter_map(Result::ok)
        .collect();

    if notes.is_empty() {
        return Ok(None);
    }

    let mut rendered = String::from("-- Column notes\n");
    let mut current_table = None;
    for (table, column, description) in &notes {
        if current_table != Some(table.as_str()) {
            rendered.push_str(&format!("-- {}:\n", table));
            current_table = Some(table.as_str());
        }
        rendered.push_str(&format!("--   {}: {}\n", column, description));
    }

    Ok(Some(rendered.trim_end().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_pool(name: &str) -> Pool<DataStoreConnectionManager> {
        let path = std::env::temp_dir().join(format!(
            "nl_sql_schema_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db.wal"));
        let manager = DataStoreConnectionManager::new(path.to_str().unwrap()).unwrap();
        Pool::builder().max_size(2).build(manager).unwrap()
    }

    #[tokio::test]
    async fn renders_every_table_definition() {
        let pool = temp_pool("ddl");
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TABLE Stores (StoreID TEXT, State TEXT);
                 CREATE TABLE Products (ProductID TEXT, Price DOUBLE);",
            )
            .unwrap();

        let description = SchemaInspector::new(pool).describe().await.unwrap();
        assert!(description.contains("Stores"));
        assert!(description.contains("Products"));
        assert!(description.contains("CREATE TABLE"));
    }

    #[tokio::test]
    async fn identical_for_an_unchanged_schema() {
        let pool = temp_pool("idempotent");
        pool.get()
            .unwrap()
            .execute_batch("CREATE TABLE Orders (OrderID INTEGER, Total DOUBLE);")
            .unwrap();

        let inspector = SchemaInspector::new(pool);
        let first = inspector.describe().await.unwrap();
        let second = inspector.describe().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn appends_column_notes_grouped_by_table() {
        let pool = temp_pool("notes");
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TABLE Stores (StoreID TEXT, State TEXT);
                 CREATE TABLE column_descriptions (
                     table_name TEXT, column_name TEXT, description TEXT);
                 INSERT INTO column_descriptions VALUES
                     ('Stores', 'State', 'Two-letter US state code'),
                     ('Stores', 'StoreID', 'Identifier with STO prefix');",
            )
            .unwrap();

        let description = SchemaInspector::new(pool).describe().await.unwrap();
        assert!(description.contains("-- Stores:"));
        assert!(description.contains("--   State: Two-letter US state code"));
        assert!(description.contains("--   StoreID: Identifier with STO prefix"));
    }
}
