use crate::db::db_pool::DataStoreConnectionManager;
use crate::error::PipelineError;
use chrono::{DateTime, NaiveTime};
use duckdb::types::{TimeUnit, ValueRef};
use r2d2::Pool;
use serde_json::{Map, Value};

/// One result row: column name to scalar value, in cursor column order.
pub type ResultRow = Map<String, Value>;

/// Runs authorized statements against the data store.
#[derive(Clone)]
pub struct QueryExecutor {
    pool: Pool<DataStoreConnectionManager>,
}

impl QueryExecutor {
    pub fn new(pool: Pool<DataStoreConnectionManager>) -> Self {
        Self { pool }
    }

    /// Executes the statement over a scoped pooled connection. Column names
    /// come from the cursor, not the statement text; rows keep the store's
    /// scalar types. Zero rows is an empty vec, never an error. The
    /// checkout is released on every exit path.
    pub async fn execute(&self, statement: &str) -> Result<Vec<ResultRow>, PipelineError> {
        let pool = self.pool.clone();
        let statement = statement.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?;

            let mut stmt = conn
                .prepare(&statement)
                .map_err(|e| PipelineError::ExecutionError(e.to_string()))?;

            let column_count = stmt.column_count();
            let mut column_names = Vec::with_capacity(column_count);
            for i in 0..column_count {
                match stmt.column_name(i) {
                    Ok(name) => column_names.push(name.to_string()),
                    Err(e) => return Err(PipelineError::ExecutionError(e.to_string())),
                }
            }

            let mut rows = stmt
                .query([])
                .map_err(|e| PipelineError::ExecutionError(e.to_string()))?;

            let mut results = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| PipelineError::ExecutionError(e.to_string()))?
            {
                let mut mapped = ResultRow::new();
                for (i, name) in column_names.iter().enumerate() {
                    let value = row
                        .get_ref(i)
                        .map_err(|e| PipelineError::ExecutionError(e.to_string()))?;
                    mapped.insert(name.clone(), scalar_to_json(value));
                }
                results.push(mapped);
            }

            Ok(results)
        })
        .await
        .map_err(|e| PipelineError::ExecutionError(e.to_string()))?
    }
}

/// Maps a DuckDB scalar onto JSON, keeping native types where JSON has
/// them. Date/time values become their canonical string forms; anything
/// outside the scalar set degrades to a debug string.
fn scalar_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(v) => Value::from(v),
        ValueRef::SmallInt(v) => Value::from(v),
        ValueRef::Int(v) => Value::from(v),
        ValueRef::BigInt(v) => Value::from(v),
        ValueRef::HugeInt(v) => Value::String(v.to_string()),
        ValueRef::UTinyInt(v) => Value::from(v),
        ValueRef::USmallInt(v) => Value::from(v),
        ValueRef::UInt(v) => Value::from(v),
        ValueRef::UBigInt(v) => Value::from(v),
        ValueRef::Float(v) => float_to_json(v as f64),
        ValueRef::Double(v) => float_to_json(v),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Timestamp(unit, raw) => timestamp_to_json(unit, raw),
        ValueRef::Date32(days) => DateTime::from_timestamp(days as i64 * 86_400, 0)
            .map(|dt| Value::String(dt.date_naive().to_string()))
            .unwrap_or(Value::Null),
        ValueRef::Time64(unit, raw) => time_to_json(unit, raw),
        other => Value::String(format!("{:?}", other)),
    }
}

fn float_to_json(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn to_micros(unit: TimeUnit, raw: i64) -> i64 {
    match unit {
        TimeUnit::Second => raw.saturating_mul(1_000_000),
        TimeUnit::Millisecond => raw.saturating_mul(1_000),
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    }
}

fn timestamp_to_json(unit: TimeUnit, raw: i64) -> Value {
    DateTime::from_timestamp_micros(to_micros(unit, raw))
        .map(|dt| Value::String(dt.naive_utc().to_string()))
        .unwrap_or(Value::Null)
}

fn time_to_json(unit: TimeUnit, raw: i64) -> Value {
    let micros = to_micros(unit, raw);
    let secs = (micros / 1_000_000) as u32;
    let nanos = ((micros % 1_000_000) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .map(|t| Value::String(t.to_string()))
        .unwrap_or(Value::Null)
}
