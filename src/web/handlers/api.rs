use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::db::executor::ResultRow;
use crate::db::history::Session;
use crate::error::PipelineError;
use crate::web::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateSqlResponse {
    pub explanation: String,
    pub sql_query: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteSqlResponse {
    pub explanation: String,
    pub sql_query: String,
    pub results: Vec<ResultRow>,
    pub session_id: String,
    pub title: String,
}

pub async fn root_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Json(json!({
        "name": "nl-sql",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
        "endpoints": [
            {"path": "/", "method": "GET", "description": "This information"},
            {"path": "/api/sessions", "method": "GET", "description": "Get all query sessions"},
            {"path": "/api/sessions/{id}", "method": "GET", "description": "Get one session's queries in order"},
            {"path": "/api/generate-sql", "method": "POST", "description": "Generate SQL from natural language"},
            {"path": "/api/execute-sql", "method": "POST", "description": "Execute natural language query"},
        ],
    }))
}

/// Translation only: the question goes through the pipeline up to
/// synthesis, nothing is executed or recorded.
pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<GenerateSqlResponse>, (StatusCode, String)> {
    info!("Generating SQL for query: {}", payload.query);

    let synthesis = state
        .pipeline
        .translate(&payload.query)
        .await
        .map_err(error_response)?;

    Ok(Json(GenerateSqlResponse {
        explanation: synthesis.explanation,
        sql_query: synthesis.statement,
    }))
}

/// Full processing: translate, gate, execute, record.
pub async fn execute_sql(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<ExecuteSqlResponse>, (StatusCode, String)> {
    info!("Executing SQL for query: {}", payload.query);

    let outcome = state
        .pipeline
        .process(&payload.query, payload.session_id)
        .await
        .map_err(error_response)?;

    info!("Query executed successfully, session_id: {}", outcome.session_id);

    Ok(Json(ExecuteSqlResponse {
        explanation: outcome.explanation,
        sql_query: outcome.sql_query,
        results: outcome.results,
        session_id: outcome.session_id,
        title: outcome.title,
    }))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Session>>, (StatusCode, String)> {
    let sessions = state
        .history
        .all_sessions()
        .await
        .map_err(error_response)?;

    info!("Found {} sessions", sessions.len());
    Ok(Json(sessions))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, (StatusCode, String)> {
    let queries = state
        .history
        .session_entries(&session_id)
        .await
        .map_err(error_response)?;

    if queries.is_empty() {
        return Err((StatusCode::NOT_FOUND, "Session not found".to_string()));
    }

    Ok(Json(Session {
        id: session_id,
        queries,
    }))
}

/// Maps the pipeline taxonomy onto HTTP statuses. Gate rejections and bad
/// statements are client-facing 4xx; unreachable backing services are 5xx.
fn error_response(err: PipelineError) -> (StatusCode, String) {
    let status = match &err {
        PipelineError::InvalidQuestion => StatusCode::BAD_REQUEST,
        PipelineError::WriteOperationNotPermitted(_) => StatusCode::BAD_REQUEST,
        // Distinct status so clients can offer a retry on unparsable output
        PipelineError::NoStatementFound => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::ExecutionError(_) => StatusCode::BAD_REQUEST,
        PipelineError::StoreUnavailable(_)
        | PipelineError::SynthesisUnavailable(_)
        | PipelineError::PersistenceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("{}", err);
    }

    (status, err.to_string())
}
