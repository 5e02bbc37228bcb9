use crate::db::executor::{QueryExecutor, ResultRow};
use crate::db::history::{HistoryStore, QueryRecord};
use crate::db::schema::SchemaInspector;
use crate::error::PipelineError;
use crate::llm::models::SynthesisResult;
use crate::llm::prompt::build_prompt;
use crate::llm::LlmManager;
use crate::safety;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// The outcome of one fully processed request.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedQuery {
    pub explanation: String,
    pub sql_query: String,
    pub results: Vec<ResultRow>,
    pub session_id: String,
    pub title: String,
}

/// Sequences one request through the pipeline: schema introspection,
/// prompt construction, synthesis, safety gating, execution, history
/// persistence. Each step depends on the previous one; nothing here holds
/// a lock across the slow calls.
pub struct QueryPipeline {
    schema: SchemaInspector,
    executor: QueryExecutor,
    llm: Arc<LlmManager>,
    history: Arc<HistoryStore>,
    instructions: String,
}

impl QueryPipeline {
    pub fn new(
        schema: SchemaInspector,
        executor: QueryExecutor,
        llm: Arc<LlmManager>,
        history: Arc<HistoryStore>,
        instructions: String,
    ) -> Self {
        Self {
            schema,
            executor,
            llm,
            history,
            instructions,
        }
    }

    /// Translation only: introspect, build the prompt, synthesize. No
    /// gating and no execution; this backs the generate-sql endpoint.
    pub async fn translate(&self, question: &str) -> Result<SynthesisResult, PipelineError> {
        let schema = self.schema.describe().await?;
        let prompt = build_prompt(&self.instructions, &schema, question)?;
        let result = self.llm.synthesize(&prompt).await?;
        info!("Synthesized statement: {}", result.statement);
        Ok(result)
    }

    /// Full processing: translate, authorize, execute, then append to
    /// history. Failures before the history step propagate unrecorded; a
    /// failed history write is logged and does not fail the response.
    pub async fn process(
        &self,
        question: &str,
        session_id: Option<String>,
    ) -> Result<ProcessedQuery, PipelineError> {
        let synthesis = self.translate(question).await?;
        let statement = safety::authorize(&synthesis.statement)?;
        let results = self.executor.execute(&statement).await?;

        let session_id = session_id.unwrap_or_else(HistoryStore::generate_session_id);
        let title = derive_title(question);

        let record = QueryRecord {
            session_id: session_id.clone(),
            natural_query: question.to_string(),
            sql_query: statement.clone(),
            explanation: synthesis.explanation.clone(),
            result: results.clone(),
            title: Some(title.clone()),
        };
        if let Err(e) = self.history.record(record).await {
            warn!("{}", e);
        }

        Ok(ProcessedQuery {
            explanation: synthesis.explanation,
            sql_query: statement,
            results,
            session_id,
            title,
        })
    }
}

/// Session titles are the question itself, clipped for display.
fn derive_title(question: &str) -> String {
    const MAX_CHARS: usize = 64;
    let question = question.trim();
    if question.chars().count() <= MAX_CHARS {
        question.to_string()
    } else {
        let clipped: String = question.chars().take(MAX_CHARS).collect();
        format!("{}...", clipped.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::DataStoreConnectionManager;
    use crate::llm::{Completion, LlmError};
    use async_trait::async_trait;
    use r2d2::Pool;
    use serde_json::json;

    struct CannedCompletion(String);

    #[async_trait]
    impl Completion for CannedCompletion {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Ok(self.0.clone())
        }
    }

    fn fixture(name: &str, response: &str) -> QueryPipeline {
        let data_path = std::env::temp_dir().join(format!(
            "nl_sql_pipeline_data_{}_{}.db",
            name,
            std::process::id()
        ));
        let history_path = std::env::temp_dir().join(format!(
            "nl_sql_pipeline_history_{}_{}.db",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&data_path);
        let _ = std::fs::remove_file(data_path.with_extension("db.wal"));
        let _ = std::fs::remove_file(&history_path);
        let _ = std::fs::remove_file(history_path.with_extension("db.wal"));

        let manager = DataStoreConnectionManager::new(data_path.to_str().unwrap()).unwrap();
        let pool = Pool::builder().max_size(2).build(manager).unwrap();
        pool.get()
            .unwrap()
            .execute_batch(
                "CREATE TABLE Stores (StoreID TEXT, State TEXT);
                 INSERT INTO Stores VALUES
                     ('STO123', 'NY'), ('STO456', 'CA'), ('STO789', 'NY');",
            )
            .unwrap();

        let llm = Arc::new(LlmManager::with_provider(Box::new(CannedCompletion(
            response.to_string(),
        ))));
        let history = Arc::new(HistoryStore::new(history_path.to_str().unwrap()));

        QueryPipeline::new(
            SchemaInspector::new(pool.clone()),
            QueryExecutor::new(pool),
            llm,
            history,
            "test instructions".to_string(),
        )
    }

    async fn init_history(pipeline: &QueryPipeline) {
        pipeline.history.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn executes_the_synthesized_select_and_records_it() {
        let pipeline = fixture(
            "scenario_a",
            "Stores in New York are filtered by the NY state code.\n\
             ```sql\nSELECT * FROM Stores WHERE State = 'NY'\n```",
        );
        init_history(&pipeline).await;

        let outcome = pipeline
            .process("Show all stores in New York", Some("session-a".to_string()))
            .await
            .unwrap();

        assert_eq!(outcome.sql_query, "SELECT * FROM Stores WHERE State = 'NY'");
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome
            .results
            .iter()
            .all(|row| row["State"] == json!("NY")));
        assert_eq!(outcome.session_id, "session-a");

        let sessions = pipeline.history.all_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "session-a");
        assert_eq!(
            sessions[0].queries[0].natural_query,
            "Show all stores in New York"
        );
    }

    #[tokio::test]
    async fn rejects_write_statements_without_executing_or_recording() {
        let pipeline = fixture(
            "scenario_b",
            "Removing every product as requested.\n```sql\nDELETE FROM Products\n```",
        );
        init_history(&pipeline).await;

        let err = pipeline
            .process("Delete all products", None)
            .await
            .unwrap_err();
        match err {
            PipelineError::WriteOperationNotPermitted(keyword) => assert_eq!(keyword, "DELETE"),
            other => panic!("expected rejection, got {:?}", other),
        }

        assert!(pipeline.history.all_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn execution_failures_propagate_unrecorded() {
        let pipeline = fixture(
            "scenario_c",
            "```sql\nSELECT NoSuchColumn FROM Stores\n```",
        );
        init_history(&pipeline).await;

        let err = pipeline.process("Show stores", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::ExecutionError(_)));
        assert!(pipeline.history.all_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generates_distinct_sessions_when_none_supplied() {
        let pipeline = fixture(
            "scenario_d",
            "```sql\nSELECT * FROM Stores\n```",
        );
        init_history(&pipeline).await;

        let first = pipeline.process("Show stores", None).await.unwrap();
        let second = pipeline.process("Show stores", None).await.unwrap();
        assert_ne!(first.session_id, second.session_id);

        let sessions = pipeline.history.all_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);
    }

    #[tokio::test]
    async fn a_response_without_markers_never_reaches_execution() {
        let pipeline = fixture(
            "no_markers",
            "I cannot produce a query for that question.",
        );
        init_history(&pipeline).await;

        let err = pipeline.process("Show stores", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoStatementFound));
        assert!(pipeline.history.all_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn translate_does_not_execute_or_record() {
        let pipeline = fixture(
            "translate_only",
            "Explanation text.\n```sql\nSELECT * FROM Stores\n```",
        );
        init_history(&pipeline).await;

        let synthesis = pipeline.translate("Show stores").await.unwrap();
        assert_eq!(synthesis.statement, "SELECT * FROM Stores");
        assert!(pipeline.history.all_sessions().await.unwrap().is_empty());
    }

    #[test]
    fn titles_clip_long_questions() {
        let short = derive_title("Show stores");
        assert_eq!(short, "Show stores");

        let long_question = "words ".repeat(30);
        let title = derive_title(&long_question);
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= 64 + 3);
    }
}
