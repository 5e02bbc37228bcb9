use crate::llm::LlmError;
use std::error::Error;
use std::fmt;

/// Failure taxonomy for a single query-translation request. Every fatal kind
/// is distinguishable by the HTTP layer; only `PersistenceError` is treated
/// as non-fatal by the orchestrator.
#[derive(Debug)]
pub enum PipelineError {
    /// The data store could not be reached for schema introspection or a
    /// connection checkout.
    StoreUnavailable(String),
    /// The question was blank after trimming.
    InvalidQuestion,
    /// The generation service was unreachable, timed out, or errored.
    SynthesisUnavailable(String),
    /// The model response contained no fenced SQL block.
    NoStatementFound,
    /// The safety gate rejected a non-SELECT statement; carries the leading
    /// keyword that was found.
    WriteOperationNotPermitted(String),
    /// The data store rejected the statement; carries the store diagnostic.
    ExecutionError(String),
    /// The history write could not be committed.
    PersistenceError(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::StoreUnavailable(msg) => write!(f, "data store unavailable: {}", msg),
            PipelineError::InvalidQuestion => write!(f, "question must not be empty"),
            PipelineError::SynthesisUnavailable(msg) => {
                write!(f, "generation service unavailable: {}", msg)
            }
            PipelineError::NoStatementFound => {
                write!(f, "no SQL statement found in model response")
            }
            PipelineError::WriteOperationNotPermitted(keyword) => write!(
                f,
                "only SELECT queries are allowed, statement begins with {}",
                keyword
            ),
            PipelineError::ExecutionError(msg) => write!(f, "SQL error: {}", msg),
            PipelineError::PersistenceError(msg) => write!(f, "history write failed: {}", msg),
        }
    }
}

impl Error for PipelineError {}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NoStatement => PipelineError::NoStatementFound,
            other => PipelineError::SynthesisUnavailable(other.to_string()),
        }
    }
}
