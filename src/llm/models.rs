use serde::{Deserialize, Serialize};

/// A fully assembled prompt for one synthesis request. Immutable and
/// request-scoped; the schema text inside `user` is re-read from the data
/// store for every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisPrompt {
    /// The instruction template (policy configuration).
    pub system: String,
    /// Schema description plus the user's question.
    pub user: String,
}

/// What came back from the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// The full model response, verbatim.
    pub explanation: String,
    /// The SQL statement extracted from the first fenced block, trimmed.
    /// Never empty.
    pub statement: String,
}
