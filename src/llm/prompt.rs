use crate::error::PipelineError;
use crate::llm::models::SynthesisPrompt;

/// Default instruction template. This is policy configuration, not logic:
/// the permitted statement kind, the required output shape, and the domain
/// literal conventions all live here so they can be swapped via
/// `[prompt] instructions` without touching code.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are a SQL query converter.
Create queries according to the provided schema and use exact table and column names.
Case sensitivity in requests doesn't matter.
Adhere to these rules:
- Only SELECT statements are permitted. Never produce INSERT, UPDATE, DELETE, DROP, ALTER or any other statement that modifies data or schema.
- Respond with a short natural-language explanation of how the query answers the question, followed by exactly one SQL code block delimited by ```sql and ```.
- Use UPPERCASE for all SQL keywords and proper indentation.
- When the user names a US state in full, normalize it to its two-letter code (for example New York becomes 'NY').
- Store identifiers are stored with the STO prefix; when the user supplies a bare numeric store id, prefix it (store 123 is 'STO123')."#;

/// Combines the instruction template, the rendered schema and the user's
/// question into a prompt. Pure; the only failure mode is a blank question.
pub fn build_prompt(
    instructions: &str,
    schema: &str,
    question: &str,
) -> Result<SynthesisPrompt, PipelineError> {
    if question.trim().is_empty() {
        return Err(PipelineError::InvalidQuestion);
    }

    Ok(SynthesisPrompt {
        system: instructions.to_string(),
        user: format!("Database Schema:\n{}\n\nUser Query:\n{}", schema, question),
    })
}
