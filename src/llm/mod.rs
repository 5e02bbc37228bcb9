pub mod models;
pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use models::{SynthesisPrompt, SynthesisResult};
use std::error::Error;
use std::fmt;
use tracing::debug;

/// Opening marker of the fenced SQL block the instruction template demands.
pub const SQL_BLOCK_OPEN: &str = "```sql";
/// Closing marker.
pub const SQL_BLOCK_CLOSE: &str = "```";

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    /// The response carried no fenced SQL block.
    NoStatement,
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
            LlmError::NoStatement => write!(f, "no fenced SQL block in LLM response"),
        }
    }
}

impl Error for LlmError {}

/// A text-completion backend: one system + user conversation in, one
/// completion out. No streaming, no retries.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

/// Returns the interior of the first `open`..`close` fenced block in `text`,
/// trimmed. The first occurrence of `open` and the first occurrence of
/// `close` strictly after it win; nested or repeated blocks are not
/// supported. `None` when either marker is absent.
pub fn extract_fenced_block<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let end = text[start..].find(close)? + start;
    Some(text[start..end].trim())
}

pub struct LlmManager {
    provider: Box<dyn Completion>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider: Box<dyn Completion> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { provider })
    }

    /// Mostly for tests and embedding: wrap an already-built backend.
    pub fn with_provider(provider: Box<dyn Completion>) -> Self {
        Self { provider }
    }

    /// Sends the prompt once and extracts the SQL statement from the
    /// response. The full response text is kept verbatim as the
    /// explanation. A response without a well-formed, non-empty fenced
    /// block is a hard failure; callers must not execute anything.
    pub async fn synthesize(&self, prompt: &SynthesisPrompt) -> Result<SynthesisResult, LlmError> {
        let explanation = self.provider.complete(&prompt.system, &prompt.user).await?;
        debug!("LLM response: {}", explanation);

        let statement = extract_fenced_block(&explanation, SQL_BLOCK_OPEN, SQL_BLOCK_CLOSE)
            .filter(|sql| !sql.is_empty())
            .ok_or(LlmError::NoStatement)?
            .to_string();

        Ok(SynthesisResult {
            explanation,
            statement,
        })
    }
}
