use thiserror::Error;

/// Failure of a call to the text-generation service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] async_openai::error::OpenAIError),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Errors surfaced by the summarization pipeline.
///
/// A `Summarizer` failure never moves the bookmark, so the same window is
/// offered again on the next request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("summarization failed: {0}")]
    Summarizer(#[from] LlmError),

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub fn is_summarizer(&self) -> bool {
        matches!(self, PipelineError::Summarizer(_))
    }
}
