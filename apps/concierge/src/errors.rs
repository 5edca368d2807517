use thiserror::Error;

use crate::corpus::CorpusError;
use crate::generation::GenerationError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Every subcommand returns `Result<_, AppError>`; `main` reports it and exits non-zero.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Missing credential: environment variable '{0}' is not set")]
    MissingCredential(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Short machine-readable code, used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Corpus(_) => "CORPUS_ERROR",
            AppError::Llm(_) => "LLM_ERROR",
            AppError::Generation(_) => "GENERATION_ERROR",
            AppError::MissingCredential(_) => "MISSING_CREDENTIAL",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_message_names_variable() {
        let err = AppError::MissingCredential("OPENAI_API_KEY");
        assert_eq!(err.code(), "MISSING_CREDENTIAL");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_corpus_error_converts() {
        let err: AppError = CorpusError::CountMismatch {
            messages: 3,
            labels: 2,
        }
        .into();
        assert_eq!(err.code(), "CORPUS_ERROR");
        assert!(err.to_string().contains("3 messages but 2 labels"));
    }
}
