//! Error types for the four-diagnosis engine.

use thiserror::Error;

use crate::feature::DiagnosisType;

#[derive(Error, Debug)]
pub enum SizhenError {
    /// A modality call failed on every attempt (network fault or timeout).
    #[error("{modality} adapter failed after {attempts} attempt(s): {message}")]
    TransientAdapter {
        modality: DiagnosisType,
        attempts: u32,
        message: String,
    },

    /// The modality is disabled, has no payload, or no adapter is wired for it.
    #[error("{modality} unavailable: {reason}")]
    ModalityUnavailable {
        modality: DiagnosisType,
        reason: String,
    },

    #[error("Analysis parse error: {0}")]
    AnalysisParse(String),

    #[error("Coordinator internal error: {0}")]
    Internal(String),

    #[error("Diagnostic service error: {0}")]
    Service(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SizhenError {
    /// Whether the failure is local to one modality and must not abort a coordination.
    pub fn is_modality_scoped(&self) -> bool {
        matches!(
            self,
            SizhenError::TransientAdapter { .. } | SizhenError::ModalityUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SizhenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_error_message_names_modality_and_attempts() {
        let err = SizhenError::TransientAdapter {
            modality: DiagnosisType::Palpation,
            attempts: 3,
            message: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "PALPATION adapter failed after 3 attempt(s): connection refused"
        );
        assert!(err.is_modality_scoped());
    }

    #[test]
    fn internal_error_is_not_modality_scoped() {
        assert!(!SizhenError::Internal("bad state".into()).is_modality_scoped());
        assert!(!SizhenError::AnalysisParse("empty".into()).is_modality_scoped());
    }
}
