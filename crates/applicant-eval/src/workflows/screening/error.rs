use serde::Serialize;

use super::composite::RatioError;
use super::repository::{CatalogError, EvaluatorError, StoreError};
use super::session::SessionError;

/// Failure taxonomy surfaced by the screening workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ScreeningError {
    /// Candidate or template missing; callers show an empty state.
    #[error("not found: {0}")]
    NotFound(String),
    /// A criteria document could not be read; scoped to that document.
    #[error("parse error: {0}")]
    Parse(String),
    /// Network or store failure; state is kept and the call can be retried.
    #[error("temporarily unavailable: {0}")]
    Transient(String),
    /// Input outside its domain; rejected without side effects.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ScreeningError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ScreeningError::Transient(_))
    }

    /// Keeps the catalog failure kind while letting the caller choose the message.
    fn from_catalog_kind(cause: &CatalogError, message: String) -> Self {
        match cause {
            CatalogError::NotFound(_) => Self::NotFound(message),
            CatalogError::Parse { .. } => Self::Parse(message),
            CatalogError::InvalidName(_) => Self::Validation(message),
            CatalogError::Unavailable(_) => Self::Transient(message),
        }
    }
}

impl From<StoreError> for ScreeningError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => Self::NotFound("candidate record".to_string()),
            StoreError::Conflict(detail) => Self::Conflict(detail),
            StoreError::Unavailable(detail) => Self::Transient(detail),
        }
    }
}

impl From<CatalogError> for ScreeningError {
    fn from(value: CatalogError) -> Self {
        let message = value.to_string();
        Self::from_catalog_kind(&value, message)
    }
}

impl From<EvaluatorError> for ScreeningError {
    fn from(value: EvaluatorError) -> Self {
        match &value {
            EvaluatorError::Rejected(_) => Self::Validation(value.to_string()),
            EvaluatorError::Unavailable(_) => Self::Transient(value.to_string()),
        }
    }
}

impl From<RatioError> for ScreeningError {
    fn from(value: RatioError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<SessionError> for ScreeningError {
    fn from(value: SessionError) -> Self {
        match &value {
            SessionError::TemplateUnavailable { cause, .. } => {
                Self::from_catalog_kind(cause, value.to_string())
            }
            SessionError::ItemOutOfRange { .. } => Self::Validation(value.to_string()),
        }
    }
}
