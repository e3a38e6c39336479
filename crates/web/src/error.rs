use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use storage::error::{LedgerError, StorageError};
use validator::{ValidationErrors, ValidationErrorsKind};

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Ledger(LedgerError),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ledger(e) => write!(f, "{}", e),
        }
    }
}

impl WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Ledger(error) => match error {
                LedgerError::Validation(_) | LedgerError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                LedgerError::ScoreMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                LedgerError::WorkoutNotFound(_)
                | LedgerError::ScoreNotFound(_)
                | LedgerError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
                LedgerError::ConcurrencyConflict { .. }
                | LedgerError::Storage(StorageError::Conflict(_))
                | LedgerError::Storage(StorageError::ConstraintViolation(_)) => {
                    StatusCode::CONFLICT
                }
                LedgerError::InvariantViolation(_) | LedgerError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let body = match &self {
            Self::Ledger(LedgerError::Validation(errors)) => {
                let mut field_errors = Vec::new();
                collect_field_errors("", errors, &mut field_errors);

                json!({
                    "error": "Validation failed",
                    "details": field_errors
                })
            }
            Self::Ledger(LedgerError::Storage(StorageError::NotFound)) => {
                json!({
                    "error": "Resource not found"
                })
            }
            Self::Ledger(LedgerError::ConcurrencyConflict { attempts }) => {
                tracing::warn!("Request gave up after {} conflicting attempt(s)", attempts);
                json!({
                    "error": "The score is being changed concurrently, try again",
                    "attempts": attempts
                })
            }
            Self::Ledger(error) if status_code == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("Internal error: {:?}", error);
                json!({
                    "error": "An internal error occurred"
                })
            }
            Self::Ledger(error) => {
                json!({
                    "error": error.to_string()
                })
            }
        };

        (status_code, Json(body)).into_response()
    }
}

/// Flattens nested validation errors into `path: message` lines.
fn collect_field_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(errors) => {
                out.extend(errors.iter().map(|e| {
                    format!(
                        "{}: {}",
                        path,
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    )
                }));
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_field_errors(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

impl From<LedgerError> for WebError {
    fn from(error: LedgerError) -> Self {
        Self::Ledger(error)
    }
}

pub type WebResult<T> = Result<T, WebError>;
