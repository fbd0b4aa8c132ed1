use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Field-level validation failures, keyed by request field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_entries(self) -> impl Iterator<Item = (String, Vec<String>)> {
        self.0.into_iter()
    }

    /// Ok when nothing was recorded, otherwise a `Validation` error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Database(anyhow::Error),
    DatabaseError(String),
    NotFound(String),
    BadRequest(String),
    SelfReference(String),
    Internal(String),
    Validation(FieldErrors),
    Unauthorized(String),
}

pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::SelfReference(msg) => write!(f, "Self reference: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Validation(errors) => {
                write!(f, "Validation failed on {} field(s)", errors.0.len())
            }
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::SelfReference(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, errors) = match self {
            AppError::Database(err) => {
                tracing::error!("Database error: {:#}", err);
                (UNEXPECTED_ERROR_MESSAGE.to_string(), json!({}))
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (UNEXPECTED_ERROR_MESSAGE.to_string(), json!({}))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (UNEXPECTED_ERROR_MESSAGE.to_string(), json!({}))
            }
            AppError::Validation(errors) => ("Validation failed".to_string(), json!(errors)),
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::SelfReference(msg)
            | AppError::Unauthorized(msg) => (msg, json!({})),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "errors": errors,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::Validation(FieldErrors::single("email", "taken")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::SelfReference("nope".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("post".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::DatabaseError("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_field_errors_accumulate() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("password", "too short");
        errors.add("password", "must be confirmed");
        assert_eq!(errors.get("password").map(|m| m.len()), Some(2));
        assert!(matches!(
            errors.into_result(),
            Err(AppError::Validation(_))
        ));
    }
}
