use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Maps a query error on `what` to 404 / 409 where the row state explains it.
    pub fn from_db(err: sqlx::Error, what: impl Into<String>) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound(what.into()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("{} already exists", what.into()))
            }
            other => AppError::Database(other),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::Conflict(what) => AppError::Conflict(what),
            RepositoryError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = AppError::Validation("Invalid input".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_database_error_status_code() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_conflict_error_status_code() {
        let error = AppError::Conflict("already settled".to_string());
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_insufficient_funds_status_code() {
        let error = AppError::InsufficientFunds("balance 10 < 30".to_string());
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("Unauthorized access".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error = AppError::from_db(sqlx::Error::RowNotFound, "Wallet 42");
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_string(), "Not found: Wallet 42");
    }

    #[test]
    fn test_repository_errors_map_to_app_errors() {
        let missing: AppError = RepositoryError::NotFound("wallet 1".to_string()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let conflict: AppError = RepositoryError::Conflict("ledger entry".to_string()).into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("Transaction not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_database_error_response() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
