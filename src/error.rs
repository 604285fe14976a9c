//! Error types for the library server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Stable numeric error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    StoreFailure = 3,
    NoSuchMember = 4,
    NoSuchBook = 5,
    BookOutOfStock = 7,
    Duplicate = 8,
    DebtLimitExceeded = 11,
    AlreadyReturned = 13,
    BadValue = 18,
    NoSuchTransaction = 20,
}

/// Kind of record an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Book,
    Member,
    Transaction,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Entity::Book => "Book",
            Entity::Member => "Member",
            Entity::Transaction => "Transaction",
        };
        write!(f, "{}", label)
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("Book {book_id} is out of stock")]
    OutOfStock { book_id: Uuid },

    #[error("Member {member_id} owes {debt}, which meets the debt ceiling of {ceiling}")]
    DebtLimitExceeded {
        member_id: Uuid,
        debt: Decimal,
        ceiling: Decimal,
    },

    #[error("Transaction {transaction_id} has already been returned")]
    AlreadyReturned { transaction_id: Uuid },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: Entity, id: Uuid) -> Self {
        AppError::NotFound { entity, id }
    }

    /// HTTP status and error code for this error
    pub fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::NotFound { entity, .. } => {
                let code = match entity {
                    Entity::Book => ErrorCode::NoSuchBook,
                    Entity::Member => ErrorCode::NoSuchMember,
                    Entity::Transaction => ErrorCode::NoSuchTransaction,
                };
                (StatusCode::NOT_FOUND, code)
            }
            AppError::OutOfStock { .. } => (StatusCode::CONFLICT, ErrorCode::BookOutOfStock),
            AppError::DebtLimitExceeded { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::DebtLimitExceeded)
            }
            AppError::AlreadyReturned { .. } => (StatusCode::CONFLICT, ErrorCode::AlreadyReturned),
            AppError::StoreUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::StoreFailure)
            }
            AppError::Validation(_) | AppError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue)
            }
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = e {
            // 23505 unique_violation, 23503 foreign_key_violation
            match db.code().as_deref() {
                Some("23505") => {
                    return AppError::Conflict(format!("Duplicate value: {}", db.message()))
                }
                Some("23503") => {
                    return AppError::Conflict("Record is still referenced by transactions".to_string())
                }
                _ => {}
            }
        }
        tracing::error!("Database error: {:?}", e);
        AppError::StoreUnavailable(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::StoreUnavailable(_) => "Store unavailable".to_string(),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
