use crate::database::DatabaseError;
use crate::payment_gateway::GatewayError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Event, enrollment or transaction absent, or not owned by the caller
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing or invalid caller identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Authenticity check failed on a payment verification path
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Event capacity reached
    #[error("No seats available for event {0}")]
    SeatsExhausted(uuid::Uuid),

    /// Refund attempted without a captured payment
    #[error("No payment to refund for transaction {0}")]
    NoPaymentToRefund(uuid::Uuid),

    /// State conflict, e.g. enrolling twice in the same event
    #[error("Conflict: {0}")]
    Conflict(String),

    /// External payment provider call failed
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// UUID parsing errors
    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Check if error is a database connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::PoolCreation(_))
                | AppError::Database(DatabaseError::ConnectionTimeout)
        )
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::Validation(_) | AppError::InvalidUuid(_) => 400,
            AppError::InvalidSignature(_) => 400,
            AppError::NoPaymentToRefund(_) => 400,
            AppError::SeatsExhausted(_) | AppError::Conflict(_) => 409,
            AppError::Gateway(_) => 502,
            AppError::Config(_) => 500,
            AppError::Database(_) | AppError::Sqlx(_) => 500,
            _ => 500,
        }
    }

    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation(_) | AppError::InvalidUuid(_) => "VALIDATION_ERROR",
            AppError::InvalidSignature(_) => "INVALID_SIGNATURE",
            AppError::SeatsExhausted(_) => "SEATS_EXHAUSTED",
            AppError::NoPaymentToRefund(_) => "NO_PAYMENT_TO_REFUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Gateway(_) => "GATEWAY_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored value could not be decoded into a domain type
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Conflict(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InvalidInput(msg) => AppError::Validation(msg),
            RepositoryError::Corrupt(msg) => AppError::Message(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                // Check for common PostgreSQL error codes
                let code = db_err.code().map(|c| c.to_string());
                if code.as_deref() == Some("23505") {
                    // Unique violation
                    RepositoryError::Duplicate(db_err.message().to_string())
                } else if code.as_deref() == Some("23503") {
                    // Foreign key violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else if code.as_deref() == Some("23514") {
                    // Check constraint violation
                    RepositoryError::ConstraintViolation(db_err.message().to_string())
                } else {
                    RepositoryError::Query(err)
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

/// Convenience function to convert Option<T> to Result<T, AppError>
pub fn option_to_result<T>(opt: Option<T>, error_msg: &str) -> AppResult<T> {
    opt.ok_or_else(|| AppError::NotFound(error_msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes_follow_taxonomy() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::InvalidSignature("x".into()).status_code(), 400);
        assert_eq!(AppError::SeatsExhausted(Uuid::nil()).status_code(), 409);
        assert_eq!(AppError::NoPaymentToRefund(Uuid::nil()).status_code(), 400);
        assert_eq!(AppError::Gateway(GatewayError::Timeout).status_code(), 502);
        assert_eq!(AppError::Validation("x".into()).status_code(), 400);
    }

    #[test]
    fn test_repository_duplicate_becomes_conflict() {
        let err: AppError = RepositoryError::Duplicate("enrollments_pair".into()).into();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn test_option_to_result() {
        let missing: Option<u8> = None;
        let err = option_to_result(missing, "Enrollment not found").unwrap_err();
        assert!(err.is_not_found());
    }
}
