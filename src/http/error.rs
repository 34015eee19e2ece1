use crate::error::AppError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Who reads the error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Participants get terse messages without provider detail
    Participant,
    /// Organizers and admins see gateway error text
    Operator,
}

/// HTTP wrapper around [`AppError`]
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub audience: Audience,
}

impl ApiError {
    pub fn for_operator(error: AppError) -> Self {
        Self {
            error,
            audience: Audience::Operator,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        Self {
            error,
            audience: Audience::Participant,
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if status.is_server_error() && !matches!(self.error, AppError::Gateway(_)) {
            tracing::error!(
                status = %status,
                code = self.error.code(),
                error = %self.error,
                "Internal server error"
            );
            "Internal server error".to_string()
        } else {
            match (&self.error, self.audience) {
                (AppError::Gateway(e), Audience::Operator) => format!("Payment gateway error: {}", e),
                (AppError::Gateway(e), Audience::Participant) => {
                    tracing::warn!(error = %e, "Payment gateway error");
                    "Payment provider unavailable, please retry".to_string()
                }
                (error, _) => error.to_string(),
            }
        };

        let body = ErrorResponse {
            code: self.error.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment_gateway::GatewayError;

    fn rejected() -> AppError {
        AppError::Gateway(GatewayError::Rejected {
            status: 400,
            body: "BAD_REQUEST_ERROR: payment already refunded".into(),
        })
    }

    async fn body_of(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_gateway_detail_hidden_from_participants() {
        let (status, body) = body_of(ApiError::from(rejected())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "GATEWAY_ERROR");
        assert_eq!(body["message"], "Payment provider unavailable, please retry");
    }

    #[tokio::test]
    async fn test_operator_sees_gateway_detail() {
        let err = ApiError::for_operator(rejected());
        assert_eq!(err.audience, Audience::Operator);

        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let message = body["message"].as_str().unwrap();
        assert!(message.starts_with("Payment gateway error: "));
        assert!(message.contains("BAD_REQUEST_ERROR: payment already refunded"));
    }

    #[tokio::test]
    async fn test_other_server_errors_are_masked() {
        let (status, body) = body_of(ApiError::for_operator(AppError::Message("pool exploded".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }

    #[test]
    fn test_seats_exhausted_is_conflict() {
        let response = ApiError::from(AppError::SeatsExhausted(uuid::Uuid::nil())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
