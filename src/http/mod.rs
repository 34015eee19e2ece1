//! REST surface of the enrollment core.

pub mod enrollments;
pub mod error;
pub mod extract;
pub mod reports;
pub mod webhooks;

pub use error::{ApiError, Audience};
pub use extract::{AuthUser, RequireAdmin, RequireOrganizer, RequireParticipant};

use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /health/ready`
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let Some(database) = &state.database else {
        return (StatusCode::OK, Json(json!({ "status": "ready", "database": "none" })));
    };

    match database.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready", "database": "ok" }))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "database": "error" })),
            )
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/enrollments", get(enrollments::list_enrollments))
        .route("/enrollments/:id", post(enrollments::request_enrollment))
        .route("/enrollments/:id/verify", post(enrollments::verify_payment))
        .route("/webhooks/payment-captured", post(webhooks::payment_captured))
        .route("/organizer/payments", get(reports::organizer_payments))
        .route(
            "/organizer/payments/:transaction_id/refund",
            post(reports::refund_transaction),
        )
        .route("/organizer/events/:event_id/attendees", get(reports::event_attendees))
        .route(
            "/organizer/events/:event_id/seat-ledger",
            get(reports::organizer_seat_ledger),
        )
        .route("/admin/transactions", get(reports::admin_transactions))
        .route("/admin/events/:event_id/seat-ledger", get(reports::admin_seat_ledger))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
