use super::error::ApiError;
use super::extract::RequireParticipant;
use crate::models::EnrollmentWithEvent;
use crate::services::{EnrollmentResult, VerificationResult};
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct EnrollmentList {
    pub data: Vec<EnrollmentWithEvent>,
}

/// Client checkout callback body; missing fields are rejected by the service
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyPaymentBody {
    pub payment_id: String,
    pub order_id: String,
    pub signature: String,
}

/// `POST /enrollments/:id` where `id` is the event
pub async fn request_enrollment(
    State(state): State<AppState>,
    RequireParticipant(user): RequireParticipant,
    Path(event_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnrollmentResult>), ApiError> {
    let result = state.enrollments.request_enrollment(user.id, event_id).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// `GET /enrollments`
pub async fn list_enrollments(
    State(state): State<AppState>,
    RequireParticipant(user): RequireParticipant,
) -> Result<Json<EnrollmentList>, ApiError> {
    let data = state.enrollments.list_enrollments(user.id).await?;
    Ok(Json(EnrollmentList { data }))
}

/// `POST /enrollments/:id/verify`
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireParticipant(user): RequireParticipant,
    Path(enrollment_id): Path<Uuid>,
    Json(body): Json<VerifyPaymentBody>,
) -> Result<Json<VerificationResult>, ApiError> {
    let result = state
        .verification
        .verify_payment(
            user.id,
            enrollment_id,
            &body.payment_id,
            &body.order_id,
            &body.signature,
        )
        .await?;
    Ok(Json(result))
}
