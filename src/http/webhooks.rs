use super::error::ApiError;
use crate::services::WebhookAck;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;

/// Header names the gateway signs deliveries under, in lookup order
pub const SIGNATURE_HEADERS: [&str; 2] = ["x-razorpay-signature", "x-signature"];

fn signature_header(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
}

/// `POST /webhooks/payment-captured`
///
/// Takes the body as raw bytes; the signature covers them exactly.
pub async fn payment_captured(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let ack = state
        .verification
        .handle_payment_webhook(&body, signature_header(&headers))
        .await?;
    Ok(Json(ack))
}
