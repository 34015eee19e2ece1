//! Payment verification, reached two ways.
//!
//! The client posts the checkout callback (`verify_payment`), and the gateway
//! independently posts a `payment.captured` webhook (`handle_payment_webhook`).
//! Either may arrive first, twice, or not at all; both funnel into the store's
//! mark-paid primitive so the end state does not depend on arrival order.

use super::audit::CaptureSource;
use super::notifier::Notifier;
use crate::error::{AppError, AppResult};
use crate::models::{Enrollment, EnrollmentStatus, PaymentCapture};
use crate::repositories::{EnrollmentStore, PaidTransition};
use crate::signature;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const PAYMENT_CAPTURED: &str = "payment.captured";

/// Outcome of a client verification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub enrollment_id: Uuid,
    pub status: EnrollmentStatus,
    /// True when an earlier capture had already settled this enrollment
    pub already_paid: bool,
}

/// What the webhook handler did with a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    AlreadyPaid,
    /// Not a `payment.captured` event
    Ignored,
    /// Body was not a payment event we could read
    Malformed,
    UnknownOrder,
    SeatsExhausted,
    Rejected,
    /// Storage failed; logged for follow-up
    Deferred,
}

/// Acknowledgement body; the gateway only cares about the 200
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    pub outcome: WebhookOutcome,
}

impl WebhookAck {
    fn new(outcome: WebhookOutcome) -> Self {
        Self { ok: true, outcome }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    #[serde(default)]
    payload: Option<WebhookPayload>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    payment: Option<PaymentWrapper>,
}

#[derive(Debug, Deserialize)]
struct PaymentWrapper {
    entity: PaymentEntity,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    order_id: Option<String>,
}

pub struct VerificationService {
    store: Arc<dyn EnrollmentStore>,
    notifier: Notifier,
    key_secret: String,
    webhook_secret: String,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        notifier: Notifier,
        key_secret: String,
        webhook_secret: String,
    ) -> Self {
        Self {
            store,
            notifier,
            key_secret,
            webhook_secret,
        }
    }

    /// Verify the client checkout callback and settle the enrollment
    pub async fn verify_payment(
        &self,
        participant_id: Uuid,
        enrollment_id: Uuid,
        payment_id: &str,
        order_id: &str,
        signature_hex: &str,
    ) -> AppResult<VerificationResult> {
        if payment_id.trim().is_empty() || order_id.trim().is_empty() || signature_hex.trim().is_empty() {
            return Err(AppError::Validation(
                "paymentId, orderId and signature are required".into(),
            ));
        }

        // Get Enrollment, hiding other participants' rows
        let enrollment = self
            .store
            .find_enrollment(enrollment_id)
            .await?
            .filter(|e| e.belongs_to(participant_id))
            .ok_or_else(|| AppError::NotFound("Enrollment not found".into()))?;

        if !signature::verify_payment_signature(&self.key_secret, order_id, payment_id, signature_hex) {
            warn!(enrollment_id = %enrollment.id, order_id = %order_id, "Payment signature mismatch");
            return Err(AppError::InvalidSignature("Payment signature mismatch".into()));
        }

        // The order must be one of this enrollment's attempts
        self.store
            .find_transaction_by_order(order_id)
            .await?
            .filter(|tx| tx.enrollment_id == enrollment.id)
            .ok_or_else(|| AppError::NotFound("Order not found for this enrollment".into()))?;

        let capture = PaymentCapture {
            enrollment_id: enrollment.id,
            order_id: Some(order_id.to_string()),
            payment_id: Some(payment_id.to_string()),
            signature: Some(signature_hex.to_string()),
        };
        let transition = self.store.mark_paid_if_not_already(&capture).await?;
        self.notifier.capture(&transition, CaptureSource::Client).await;

        match transition {
            PaidTransition::Applied { enrollment, .. } => Ok(VerificationResult {
                enrollment_id: enrollment.id,
                status: EnrollmentStatus::Paid,
                already_paid: false,
            }),
            PaidTransition::AlreadyPaid { enrollment } => {
                warn_if_second_capture(&enrollment, &capture);
                Ok(VerificationResult {
                    enrollment_id: enrollment.id,
                    status: EnrollmentStatus::Paid,
                    already_paid: true,
                })
            }
            PaidTransition::SeatsExhausted { enrollment, .. } => {
                Err(AppError::SeatsExhausted(enrollment.event_id))
            }
            PaidTransition::Rejected { reason, .. } => Err(AppError::Conflict(reason)),
        }
    }

    /// Handle a gateway webhook delivery.
    ///
    /// Only a missing or wrong signature is an error; everything past that
    /// point is acknowledged so the gateway does not retry.
    pub async fn handle_payment_webhook(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> AppResult<WebhookAck> {
        let Some(signature_hex) = signature_header.filter(|s| !s.trim().is_empty()) else {
            warn!("Webhook without signature header");
            return Err(AppError::InvalidSignature("Missing webhook signature".into()));
        };
        if !signature::verify_webhook_signature(&self.webhook_secret, raw_body, signature_hex) {
            warn!("Webhook signature mismatch");
            return Err(AppError::InvalidSignature("Webhook signature mismatch".into()));
        }

        let envelope: WebhookEnvelope = match serde_json::from_slice(raw_body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Unparseable webhook body");
                return Ok(WebhookAck::new(WebhookOutcome::Malformed));
            }
        };

        if envelope.event != PAYMENT_CAPTURED {
            info!(event = %envelope.event, "Ignoring webhook event");
            return Ok(WebhookAck::new(WebhookOutcome::Ignored));
        }

        let Some(payment) = envelope.payload.and_then(|p| p.payment).map(|p| p.entity) else {
            warn!("payment.captured webhook without payment entity");
            return Ok(WebhookAck::new(WebhookOutcome::Malformed));
        };
        let Some(order_id) = payment.order_id.filter(|o| !o.is_empty()) else {
            warn!(payment_id = %payment.id, "Captured payment has no order");
            return Ok(WebhookAck::new(WebhookOutcome::Malformed));
        };

        let outcome = match self.settle_webhook_capture(&order_id, &payment.id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(order_id = %order_id, payment_id = %payment.id, error = %e, "Webhook processing failed");
                WebhookOutcome::Deferred
            }
        };

        Ok(WebhookAck::new(outcome))
    }

    async fn settle_webhook_capture(&self, order_id: &str, payment_id: &str) -> AppResult<WebhookOutcome> {
        // Resolve through the transaction; a retry may have moved the
        // enrollment's own order reference on
        let Some(transaction) = self.store.find_transaction_by_order(order_id).await? else {
            warn!(order_id = %order_id, "Webhook for unknown order");
            return Ok(WebhookOutcome::UnknownOrder);
        };

        let capture = PaymentCapture {
            enrollment_id: transaction.enrollment_id,
            order_id: Some(order_id.to_string()),
            payment_id: Some(payment_id.to_string()),
            signature: None,
        };
        let transition = self.store.mark_paid_if_not_already(&capture).await?;
        self.notifier.capture(&transition, CaptureSource::Webhook).await;

        Ok(match transition {
            PaidTransition::Applied { .. } => WebhookOutcome::Applied,
            PaidTransition::AlreadyPaid { enrollment } => {
                warn_if_second_capture(&enrollment, &capture);
                WebhookOutcome::AlreadyPaid
            }
            PaidTransition::SeatsExhausted { .. } => WebhookOutcome::SeatsExhausted,
            PaidTransition::Rejected { .. } => WebhookOutcome::Rejected,
        })
    }
}

/// A paid enrollment receiving a capture for a different order means the
/// participant paid twice
fn warn_if_second_capture(enrollment: &Enrollment, capture: &PaymentCapture) {
    if capture.order_id.is_some() && enrollment.order_id != capture.order_id {
        warn!(
            enrollment_id = %enrollment.id,
            paid_order = ?enrollment.order_id,
            captured_order = ?capture.order_id,
            "Second payment captured for a paid enrollment, refund required"
        );
    }
}
