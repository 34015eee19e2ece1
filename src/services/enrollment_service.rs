use super::audit::CaptureSource;
use super::notifier::Notifier;
use crate::error::{AppError, AppResult};
use crate::models::{
    to_minor_units, Enrollment, EnrollmentStatus, EnrollmentWithEvent, Event, NewTransaction,
    PaymentCapture, Transaction,
};
use crate::payment_gateway::{GatewayError, GatewayOrder, PaymentGateway};
use crate::repositories::{EnrollmentStore, PaidTransition};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Service that turns an enroll request into a pending enrollment with an
/// open payment attempt (or, for free events, straight into a paid one)
pub struct EnrollmentService {
    store: Arc<dyn EnrollmentStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Notifier,
    currency: String,
    gateway_timeout: Duration,
}

/// Response to an enroll request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResult {
    /// Absent for free events
    pub order: Option<GatewayOrder>,
    pub enrollment_id: Uuid,
    pub transaction_id: Uuid,
    pub status: EnrollmentStatus,
}

/// Receipt reference sent to the gateway; kept under its 40 character limit
pub fn receipt_for(enrollment_id: Uuid) -> String {
    format!("enr_{}", enrollment_id.simple())
}

impl EnrollmentService {
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
        currency: String,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            currency,
            gateway_timeout,
        }
    }

    /// Request enrollment in an event
    pub async fn request_enrollment(
        &self,
        participant_id: Uuid,
        event_id: Uuid,
    ) -> AppResult<EnrollmentResult> {
        info!(participant_id = %participant_id, event_id = %event_id, "Enrollment requested");

        // Get Event
        let event = self
            .store
            .find_event(event_id)
            .await?
            .filter(Event::is_published)
            .ok_or_else(|| AppError::NotFound("Event not available".into()))?;

        // Reuse or create the (participant, event) row
        let enrollment = self
            .store
            .upsert_pending_enrollment(participant_id, event_id)
            .await?;

        match enrollment.status_enum() {
            Some(EnrollmentStatus::Pending) => {}
            Some(EnrollmentStatus::Paid) => {
                return Err(AppError::Conflict("Already enrolled in this event".into()))
            }
            _ => {
                return Err(AppError::Conflict(format!(
                    "Enrollment is {} and cannot be reopened",
                    enrollment.status
                )))
            }
        }

        // Advisory only; the seat is taken when payment is captured
        if event.is_full() {
            return Err(AppError::SeatsExhausted(event.id));
        }

        if event.is_free() {
            return self.enroll_free(&event, enrollment).await;
        }

        self.open_order(&event, enrollment).await
    }

    async fn enroll_free(&self, event: &Event, enrollment: Enrollment) -> AppResult<EnrollmentResult> {
        let attempt = self.new_attempt(event, &enrollment, Decimal::ZERO, None);
        let (enrollment, transaction) = self.attach(attempt).await?;

        let transition = self
            .store
            .mark_paid_if_not_already(&PaymentCapture::free(enrollment.id))
            .await?;
        self.notifier.capture(&transition, CaptureSource::Free).await;

        match transition {
            PaidTransition::Applied { .. } | PaidTransition::AlreadyPaid { .. } => Ok(EnrollmentResult {
                order: None,
                enrollment_id: enrollment.id,
                transaction_id: transaction.id,
                status: EnrollmentStatus::Paid,
            }),
            PaidTransition::SeatsExhausted { .. } => Err(AppError::SeatsExhausted(event.id)),
            PaidTransition::Rejected { reason, .. } => Err(AppError::Conflict(reason)),
        }
    }

    async fn open_order(&self, event: &Event, enrollment: Enrollment) -> AppResult<EnrollmentResult> {
        let amount_minor = to_minor_units(event.enrollment_fee)
            .ok_or_else(|| AppError::Validation("Invalid enrollment fee".into()))?;

        // Create order with the gateway, outside any store transaction
        let receipt = receipt_for(enrollment.id);
        let order = tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.create_order(amount_minor, &self.currency, &receipt),
        )
        .await
        .map_err(|_| GatewayError::Timeout)?
        .map_err(|e| {
            warn!(enrollment_id = %enrollment.id, error = %e, "Order creation failed");
            e
        })?;

        let attempt = self.new_attempt(event, &enrollment, event.enrollment_fee, Some(order.id.clone()));
        let (enrollment, transaction) = self.attach(attempt).await?;
        self.notifier.order_created(&enrollment, &transaction).await;

        Ok(EnrollmentResult {
            order: Some(order),
            enrollment_id: enrollment.id,
            transaction_id: transaction.id,
            status: EnrollmentStatus::Pending,
        })
    }

    fn new_attempt(
        &self,
        event: &Event,
        enrollment: &Enrollment,
        amount: Decimal,
        order_id: Option<String>,
    ) -> NewTransaction {
        NewTransaction {
            participant_id: enrollment.participant_id,
            organizer_id: event.organizer_id,
            event_id: event.id,
            enrollment_id: enrollment.id,
            amount,
            currency: self.currency.clone(),
            order_id,
        }
    }

    async fn attach(&self, attempt: NewTransaction) -> AppResult<(Enrollment, Transaction)> {
        self.store
            .attach_order_attempt(attempt)
            .await?
            // Paid by a concurrent request between upsert and attach
            .ok_or_else(|| AppError::Conflict("Already enrolled in this event".into()))
    }

    /// List a participant's enrollments
    pub async fn list_enrollments(&self, participant_id: Uuid) -> AppResult<Vec<EnrollmentWithEvent>> {
        Ok(self
            .store
            .list_enrollments_for_participant(participant_id)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_fits_gateway_limit() {
        let receipt = receipt_for(Uuid::new_v4());
        assert!(receipt.len() <= 40);
        assert!(receipt.starts_with("enr_"));
    }
}
