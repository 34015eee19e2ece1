use super::audit::{AuditTrailService, CaptureSource};
use crate::models::{Enrollment, Event, Transaction};
use crate::repositories::PaidTransition;
use crate::websocket::WebSocketServer;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Side effects that follow a committed store transition: structured logs,
/// the audit trail and the live seat feed.
///
/// Nothing here can fail the request; the state change already committed.
#[derive(Clone, Default)]
pub struct Notifier {
    feed: WebSocketServer,
    audit: Option<Arc<AuditTrailService>>,
}

impl Notifier {
    pub fn new(feed: WebSocketServer, audit: Option<Arc<AuditTrailService>>) -> Self {
        Self { feed, audit }
    }

    pub async fn order_created(&self, enrollment: &Enrollment, transaction: &Transaction) {
        info!(
            enrollment_id = %enrollment.id,
            transaction_id = %transaction.id,
            order_id = ?transaction.order_id,
            "Order attempt recorded"
        );
        if let Some(audit) = &self.audit {
            audit.log_order_created(enrollment, transaction).await;
        }
    }

    pub async fn capture(&self, transition: &PaidTransition, source: CaptureSource) {
        match transition {
            PaidTransition::Applied {
                enrollment,
                transaction,
                event,
            } => {
                info!(
                    enrollment_id = %enrollment.id,
                    event_id = %event.id,
                    enrolled_count = event.enrolled_count,
                    source = ?source,
                    "Enrollment paid"
                );
                if let Some(audit) = &self.audit {
                    audit.log_payment_captured(enrollment, transaction, source).await;
                }
                self.feed.broadcast_seats(event).await;
                self.feed
                    .broadcast_enrollment_confirmed(enrollment.id, event.id, enrollment.participant_id)
                    .await;
            }
            PaidTransition::AlreadyPaid { enrollment } => {
                info!(
                    enrollment_id = %enrollment.id,
                    source = ?source,
                    "Capture already applied"
                );
            }
            PaidTransition::SeatsExhausted {
                enrollment,
                transaction,
            } => {
                // Money was taken but no seat exists; an operator has to refund
                error!(
                    enrollment_id = %enrollment.id,
                    transaction_id = %transaction.id,
                    payment_id = ?transaction.payment_id,
                    source = ?source,
                    "Payment captured for a full event, refund required"
                );
                if let Some(audit) = &self.audit {
                    audit.log_seats_exhausted(enrollment, transaction).await;
                }
            }
            PaidTransition::Rejected { enrollment, reason } => {
                warn!(
                    enrollment_id = %enrollment.id,
                    reason = %reason,
                    source = ?source,
                    "Capture rejected"
                );
            }
        }
    }

    pub async fn refund(
        &self,
        transaction: &Transaction,
        organizer_id: Uuid,
        enrollment: Option<&Enrollment>,
        event: Option<&Event>,
    ) {
        info!(
            transaction_id = %transaction.id,
            refund_id = ?transaction.refund_id,
            seat_released = event.is_some(),
            "Refund completed"
        );
        if let Some(audit) = &self.audit {
            audit
                .log_refund_completed(transaction, organizer_id, event.is_some())
                .await;
        }
        if let Some(event) = event {
            self.feed.broadcast_seats(event).await;
        }
        if let Some(enrollment) = enrollment {
            self.feed
                .broadcast_enrollment_refunded(enrollment.id, enrollment.event_id, enrollment.participant_id)
                .await;
        }
    }
}
