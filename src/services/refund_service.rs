use super::notifier::Notifier;
use crate::error::{AppError, AppResult};
use crate::models::{to_minor_units, Transaction};
use crate::payment_gateway::{GatewayError, PaymentGateway};
use crate::repositories::{EnrollmentStore, RefundCompletion};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Service for organizer-initiated refunds
pub struct RefundService {
    store: Arc<dyn EnrollmentStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Notifier,
    gateway_timeout: Duration,
    release_seat: bool,
}

impl RefundService {
    pub fn new(
        store: Arc<dyn EnrollmentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
        gateway_timeout: Duration,
        release_seat: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            gateway_timeout,
            release_seat,
        }
    }

    /// Refund a captured transaction of one of the organizer's events.
    ///
    /// Besides paid transactions this covers captures that failed for lack of
    /// a seat, which hold the participant's money without an enrollment.
    pub async fn refund_transaction(
        &self,
        transaction_id: Uuid,
        organizer_id: Uuid,
    ) -> AppResult<Transaction> {
        info!(transaction_id = %transaction_id, organizer_id = %organizer_id, "Refund requested");

        // Get Transaction
        let transaction = self
            .store
            .find_transaction(transaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;

        // Ownership goes through the event, not the denormalized column
        let owned = self
            .store
            .find_event(transaction.event_id)
            .await?
            .map_or(false, |event| event.organizer_id == organizer_id);
        if !owned || !transaction.is_refundable() {
            return Err(AppError::NotFound("Transaction not found".into()));
        }

        let payment_id = transaction
            .payment_id
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(AppError::NoPaymentToRefund(transaction.id))?;

        let amount_minor = to_minor_units(transaction.amount)
            .ok_or_else(|| AppError::Validation("Invalid transaction amount".into()))?;

        // Refund with the gateway; on failure the transaction is left as is
        let refund_id = tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.refund(payment_id, amount_minor),
        )
        .await
        .map_err(|_| GatewayError::Timeout)?
        .map_err(|e| {
            warn!(transaction_id = %transaction.id, error = %e, "Gateway refund failed");
            e
        })?;

        match self
            .store
            .complete_refund(transaction.id, &refund_id, self.release_seat)
            .await?
        {
            RefundCompletion::Completed {
                transaction,
                enrollment,
                event,
            } => {
                self.notifier
                    .refund(&transaction, organizer_id, enrollment.as_ref(), event.as_ref())
                    .await;
                Ok(transaction)
            }
            RefundCompletion::NotPaid { transaction } => {
                // A concurrent refund won; the gateway refund above is a duplicate
                warn!(
                    transaction_id = %transaction.id,
                    status = %transaction.status,
                    refund_id = %refund_id,
                    "Transaction no longer refundable after gateway refund"
                );
                Ok(transaction)
            }
        }
    }
}
