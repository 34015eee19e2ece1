//! The enrollment store seam.
//!
//! Every multi-record state change the enrollment core performs goes through
//! one of the atomic primitives below. Implementations must apply each
//! primitive as a single unit: either all of its writes land or none do, and
//! concurrent callers observe them serially.

use crate::error::RepositoryError;
use crate::models::{
    Enrollment, EnrollmentWithEvent, Event, NewTransaction, Page, PaymentCapture, SeatLedger,
    Transaction, TransactionFilter, User,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Outcome of [`EnrollmentStore::mark_paid_if_not_already`]
#[derive(Debug, Clone)]
pub enum PaidTransition {
    /// This call moved the enrollment to paid and took a seat
    Applied {
        enrollment: Enrollment,
        transaction: Transaction,
        event: Event,
    },
    /// Someone else already applied the capture; nothing changed
    AlreadyPaid { enrollment: Enrollment },
    /// No seat was left; the transaction is marked failed
    SeatsExhausted {
        enrollment: Enrollment,
        transaction: Transaction,
    },
    /// The enrollment is not pending, or the capture names no open order
    Rejected {
        enrollment: Enrollment,
        reason: String,
    },
}

impl PaidTransition {
    pub fn enrollment(&self) -> &Enrollment {
        match self {
            PaidTransition::Applied { enrollment, .. }
            | PaidTransition::AlreadyPaid { enrollment }
            | PaidTransition::SeatsExhausted { enrollment, .. }
            | PaidTransition::Rejected { enrollment, .. } => enrollment,
        }
    }
}

/// Outcome of [`EnrollmentStore::complete_refund`]
#[derive(Debug, Clone)]
pub enum RefundCompletion {
    Completed {
        transaction: Transaction,
        /// Set when the refund also rolled the enrollment back
        enrollment: Option<Enrollment>,
        event: Option<Event>,
    },
    /// Nothing left to refund once we got the lock
    NotPaid { transaction: Transaction },
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, RepositoryError>;

    async fn find_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>, RepositoryError>;

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, RepositoryError>;

    async fn find_transaction_by_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, RepositoryError>;

    /// Return the (participant, event) enrollment, creating it pending if absent
    async fn upsert_pending_enrollment(
        &self,
        participant_id: Uuid,
        event_id: Uuid,
    ) -> Result<Enrollment, RepositoryError>;

    /// Open a `created` transaction and point the enrollment at its order.
    ///
    /// Returns `None` without writing anything when the enrollment is no
    /// longer pending.
    async fn attach_order_attempt(
        &self,
        new: NewTransaction,
    ) -> Result<Option<(Enrollment, Transaction)>, RepositoryError>;

    /// The single pending -> paid transition, including the seat take.
    ///
    /// # Errors
    ///
    /// `RepositoryError::NotFound` if the enrollment does not exist
    async fn mark_paid_if_not_already(
        &self,
        capture: &PaymentCapture,
    ) -> Result<PaidTransition, RepositoryError>;

    /// Record a gateway refund on a paid transaction, optionally rolling back
    /// the enrollment and freeing its seat in the same unit. A failed capture
    /// can be refunded too; it only moves the transaction to `refunded`.
    async fn complete_refund(
        &self,
        transaction_id: Uuid,
        refund_id: &str,
        release_seat: bool,
    ) -> Result<RefundCompletion, RepositoryError>;

    async fn list_enrollments_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<EnrollmentWithEvent>, RepositoryError>;

    async fn list_paid_enrollments(&self, event_id: Uuid) -> Result<Vec<Enrollment>, RepositoryError>;

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Page<Transaction>, RepositoryError>;

    async fn seat_ledger(&self, event_id: Uuid) -> Result<Option<SeatLedger>, RepositoryError>;
}
