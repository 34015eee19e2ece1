use super::store::{EnrollmentStore, PaidTransition, RefundCompletion};
use super::{
    enrollment_repository as enrollments, event_repository as events,
    transaction_repository as transactions, EnrollmentRepository, EventRepository,
    TransactionRepository, UserRepository,
};
use crate::error::RepositoryError;
use crate::models::{
    Enrollment, EnrollmentStatus, EnrollmentWithEvent, Event, NewTransaction, Page,
    PaymentCapture, SeatLedger, Transaction, TransactionFilter, TransactionStatus, User,
};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// Postgres-backed enrollment store.
///
/// Multi-row primitives run inside one SQL transaction and always lock in
/// the same order: enrollment, then transaction, then event.
pub struct PgEnrollmentStore {
    pool: PgPool,
    users: UserRepository,
    events: EventRepository,
    enrollments: EnrollmentRepository,
    transactions: TransactionRepository,
}

impl PgEnrollmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            enrollments: EnrollmentRepository::new(pool.clone()),
            transactions: TransactionRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn events(&self) -> &EventRepository {
        &self.events
    }
}

#[async_trait]
impl EnrollmentStore for PgEnrollmentStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.users.find_by_id(id).await
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, RepositoryError> {
        self.events.find_by_id(id).await
    }

    async fn find_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>, RepositoryError> {
        self.enrollments.find_by_id(id).await
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, RepositoryError> {
        self.transactions.find_by_id(id).await
    }

    async fn find_transaction_by_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, RepositoryError> {
        self.transactions.find_by_order(order_id).await
    }

    async fn upsert_pending_enrollment(
        &self,
        participant_id: Uuid,
        event_id: Uuid,
    ) -> Result<Enrollment, RepositoryError> {
        self.enrollments.upsert_pending(participant_id, event_id).await
    }

    async fn attach_order_attempt(
        &self,
        new: NewTransaction,
    ) -> Result<Option<(Enrollment, Transaction)>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(enrollment) =
            enrollments::set_order(&mut tx, new.enrollment_id, new.order_id.as_deref()).await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        let transaction = transactions::insert(&mut tx, &new).await?;

        tx.commit().await?;
        Ok(Some((enrollment, transaction)))
    }

    async fn mark_paid_if_not_already(
        &self,
        capture: &PaymentCapture,
    ) -> Result<PaidTransition, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let enrollment = enrollments::lock_by_id(&mut tx, capture.enrollment_id)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Enrollment {}", capture.enrollment_id))
            })?;

        match enrollment.status_enum() {
            Some(EnrollmentStatus::Pending) => {}
            Some(EnrollmentStatus::Paid) => {
                tx.commit().await?;
                return Ok(PaidTransition::AlreadyPaid { enrollment });
            }
            _ => {
                tx.commit().await?;
                let reason = format!("enrollment is {}", enrollment.status);
                return Ok(PaidTransition::Rejected { enrollment, reason });
            }
        }

        let Some(open) = transactions::lock_open_for_capture(
            &mut tx,
            enrollment.id,
            capture.order_id.as_deref(),
        )
        .await?
        else {
            tx.commit().await?;
            return Ok(PaidTransition::Rejected {
                enrollment,
                reason: "no open transaction for order".to_string(),
            });
        };

        let Some(event) = events::try_take_seat(&mut tx, enrollment.event_id).await? else {
            let transaction = transactions::settle(
                &mut tx,
                open.id,
                TransactionStatus::Failed,
                capture.payment_id.as_deref(),
            )
            .await?;
            tx.commit().await?;
            return Ok(PaidTransition::SeatsExhausted {
                enrollment,
                transaction,
            });
        };

        let enrollment = enrollments::mark_paid(&mut tx, capture).await?;
        let transaction = transactions::settle(
            &mut tx,
            open.id,
            TransactionStatus::Paid,
            capture.payment_id.as_deref(),
        )
        .await?;

        tx.commit().await?;
        debug!("Enrollment {} marked paid", enrollment.id);

        Ok(PaidTransition::Applied {
            enrollment,
            transaction,
            event,
        })
    }

    async fn complete_refund(
        &self,
        transaction_id: Uuid,
        refund_id: &str,
        release_seat: bool,
    ) -> Result<RefundCompletion, RepositoryError> {
        // Unlocked read only to learn the enrollment id for lock ordering
        let current = self
            .transactions
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {}", transaction_id)))?;

        let mut tx = self.pool.begin().await?;

        let enrollment = enrollments::lock_by_id(&mut tx, current.enrollment_id).await?;
        let locked = transactions::lock_by_id(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Transaction {}", transaction_id)))?;

        if !locked.is_refundable() {
            tx.commit().await?;
            return Ok(RefundCompletion::NotPaid { transaction: locked });
        }

        let transaction = transactions::mark_refunded(&mut tx, transaction_id, refund_id).await?;

        // A failed capture never held a seat
        let (enrollment, event) = match enrollment {
            Some(enrollment) if release_seat && locked.is_paid() && enrollment.is_paid() => {
                let enrollment = enrollments::mark_refunded(&mut tx, enrollment.id).await?;
                let event = events::release_seat(&mut tx, enrollment.event_id).await?;
                (Some(enrollment), event)
            }
            _ => (None, None),
        };

        tx.commit().await?;

        Ok(RefundCompletion::Completed {
            transaction,
            enrollment,
            event,
        })
    }

    async fn list_enrollments_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<EnrollmentWithEvent>, RepositoryError> {
        self.enrollments.list_for_participant(participant_id).await
    }

    async fn list_paid_enrollments(&self, event_id: Uuid) -> Result<Vec<Enrollment>, RepositoryError> {
        self.enrollments.list_paid_for_event(event_id).await
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Page<Transaction>, RepositoryError> {
        self.transactions.list(filter).await
    }

    async fn seat_ledger(&self, event_id: Uuid) -> Result<Option<SeatLedger>, RepositoryError> {
        self.events.seat_ledger(event_id).await
    }
}
