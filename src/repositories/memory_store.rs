use super::store::{EnrollmentStore, PaidTransition, RefundCompletion};
use crate::error::RepositoryError;
use crate::models::{
    Enrollment, EnrollmentStatus, EnrollmentWithEvent, Event, NewTransaction, Page,
    PaymentCapture, SeatLedger, Transaction, TransactionFilter, TransactionStatus, User,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    enrollments: HashMap<Uuid, Enrollment>,
    transactions: HashMap<Uuid, Transaction>,
}

impl State {
    fn enrollment_for(&self, participant_id: Uuid, event_id: Uuid) -> Option<&Enrollment> {
        self.enrollments
            .values()
            .find(|e| e.participant_id == participant_id && e.event_id == event_id)
    }
}

/// Store that keeps everything in process memory.
///
/// One lock guards all tables, so every primitive is trivially atomic.
/// Used by the development server and the test suite.
#[derive(Default)]
pub struct InMemoryEnrollmentStore {
    state: Mutex<State>,
}

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) -> User {
        let mut state = self.state.lock().await;
        state.users.insert(user.id, user.clone());
        user
    }

    pub async fn insert_event(&self, event: Event) -> Event {
        let mut state = self.state.lock().await;
        state.events.insert(event.id, event.clone());
        event
    }

    /// Replace a stored user, e.g. to flip verification in tests
    pub async fn update_user(&self, user: User) {
        self.state.lock().await.users.insert(user.id, user);
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, RepositoryError> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn find_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self.state.lock().await.enrollments.get(&id).cloned())
    }

    async fn find_transaction(&self, id: Uuid) -> Result<Option<Transaction>, RepositoryError> {
        Ok(self.state.lock().await.transactions.get(&id).cloned())
    }

    async fn find_transaction_by_order(
        &self,
        order_id: &str,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .values()
            .find(|t| t.order_id.as_deref() == Some(order_id))
            .cloned())
    }

    async fn upsert_pending_enrollment(
        &self,
        participant_id: Uuid,
        event_id: Uuid,
    ) -> Result<Enrollment, RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.enrollment_for(participant_id, event_id) {
            return Ok(existing.clone());
        }
        if !state.events.contains_key(&event_id) {
            return Err(RepositoryError::ConstraintViolation(format!(
                "event {} does not exist",
                event_id
            )));
        }

        let enrollment = Enrollment::new(participant_id, event_id);
        state.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn attach_order_attempt(
        &self,
        new: NewTransaction,
    ) -> Result<Option<(Enrollment, Transaction)>, RepositoryError> {
        let mut state = self.state.lock().await;

        if let Some(order_id) = new.order_id.as_deref() {
            let taken = state
                .transactions
                .values()
                .any(|t| t.order_id.as_deref() == Some(order_id));
            if taken {
                return Err(RepositoryError::Duplicate(format!("order {}", order_id)));
            }
        }

        let Some(enrollment) = state.enrollments.get_mut(&new.enrollment_id) else {
            return Ok(None);
        };
        if !enrollment.is_pending() {
            return Ok(None);
        }
        enrollment.order_id = new.order_id.clone();
        enrollment.updated_at = now();
        let enrollment = enrollment.clone();

        let transaction = new.into_transaction();
        state.transactions.insert(transaction.id, transaction.clone());

        Ok(Some((enrollment, transaction)))
    }

    async fn mark_paid_if_not_already(
        &self,
        capture: &PaymentCapture,
    ) -> Result<PaidTransition, RepositoryError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let enrollment = state
            .enrollments
            .get(&capture.enrollment_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Enrollment {}", capture.enrollment_id))
            })?;

        match enrollment.status_enum() {
            Some(EnrollmentStatus::Pending) => {}
            Some(EnrollmentStatus::Paid) => return Ok(PaidTransition::AlreadyPaid { enrollment }),
            _ => {
                let reason = format!("enrollment is {}", enrollment.status);
                return Ok(PaidTransition::Rejected { enrollment, reason });
            }
        }

        let open = state
            .transactions
            .values()
            .filter(|t| {
                t.enrollment_id == enrollment.id && t.is_open() && t.order_id == capture.order_id
            })
            .max_by_key(|t| t.created_at)
            .map(|t| t.id);
        let Some(open_id) = open else {
            return Ok(PaidTransition::Rejected {
                enrollment,
                reason: "no open transaction for order".to_string(),
            });
        };

        let seat_taken = match state.events.get_mut(&enrollment.event_id) {
            Some(event) if event.enrolled_count < event.capacity => {
                event.enrolled_count += 1;
                event.updated_at = now();
                Some(event.clone())
            }
            _ => None,
        };

        let Some(transaction) = state.transactions.get_mut(&open_id) else {
            return Err(RepositoryError::NotFound(format!("Transaction {}", open_id)));
        };
        if capture.payment_id.is_some() {
            transaction.payment_id = capture.payment_id.clone();
        }
        transaction.updated_at = now();

        let Some(event) = seat_taken else {
            transaction.status = TransactionStatus::Failed.as_str().to_string();
            let transaction = transaction.clone();
            return Ok(PaidTransition::SeatsExhausted {
                enrollment,
                transaction,
            });
        };
        transaction.status = TransactionStatus::Paid.as_str().to_string();
        let transaction = transaction.clone();

        let Some(stored) = state.enrollments.get_mut(&enrollment.id) else {
            return Err(RepositoryError::NotFound(format!("Enrollment {}", enrollment.id)));
        };
        stored.status = EnrollmentStatus::Paid.as_str().to_string();
        if capture.order_id.is_some() {
            stored.order_id = capture.order_id.clone();
        }
        stored.payment_id = capture.payment_id.clone();
        stored.payment_signature = capture.signature.clone();
        stored.updated_at = now();

        Ok(PaidTransition::Applied {
            enrollment: stored.clone(),
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
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(transaction) = state.transactions.get_mut(&transaction_id) else {
            return Err(RepositoryError::NotFound(format!("Transaction {}", transaction_id)));
        };
        if !transaction.is_refundable() {
            return Ok(RefundCompletion::NotPaid {
                transaction: transaction.clone(),
            });
        }
        let held_seat = transaction.is_paid();
        transaction.status = TransactionStatus::Refunded.as_str().to_string();
        transaction.refund_id = Some(refund_id.to_string());
        transaction.updated_at = now();
        let transaction = transaction.clone();

        let mut rolled_back = None;
        let mut released = None;
        if release_seat && held_seat {
            if let Some(enrollment) = state.enrollments.get_mut(&transaction.enrollment_id) {
                if enrollment.is_paid() {
                    enrollment.status = EnrollmentStatus::Refunded.as_str().to_string();
                    enrollment.updated_at = now();
                    rolled_back = Some(enrollment.clone());

                    if let Some(event) = state.events.get_mut(&enrollment.event_id) {
                        if event.enrolled_count > 0 {
                            event.enrolled_count -= 1;
                            event.updated_at = now();
                            released = Some(event.clone());
                        }
                    }
                }
            }
        }

        Ok(RefundCompletion::Completed {
            transaction,
            enrollment: rolled_back,
            event: released,
        })
    }

    async fn list_enrollments_for_participant(
        &self,
        participant_id: Uuid,
    ) -> Result<Vec<EnrollmentWithEvent>, RepositoryError> {
        let state = self.state.lock().await;
        let mut rows: Vec<EnrollmentWithEvent> = state
            .enrollments
            .values()
            .filter(|e| e.participant_id == participant_id)
            .filter_map(|e| {
                let event = state.events.get(&e.event_id)?;
                Some(EnrollmentWithEvent {
                    id: e.id,
                    event_id: e.event_id,
                    status: e.status.clone(),
                    order_id: e.order_id.clone(),
                    payment_id: e.payment_id.clone(),
                    created_at: e.created_at,
                    event_title: event.title.clone(),
                    event_status: event.status.clone(),
                    enrollment_fee: event.enrollment_fee,
                    capacity: event.capacity,
                    enrolled_count: event.enrolled_count,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_paid_enrollments(&self, event_id: Uuid) -> Result<Vec<Enrollment>, RepositoryError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Enrollment> = state
            .enrollments
            .values()
            .filter(|e| e.event_id == event_id && e.is_paid())
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.updated_at);
        Ok(rows)
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Page<Transaction>, RepositoryError> {
        let state = self.state.lock().await;
        let mut matching: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let data = matching
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();

        Ok(Page {
            data,
            page: filter.page.max(1),
            limit: filter.limit,
            total,
        })
    }

    async fn seat_ledger(&self, event_id: Uuid) -> Result<Option<SeatLedger>, RepositoryError> {
        let state = self.state.lock().await;
        let Some(event) = state.events.get(&event_id) else {
            return Ok(None);
        };
        let paid_enrollments = state
            .enrollments
            .values()
            .filter(|e| e.event_id == event_id && e.is_paid())
            .count() as i64;

        Ok(Some(SeatLedger {
            event_id,
            capacity: event.capacity,
            enrolled_count: event.enrolled_count,
            paid_enrollments,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, UserRole};
    use rust_decimal::Decimal;

    async fn seeded(capacity: i32) -> (InMemoryEnrollmentStore, Event, User) {
        let store = InMemoryEnrollmentStore::new();
        let organizer = store
            .insert_user(User::new("Org".into(), "org@example.com".into(), UserRole::Organizer))
            .await;
        let participant = store
            .insert_user(User::new("P".into(), "p@example.com".into(), UserRole::Participant))
            .await;
        let mut event = Event::new(organizer.id, "Workshop".into(), capacity, Decimal::new(100, 0));
        event.status = EventStatus::Published.as_str().to_string();
        let event = store.insert_event(event).await;
        (store, event, participant)
    }

    fn attempt(enrollment: &Enrollment, event: &Event, order_id: &str) -> NewTransaction {
        NewTransaction {
            participant_id: enrollment.participant_id,
            organizer_id: event.organizer_id,
            event_id: event.id,
            enrollment_id: enrollment.id,
            amount: event.enrollment_fee,
            currency: "INR".into(),
            order_id: Some(order_id.into()),
        }
    }

    fn capture(enrollment: &Enrollment, order_id: &str) -> PaymentCapture {
        PaymentCapture {
            enrollment_id: enrollment.id,
            order_id: Some(order_id.into()),
            payment_id: Some("pay_1".into()),
            signature: Some("sig".into()),
        }
    }

    #[tokio::test]
    async fn test_upsert_returns_same_enrollment() {
        let (store, event, participant) = seeded(5).await;
        let first = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        let second = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_mark_paid_applies_once() {
        let (store, event, participant) = seeded(5).await;
        let enrollment = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        store
            .attach_order_attempt(attempt(&enrollment, &event, "order_1"))
            .await
            .unwrap()
            .unwrap();

        let first = store.mark_paid_if_not_already(&capture(&enrollment, "order_1")).await.unwrap();
        assert!(matches!(first, PaidTransition::Applied { .. }));

        let second = store.mark_paid_if_not_already(&capture(&enrollment, "order_1")).await.unwrap();
        assert!(matches!(second, PaidTransition::AlreadyPaid { .. }));

        let ledger = store.seat_ledger(event.id).await.unwrap().unwrap();
        assert_eq!(ledger.enrolled_count, 1);
        assert!(ledger.is_consistent());
    }

    #[tokio::test]
    async fn test_mark_paid_on_full_event_fails_transaction() {
        let (store, event, participant) = seeded(0).await;
        let enrollment = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        store
            .attach_order_attempt(attempt(&enrollment, &event, "order_1"))
            .await
            .unwrap();

        let outcome = store.mark_paid_if_not_already(&capture(&enrollment, "order_1")).await.unwrap();
        match outcome {
            PaidTransition::SeatsExhausted { transaction, enrollment } => {
                assert_eq!(transaction.status, "failed");
                assert_eq!(transaction.payment_id.as_deref(), Some("pay_1"));
                assert!(enrollment.is_pending());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_order_is_rejected() {
        let (store, event, participant) = seeded(5).await;
        let enrollment = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        store
            .attach_order_attempt(attempt(&enrollment, &event, "order_1"))
            .await
            .unwrap();

        let outcome = store.mark_paid_if_not_already(&capture(&enrollment, "order_x")).await.unwrap();
        assert!(matches!(outcome, PaidTransition::Rejected { .. }));
        assert_eq!(store.seat_ledger(event.id).await.unwrap().unwrap().enrolled_count, 0);
    }

    #[tokio::test]
    async fn test_refund_releases_seat_once() {
        let (store, event, participant) = seeded(5).await;
        let enrollment = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        let (_, tx) = store
            .attach_order_attempt(attempt(&enrollment, &event, "order_1"))
            .await
            .unwrap()
            .unwrap();
        store.mark_paid_if_not_already(&capture(&enrollment, "order_1")).await.unwrap();

        let done = store.complete_refund(tx.id, "rfnd_1", true).await.unwrap();
        assert!(matches!(done, RefundCompletion::Completed { enrollment: Some(_), .. }));

        let again = store.complete_refund(tx.id, "rfnd_2", true).await.unwrap();
        assert!(matches!(again, RefundCompletion::NotPaid { .. }));

        let ledger = store.seat_ledger(event.id).await.unwrap().unwrap();
        assert_eq!(ledger.enrolled_count, 0);
        assert!(ledger.is_consistent());
    }

    #[tokio::test]
    async fn test_refund_of_failed_capture_keeps_seat_counter() {
        let (store, event, participant) = seeded(0).await;
        let enrollment = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        let (_, tx) = store
            .attach_order_attempt(attempt(&enrollment, &event, "order_1"))
            .await
            .unwrap()
            .unwrap();
        store.mark_paid_if_not_already(&capture(&enrollment, "order_1")).await.unwrap();

        let done = store.complete_refund(tx.id, "rfnd_1", true).await.unwrap();
        match done {
            RefundCompletion::Completed {
                transaction,
                enrollment,
                event,
            } => {
                assert_eq!(transaction.status, "refunded");
                assert!(enrollment.is_none());
                assert!(event.is_none());
            }
            other => panic!("unexpected completion: {:?}", other),
        }

        assert!(store.find_enrollment(enrollment.id).await.unwrap().unwrap().is_pending());
        assert_eq!(store.seat_ledger(event.id).await.unwrap().unwrap().enrolled_count, 0);
    }

    #[tokio::test]
    async fn test_attach_rejects_non_pending() {
        let (store, event, participant) = seeded(5).await;
        let enrollment = store.upsert_pending_enrollment(participant.id, event.id).await.unwrap();
        store
            .attach_order_attempt(attempt(&enrollment, &event, "order_1"))
            .await
            .unwrap();
        store.mark_paid_if_not_already(&capture(&enrollment, "order_1")).await.unwrap();

        let retry = store
            .attach_order_attempt(attempt(&enrollment, &event, "order_2"))
            .await
            .unwrap();
        assert!(retry.is_none());
    }
}
