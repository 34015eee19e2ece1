//! Store primitives against a real Postgres.
//!
//! Run with `DATABASE_URL` set: `cargo test --test database_test -- --ignored`

use eventhub_backend::models::*;
use eventhub_backend::repositories::*;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;

struct Seeded {
    store: PgEnrollmentStore,
    organizer: User,
    participant: User,
    event: Event,
}

async fn seed(pool: PgPool, capacity: i32, fee: Decimal) -> Seeded {
    let store = PgEnrollmentStore::new(pool);
    let organizer = store
        .users()
        .create("Olivia", "olivia@example.com", UserRole::Organizer)
        .await
        .expect("Failed to create organizer");
    let participant = store
        .users()
        .create("Priya", "priya@example.com", UserRole::Participant)
        .await
        .expect("Failed to create participant");
    let event = store
        .events()
        .create(organizer.id, "Rust Meetup", capacity, fee, EventStatus::Published)
        .await
        .expect("Failed to create event");

    Seeded {
        store,
        organizer,
        participant,
        event,
    }
}

fn attempt(s: &Seeded, enrollment: &Enrollment, order_id: Option<&str>) -> NewTransaction {
    NewTransaction {
        participant_id: enrollment.participant_id,
        organizer_id: s.organizer.id,
        event_id: s.event.id,
        enrollment_id: enrollment.id,
        amount: s.event.enrollment_fee,
        currency: "INR".to_string(),
        order_id: order_id.map(str::to_string),
    }
}

fn capture(enrollment_id: uuid::Uuid, order_id: &str, payment_id: &str) -> PaymentCapture {
    PaymentCapture {
        enrollment_id,
        order_id: Some(order_id.to_string()),
        payment_id: Some(payment_id.to_string()),
        signature: None,
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_upsert_returns_existing_row(pool: PgPool) {
    let s = seed(pool, 10, Decimal::new(500, 0)).await;

    let first = s
        .store
        .upsert_pending_enrollment(s.participant.id, s.event.id)
        .await
        .unwrap();
    let second = s
        .store
        .upsert_pending_enrollment(s.participant.id, s.event.id)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert!(second.is_pending());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_mark_paid_is_idempotent(pool: PgPool) {
    let s = seed(pool, 10, Decimal::new(500, 0)).await;
    let enrollment = s
        .store
        .upsert_pending_enrollment(s.participant.id, s.event.id)
        .await
        .unwrap();
    let (_, tx) = s
        .store
        .attach_order_attempt(attempt(&s, &enrollment, Some("order_db_1")))
        .await
        .unwrap()
        .unwrap();

    let applied = s
        .store
        .mark_paid_if_not_already(&capture(enrollment.id, "order_db_1", "pay_db_1"))
        .await
        .unwrap();
    assert!(matches!(applied, PaidTransition::Applied { ref event, .. } if event.enrolled_count == 1));

    let again = s
        .store
        .mark_paid_if_not_already(&capture(enrollment.id, "order_db_1", "pay_db_1"))
        .await
        .unwrap();
    assert!(matches!(again, PaidTransition::AlreadyPaid { .. }));

    let stored = s.store.find_transaction(tx.id).await.unwrap().unwrap();
    assert!(stored.is_paid());
    assert_eq!(stored.payment_id.as_deref(), Some("pay_db_1"));

    let found = s.store.find_transaction_by_order("order_db_1").await.unwrap().unwrap();
    assert_eq!(found.id, tx.id);

    let ledger = s.store.seat_ledger(s.event.id).await.unwrap().unwrap();
    assert!(ledger.is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_attach_refused_once_paid(pool: PgPool) {
    let s = seed(pool, 10, Decimal::ZERO).await;
    let enrollment = s
        .store
        .upsert_pending_enrollment(s.participant.id, s.event.id)
        .await
        .unwrap();
    s.store
        .attach_order_attempt(attempt(&s, &enrollment, None))
        .await
        .unwrap()
        .unwrap();
    s.store
        .mark_paid_if_not_already(&PaymentCapture::free(enrollment.id))
        .await
        .unwrap();

    let refused = s
        .store
        .attach_order_attempt(attempt(&s, &enrollment, None))
        .await
        .unwrap();
    assert!(refused.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_captures_take_one_seat(pool: PgPool) {
    let s = seed(pool.clone(), 1, Decimal::new(100, 0)).await;
    let store = Arc::new(PgEnrollmentStore::new(pool));

    let mut captures = Vec::new();
    for i in 0..5 {
        let user = s
            .store
            .users()
            .create(&format!("P{}", i), &format!("p{}@example.com", i), UserRole::Participant)
            .await
            .unwrap();
        let enrollment = s.store.upsert_pending_enrollment(user.id, s.event.id).await.unwrap();
        let order_id = format!("order_race_{}", i);
        s.store
            .attach_order_attempt(attempt(&s, &enrollment, Some(&order_id)))
            .await
            .unwrap()
            .unwrap();
        captures.push(capture(enrollment.id, &order_id, &format!("pay_race_{}", i)));
    }

    let handles: Vec<_> = captures
        .into_iter()
        .map(|c| {
            let store = store.clone();
            tokio::spawn(async move { store.mark_paid_if_not_already(&c).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        if let PaidTransition::Applied { .. } = handle.await.unwrap().unwrap() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);

    let ledger = s.store.seat_ledger(s.event.id).await.unwrap().unwrap();
    assert_eq!(ledger.enrolled_count, 1);
    assert!(ledger.is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_refund_releases_seat_once(pool: PgPool) {
    let s = seed(pool, 3, Decimal::new(100, 0)).await;
    let enrollment = s
        .store
        .upsert_pending_enrollment(s.participant.id, s.event.id)
        .await
        .unwrap();
    let (_, tx) = s
        .store
        .attach_order_attempt(attempt(&s, &enrollment, Some("order_refund")))
        .await
        .unwrap()
        .unwrap();
    s.store
        .mark_paid_if_not_already(&capture(enrollment.id, "order_refund", "pay_refund"))
        .await
        .unwrap();

    let done = s.store.complete_refund(tx.id, "rfnd_1", true).await.unwrap();
    match done {
        RefundCompletion::Completed {
            transaction,
            enrollment,
            event,
        } => {
            assert_eq!(transaction.refund_id.as_deref(), Some("rfnd_1"));
            assert_eq!(
                enrollment.and_then(|e| e.status_enum()),
                Some(EnrollmentStatus::Refunded)
            );
            assert_eq!(event.map(|e| e.enrolled_count), Some(0));
        }
        other => panic!("unexpected completion: {:?}", other),
    }

    let repeat = s.store.complete_refund(tx.id, "rfnd_2", true).await.unwrap();
    assert!(matches!(repeat, RefundCompletion::NotPaid { .. }));

    let page = s
        .store
        .list_transactions(&TransactionFilter {
            organizer_id: Some(s.organizer.id),
            status: Some(TransactionStatus::Refunded),
            page: 1,
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_upserts_share_one_row(pool: PgPool) {
    let s = seed(pool.clone(), 10, Decimal::new(100, 0)).await;
    let store = Arc::new(PgEnrollmentStore::new(pool.clone()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let (participant_id, event_id) = (s.participant.id, s.event.id);
            tokio::spawn(async move { store.upsert_pending_enrollment(participant_id, event_id).await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollments WHERE participant_id = $1 AND event_id = $2",
    )
    .bind(s.participant.id)
    .bind(s.event.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_client_and_webhook_capture_race(pool: PgPool) {
    let s = seed(pool.clone(), 1, Decimal::new(100, 0)).await;
    let store = Arc::new(PgEnrollmentStore::new(pool));
    let enrollment = s
        .store
        .upsert_pending_enrollment(s.participant.id, s.event.id)
        .await
        .unwrap();
    s.store
        .attach_order_attempt(attempt(&s, &enrollment, Some("order_both")))
        .await
        .unwrap()
        .unwrap();

    // Client callback carries the checkout signature, the webhook does not
    let mut from_client = capture(enrollment.id, "order_both", "pay_both");
    from_client.signature = Some("sig_both".to_string());
    let from_webhook = capture(enrollment.id, "order_both", "pay_both");

    let handles: Vec<_> = [from_client, from_webhook]
        .into_iter()
        .map(|c| {
            let store = store.clone();
            tokio::spawn(async move { store.mark_paid_if_not_already(&c).await })
        })
        .collect();

    let mut applied = 0;
    let mut already = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            PaidTransition::Applied { .. } => applied += 1,
            PaidTransition::AlreadyPaid { .. } => already += 1,
            other => panic!("unexpected transition: {:?}", other),
        }
    }
    assert_eq!((applied, already), (1, 1));

    let ledger = s.store.seat_ledger(s.event.id).await.unwrap().unwrap();
    assert_eq!(ledger.enrolled_count, 1);
    assert!(ledger.is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_refund_of_failed_capture_keeps_seat(pool: PgPool) {
    let s = seed(pool, 0, Decimal::new(100, 0)).await;
    let enrollment = s
        .store
        .upsert_pending_enrollment(s.participant.id, s.event.id)
        .await
        .unwrap();
    let (_, tx) = s
        .store
        .attach_order_attempt(attempt(&s, &enrollment, Some("order_full")))
        .await
        .unwrap()
        .unwrap();
    let outcome = s
        .store
        .mark_paid_if_not_already(&capture(enrollment.id, "order_full", "pay_full"))
        .await
        .unwrap();
    assert!(matches!(outcome, PaidTransition::SeatsExhausted { .. }));

    let done = s.store.complete_refund(tx.id, "rfnd_full", true).await.unwrap();
    match done {
        RefundCompletion::Completed {
            transaction,
            enrollment,
            event,
        } => {
            assert_eq!(transaction.status_enum(), Some(TransactionStatus::Refunded));
            assert!(enrollment.is_none());
            assert!(event.is_none());
        }
        other => panic!("unexpected completion: {:?}", other),
    }

    let stored = s.store.find_enrollment(enrollment.id).await.unwrap().unwrap();
    assert!(stored.is_pending());
    let ledger = s.store.seat_ledger(s.event.id).await.unwrap().unwrap();
    assert_eq!(ledger.enrolled_count, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_listing_survives_huge_page(pool: PgPool) {
    let s = seed(pool, 1, Decimal::new(100, 0)).await;

    let page = s
        .store
        .list_transactions(&TransactionFilter {
            page: i64::MAX,
            limit: 100,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(page.data.is_empty());
    assert_eq!(page.total, 0);
}
