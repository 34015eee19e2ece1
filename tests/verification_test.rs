mod helpers;

use eventhub_backend::error::AppError;
use eventhub_backend::models::*;
use eventhub_backend::services::{EnrollmentResult, WebhookOutcome};
use helpers::*;

struct Checkout {
    participant: User,
    event: Event,
    result: EnrollmentResult,
    order_id: String,
}

async fn checkout(app: &TestApp, capacity: i32) -> Checkout {
    let organizer = app.organizer("olivia").await;
    let participant = app.participant("priya").await;
    let event = app.published_event(&organizer, capacity, fee(799)).await;
    let result = app
        .state
        .enrollments
        .request_enrollment(participant.id, event.id)
        .await
        .unwrap();
    let order_id = result.order.clone().unwrap().id;

    Checkout {
        participant,
        event,
        result,
        order_id,
    }
}

#[tokio::test]
async fn test_client_verification_marks_paid_once() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;
    let signature = app.client_signature(&c.order_id, "pay_001");

    let first = app
        .state
        .verification
        .verify_payment(c.participant.id, c.result.enrollment_id, "pay_001", &c.order_id, &signature)
        .await
        .unwrap();
    assert_eq!(first.status, EnrollmentStatus::Paid);
    assert!(!first.already_paid);

    let second = app
        .state
        .verification
        .verify_payment(c.participant.id, c.result.enrollment_id, "pay_001", &c.order_id, &signature)
        .await
        .unwrap();
    assert!(second.already_paid);

    let enrollment = app.enrollment(c.result.enrollment_id).await;
    assert!(enrollment.is_paid());
    assert_eq!(enrollment.payment_id.as_deref(), Some("pay_001"));
    assert_eq!(enrollment.payment_signature.as_deref(), Some(signature.as_str()));

    let transaction = app.transaction(c.result.transaction_id).await;
    assert!(transaction.is_paid());
    assert_eq!(transaction.payment_id.as_deref(), Some("pay_001"));

    let ledger = app.ledger(c.event.id).await;
    assert_eq!(ledger.enrolled_count, 1);
    assert!(ledger.is_consistent());
}

#[tokio::test]
async fn test_bad_signature_changes_nothing() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;
    let forged = app.client_signature(&c.order_id, "pay_other");

    let err = app
        .state
        .verification
        .verify_payment(c.participant.id, c.result.enrollment_id, "pay_001", &c.order_id, &forged)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature(_)));

    assert!(app.enrollment(c.result.enrollment_id).await.is_pending());
    assert!(app.transaction(c.result.transaction_id).await.is_open());
    assert_eq!(app.event(c.event.id).await.enrolled_count, 0);
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;

    let err = app
        .state
        .verification
        .verify_payment(c.participant.id, c.result.enrollment_id, "", &c.order_id, "abc")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_other_participant_cannot_verify() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;
    let intruder = app.participant("mallory").await;
    let signature = app.client_signature(&c.order_id, "pay_001");

    let err = app
        .state
        .verification
        .verify_payment(intruder.id, c.result.enrollment_id, "pay_001", &c.order_id, &signature)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(app.enrollment(c.result.enrollment_id).await.is_pending());
}

#[tokio::test]
async fn test_order_from_another_enrollment_is_not_found() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;
    let signature = app.client_signature("order_unknown", "pay_001");

    let err = app
        .state
        .verification
        .verify_payment(c.participant.id, c.result.enrollment_id, "pay_001", "order_unknown", &signature)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_webhook_capture_is_idempotent() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;
    let body = captured_webhook(&c.order_id, "pay_hook");
    let signature = app.webhook_signature(&body);

    let first = app
        .state
        .verification
        .handle_payment_webhook(&body, Some(&signature))
        .await
        .unwrap();
    assert!(first.ok);
    assert_eq!(first.outcome, WebhookOutcome::Applied);

    let redelivery = app
        .state
        .verification
        .handle_payment_webhook(&body, Some(&signature))
        .await
        .unwrap();
    assert_eq!(redelivery.outcome, WebhookOutcome::AlreadyPaid);

    let enrollment = app.enrollment(c.result.enrollment_id).await;
    assert!(enrollment.is_paid());
    assert_eq!(enrollment.payment_id.as_deref(), Some("pay_hook"));
    assert!(enrollment.payment_signature.is_none());
    assert_eq!(app.event(c.event.id).await.enrolled_count, 1);
}

#[tokio::test]
async fn test_webhook_then_client_reaches_same_state() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;

    let body = captured_webhook(&c.order_id, "pay_001");
    let ack = app
        .state
        .verification
        .handle_payment_webhook(&body, Some(&app.webhook_signature(&body)))
        .await
        .unwrap();
    assert_eq!(ack.outcome, WebhookOutcome::Applied);

    let signature = app.client_signature(&c.order_id, "pay_001");
    let result = app
        .state
        .verification
        .verify_payment(c.participant.id, c.result.enrollment_id, "pay_001", &c.order_id, &signature)
        .await
        .unwrap();
    assert!(result.already_paid);
    assert_eq!(result.status, EnrollmentStatus::Paid);

    let ledger = app.ledger(c.event.id).await;
    assert_eq!(ledger.enrolled_count, 1);
    assert_eq!(ledger.paid_enrollments, 1);
}

#[tokio::test]
async fn test_webhook_settles_superseded_order() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;

    // Participant retried checkout; the first order is then captured
    let retry = app
        .state
        .enrollments
        .request_enrollment(c.participant.id, c.event.id)
        .await
        .unwrap();
    assert_ne!(retry.order.unwrap().id, c.order_id);

    let body = captured_webhook(&c.order_id, "pay_first");
    let ack = app
        .state
        .verification
        .handle_payment_webhook(&body, Some(&app.webhook_signature(&body)))
        .await
        .unwrap();
    assert_eq!(ack.outcome, WebhookOutcome::Applied);

    assert!(app.transaction(c.result.transaction_id).await.is_paid());
    assert!(app.transaction(retry.transaction_id).await.is_open());
    let enrollment = app.enrollment(c.result.enrollment_id).await;
    assert_eq!(enrollment.order_id.as_deref(), Some(c.order_id.as_str()));
}

#[tokio::test]
async fn test_webhook_acknowledges_what_it_cannot_apply() {
    let app = TestApp::new();

    let body = captured_webhook("order_nowhere", "pay_1");
    let ack = app
        .state
        .verification
        .handle_payment_webhook(&body, Some(&app.webhook_signature(&body)))
        .await
        .unwrap();
    assert!(ack.ok);
    assert_eq!(ack.outcome, WebhookOutcome::UnknownOrder);

    let other = br#"{"event":"refund.processed","payload":{}}"#;
    let ack = app
        .state
        .verification
        .handle_payment_webhook(other, Some(&app.webhook_signature(other)))
        .await
        .unwrap();
    assert_eq!(ack.outcome, WebhookOutcome::Ignored);

    let garbage = b"not json";
    let ack = app
        .state
        .verification
        .handle_payment_webhook(garbage, Some(&app.webhook_signature(garbage)))
        .await
        .unwrap();
    assert_eq!(ack.outcome, WebhookOutcome::Malformed);
}

#[tokio::test]
async fn test_webhook_signature_is_required() {
    let app = TestApp::new();
    let c = checkout(&app, 5).await;
    let body = captured_webhook(&c.order_id, "pay_1");

    let err = app
        .state
        .verification
        .handle_payment_webhook(&body, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature(_)));

    let err = app
        .state
        .verification
        .handle_payment_webhook(&body, Some("deadbeef"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidSignature(_)));

    assert!(app.enrollment(c.result.enrollment_id).await.is_pending());
}

#[tokio::test]
async fn test_capture_on_full_event_fails_transaction() {
    let app = TestApp::new();
    let organizer = app.organizer("olivia").await;
    let event = app.published_event(&organizer, 1, fee(100)).await;
    let first = app.participant("priya").await;
    let second = app.participant("rahul").await;

    let a = app.state.enrollments.request_enrollment(first.id, event.id).await.unwrap();
    let b = app.state.enrollments.request_enrollment(second.id, event.id).await.unwrap();
    let order_a = a.order.unwrap().id;
    let order_b = b.order.unwrap().id;

    let body = captured_webhook(&order_a, "pay_a");
    let ack = app
        .state
        .verification
        .handle_payment_webhook(&body, Some(&app.webhook_signature(&body)))
        .await
        .unwrap();
    assert_eq!(ack.outcome, WebhookOutcome::Applied);

    let body = captured_webhook(&order_b, "pay_b");
    let ack = app
        .state
        .verification
        .handle_payment_webhook(&body, Some(&app.webhook_signature(&body)))
        .await
        .unwrap();
    assert_eq!(ack.outcome, WebhookOutcome::SeatsExhausted);

    let loser = app.transaction(b.transaction_id).await;
    assert_eq!(loser.status_enum(), Some(TransactionStatus::Failed));
    assert_eq!(loser.payment_id.as_deref(), Some("pay_b"));
    assert!(app.enrollment(b.enrollment_id).await.is_pending());
    assert!(app.ledger(event.id).await.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_client_and_webhook_race_settles_once() {
    for round in 0..10 {
        let app = TestApp::new();
        let c = checkout(&app, 1).await;
        let payment_id = format!("pay_race_{}", round);

        let verification = app.state.verification.clone();
        let signature = app.client_signature(&c.order_id, &payment_id);
        let (participant_id, enrollment_id) = (c.participant.id, c.result.enrollment_id);
        let (order_id, client_payment) = (c.order_id.clone(), payment_id.clone());
        let client = tokio::spawn(async move {
            verification
                .verify_payment(participant_id, enrollment_id, &client_payment, &order_id, &signature)
                .await
        });

        let verification = app.state.verification.clone();
        let body = captured_webhook(&c.order_id, &payment_id);
        let webhook_signature = app.webhook_signature(&body);
        let webhook = tokio::spawn(async move {
            verification
                .handle_payment_webhook(&body, Some(&webhook_signature))
                .await
        });

        let client = client.await.unwrap().unwrap();
        let ack = webhook.await.unwrap().unwrap();
        assert_eq!(client.status, EnrollmentStatus::Paid);

        let applied = [!client.already_paid, ack.outcome == WebhookOutcome::Applied];
        assert_eq!(applied.iter().filter(|a| **a).count(), 1);
        if client.already_paid {
            assert_eq!(ack.outcome, WebhookOutcome::Applied);
        } else {
            assert_eq!(ack.outcome, WebhookOutcome::AlreadyPaid);
        }

        let ledger = app.ledger(c.event.id).await;
        assert_eq!(ledger.enrolled_count, 1);
        assert_eq!(ledger.paid_enrollments, 1);
        assert!(ledger.is_consistent());
    }
}
