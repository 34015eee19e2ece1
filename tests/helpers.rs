#![allow(dead_code)]

use eventhub_backend::auth;
use eventhub_backend::config::AppConfig;
use eventhub_backend::models::*;
use eventhub_backend::payment_gateway::MockPaymentGateway;
use eventhub_backend::repositories::{EnrollmentStore, InMemoryEnrollmentStore};
use eventhub_backend::services::Notifier;
use eventhub_backend::signature;
use eventhub_backend::AppState;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Application wired over the in-memory store and the mock gateway
pub struct TestApp {
    pub config: AppConfig,
    pub store: Arc<InMemoryEnrollmentStore>,
    pub gateway: Arc<MockPaymentGateway>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryEnrollmentStore::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let state = AppState::new(&config, store.clone(), gateway.clone(), Notifier::default());

        Self {
            config,
            store,
            gateway,
            state,
        }
    }

    pub async fn participant(&self, name: &str) -> User {
        let user = User::new(name.to_string(), format!("{}@example.com", name), UserRole::Participant);
        self.store.insert_user(user).await
    }

    /// Organizers must be verified to reach their routes
    pub async fn organizer(&self, name: &str) -> User {
        let mut user = User::new(name.to_string(), format!("{}@example.com", name), UserRole::Organizer);
        user.verification_status = VerificationStatus::Verified.as_str().to_string();
        self.store.insert_user(user).await
    }

    pub async fn admin(&self) -> User {
        let user = User::new("admin".to_string(), "admin@example.com".to_string(), UserRole::Admin);
        self.store.insert_user(user).await
    }

    pub async fn published_event(&self, organizer: &User, capacity: i32, fee: Decimal) -> Event {
        let mut event = Event::new(organizer.id, "Rust Meetup".to_string(), capacity, fee);
        event.status = EventStatus::Published.as_str().to_string();
        self.store.insert_event(event).await
    }

    pub async fn event(&self, id: Uuid) -> Event {
        self.store
            .find_event(id)
            .await
            .expect("store failure")
            .expect("event missing")
    }

    pub async fn enrollment(&self, id: Uuid) -> Enrollment {
        self.store
            .find_enrollment(id)
            .await
            .expect("store failure")
            .expect("enrollment missing")
    }

    pub async fn transaction(&self, id: Uuid) -> Transaction {
        self.store
            .find_transaction(id)
            .await
            .expect("store failure")
            .expect("transaction missing")
    }

    pub async fn ledger(&self, event_id: Uuid) -> SeatLedger {
        self.store
            .seat_ledger(event_id)
            .await
            .expect("store failure")
            .expect("event missing")
    }

    pub fn token(&self, user: &User) -> String {
        let role = user.role_enum().expect("seeded users have a valid role");
        auth::issue_token(
            &self.config.auth.token_secret,
            user.id,
            role,
            chrono::Utc::now().timestamp(),
        )
    }

    /// Checkout signature as the gateway would hand it to the client
    pub fn client_signature(&self, order_id: &str, payment_id: &str) -> String {
        signature::sign_payment(&self.config.payment.key_secret, order_id, payment_id)
    }

    pub fn webhook_signature(&self, body: &[u8]) -> String {
        signature::sign_webhook(&self.config.payment.webhook_secret, body)
    }
}

/// A `payment.captured` delivery in the gateway's envelope shape
pub fn captured_webhook(order_id: &str, payment_id: &str) -> Vec<u8> {
    json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": order_id,
                    "status": "captured"
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

pub fn fee(rupees: i64) -> Decimal {
    Decimal::new(rupees, 0)
}
