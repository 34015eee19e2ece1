//! EventHub Backend Library
//!
//! Enrollment and payment consistency core of the EventHub marketplace:
//! seat reservation, payment order creation, dual-path payment verification,
//! refunds, and the reporting views built on the transaction ledger.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod http;
pub mod models;
pub mod payment_gateway;
pub mod repositories;
pub mod services;
pub mod signature;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use config::AuthConfig;
use database::Database;
use payment_gateway::PaymentGateway;
use repositories::EnrollmentStore;
use services::{EnrollmentService, Notifier, RefundService, ReportingService, VerificationService};
use std::sync::Arc;

/// Application state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EnrollmentStore>,
    pub enrollments: Arc<EnrollmentService>,
    pub verification: Arc<VerificationService>,
    pub refunds: Arc<RefundService>,
    pub reporting: Arc<ReportingService>,
    pub notifier: Notifier,
    pub auth: AuthConfig,
    /// Present when backed by Postgres; probed by the readiness check
    pub database: Option<Database>,
}

impl AppState {
    /// Wire the services over a store and a gateway
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn EnrollmentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Notifier,
    ) -> Self {
        let timeout = config.payment.timeout();

        Self {
            enrollments: Arc::new(EnrollmentService::new(
                store.clone(),
                gateway.clone(),
                notifier.clone(),
                config.payment.currency.clone(),
                timeout,
            )),
            verification: Arc::new(VerificationService::new(
                store.clone(),
                notifier.clone(),
                config.payment.key_secret.clone(),
                config.payment.webhook_secret.clone(),
            )),
            refunds: Arc::new(RefundService::new(
                store.clone(),
                gateway,
                notifier.clone(),
                timeout,
                config.refund_releases_seat,
            )),
            reporting: Arc::new(ReportingService::new(store.clone())),
            notifier,
            auth: config.auth.clone(),
            database: None,
            store,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}
