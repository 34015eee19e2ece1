//! Payment gateway abstraction.
//!
//! The enrollment core only needs two calls from a provider: open an order
//! for an amount in minor units, and refund a captured payment. Signature
//! checks on captures and webhooks are local HMAC computations and live in
//! [`crate::signature`].

mod mock;
mod razorpay;

pub use mock::MockPaymentGateway;
pub use razorpay::RazorpayGateway;

use crate::config::{GatewayKind, PaymentConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by a payment provider
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Provider did not answer within the configured timeout
    #[error("Gateway timeout")]
    Timeout,

    /// Network or TLS failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("Gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Provider answered with a body we could not decode
    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// An order opened with the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
}

/// Payment provider operations used by the enrollment core
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open an order the client checkout will pay against
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unreachable or rejects the order
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError>;

    /// Refund a captured payment, returning the provider refund id
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unreachable or rejects the refund
    async fn refund(&self, payment_id: &str, amount_minor: i64) -> Result<String, GatewayError>;
}

/// Build the gateway selected by configuration
pub fn from_config(config: &PaymentConfig) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    match config.gateway {
        GatewayKind::Razorpay => Ok(Arc::new(RazorpayGateway::new(config)?)),
        GatewayKind::Mock => Ok(MockPaymentGateway::shared()),
    }
}
