use super::{GatewayError, GatewayOrder, PaymentGateway};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-process gateway for development and tests.
///
/// Always succeeds unless told to fail; order ids are sequential so tests
/// can predict them.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    fail_orders: AtomicBool,
    fail_refunds: AtomicBool,
    order_seq: AtomicU64,
    delay_ms: AtomicU64,
    orders: Mutex<Vec<GatewayOrder>>,
    refunds: Mutex<Vec<(String, i64)>>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped instance for sharing
    pub fn shared() -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new())
    }

    /// Make subsequent order creations fail
    pub fn fail_orders(&self, fail: bool) {
        self.fail_orders.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent refunds fail
    pub fn fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    /// Simulated provider latency
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn orders(&self) -> Vec<GatewayOrder> {
        self.orders.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Refunds issued so far as `(payment_id, amount_minor)`
    pub fn refunds(&self) -> Vec<(String, i64)> {
        self.refunds.lock().map(|r| r.clone()).unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        self.simulate_latency().await;

        if self.fail_orders.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "mock gateway unavailable".to_string(),
            });
        }

        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let order = GatewayOrder {
            id: format!("order_mock_{}", seq),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        };

        tracing::info!(
            order_id = %order.id,
            amount = amount_minor,
            "Mock order created"
        );

        if let Ok(mut orders) = self.orders.lock() {
            orders.push(order.clone());
        }

        Ok(order)
    }

    async fn refund(&self, payment_id: &str, amount_minor: i64) -> Result<String, GatewayError> {
        self.simulate_latency().await;

        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "The payment has been fully refunded already".to_string(),
            });
        }

        let refund_id = format!("rfnd_mock_{}", uuid::Uuid::new_v4().simple());

        tracing::info!(
            payment_id = %payment_id,
            amount = amount_minor,
            refund_id = %refund_id,
            "Mock refund processed"
        );

        if let Ok(mut refunds) = self.refunds.lock() {
            refunds.push((payment_id.to_string(), amount_minor));
        }

        Ok(refund_id)
    }
}
