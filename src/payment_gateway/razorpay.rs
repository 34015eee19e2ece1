use super::{GatewayError, GatewayOrder, PaymentGateway};
use crate::config::PaymentConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Razorpay REST client
pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

#[derive(Serialize)]
struct OrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    amount: i64,
    currency: String,
    receipt: Option<String>,
}

#[derive(Serialize)]
struct RefundRequest {
    amount: i64,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

impl RazorpayGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Gateway returned {} for {}: {}", status, path, body);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(err.to_string())
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let order: OrderResponse = self
            .post(
                "/v1/orders",
                &OrderRequest {
                    amount: amount_minor,
                    currency,
                    receipt,
                },
            )
            .await?;

        Ok(GatewayOrder {
            id: order.id,
            amount: order.amount,
            currency: order.currency,
            receipt: order.receipt,
        })
    }

    async fn refund(&self, payment_id: &str, amount_minor: i64) -> Result<String, GatewayError> {
        let path = format!("/v1/payments/{}/refund", payment_id);
        let refund: RefundResponse = self
            .post(&path, &RefundRequest { amount: amount_minor })
            .await?;

        Ok(refund.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let config = PaymentConfig {
            api_base_url: "https://api.razorpay.com/".to_string(),
            ..PaymentConfig::default()
        };
        let gateway = RazorpayGateway::new(&config).unwrap();
        assert_eq!(gateway.base_url, "https://api.razorpay.com");
    }

    #[test]
    fn test_order_request_shape() {
        let body = serde_json::to_value(OrderRequest {
            amount: 49900,
            currency: "INR",
            receipt: "enr_1",
        })
        .unwrap();
        assert_eq!(body["amount"], 49900);
        assert_eq!(body["currency"], "INR");
        assert_eq!(body["receipt"], "enr_1");
    }
}
