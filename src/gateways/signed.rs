use super::{CallbackPayload, CallbackVerdict, GatewayError, GatewayTransaction, PaymentGateway};
use crate::{config::SignedGatewayConfig, entities::OrderModel};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Order-creation provider. A provider order is created server-side; the
/// client completes payment in the provider's widget and posts back
/// `(provider_order_id, provider_payment_id, signature)`, where the signature
/// is HMAC-SHA256 over `"{order_id}|{payment_id}"` with the shared secret.
///
/// An unsigned or mis-signed confirmation is rejected outright; it is never
/// interpreted as a failed payment.
pub struct SignedGateway {
    client: reqwest::Client,
    config: SignedGatewayConfig,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    /// Amount in minor units (cents)
    amount: i64,
    currency: &'a str,
    /// Local order id, echoed back on the provider order for correlation
    receipt: String,
}

#[derive(Debug, Deserialize)]
struct ProviderOrder {
    id: String,
    receipt: String,
}

/// Converts a major-unit decimal amount to integer minor units. Amounts with
/// sub-cent precision are rejected rather than rounded.
fn to_minor_units(amount: Decimal) -> Option<i64> {
    let minor = amount * Decimal::from(100);
    if minor.fract() != Decimal::ZERO {
        return None;
    }
    minor.to_i64()
}

fn signature_message(provider_order_id: &str, provider_payment_id: &str) -> String {
    format!("{}|{}", provider_order_id, provider_payment_id)
}

fn compute_signature(secret: &str, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

impl SignedGateway {
    pub fn new(config: SignedGatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'))
    }

    fn signature_is_valid(
        &self,
        provider_order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> bool {
        let expected = compute_signature(
            &self.config.key_secret,
            &signature_message(provider_order_id, provider_payment_id),
        );
        constant_time_eq(&expected, signature)
    }

    /// Fetches the provider's record of an order to resolve the local order id.
    async fn fetch_provider_order(&self, provider_order_id: &str) -> Result<Uuid, GatewayError> {
        let response = self
            .client
            .get(format!("{}/{}", self.orders_url(), provider_order_id))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(GatewayError::MalformedCallback(format!(
                "unknown provider order {}",
                provider_order_id
            ))),
            status if !status.is_success() => Err(GatewayError::Unavailable(format!(
                "provider order lookup returned {}",
                status
            ))),
            _ => {
                let order: ProviderOrder = response.json().await?;
                Uuid::parse_str(&order.receipt).map_err(|_| {
                    GatewayError::MalformedCallback(format!(
                        "provider order {} carries a non-order receipt",
                        order.id
                    ))
                })
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for SignedGateway {
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn create_transaction(
        &self,
        order: &OrderModel,
    ) -> Result<GatewayTransaction, GatewayError> {
        if order.total_amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount(format!(
                "cannot charge {}",
                order.total_amount
            )));
        }

        let amount = to_minor_units(order.total_amount).ok_or_else(|| {
            GatewayError::InvalidAmount(format!(
                "amount {} is not representable in minor units",
                order.total_amount
            ))
        })?;

        let request = CreateOrderRequest {
            amount,
            currency: &order.currency,
            receipt: order.id.to_string(),
        };

        let response = self
            .client
            .post(self.orders_url())
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Unavailable(format!(
                "provider order creation returned {}",
                response.status()
            )));
        }

        let provider_order: ProviderOrder = response.json().await?;

        Ok(GatewayTransaction {
            client_payload: serde_json::json!({
                "provider_order_id": provider_order.id,
                "key_id": self.config.key_id,
                "amount": amount,
                "currency": order.currency,
            }),
            provider_reference: provider_order.id,
        })
    }

    #[instrument(skip(self, payload))]
    async fn verify_callback(
        &self,
        payload: &CallbackPayload,
    ) -> Result<CallbackVerdict, GatewayError> {
        let (provider_order_id, provider_payment_id, signature) = match payload {
            CallbackPayload::Signed {
                provider_order_id,
                provider_payment_id,
                signature,
            } => (provider_order_id, provider_payment_id, signature),
            other => {
                return Err(GatewayError::MalformedCallback(format!(
                    "unexpected callback payload: {:?}",
                    other
                )))
            }
        };

        let verified = match (provider_payment_id, signature) {
            (Some(payment_id), Some(signature)) => {
                if !self.signature_is_valid(provider_order_id, payment_id, signature) {
                    warn!(%provider_order_id, "callback signature mismatch");
                    return Err(GatewayError::SignatureInvalid);
                }
                true
            }
            (None, None) => false,
            _ => {
                // A payment id without a signature (or vice versa) is a
                // tampered callback, not an abandoned payment.
                return Err(GatewayError::SignatureInvalid);
            }
        };

        let order_id = self.fetch_provider_order(provider_order_id).await?;

        Ok(CallbackVerdict {
            order_id,
            provider_reference: provider_order_id.clone(),
            verified,
        })
    }
}
