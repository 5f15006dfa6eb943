use super::{CallbackPayload, CallbackVerdict, GatewayError, GatewayTransaction, PaymentGateway};
use crate::{config::RedirectGatewayConfig, entities::OrderModel};
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Hosted-checkout-session provider. The customer is redirected to a
/// provider-hosted payment page and returns with a session id.
///
/// Verification never trusts anything the redirect carries: the session is
/// re-fetched from the provider and only the provider-reported status counts.
pub struct RedirectGateway {
    client: reqwest::Client,
    config: RedirectGatewayConfig,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    amount: Decimal,
    currency: &'a str,
    /// Local order id, echoed back on the session for correlation
    receipt: String,
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    #[serde(default)]
    url: Option<String>,
    status: String,
    receipt: String,
}

impl RedirectGateway {
    pub fn new(config: RedirectGatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn sessions_url(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

/// Resolves a provider session into a verdict. Only the provider-reported
/// `paid` status verifies; anything else (open, expired, failed) does not.
fn verdict_from_session(session: CheckoutSession) -> Result<CallbackVerdict, GatewayError> {
    let order_id = Uuid::parse_str(&session.receipt).map_err(|_| {
        GatewayError::MalformedCallback(format!(
            "session {} carries a non-order receipt",
            session.id
        ))
    })?;

    Ok(CallbackVerdict {
        order_id,
        provider_reference: session.id,
        verified: session.status == "paid",
    })
}

#[async_trait]
impl PaymentGateway for RedirectGateway {
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

        let request = CreateSessionRequest {
            amount: order.total_amount,
            currency: &order.currency,
            receipt: order.id.to_string(),
            success_url: &self.config.success_url,
            cancel_url: &self.config.cancel_url,
        };

        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::Unavailable(format!(
                "session creation returned {}",
                response.status()
            )));
        }

        let session: CheckoutSession = response.json().await?;

        Ok(GatewayTransaction {
            client_payload: serde_json::json!({
                "session_id": session.id,
                "redirect_url": session.url,
            }),
            provider_reference: session.id,
        })
    }

    #[instrument(skip(self, payload))]
    async fn verify_callback(
        &self,
        payload: &CallbackPayload,
    ) -> Result<CallbackVerdict, GatewayError> {
        let session_id = match payload {
            CallbackPayload::Redirect { session_id } => session_id,
            other => {
                return Err(GatewayError::MalformedCallback(format!(
                    "unexpected callback payload: {:?}",
                    other
                )))
            }
        };

        let response = self
            .client
            .get(format!("{}/{}", self.sessions_url(), session_id))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                warn!(%session_id, "callback references an unknown session");
                Err(GatewayError::MalformedCallback(format!(
                    "unknown session {}",
                    session_id
                )))
            }
            status if !status.is_success() => Err(GatewayError::Unavailable(format!(
                "session lookup returned {}",
                status
            ))),
            _ => verdict_from_session(response.json().await?),
        }
    }
}
