use crate::{
    entities::{OrderModel, PaymentMethod},
    errors::ServiceError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub mod redirect;
pub mod signed;

pub use redirect::RedirectGateway;
pub use signed::SignedGateway;

/// Errors surfaced by payment gateway adapters. Raw provider/transport errors
/// are translated at this boundary; nothing else in the service ever sees a
/// reqwest error or a provider status code.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("invalid charge amount: {0}")]
    InvalidAmount(String),

    #[error("callback signature invalid")]
    SignatureInvalid,

    #[error("malformed callback: {0}")]
    MalformedCallback(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts are deliberately indistinguishable from other transport
        // failures: both cancel the local order attempt.
        GatewayError::Unavailable(err.to_string())
    }
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(msg) => ServiceError::GatewayUnavailable(msg),
            GatewayError::InvalidAmount(msg) => ServiceError::InvalidAmount(msg),
            GatewayError::SignatureInvalid => ServiceError::SignatureInvalid,
            GatewayError::MalformedCallback(msg) => ServiceError::ValidationError(msg),
        }
    }
}

/// Result of creating a provider-side transaction for an order.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayTransaction {
    /// Opaque provider id recorded on the order for later correlation
    pub provider_reference: String,
    /// Provider-specific data the client needs to drive the payment UI
    /// (redirect URL, provider order descriptor)
    pub client_payload: serde_json::Value,
}

/// Provider-specific callback data delivered when the customer returns from
/// the provider or a server-to-server notification arrives.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum CallbackPayload {
    /// Hosted-checkout return. The redirect may carry a success flag; it is
    /// never part of this payload because it is never trusted.
    Redirect { session_id: String },
    /// Client confirmation for the order-creation provider. Payment id and
    /// signature are absent when the customer abandoned or the payment was
    /// declined client-side.
    Signed {
        provider_order_id: String,
        #[serde(default)]
        provider_payment_id: Option<String>,
        #[serde(default)]
        signature: Option<String>,
    },
}

/// Outcome of verifying a callback against the provider.
#[derive(Debug, Clone)]
pub struct CallbackVerdict {
    /// The local order this callback belongs to, resolved from the provider's
    /// own record of the transaction
    pub order_id: Uuid,
    /// Provider transaction id, must match the order's recorded reference
    pub provider_reference: String,
    pub verified: bool,
}

/// Capability interface over the two interchangeable payment providers.
///
/// Adapters have no local side effects: they never touch cart, order status
/// or payment state. Recording `provider_reference` and reacting to the
/// verdict is the reconciliation service's job.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a provider-side transaction for an order in `created` state
    /// with a positive total.
    async fn create_transaction(
        &self,
        order: &OrderModel,
    ) -> Result<GatewayTransaction, GatewayError>;

    /// Verifies a callback against the provider's authoritative record.
    async fn verify_callback(
        &self,
        payload: &CallbackPayload,
    ) -> Result<CallbackVerdict, GatewayError>;
}

/// Selects the adapter for a payment method or callback. Methods whose
/// gateway is not configured are unavailable, not an internal error.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    redirect: Option<Arc<dyn PaymentGateway>>,
    signed: Option<Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new(
        redirect: Option<Arc<dyn PaymentGateway>>,
        signed: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self { redirect, signed }
    }

    pub fn for_method(
        &self,
        method: PaymentMethod,
    ) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        let slot = match method {
            PaymentMethod::Cod => {
                return Err(ServiceError::InvalidOperation(
                    "cash on delivery does not use a payment gateway".to_string(),
                ))
            }
            PaymentMethod::Redirect => &self.redirect,
            PaymentMethod::Signed => &self.signed,
        };

        slot.clone().ok_or_else(|| {
            ServiceError::GatewayUnavailable("payment method is not configured".to_string())
        })
    }

    pub fn for_callback(
        &self,
        payload: &CallbackPayload,
    ) -> Result<Arc<dyn PaymentGateway>, ServiceError> {
        match payload {
            CallbackPayload::Redirect { .. } => self.for_method(PaymentMethod::Redirect),
            CallbackPayload::Signed { .. } => self.for_method(PaymentMethod::Signed),
        }
    }
}
