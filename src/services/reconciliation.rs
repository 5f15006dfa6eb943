use crate::{
    entities::{OrderStatus, PaymentMethod, PaymentState},
    errors::ServiceError,
    events::{Event, EventSender},
    gateways::{CallbackPayload, GatewayRegistry},
    services::{
        cart::CartService,
        catalog::CatalogService,
        orders::{OrderResponse, OrderService, SnapshotLine},
    },
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Orchestrates order placement and payment confirmation: ties an order
/// ledger entry to a provider-side transaction, verifies the result and
/// performs the post-payment side effects exactly once.
#[derive(Clone)]
pub struct ReconciliationService {
    orders: Arc<OrderService>,
    cart: Arc<CartService>,
    catalog: Arc<CatalogService>,
    gateways: GatewayRegistry,
    event_sender: Arc<EventSender>,
    delivery_charge: Decimal,
    currency: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub line1: String,
    pub line2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    pub state: Option<String>,
    #[validate(length(min = 1))]
    pub country: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    pub phone: Option<String>,
}

/// Checkout request. Deliberately carries no total: the billed amount is
/// always computed server-side from current catalog prices.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderInput {
    #[validate]
    pub items: Vec<OrderItemInput>,
    #[validate]
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceOrderOutcome {
    pub order: OrderResponse,
    /// Present only for gateway methods: what the client needs to drive the
    /// provider's payment UI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_payload: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmOutcome {
    pub order: OrderResponse,
    /// False when this confirmation was a duplicate delivery and the side
    /// effects had already run
    pub newly_confirmed: bool,
}

/// Sum of line totals plus the flat delivery charge. The one place the
/// billed amount is computed.
pub(crate) fn order_total(lines: &[SnapshotLine], delivery_charge: Decimal) -> Decimal {
    let subtotal: Decimal = lines.iter().map(SnapshotLine::line_total).sum();
    subtotal + delivery_charge
}

impl ReconciliationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<OrderService>,
        cart: Arc<CartService>,
        catalog: Arc<CatalogService>,
        gateways: GatewayRegistry,
        event_sender: Arc<EventSender>,
        delivery_charge: Decimal,
        currency: String,
    ) -> Self {
        Self {
            orders,
            cart,
            catalog,
            gateways,
            event_sender,
            delivery_charge,
            currency,
        }
    }

    /// Places an order for the customer.
    ///
    /// COD orders are placed immediately (cart cleared, no gateway). Gateway
    /// orders are created locally, a provider transaction is opened for them,
    /// and the provider reference plus client payload are returned; the cart
    /// stays untouched until the payment is confirmed. If the provider
    /// transaction cannot be created the local order is cancelled in the same
    /// call, so no `created` row survives that a later callback could pay.
    #[instrument(skip(self, input), fields(customer_id = %customer_id, method = ?input.payment_method))]
    pub async fn place_order(
        &self,
        customer_id: Uuid,
        input: PlaceOrderInput,
    ) -> Result<PlaceOrderOutcome, ServiceError> {
        let lines = self.resolve_lines(&input).await?;

        let total_amount = order_total(&lines, self.delivery_charge);
        let address = serde_json::to_value(&input.address)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        let order = self
            .orders
            .create_order(
                customer_id,
                lines,
                address,
                input.payment_method,
                total_amount,
                self.delivery_charge,
                self.currency.clone(),
            )
            .await?;

        if input.payment_method == PaymentMethod::Cod {
            let placed = self.orders.mark_placed(order.id).await?;
            self.cart.clear(customer_id).await?;

            self.event_sender
                .send_or_log(Event::OrderPlaced {
                    order_id: placed.id,
                    customer_id,
                })
                .await;

            info!(order_id = %placed.id, "COD order placed");
            return Ok(PlaceOrderOutcome {
                order: self.orders.to_response(placed).await?,
                client_payload: None,
            });
        }

        let gateway = self.gateways.for_method(input.payment_method)?;

        let transaction = match gateway.create_transaction(&order).await {
            Ok(transaction) => transaction,
            Err(gateway_err) => {
                // The order must not linger in `created`, where a forged
                // callback could later promote it to paid.
                warn!(
                    order_id = %order.id,
                    error = %gateway_err,
                    "Provider transaction creation failed; cancelling order"
                );
                self.orders.cancel_order(order.id).await?;
                return Err(gateway_err.into());
            }
        };

        self.orders
            .set_provider_reference(order.id, &transaction.provider_reference)
            .await?;

        info!(
            order_id = %order.id,
            provider_reference = %transaction.provider_reference,
            "Provider transaction created"
        );

        let order = self.orders.get_order(order.id).await?;
        Ok(PlaceOrderOutcome {
            order: self.orders.to_response(order).await?,
            client_payload: Some(transaction.client_payload),
        })
    }

    /// Confirms (or rejects) a payment from a provider callback.
    ///
    /// Safe under duplicate and concurrent delivery: the already-paid guard
    /// plus the conditional `mark_paid` update guarantee the side effects
    /// (cart clear, notifications) run at most once per order.
    #[instrument(skip(self, payload))]
    pub async fn confirm_payment(
        &self,
        payload: CallbackPayload,
    ) -> Result<ConfirmOutcome, ServiceError> {
        let gateway = self.gateways.for_callback(&payload)?;
        let verdict = gateway.verify_callback(&payload).await.map_err(|e| {
            warn!(error = %e, "Callback verification failed");
            ServiceError::from(e)
        })?;

        // The order must already exist; a callback never creates one.
        let order = self.orders.get_order(verdict.order_id).await?;

        if order.provider_reference.as_deref() != Some(verdict.provider_reference.as_str()) {
            warn!(
                order_id = %order.id,
                callback_reference = %verdict.provider_reference,
                "Callback reference does not match the order's payment attempt"
            );
            return Err(ServiceError::ValidationError(
                "callback does not match the order's payment attempt".to_string(),
            ));
        }

        // Idempotency guard: duplicate deliveries of a processed callback
        // return success without re-running any side effect.
        if order.payment_state == PaymentState::Paid {
            info!(order_id = %order.id, "Duplicate confirmation for already-paid order");
            return Ok(ConfirmOutcome {
                order: self.orders.to_response(order).await?,
                newly_confirmed: false,
            });
        }

        if !verdict.verified {
            // The cart is left untouched so the customer can retry with a
            // fresh order.
            if order.status != OrderStatus::Cancelled {
                self.orders.cancel_order(order.id).await?;
            }

            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    order_id: order.id,
                    reason: "provider reported payment as not completed".to_string(),
                })
                .await;

            return Err(ServiceError::PaymentFailed(
                "payment was not completed; your cart is unchanged".to_string(),
            ));
        }

        let transitioned = self.orders.mark_paid(order.id).await?;

        if !transitioned {
            // Lost the race (or a duplicate slipped past the guard above).
            let current = self.orders.get_order(order.id).await?;
            if current.payment_state == PaymentState::Paid {
                return Ok(ConfirmOutcome {
                    order: self.orders.to_response(current).await?,
                    newly_confirmed: false,
                });
            }
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is {:?} and can no longer be paid",
                order.id, current.status
            )));
        }

        self.cart.clear(order.customer_id).await?;

        self.event_sender
            .send_or_log(Event::PaymentConfirmed {
                order_id: order.id,
                provider_reference: verdict.provider_reference,
            })
            .await;
        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                customer_id: order.customer_id,
            })
            .await;

        info!(order_id = %order.id, "Payment confirmed, order placed");

        let confirmed = self.orders.get_order(order.id).await?;
        Ok(ConfirmOutcome {
            order: self.orders.to_response(confirmed).await?,
            newly_confirmed: true,
        })
    }

    /// Resolves request items into snapshot lines against the live catalog.
    async fn resolve_lines(
        &self,
        input: &PlaceOrderInput,
    ) -> Result<Vec<SnapshotLine>, ServiceError> {
        if input.items.is_empty() {
            return Err(ServiceError::InvalidOrder(
                "order has no items".to_string(),
            ));
        }

        input
            .address
            .validate()
            .map_err(|e| ServiceError::InvalidOrder(format!("invalid address: {}", e)))?;

        let mut lines = Vec::with_capacity(input.items.len());
        for item in &input.items {
            if item.quantity < 1 {
                return Err(ServiceError::InvalidOrder(format!(
                    "quantity {} is not positive",
                    item.quantity
                )));
            }

            let product = self
                .catalog
                .get_active_product(item.product_id)
                .await
                .map_err(|_| {
                    ServiceError::InvalidOrder(format!(
                        "product {} does not exist",
                        item.product_id
                    ))
                })?;

            if let (Some(sizes), Some(size)) = (&product.sizes, &item.size) {
                let known = sizes
                    .as_array()
                    .map(|list| list.iter().any(|s| s.as_str() == Some(size.as_str())))
                    .unwrap_or(false);
                if !known {
                    return Err(ServiceError::InvalidOrder(format!(
                        "product {} has no size {:?}",
                        product.id, size
                    )));
                }
            }

            lines.push(SnapshotLine {
                product_id: product.id,
                name: product.name,
                unit_price: product.price,
                quantity: item.quantity,
                size: item.size.clone(),
            });
        }

        Ok(lines)
    }
}
