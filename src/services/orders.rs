use crate::{
    entities::{
        order, order_item, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus,
        PaymentMethod, PaymentState,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// One order line as snapshotted at creation time. Name and unit price are
/// copied from the catalog so later edits never change historical orders.
#[derive(Debug, Clone)]
pub struct SnapshotLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub size: Option<String>,
}

impl SnapshotLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub size: Option<String>,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub payment_state: PaymentState,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub delivery_charge: Decimal,
    pub currency: String,
    pub shipping_address: serde_json::Value,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

/// Order ledger. Owns the status lifecycle and the payment sub-state; the
/// `unpaid → paid` transition is a conditional update so that concurrent
/// confirmations cannot both win.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates an order in `created`/`unpaid` state with its snapshot lines,
    /// all inside one transaction.
    #[instrument(skip(self, lines, shipping_address), fields(customer_id = %customer_id))]
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        lines: Vec<SnapshotLine>,
        shipping_address: serde_json::Value,
        payment_method: PaymentMethod,
        total_amount: Decimal,
        delivery_charge: Decimal,
        currency: String,
    ) -> Result<OrderModel, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!(
                "ORD-{}",
                order_id.to_string()[..8].to_uppercase()
            )),
            customer_id: Set(customer_id),
            status: Set(OrderStatus::Created),
            payment_state: Set(PaymentState::Unpaid),
            payment_method: Set(payment_method),
            total_amount: Set(total_amount),
            delivery_charge: Set(delivery_charge),
            currency: Set(currency),
            shipping_address: Set(shipping_address.to_string()),
            provider_reference: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let order = order.insert(&txn).await?;

        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                name: Set(line.name.clone()),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity),
                size: Set(line.size.clone()),
                line_total: Set(line.line_total()),
                created_at: Set(now),
            };
            item.insert(&txn).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;

        info!(order_id = %order_id, "Order created");
        Ok(order)
    }

    /// Records the provider transaction id for an order. Assigns at most
    /// once: a second assignment attempt is a conflict, never an overwrite.
    #[instrument(skip(self))]
    pub async fn set_provider_reference(
        &self,
        order_id: Uuid,
        provider_reference: &str,
    ) -> Result<(), ServiceError> {
        let result = Order::update_many()
            .set(order::ActiveModel {
                provider_reference: Set(Some(provider_reference.to_string())),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::ProviderReference.is_null())
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "order {} already has a provider reference",
                order_id
            )));
        }
        Ok(())
    }

    /// The `unpaid → paid` transition, as a compare-and-swap.
    ///
    /// Returns `true` when this call performed the transition and `false`
    /// when another confirmation already had. The filter restricts the update
    /// to `created`/`unpaid` rows, so cancelled orders can never become paid.
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        let result = Order::update_many()
            .set(order::ActiveModel {
                payment_state: Set(PaymentState::Paid),
                status: Set(OrderStatus::Placed),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::PaymentState.eq(PaymentState::Unpaid))
            .filter(order::Column::Status.eq(OrderStatus::Created))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Moves a `created` COD order straight to `placed`.
    #[instrument(skip(self))]
    pub async fn mark_placed(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        self.transition(order_id, OrderStatus::Placed).await
    }

    /// Cancels an order. Terminal orders (`delivered`, `cancelled`) reject
    /// cancellation.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let cancelled = self.transition(order_id, OrderStatus::Cancelled).await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        Ok(cancelled)
    }

    /// Admin fulfillment progression with lifecycle validation.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let updated = self.transition(order_id, new_status).await?;
        Ok(updated)
    }

    async fn transition(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let existing = self.get_order(order_id).await?;
        let old_status = existing.status;

        if !old_status.can_transition_to(new_status) {
            warn!(
                order_id = %order_id,
                ?old_status,
                ?new_status,
                "Rejected illegal status transition"
            );
            return Err(ServiceError::InvalidOperation(format!(
                "cannot move order from {:?} to {:?}",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{:?}", old_status),
                new_status: format!("{:?}", new_status),
            })
            .await;

        info!(order_id = %order_id, ?old_status, ?new_status, "Order status updated");
        Ok(updated)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Fetches an order owned by the given customer; other customers' orders
    /// are indistinguishable from absent ones.
    pub async fn get_order_for_customer(
        &self,
        order_id: Uuid,
        customer_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        let order = self.get_order(order_id).await?;
        if order.customer_id != customer_id {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }
        Ok(order)
    }

    pub async fn list_orders_for_customer(
        &self,
        customer_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = Order::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Converts an order model plus its item rows into the response shape.
    pub async fn to_response(&self, order: OrderModel) -> Result<OrderResponse, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;

        Ok(build_response(order, items))
    }
}

fn build_response(order: OrderModel, items: Vec<OrderItemModel>) -> OrderResponse {
    let shipping_address = serde_json::from_str(&order.shipping_address)
        .unwrap_or_else(|_| serde_json::Value::String(order.shipping_address.clone()));

    OrderResponse {
        id: order.id,
        order_number: order.order_number,
        customer_id: order.customer_id,
        status: order.status,
        payment_state: order.payment_state,
        payment_method: order.payment_method,
        total_amount: order.total_amount,
        delivery_charge: order.delivery_charge,
        currency: order.currency,
        shipping_address,
        provider_reference: order.provider_reference,
        created_at: order.created_at,
        updated_at: order.updated_at,
        items: items
            .into_iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id,
                name: item.name,
                unit_price: item.unit_price,
                quantity: item.quantity,
                size: item.size,
                line_total: item.line_total,
            })
            .collect(),
    }
}
