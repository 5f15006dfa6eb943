use crate::{
    entities::{cart, cart_item, Cart, CartItem, CartItemModel, CartModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::CatalogService,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Cart store: one cart per customer, a mapping of product id to a positive
/// quantity. This is the only module that mutates cart rows, so the "no zero
/// or negative entries" invariant is enforced in exactly one place.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    catalog: Arc<CatalogService>,
}

/// Cart with items
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: CartModel,
    pub items: Vec<CartItemModel>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        catalog: Arc<CatalogService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            catalog,
        }
    }

    /// Returns the customer's cart, creating an empty one on first touch.
    pub async fn get_or_create_cart(&self, customer_id: Uuid) -> Result<CartModel, ServiceError> {
        if let Some(existing) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let new_cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = new_cart.insert(&*self.db).await?;
        info!(customer_id = %customer_id, cart_id = %created.id, "Created cart");
        Ok(created)
    }

    /// Returns the cart with its items.
    pub async fn get_cart(&self, customer_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;
        let items = cart.find_related(CartItem).all(&*self.db).await?;
        Ok(CartWithItems { cart, items })
    }

    /// Sets the quantity for one product in the customer's cart.
    ///
    /// A quantity of zero or less removes the line; removing an absent line
    /// succeeds silently. Positive quantities upsert and require the product
    /// to exist and be active.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_cart(customer_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        if quantity <= 0 {
            if let Some(item) = existing {
                item.delete(&*self.db).await?;
            }
        } else {
            self.catalog.get_active_product(product_id).await?;

            let now = Utc::now();
            match existing {
                Some(item) => {
                    let mut active: cart_item::ActiveModel = item.into();
                    active.quantity = Set(quantity);
                    active.updated_at = Set(now);
                    active.update(&*self.db).await?;
                }
                None => {
                    let item = cart_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        cart_id: Set(cart.id),
                        product_id: Set(product_id),
                        quantity: Set(quantity),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };
                    item.insert(&*self.db).await?;
                }
            }
        }

        self.touch_cart(&cart).await?;

        self.event_sender
            .send_or_log(Event::CartItemSet {
                customer_id,
                product_id,
                quantity,
            })
            .await;

        self.get_cart(customer_id).await
    }

    /// Empties the customer's cart. Idempotent: clearing an already-empty (or
    /// never-created) cart succeeds silently.
    #[instrument(skip(self))]
    pub async fn clear(&self, customer_id: Uuid) -> Result<(), ServiceError> {
        let cart = match Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        {
            Some(cart) => cart,
            None => return Ok(()),
        };

        let deleted = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;

        self.touch_cart(&cart).await?;

        self.event_sender
            .send_or_log(Event::CartCleared(customer_id))
            .await;

        info!(
            customer_id = %customer_id,
            removed = deleted.rows_affected,
            "Cleared cart"
        );
        Ok(())
    }

    async fn touch_cart(&self, cart: &CartModel) -> Result<(), ServiceError> {
        let mut active: cart::ActiveModel = cart.clone().into();
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}
