use crate::{
    entities::{wishlist, wishlist_item, Wishlist, WishlistItem, WishlistItemModel, WishlistModel},
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
use tracing::instrument;
use uuid::Uuid;

/// Wishlist service: per-customer saved products.
#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    catalog: Arc<CatalogService>,
}

#[derive(Debug, Serialize)]
pub struct WishlistWithItems {
    pub wishlist: WishlistModel,
    pub items: Vec<WishlistItemModel>,
}

impl WishlistService {
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

    async fn get_or_create(&self, customer_id: Uuid) -> Result<WishlistModel, ServiceError> {
        if let Some(existing) = Wishlist::find()
            .filter(wishlist::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let created = wishlist::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        Ok(created)
    }

    pub async fn get_wishlist(
        &self,
        customer_id: Uuid,
    ) -> Result<WishlistWithItems, ServiceError> {
        let wishlist = self.get_or_create(customer_id).await?;
        let items = wishlist.find_related(WishlistItem).all(&*self.db).await?;
        Ok(WishlistWithItems { wishlist, items })
    }

    /// Adds a product. Adding a product that is already saved is a no-op.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishlistWithItems, ServiceError> {
        self.catalog.get_active_product(product_id).await?;

        let wishlist = self.get_or_create(customer_id).await?;

        let existing = WishlistItem::find()
            .filter(wishlist_item::Column::WishlistId.eq(wishlist.id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        if existing.is_none() {
            wishlist_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                wishlist_id: Set(wishlist.id),
                product_id: Set(product_id),
                created_at: Set(Utc::now()),
            }
            .insert(&*self.db)
            .await?;

            self.event_sender
                .send_or_log(Event::WishlistItemAdded {
                    customer_id,
                    product_id,
                })
                .await;
        }

        self.get_wishlist(customer_id).await
    }

    /// Removes a product; removing an absent product succeeds silently.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<WishlistWithItems, ServiceError> {
        let wishlist = self.get_or_create(customer_id).await?;

        let existing = WishlistItem::find()
            .filter(wishlist_item::Column::WishlistId.eq(wishlist.id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        if let Some(item) = existing {
            item.delete(&*self.db).await?;

            self.event_sender
                .send_or_log(Event::WishlistItemRemoved {
                    customer_id,
                    product_id,
                })
                .await;
        }

        self.get_wishlist(customer_id).await
    }
}
