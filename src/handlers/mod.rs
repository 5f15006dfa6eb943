use crate::{
    events::EventSender,
    gateways::GatewayRegistry,
    services::{CartService, CatalogService, OrderService, ReconciliationService, WishlistService},
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod carts;
pub mod common;
pub mod orders;
pub mod products;
pub mod wishlist;

/// Aggregated services used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub wishlist: Arc<WishlistService>,
    pub orders: Arc<OrderService>,
    pub reconciliation: Arc<ReconciliationService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateways: GatewayRegistry,
        delivery_charge: Decimal,
        currency: String,
    ) -> Self {
        let catalog = Arc::new(CatalogService::new(db.clone(), event_sender.clone()));
        let cart = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            catalog.clone(),
        ));
        let wishlist = Arc::new(WishlistService::new(
            db.clone(),
            event_sender.clone(),
            catalog.clone(),
        ));
        let orders = Arc::new(OrderService::new(db, event_sender.clone()));
        let reconciliation = Arc::new(ReconciliationService::new(
            orders.clone(),
            cart.clone(),
            catalog.clone(),
            gateways,
            event_sender,
            delivery_charge,
            currency,
        ));

        Self {
            catalog,
            cart,
            wishlist,
            orders,
            reconciliation,
        }
    }
}
