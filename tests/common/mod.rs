#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use storefront_api::{
    entities::{OrderModel, PaymentMethod, ProductModel},
    events::{Event, EventSender},
    gateways::{
        CallbackPayload, CallbackVerdict, GatewayError, GatewayRegistry, GatewayTransaction,
        PaymentGateway,
    },
    migrator::Migrator,
    services::{
        catalog::CreateProductInput,
        reconciliation::{OrderItemInput, PlaceOrderInput, ShippingAddress},
        CartService, CatalogService, OrderService, ReconciliationService, WishlistService,
    },
};

pub const DELIVERY_CHARGE: Decimal = dec!(10);

/// Scripted in-process payment gateway. Records call counts and lets tests
/// choose the create outcome and the verification verdict.
pub struct TestGateway {
    pub create_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
    pub fail_create: AtomicBool,
    pub verify_result: AtomicBool,
}

impl TestGateway {
    pub fn new() -> Self {
        Self {
            create_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            fail_create: AtomicBool::new(false),
            verify_result: AtomicBool::new(true),
        }
    }

    pub fn reference_for(order_id: Uuid) -> String {
        format!("test_ref_{}", order_id)
    }

    pub fn callback_for(order_id: Uuid) -> CallbackPayload {
        CallbackPayload::Redirect {
            session_id: Self::reference_for(order_id),
        }
    }
}

#[async_trait]
impl PaymentGateway for TestGateway {
    async fn create_transaction(
        &self,
        order: &OrderModel,
    ) -> Result<GatewayTransaction, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("test provider down".to_string()));
        }
        if order.total_amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidAmount(format!(
                "cannot charge {}",
                order.total_amount
            )));
        }

        let reference = Self::reference_for(order.id);
        Ok(GatewayTransaction {
            provider_reference: reference.clone(),
            client_payload: serde_json::json!({ "session_id": reference }),
        })
    }

    async fn verify_callback(
        &self,
        payload: &CallbackPayload,
    ) -> Result<CallbackVerdict, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);

        let reference = match payload {
            CallbackPayload::Redirect { session_id } => session_id.clone(),
            CallbackPayload::Signed {
                provider_order_id, ..
            } => provider_order_id.clone(),
        };

        let order_id = reference
            .strip_prefix("test_ref_")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(|| {
                GatewayError::MalformedCallback(format!("unknown reference {}", reference))
            })?;

        Ok(CallbackVerdict {
            order_id,
            provider_reference: reference,
            verified: self.verify_result.load(Ordering::SeqCst),
        })
    }
}

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub wishlist: Arc<WishlistService>,
    pub orders: Arc<OrderService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub gateway: Arc<TestGateway>,
    pub event_sender: Arc<EventSender>,
    events: Mutex<mpsc::Receiver<Event>>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
        opt.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.expect("sqlite connection");
        Migrator::up(&db, None).await.expect("migrations");
        let db = Arc::new(db);

        let (tx, rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(tx));

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
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));

        let gateway = Arc::new(TestGateway::new());
        let registry = GatewayRegistry::new(
            Some(gateway.clone() as Arc<dyn PaymentGateway>),
            Some(gateway.clone() as Arc<dyn PaymentGateway>),
        );

        let reconciliation = Arc::new(ReconciliationService::new(
            orders.clone(),
            cart.clone(),
            catalog.clone(),
            registry,
            event_sender.clone(),
            DELIVERY_CHARGE,
            "USD".to_string(),
        ));

        Self {
            db,
            catalog,
            cart,
            wishlist,
            orders,
            reconciliation,
            gateway,
            event_sender,
            events: Mutex::new(rx),
        }
    }

    /// Builds a reconciliation service wired to a custom gateway registry,
    /// sharing this app's stores.
    pub fn reconciliation_with(&self, registry: GatewayRegistry) -> ReconciliationService {
        ReconciliationService::new(
            self.orders.clone(),
            self.cart.clone(),
            self.catalog.clone(),
            registry,
            self.event_sender.clone(),
            DELIVERY_CHARGE,
            "USD".to_string(),
        )
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> ProductModel {
        self.catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: None,
                price,
                currency: "USD".to_string(),
                category: Some("apparel".to_string()),
                sizes: Some(vec!["S".to_string(), "M".to_string(), "L".to_string()]),
                image_url: None,
                is_featured: false,
            })
            .await
            .expect("seed product")
    }

    /// Drains every event emitted so far.
    pub async fn drain_events(&self) -> Vec<Event> {
        let mut rx = self.events.lock().await;
        let mut drained = Vec::new();
        while let Ok(event) = rx.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub async fn count_cart_cleared(&self) -> usize {
        self.drain_events()
            .await
            .iter()
            .filter(|event| matches!(event, Event::CartCleared(_)))
            .count()
    }
}

pub fn test_address() -> ShippingAddress {
    ShippingAddress {
        name: "Jo Doe".to_string(),
        line1: "12 High Street".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        state: Some("IL".to_string()),
        country: "US".to_string(),
        postal_code: "62701".to_string(),
        phone: None,
    }
}

pub fn order_input(
    items: Vec<(Uuid, i32)>,
    payment_method: PaymentMethod,
) -> PlaceOrderInput {
    PlaceOrderInput {
        items: items
            .into_iter()
            .map(|(product_id, quantity)| OrderItemInput {
                product_id,
                quantity,
                size: Some("M".to_string()),
            })
            .collect(),
        address: test_address(),
        payment_method,
    }
}
