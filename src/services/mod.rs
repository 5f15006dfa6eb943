pub mod cart;
pub mod catalog;
pub mod orders;
pub mod reconciliation;
pub mod wishlist;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use orders::OrderService;
pub use reconciliation::ReconciliationService;
pub use wishlist::WishlistService;
