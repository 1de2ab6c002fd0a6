//! HTTP handlers, one module per page of the marketplace

pub mod cart;
pub mod checkout;
pub mod health;
pub mod listings;
pub mod profile;

pub use cart::{add_to_cart, get_cart, remove_from_cart};
pub use checkout::{buy_now, checkout_cart};
pub use health::health_check;
pub use listings::{create_listing, delete_listing, list_all, list_by_category};
pub use profile::{get_stats, init_stats, my_listings, my_purchases, my_sales};
