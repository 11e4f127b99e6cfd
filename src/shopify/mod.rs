//! Storefront collaborator integration (Shopify Admin REST API).

mod client;

pub use client::ShopifyClient;
