//! Shopify Admin API Client
//!
//! Read-only wrapper around the Shopify Admin REST API. Implements
//! `CommerceClient`; every failure is mapped to a typed
//! `CommerceError` so the tool executor can classify it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::CommerceError;
use crate::types::{CommerceClient, Customer, Order, PriceRule, Product};

/// Per-request budget against the Shopify API.
const REQUEST_TIMEOUT_SECS: u64 = 15;

pub struct ShopifyClient {
    base_url: String,
    access_token: String,
    http: Client,
}

impl ShopifyClient {
    /// * `store_domain` - e.g. `my-store.myshopify.com`.
    /// * `api_version` - e.g. `2024-10`.
    /// * `access_token` - Admin API access token.
    pub fn new(store_domain: &str, api_version: &str, access_token: &str) -> Self {
        Self {
            base_url: format!("https://{store_domain}/admin/api/{api_version}"),
            access_token: access_token.to_string(),
            http: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Internal helper: GET an endpoint and return the JSON body.
    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, CommerceError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let resp = self
            .http
            .get(&url)
            .header("X-Shopify-Access-Token", &self.access_token)
            .header("Content-Type", "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CommerceError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    CommerceError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 404 {
            return Err(CommerceError::NotFound(endpoint.to_string()));
        }
        if status.as_u16() == 429 {
            return Err(CommerceError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CommerceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| CommerceError::Decode(e.to_string()))
    }

    /// Deserialize an array field of a response envelope, e.g. the
    /// `products` key of `products.json`.
    fn parse_list<T: serde::de::DeserializeOwned>(
        data: &Value,
        key: &str,
    ) -> Result<Vec<T>, CommerceError> {
        match data.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|_| CommerceError::Decode(format!("bad '{key}' payload"))),
        }
    }
}

#[async_trait]
impl CommerceClient for ShopifyClient {
    async fn search_products(&self, query: &str, limit: u32) -> Result<Vec<Product>, CommerceError> {
        let mut params: Vec<(&str, String)> = vec![("limit", limit.to_string())];
        if !query.is_empty() {
            params.push(("title", query.to_string()));
        }
        let data = self.get("products.json", &params).await?;
        Self::parse_list(&data, "products")
    }

    async fn get_all_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError> {
        let data = self
            .get("products.json", &[("limit", limit.to_string())])
            .await?;
        Self::parse_list(&data, "products")
    }

    async fn get_order(&self, order_id: u64) -> Result<Order, CommerceError> {
        let data = self.get(&format!("orders/{order_id}.json"), &[]).await?;
        serde_json::from_value(data["order"].clone())
            .map_err(|_| CommerceError::NotFound(format!("order {order_id}")))
    }

    async fn get_orders_in_range(
        &self,
        created_at_min: &str,
        created_at_max: &str,
    ) -> Result<Vec<Order>, CommerceError> {
        let params: Vec<(&str, String)> = vec![
            ("created_at_min", created_at_min.to_string()),
            ("created_at_max", created_at_max.to_string()),
            ("status", "any".to_string()),
            ("limit", "250".to_string()),
        ];
        let data = self.get("orders.json", &params).await?;
        Self::parse_list(&data, "orders")
    }

    async fn get_unfulfilled_orders(&self) -> Result<Vec<Order>, CommerceError> {
        let params: Vec<(&str, String)> = vec![
            ("fulfillment_status", "unfulfilled".to_string()),
            ("status", "open".to_string()),
            ("limit", "250".to_string()),
        ];
        let data = self.get("orders.json", &params).await?;
        Self::parse_list(&data, "orders")
    }

    async fn get_customers(&self, limit: u32) -> Result<Vec<Customer>, CommerceError> {
        let data = self
            .get("customers.json", &[("limit", limit.to_string())])
            .await?;
        Self::parse_list(&data, "customers")
    }

    async fn get_price_rules(&self, limit: u32) -> Result<Vec<PriceRule>, CommerceError> {
        let data = self
            .get("price_rules.json", &[("limit", limit.to_string())])
            .await?;
        Self::parse_list(&data, "price_rules")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_assembly() {
        let client = ShopifyClient::new("silk-skin.myshopify.com", "2024-10", "shpat_x");
        assert_eq!(
            client.base_url,
            "https://silk-skin.myshopify.com/admin/api/2024-10"
        );
    }

    #[test]
    fn test_parse_list_tolerates_missing_key() {
        let data = serde_json::json!({});
        let products: Vec<Product> = ShopifyClient::parse_list(&data, "products").unwrap();
        assert!(products.is_empty());
    }

    #[test]
    fn test_parse_list_reads_records() {
        let data = serde_json::json!({
            "orders": [{
                "id": 45821,
                "created_at": "2025-06-01T10:00:00Z",
                "financial_status": "paid",
                "total_price": "129.99",
                "line_items": [{"name": "Leather Wallet", "quantity": 2, "price": "65.00"}]
            }]
        });
        let orders: Vec<Order> = ShopifyClient::parse_list(&data, "orders").unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 45821);
        assert_eq!(orders[0].line_items[0].quantity, 2);
    }
}
