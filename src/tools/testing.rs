//! Test doubles for the commerce collaborator.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CommerceError;
use crate::types::{CommerceClient, Customer, Order, PriceRule, Product};

/// Failure injected into every call of a `MockCommerce`.
#[derive(Clone, Copy, Debug)]
pub enum MockFailure {
    Timeout,
    RateLimited,
    Network,
}

/// In-memory `CommerceClient` with optional per-order latency and
/// blanket failure injection.
#[derive(Default)]
pub struct MockCommerce {
    pub products: Vec<Product>,
    pub orders: HashMap<u64, Order>,
    pub range_orders: Vec<Order>,
    pub unfulfilled: Vec<Order>,
    pub customers: Vec<Customer>,
    pub price_rules: Vec<PriceRule>,
    pub order_delays_ms: HashMap<u64, u64>,
    pub failure: Option<MockFailure>,
}

impl MockCommerce {
    pub fn with_products(mut self, products: Vec<Product>) -> Self {
        self.products = products;
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.insert(order.id, order);
        self
    }

    pub fn with_range_orders(mut self, orders: Vec<Order>) -> Self {
        self.range_orders = orders;
        self
    }

    pub fn with_unfulfilled(mut self, orders: Vec<Order>) -> Self {
        self.unfulfilled = orders;
        self
    }

    pub fn with_customers(mut self, customers: Vec<Customer>) -> Self {
        self.customers = customers;
        self
    }

    pub fn with_price_rules(mut self, rules: Vec<PriceRule>) -> Self {
        self.price_rules = rules;
        self
    }

    /// Delay `get_order(order_id)` by the given number of
    /// milliseconds, for completion-order tests.
    pub fn with_order_delay(mut self, order_id: u64, ms: u64) -> Self {
        self.order_delays_ms.insert(order_id, ms);
        self
    }

    pub fn failing(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    fn check(&self) -> Result<(), CommerceError> {
        match self.failure {
            Some(MockFailure::Timeout) => Err(CommerceError::Timeout(15)),
            Some(MockFailure::RateLimited) => Err(CommerceError::RateLimited),
            Some(MockFailure::Network) => Err(CommerceError::Network("connection reset".into())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CommerceClient for MockCommerce {
    async fn search_products(&self, query: &str, limit: u32) -> Result<Vec<Product>, CommerceError> {
        self.check()?;
        let query_lc = query.to_lowercase();
        Ok(self
            .products
            .iter()
            .filter(|p| query.is_empty() || p.title.to_lowercase().contains(&query_lc))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_all_products(&self, limit: u32) -> Result<Vec<Product>, CommerceError> {
        self.check()?;
        Ok(self.products.iter().take(limit as usize).cloned().collect())
    }

    async fn get_order(&self, order_id: u64) -> Result<Order, CommerceError> {
        self.check()?;
        if let Some(ms) = self.order_delays_ms.get(&order_id) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        self.orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| CommerceError::NotFound(format!("order {order_id}")))
    }

    async fn get_orders_in_range(
        &self,
        _created_at_min: &str,
        _created_at_max: &str,
    ) -> Result<Vec<Order>, CommerceError> {
        self.check()?;
        Ok(self.range_orders.clone())
    }

    async fn get_unfulfilled_orders(&self) -> Result<Vec<Order>, CommerceError> {
        self.check()?;
        Ok(self.unfulfilled.clone())
    }

    async fn get_customers(&self, limit: u32) -> Result<Vec<Customer>, CommerceError> {
        self.check()?;
        Ok(self.customers.iter().take(limit as usize).cloned().collect())
    }

    async fn get_price_rules(&self, limit: u32) -> Result<Vec<PriceRule>, CommerceError> {
        self.check()?;
        Ok(self
            .price_rules
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
