//! Tool Result Formatting & Aggregation
//!
//! Formatters that render commerce records into the plain-text tool
//! results the agents read, plus the sales aggregation and date-window
//! helpers the report tools share.

use std::collections::HashMap;

use chrono::{Datelike, Duration, TimeZone, Utc};

use crate::types::{Order, Product};

// ─── Prices ──────────────────────────────────────────────────────

/// Parse a Shopify price string ("129.99") into a float. Empty or
/// malformed values count as zero.
pub fn parse_price(amount: &str) -> f64 {
    amount.trim().parse::<f64>().unwrap_or(0.0)
}

pub fn format_price(amount: f64) -> String {
    format!("${amount:.2}")
}

// ─── Summaries ───────────────────────────────────────────────────

/// One-line product summary for the agent's context.
pub fn format_product_summary(product: &Product) -> String {
    let min_price = product
        .variants
        .iter()
        .map(|v| parse_price(&v.price))
        .fold(f64::INFINITY, f64::min);
    let from = if min_price.is_finite() {
        format_price(min_price)
    } else {
        "N/A".to_string()
    };
    format!(
        "• {} | From {} | Status: {} | Tags: {}",
        product.title, from, product.status, product.tags
    )
}

/// One-line order summary for the agent's context.
pub fn format_order_summary(order: &Order) -> String {
    let fulfillment = order
        .fulfillment_status
        .as_deref()
        .unwrap_or("unfulfilled");
    let created = order.created_at.chars().take(10).collect::<String>();
    format!(
        "Order #{} | {} | {} | Fulfillment: {} | Payment: {}",
        order.id,
        created,
        format_price(parse_price(&order.total_price)),
        fulfillment,
        order.financial_status
    )
}

// ─── Sales Aggregation ───────────────────────────────────────────

pub fn calculate_total_sales(orders: &[Order]) -> f64 {
    orders.iter().map(|o| parse_price(&o.total_price)).sum()
}

pub fn calculate_average_order_value(orders: &[Order]) -> f64 {
    if orders.is_empty() {
        return 0.0;
    }
    calculate_total_sales(orders) / orders.len() as f64
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductSales {
    pub quantity: i64,
    pub revenue: f64,
}

/// Aggregate units sold and revenue per product title from order line
/// items.
pub fn extract_product_sales(orders: &[Order]) -> HashMap<String, ProductSales> {
    let mut sales: HashMap<String, ProductSales> = HashMap::new();
    for order in orders {
        for item in &order.line_items {
            let title = if item.title.is_empty() {
                item.name.clone()
            } else {
                item.title.clone()
            };
            let entry = sales.entry(title).or_default();
            entry.quantity += item.quantity;
            entry.revenue += item.quantity as f64 * parse_price(&item.price);
        }
    }
    sales
}

/// Rank aggregated product sales by quantity, descending.
pub fn rank_by_quantity(sales: HashMap<String, ProductSales>) -> Vec<(String, ProductSales)> {
    let mut ranked: Vec<(String, ProductSales)> = sales.into_iter().collect();
    ranked.sort_by(|a, b| b.1.quantity.cmp(&a.1.quantity).then(a.0.cmp(&b.0)));
    ranked
}

// ─── Date Windows ────────────────────────────────────────────────

pub fn iso_days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc3339()
}

pub fn start_of_today_iso() -> String {
    let now = Utc::now();
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
        .to_rfc3339()
}

pub fn start_of_month_iso() -> String {
    let now = Utc::now();
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
        .to_rfc3339()
}

pub fn start_of_last_month_iso() -> String {
    let now = Utc::now();
    let first_of_this = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let last_month = first_of_this - Duration::days(1);
    Utc.with_ymd_and_hms(last_month.year(), last_month.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(last_month)
        .to_rfc3339()
}

pub fn end_of_last_month_iso() -> String {
    let now = Utc::now();
    let first_of_this = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    (first_of_this - Duration::seconds(1)).to_rfc3339()
}

/// Truncate a preview string for log output.
pub fn preview(text: &str, max: usize) -> String {
    if text.len() > max {
        let cut = text
            .char_indices()
            .take_while(|(i, _)| *i < max)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineItem, Variant};

    fn order(id: u64, total: &str, items: Vec<LineItem>) -> Order {
        Order {
            id,
            created_at: "2025-06-01T10:00:00Z".to_string(),
            financial_status: "paid".to_string(),
            fulfillment_status: None,
            total_price: total.to_string(),
            line_items: items,
            ..Default::default()
        }
    }

    fn item(title: &str, quantity: i64, price: &str) -> LineItem {
        LineItem {
            name: title.to_string(),
            title: title.to_string(),
            quantity,
            price: price.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_price_handles_garbage() {
        assert_eq!(parse_price("129.99"), 129.99);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("free"), 0.0);
    }

    #[test]
    fn test_total_and_average() {
        let orders = vec![
            order(1, "100.00", vec![]),
            order(2, "50.00", vec![]),
            order(3, "not-a-price", vec![]),
        ];
        assert_eq!(calculate_total_sales(&orders), 150.0);
        assert_eq!(calculate_average_order_value(&orders), 50.0);
        assert_eq!(calculate_average_order_value(&[]), 0.0);
    }

    #[test]
    fn test_extract_product_sales_aggregates_across_orders() {
        let orders = vec![
            order(1, "0", vec![item("Leather Wallet", 2, "65.00")]),
            order(2, "0", vec![item("Leather Wallet", 1, "65.00"), item("Card Holder", 3, "25.00")]),
        ];
        let sales = extract_product_sales(&orders);
        assert_eq!(sales["Leather Wallet"].quantity, 3);
        assert_eq!(sales["Leather Wallet"].revenue, 195.0);
        assert_eq!(sales["Card Holder"].quantity, 3);

        let ranked = rank_by_quantity(sales);
        assert_eq!(ranked[0].1.quantity, 3);
    }

    #[test]
    fn test_product_summary_uses_cheapest_variant() {
        let product = Product {
            id: 1,
            title: "Travel Bag".to_string(),
            status: "active".to_string(),
            tags: "leather, travel".to_string(),
            variants: vec![
                Variant {
                    id: 1,
                    title: "Large".to_string(),
                    price: "199.00".to_string(),
                    inventory_quantity: Some(4),
                },
                Variant {
                    id: 2,
                    title: "Small".to_string(),
                    price: "149.00".to_string(),
                    inventory_quantity: Some(0),
                },
            ],
            ..Default::default()
        };
        let summary = format_product_summary(&product);
        assert!(summary.contains("From $149.00"));
        assert!(summary.contains("Travel Bag"));
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("0123456789abc", 10), "0123456789...");
    }
}
