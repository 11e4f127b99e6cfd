//! Admin Tools
//!
//! The five analytics tools for store owners: sales reports, product
//! performance, inventory alerts, order reports, and customer
//! insights. All read-only against the commerce collaborator.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ToolError;
use crate::types::{CommerceClient, Order};

use super::format::{
    calculate_average_order_value, calculate_total_sales, end_of_last_month_iso,
    extract_product_sales, format_order_summary, format_price, iso_days_ago, parse_price,
    rank_by_quantity, start_of_last_month_iso, start_of_month_iso, start_of_today_iso,
};

/// Sales report for a given period: revenue, order count, AOV, and a
/// per-day breakdown or month-over-month comparison where applicable.
pub async fn get_sales_report(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let period = args["period"].as_str().unwrap_or("today");

    match period {
        "today" => {
            let orders = commerce
                .get_orders_in_range(&start_of_today_iso(), &iso_days_ago(0))
                .await?;
            let total = calculate_total_sales(&orders);
            let aov = if orders.is_empty() {
                0.0
            } else {
                total / orders.len() as f64
            };
            Ok(format!(
                "Today's Sales:\n  Orders:  {}\n  Revenue: {}\n  AOV:     {}",
                orders.len(),
                format_price(total),
                format_price(aov)
            ))
        }

        "last_7_days" | "last_30_days" => {
            let days: i64 = if period == "last_7_days" { 7 } else { 30 };
            let orders = commerce
                .get_orders_in_range(&iso_days_ago(days), &iso_days_ago(0))
                .await?;
            if orders.is_empty() {
                return Ok(format!("No orders in the last {days} days."));
            }

            // BTreeMap keeps the per-day breakdown date-sorted
            let mut by_date: BTreeMap<String, (usize, f64)> = BTreeMap::new();
            for order in &orders {
                let date: String = order.created_at.chars().take(10).collect();
                let entry = by_date.entry(date).or_default();
                entry.0 += 1;
                entry.1 += parse_price(&order.total_price);
            }

            let total = calculate_total_sales(&orders);
            let aov = calculate_average_order_value(&orders);

            let mut lines = vec![format!("Sales Performance — Last {days} Days:")];
            for (date, (count, revenue)) in &by_date {
                lines.push(format!("  {date}: {count} order(s) | {}", format_price(*revenue)));
            }
            lines.push(format!(
                "\n  Total:   {} orders | {}",
                orders.len(),
                format_price(total)
            ));
            lines.push(format!("  AOV:     {}", format_price(aov)));
            Ok(lines.join("\n"))
        }

        "this_month" => {
            let orders = commerce
                .get_orders_in_range(&start_of_month_iso(), &iso_days_ago(0))
                .await?;
            if orders.is_empty() {
                return Ok("No orders this month yet.".to_string());
            }
            Ok(format!(
                "This Month's Sales:\n  Orders:  {}\n  Revenue: {}\n  AOV:     {}",
                orders.len(),
                format_price(calculate_total_sales(&orders)),
                format_price(calculate_average_order_value(&orders))
            ))
        }

        "month_over_month" => {
            let this_orders = commerce
                .get_orders_in_range(&start_of_month_iso(), &iso_days_ago(0))
                .await?;
            let last_orders = commerce
                .get_orders_in_range(&start_of_last_month_iso(), &end_of_last_month_iso())
                .await?;

            let this_rev = calculate_total_sales(&this_orders);
            let last_rev = calculate_total_sales(&last_orders);
            let change = if last_rev > 0.0 {
                format!("{:+.1}%", (this_rev - last_rev) / last_rev * 100.0)
            } else {
                "n/a".to_string()
            };
            let order_diff = this_orders.len() as i64 - last_orders.len() as i64;

            Ok(format!(
                "Month-over-Month Comparison:\n\
                 \x20 This Month: {:>4} orders | {}\n\
                 \x20 Last Month: {:>4} orders | {}\n\
                 \x20 Change:     {order_diff:+} orders | Revenue {change}",
                this_orders.len(),
                format_price(this_rev),
                last_orders.len(),
                format_price(last_rev)
            ))
        }

        other => Ok(format!("Unknown period '{other}'.")),
    }
}

/// Product-level performance: top sellers or active products with no
/// sales in the window.
pub async fn get_product_performance(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let report_type = args["report_type"].as_str().unwrap_or("top_sellers");
    let days = args["days"].as_i64().unwrap_or(30);
    let top_n = args["top_n"].as_u64().unwrap_or(5) as usize;

    let orders = commerce
        .get_orders_in_range(&iso_days_ago(days), &iso_days_ago(0))
        .await?;

    match report_type {
        "top_sellers" => {
            if orders.is_empty() {
                return Ok(format!("No orders in the last {days} days."));
            }

            let ranked = rank_by_quantity(extract_product_sales(&orders));
            let mut lines = vec![format!("Top {top_n} Products (last {days} days):")];
            for (i, (title, data)) in ranked.iter().take(top_n).enumerate() {
                lines.push(format!(
                    "  {}. {title}\n     Sold: {} units | Revenue: {}",
                    i + 1,
                    data.quantity,
                    format_price(data.revenue)
                ));
            }
            Ok(lines.join("\n"))
        }

        "unsold" => {
            let sold_titles: std::collections::HashSet<String> = orders
                .iter()
                .flat_map(|o| o.line_items.iter())
                .map(|item| item.title.trim().to_lowercase())
                .collect();

            let all_products = commerce.get_all_products(250).await?;
            let unsold: Vec<_> = all_products
                .iter()
                .filter(|p| {
                    p.status == "active" && !sold_titles.contains(&p.title.trim().to_lowercase())
                })
                .collect();

            if unsold.is_empty() {
                return Ok(format!(
                    "All active products have had at least one sale in the last {days} days."
                ));
            }

            let mut lines = vec![format!(
                "Active Products With No Sales in Last {days} Days ({}):",
                unsold.len()
            )];
            for p in unsold.iter().take(25) {
                lines.push(format!("  • {}", p.title));
            }
            if unsold.len() > 25 {
                lines.push(format!("  ... and {} more.", unsold.len() - 25));
            }
            Ok(lines.join("\n"))
        }

        other => Ok(format!(
            "Unknown report_type '{other}'. Use 'top_sellers' or 'unsold'."
        )),
    }
}

/// Out-of-stock and low-stock variants across active products.
pub async fn get_inventory_status(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let threshold = args["threshold"].as_i64().unwrap_or(10);

    let products = commerce.get_all_products(250).await?;
    let mut out_of_stock: Vec<String> = Vec::new();
    let mut low_stock: Vec<String> = Vec::new();

    for p in products.iter().filter(|p| p.status == "active") {
        for v in &p.variants {
            let inventory = match v.inventory_quantity {
                Some(n) => n,
                None => continue,
            };
            let label = if v.title == "Default Title" {
                p.title.clone()
            } else {
                format!("{} — {}", p.title, v.title)
            };
            if inventory == 0 {
                out_of_stock.push(format!("  ⛔ {label} | Stock: 0"));
            } else if inventory <= threshold {
                low_stock.push(format!("  ⚠️  {label} | Stock: {inventory}"));
            }
        }
    }

    if out_of_stock.is_empty() && low_stock.is_empty() {
        return Ok(format!(
            "All active products are well-stocked (threshold: {threshold} units)."
        ));
    }

    let mut lines = vec![format!("Inventory Alerts (threshold ≤ {threshold} units):")];
    if !out_of_stock.is_empty() {
        lines.push(format!("\n  Out of Stock ({}):", out_of_stock.len()));
        lines.extend(out_of_stock);
    }
    if !low_stock.is_empty() {
        lines.push(format!("\n  Low Stock ({}):", low_stock.len()));
        lines.extend(low_stock);
    }
    Ok(lines.join("\n"))
}

/// Unfulfilled or refunded orders for admin review.
pub async fn get_orders_report(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let filter_type = args["filter_type"].as_str().unwrap_or("unfulfilled");
    let days = args["days"].as_i64().unwrap_or(7);

    match filter_type {
        "unfulfilled" => {
            let orders = commerce.get_unfulfilled_orders().await?;
            if orders.is_empty() {
                return Ok(
                    "No unfulfilled orders — all current orders are fulfilled or cancelled."
                        .to_string(),
                );
            }

            let mut lines = vec![format!("Unfulfilled Orders: {}", orders.len())];
            for order in orders.iter().take(20) {
                lines.push(format!("  {}", format_order_summary(order)));
            }
            if orders.len() > 20 {
                lines.push(format!("  ... and {} more.", orders.len() - 20));
            }
            Ok(lines.join("\n"))
        }

        "refunded" => {
            let orders = commerce
                .get_orders_in_range(&iso_days_ago(days), &iso_days_ago(0))
                .await?;
            let refunded: Vec<&Order> =
                orders.iter().filter(|o| !o.refunds.is_empty()).collect();
            if refunded.is_empty() {
                return Ok(format!("No refunded orders in the last {days} days."));
            }

            let mut total_refunded = 0.0;
            let mut lines = vec![format!(
                "Refunded Orders — Last {days} Days ({}):",
                refunded.len()
            )];
            for order in &refunded {
                let refund_amount: f64 = order
                    .refunds
                    .iter()
                    .flat_map(|r| r.transactions.iter())
                    .map(|t| parse_price(&t.amount))
                    .sum();
                total_refunded += refund_amount;
                lines.push(format!(
                    "  {} | Refunded: {}",
                    format_order_summary(order),
                    format_price(refund_amount)
                ));
            }
            lines.push(format!("\n  Total Refunded: {}", format_price(total_refunded)));
            Ok(lines.join("\n"))
        }

        other => Ok(format!(
            "Unknown filter_type '{other}'. Use 'unfulfilled' or 'refunded'."
        )),
    }
}

/// Top repeat customers by order count, then total spend.
pub async fn get_customer_insights(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let top_n = args["top_n"].as_u64().unwrap_or(10) as usize;

    let customers = commerce.get_customers(250).await?;
    let mut repeat: Vec<_> = customers
        .into_iter()
        .filter(|c| c.orders_count > 1)
        .collect();
    repeat.sort_by(|a, b| {
        b.orders_count.cmp(&a.orders_count).then(
            parse_price(&b.total_spent)
                .partial_cmp(&parse_price(&a.total_spent))
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    if repeat.is_empty() {
        return Ok("No repeat customers found yet.".to_string());
    }

    let mut lines = vec![format!("Top {top_n} Repeat Customers:")];
    for (i, c) in repeat.iter().take(top_n).enumerate() {
        let name = format!("{} {}", c.first_name, c.last_name);
        let name = if name.trim().is_empty() {
            "Unknown"
        } else {
            name.trim()
        };
        let email = if c.email.is_empty() { "N/A" } else { &c.email };
        lines.push(format!(
            "  {:>2}. {name} ({email}) | Orders: {} | Total Spent: {}",
            i + 1,
            c.orders_count,
            format_price(parse_price(&c.total_spent))
        ));
    }
    Ok(lines.join("\n"))
}
