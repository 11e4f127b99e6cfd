//! Customer Tools
//!
//! The four customer-facing tools: product search, best sellers,
//! order tracking, and store policies. Each is a pure read against
//! the commerce collaborator rendering a plain-text result.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;

use crate::error::{CommerceError, ToolError};
use crate::types::{CommerceClient, Product};

use super::format::{
    extract_product_sales, format_price, format_product_summary, iso_days_ago, parse_price,
    rank_by_quantity,
};

/// Unified product search: keyword, price filter, variant (size/color)
/// availability, and similarity mode.
pub async fn search_products(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let keyword = args["keyword"].as_str().unwrap_or("");
    let max_price = args["max_price"].as_f64();
    let size = args["size"].as_str().unwrap_or("");
    let color = args["color"].as_str().unwrap_or("");
    let find_similar_to = args["find_similar_to"].as_str().unwrap_or("");
    let limit = args["limit"].as_u64().unwrap_or(10) as usize;

    // ── Similarity Mode ──────────────────────────────────────────
    if !find_similar_to.is_empty() {
        let ref_hits = commerce.search_products(find_similar_to, 3).await?;
        let reference = match ref_hits.first() {
            Some(p) => p.clone(),
            None => {
                return Ok(format!(
                    "Could not find a product matching '{find_similar_to}' to base recommendations on."
                ))
            }
        };

        let ref_tags = tag_set(&reference);
        let ref_type = reference.product_type.to_lowercase();

        let catalog = commerce.get_all_products(150).await?;
        let mut scored: Vec<(i64, Product)> = catalog
            .into_iter()
            .filter(|p| p.id != reference.id)
            .filter_map(|p| {
                let shared = tag_set(&p).intersection(&ref_tags).count() as i64;
                let type_match =
                    i64::from(!ref_type.is_empty() && p.product_type.to_lowercase() == ref_type);
                let score = shared * 2 + type_match;
                (score > 0).then_some((score, p))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let top: Vec<Product> = scored.into_iter().take(limit).map(|(_, p)| p).collect();

        if top.is_empty() {
            return Ok(format!("No similar products found for '{}'.", reference.title));
        }

        let mut lines = vec![format!("Products similar to '{}':", reference.title)];
        lines.extend(top.iter().map(format_product_summary));
        return Ok(lines.join("\n"));
    }

    // ── Standard Search Mode ─────────────────────────────────────
    let filtering = max_price.is_some() || !size.is_empty() || !color.is_empty();
    let fetch_limit = if filtering { 250 } else { limit as u32 };
    let mut products = commerce.search_products(keyword, fetch_limit).await?;

    let suffix = if keyword.is_empty() {
        String::new()
    } else {
        format!(" matching '{keyword}'")
    };

    if products.is_empty() {
        return Ok(format!("No products found{suffix}."));
    }

    if let Some(cap) = max_price {
        products.retain(|p| p.variants.iter().any(|v| parse_price(&v.price) <= cap));
        if products.is_empty() {
            return Ok(format!("No products found under {}{suffix}.", format_price(cap)));
        }
    }

    if !size.is_empty() || !color.is_empty() {
        let size_lc = size.to_lowercase();
        let color_lc = color.to_lowercase();

        let mut results: Vec<String> = Vec::new();
        for p in &products {
            let mut matched: Vec<String> = Vec::new();
            for v in &p.variants {
                let v_title = v.title.to_lowercase();
                if (size_lc.is_empty() || v_title.contains(&size_lc))
                    && (color_lc.is_empty() || v_title.contains(&color_lc))
                {
                    let stock = match v.inventory_quantity {
                        Some(n) if n > 0 => "In Stock",
                        Some(_) => "Out of Stock",
                        None => "Availability Unknown",
                    };
                    matched.push(format!(
                        "    └ {} | {} | {stock}",
                        v.title,
                        format_price(parse_price(&v.price))
                    ));
                }
            }
            if !matched.is_empty() {
                results.push(format!("• {}", p.title));
                results.extend(matched);
            }
        }

        if results.is_empty() {
            let filter_desc: Vec<&str> = [size, color].into_iter().filter(|s| !s.is_empty()).collect();
            let for_kw = if keyword.is_empty() {
                String::new()
            } else {
                format!(" for '{keyword}'")
            };
            return Ok(format!(
                "No variants matching '{}' found{for_kw}.",
                filter_desc.join(" / ")
            ));
        }

        let mut header: Vec<String> = Vec::new();
        if !keyword.is_empty() {
            header.push(keyword.to_string());
        }
        if !size.is_empty() {
            header.push(format!("size: {size}"));
        }
        if !color.is_empty() {
            header.push(format!("color: {color}"));
        }
        return Ok(format!(
            "Variant Availability ({}):\n{}",
            header.join(", "),
            results.join("\n")
        ));
    }

    let shown = products.len().min(limit);
    let mut lines = vec![format!("Found {shown} product(s){suffix}:")];
    lines.extend(products.iter().take(limit).map(format_product_summary));
    Ok(lines.join("\n"))
}

fn tag_set(product: &Product) -> HashSet<String> {
    product
        .tags
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Top-selling products by units sold over the past N days.
pub async fn get_best_selling_products(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let days = args["days"].as_i64().unwrap_or(30);
    let top_n = args["top_n"].as_u64().unwrap_or(5) as usize;

    let orders = commerce
        .get_orders_in_range(&iso_days_ago(days), &iso_days_ago(0))
        .await?;
    if orders.is_empty() {
        return Ok(format!("No sales data available for the last {days} days."));
    }

    let sales = extract_product_sales(&orders);
    if sales.is_empty() {
        return Ok("No product sales data found in recent orders.".to_string());
    }

    let ranked = rank_by_quantity(sales);
    let mut lines = vec![format!("Top {top_n} Best-Selling Products (last {days} days):")];
    for (i, (title, data)) in ranked.iter().take(top_n).enumerate() {
        lines.push(format!("  {}. {title} — {} sold", i + 1, data.quantity));
    }
    Ok(lines.join("\n"))
}

/// Order status, fulfillment, line items, and shipping tracking.
pub async fn track_order(commerce: &dyn CommerceClient, args: &Value) -> Result<String, ToolError> {
    let order_id = args["order_id"].as_u64().unwrap_or(0);

    let order = match commerce.get_order(order_id).await {
        Ok(order) => order,
        // A wrong order number is a conversational answer, not a failure
        Err(CommerceError::NotFound(_)) => {
            return Ok(format!(
                "Order #{order_id} not found. Please double-check the number from \
                 your confirmation email."
            ))
        }
        Err(err) => return Err(err.into()),
    };

    let created = order.created_at.chars().take(10).collect::<String>();
    let fulfillment = order
        .fulfillment_status
        .as_deref()
        .unwrap_or("unfulfilled");

    let mut lines = vec![
        format!("Order #{order_id}"),
        format!("  Placed:       {created}"),
        format!("  Payment:      {}", order.financial_status),
        format!("  Fulfillment:  {fulfillment}"),
        format!("  Total:        {}", format_price(parse_price(&order.total_price))),
    ];

    if !order.line_items.is_empty() {
        lines.push("  Items:".to_string());
        for item in order.line_items.iter().take(5) {
            lines.push(format!("    - {} x{}", item.name, item.quantity));
        }
    }

    if order.fulfillments.is_empty() {
        lines.push(
            "  Shipping: Not yet shipped. You'll receive a notification when it dispatches."
                .to_string(),
        );
    } else {
        lines.push("  Shipping:".to_string());
        for f in &order.fulfillments {
            let carrier = f.tracking_company.as_deref().unwrap_or("N/A");
            let number = f.tracking_number.as_deref().unwrap_or("N/A");
            lines.push(format!(
                "    Carrier: {carrier} | Tracking #: {number} | Status: {}",
                f.status
            ));
            if let Some(url) = f.tracking_url.as_deref() {
                if !url.is_empty() {
                    lines.push(format!("    Track: {url}"));
                }
            }
        }
    }

    Ok(lines.join("\n"))
}

/// Store policy information and common support guidance.
pub async fn get_store_policy(
    commerce: &dyn CommerceClient,
    args: &Value,
) -> Result<String, ToolError> {
    let topic = args["topic"].as_str().unwrap_or("");
    let destination = args["destination"].as_str().unwrap_or("");
    let order_id = args["order_id"].as_u64();

    match topic {
        "shipping" => {
            let mut response = "Shipping Options:\n\
                 \x20 • Standard  — 5–7 business days | Free on orders over $50\n\
                 \x20 • Express   — 2–3 business days | $12.99\n\
                 \x20 • Overnight — 1 business day    | $24.99\n\n\
                 \x20 Orders are processed within 1–2 business days after payment confirmation."
                .to_string();
            if !destination.is_empty() {
                response.push_str(&format!(
                    "\n\n  Delivery to {destination}: approx. 5–7 days (Standard) \
                     or 2–3 days (Express) from dispatch."
                ));
            }
            Ok(response)
        }

        "returns" => Ok("Return & Refund Policy:\n\
             \x20 • 30-day return window from delivery date.\n\
             \x20 • Items must be unused, unwashed, and in original packaging.\n\
             \x20 • To initiate: email support@yourstore.com with your order number.\n\
             \x20 • Refunds issued within 5–7 business days of receiving your return.\n\
             \x20 • Final sale and personalized items cannot be returned.\n\
             \x20 • Damaged or defective items: full refund or replacement with no return required."
            .to_string()),

        "discounts" => {
            // Live promotions first, static offers as fallback
            match commerce.get_price_rules(20).await {
                Ok(rules) => {
                    let active: Vec<_> =
                        rules.iter().filter(|r| r.status == "enabled").collect();
                    if !active.is_empty() {
                        let mut lines = vec!["Current Promotions:".to_string()];
                        for rule in active {
                            let value = parse_price(&rule.value).abs();
                            let amount = if rule.value_type == "percentage" {
                                format!("{value:.0}% off")
                            } else {
                                format!("{} off", format_price(value))
                            };
                            let mut entry = format!("  • {}: {amount}", rule.title);
                            if let Some(ends_at) = rule.ends_at.as_deref() {
                                let date: String = ends_at.chars().take(10).collect();
                                entry.push_str(&format!(" (expires {date})"));
                            }
                            lines.push(entry);
                        }
                        return Ok(lines.join("\n"));
                    }
                }
                Err(err) => {
                    warn!("live price rules unavailable: {err}");
                }
            }

            Ok("Current Offers:\n\
                \x20 • WELCOME10 — 10% off your first order.\n\
                \x20 • Free standard shipping on orders over $50.\n\
                \x20 • Newsletter subscribers get early access to sales and exclusive codes."
                .to_string())
        }

        "damaged_item" => {
            let mut order_context = String::new();
            if let Some(id) = order_id {
                match commerce.get_order(id).await {
                    Ok(order) => {
                        let names: Vec<&str> = order
                            .line_items
                            .iter()
                            .take(3)
                            .map(|i| i.name.as_str())
                            .collect();
                        order_context =
                            format!("\n  We can see your order contained: {}.", names.join(", "));
                    }
                    Err(_) => {
                        order_context = format!(
                            "\n  (Order #{id} could not be verified — please include it in your email.)"
                        );
                    }
                }
            }

            let reference = match order_id {
                Some(id) => format!("order #{id}"),
                None => "your order".to_string(),
            };
            Ok(format!(
                "We're sorry about the damaged item!{order_context}\n\n\
                 Here's how we'll make it right:\n\
                 \x20 1. Take a clear photo of the damaged item and packaging.\n\
                 \x20 2. Email support@yourstore.com with:\n\
                 \x20      - Order number ({reference})\n\
                 \x20      - Brief description of the damage\n\
                 \x20      - Photos attached\n\
                 \x20 3. We'll reply within 24 hours with a full replacement or refund — your choice.\n\n\
                 \x20 You do NOT need to return the damaged item."
            ))
        }

        other => Ok(format!(
            "Unknown topic '{other}'. Valid options: shipping, returns, discounts, damaged_item."
        )),
    }
}
