//! Tool Registry & Capability Sets
//!
//! Declares every callable tool with its JSON-schema parameters, and
//! the named capability sets that gate which agent may invoke which
//! tool. Authorization data lives here as plain ordered lists, not in
//! closures, so it can be inspected and tested on its own.

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::types::{ToolDefinition, ToolDefinitionFunction};

pub const CUSTOMER_CAPABILITY_SET: &str = "customer_support";
pub const ADMIN_CAPABILITY_SET: &str = "admin_analytics";

/// A registered tool: unique name, description for the model, and a
/// JSON-schema describing its parameters. Execution is a pure read
/// against the storefront collaborator; tools never touch session
/// state.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Named, ordered allow-list of tool identifiers.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    pub name: String,
    pub tools: Vec<String>,
}

impl CapabilitySet {
    pub fn contains(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t == tool_name)
    }
}

/// The global tool catalog. Capability sets reference tools by name;
/// resolution always goes through a set, never the bare catalog.
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { specs: Vec::new() }
    }

    /// Registry with every built-in storefront tool.
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        for spec in builtin_tools() {
            registry.register(spec);
        }
        registry
    }

    pub fn register(&mut self, spec: ToolSpec) {
        debug_assert!(
            !self.specs.iter().any(|s| s.name == spec.name),
            "duplicate tool name: {}",
            spec.name
        );
        self.specs.push(spec);
    }

    /// Global lookup, used only to distinguish unknown tools from
    /// unauthorized ones.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Resolve a tool by name within a capability set. A tool present
    /// in the registry but absent from the set is rejected even if the
    /// router and the agent schema were both bypassed.
    pub fn resolve(&self, name: &str, set: &CapabilitySet) -> Result<&ToolSpec, ToolError> {
        if !set.contains(name) {
            if self.get(name).is_some() {
                return Err(ToolError::NotAuthorized {
                    tool: name.to_string(),
                    capability_set: set.name.clone(),
                });
            }
            return Err(ToolError::UnknownTool {
                tool: name.to_string(),
            });
        }
        self.get(name).ok_or_else(|| ToolError::UnknownTool {
            tool: name.to_string(),
        })
    }

    /// Render the model-facing schema for a capability set, in set
    /// order. Tools outside the set are omitted entirely.
    pub fn definitions_for(&self, set: &CapabilitySet) -> Vec<ToolDefinition> {
        set.tools
            .iter()
            .filter_map(|name| self.get(name))
            .map(|spec| ToolDefinition {
                def_type: "function".to_string(),
                function: ToolDefinitionFunction {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                },
            })
            .collect()
    }

    /// Capability set for the customer support agent.
    pub fn customer_capability_set() -> CapabilitySet {
        CapabilitySet {
            name: CUSTOMER_CAPABILITY_SET.to_string(),
            tools: vec![
                "search_products".to_string(),
                "get_best_selling_products".to_string(),
                "track_order".to_string(),
                "get_store_policy".to_string(),
            ],
        }
    }

    /// Capability set for the admin analytics agent: the five admin
    /// tools plus everything customers can do.
    pub fn admin_capability_set() -> CapabilitySet {
        let mut tools = vec![
            "get_sales_report".to_string(),
            "get_product_performance".to_string(),
            "get_inventory_status".to_string(),
            "get_orders_report".to_string(),
            "get_customer_insights".to_string(),
        ];
        tools.extend(Self::customer_capability_set().tools);
        CapabilitySet {
            name: ADMIN_CAPABILITY_SET.to_string(),
            tools,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_builtin_tools()
    }
}

/// Validate arguments against a tool's parameter schema. Collects
/// every offending field; nothing executes when any field fails.
pub fn validate_arguments(spec: &ToolSpec, args: &Value) -> Result<(), ToolError> {
    let mut fields: Vec<String> = Vec::new();

    let obj = match args.as_object() {
        Some(obj) => obj,
        None => {
            return Err(ToolError::InvalidArguments {
                fields: vec!["arguments must be a JSON object".to_string()],
            })
        }
    };

    let empty = serde_json::Map::new();
    let properties = spec.parameters["properties"].as_object().unwrap_or(&empty);

    if let Some(required) = spec.parameters["required"].as_array() {
        for req in required.iter().filter_map(|r| r.as_str()) {
            if !obj.contains_key(req) {
                fields.push(format!("missing required '{req}'"));
            }
        }
    }

    for (key, value) in obj {
        let prop = match properties.get(key) {
            Some(prop) => prop,
            None => {
                fields.push(format!("unknown field '{key}'"));
                continue;
            }
        };

        let type_ok = match prop["type"].as_str() {
            Some("string") => value.is_string(),
            Some("integer") => value.is_i64() || value.is_u64(),
            Some("number") => value.is_number(),
            Some("boolean") => value.is_boolean(),
            _ => true,
        };
        if !type_ok {
            fields.push(format!(
                "'{key}': expected {}",
                prop["type"].as_str().unwrap_or("unknown type")
            ));
            continue;
        }

        if let Some(allowed) = prop["enum"].as_array() {
            if !allowed.contains(value) {
                let options: Vec<&str> = allowed.iter().filter_map(|v| v.as_str()).collect();
                fields.push(format!("'{key}': must be one of {}", options.join(", ")));
            }
        }
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments { fields })
    }
}

/// The built-in tool catalog. Customer tools first, then admin tools.
fn builtin_tools() -> Vec<ToolSpec> {
    vec![
        // --- Customer Tools ---
        ToolSpec {
            name: "search_products".to_string(),
            description: "Unified product search. Handles keyword search, price filtering, \
                          variant availability (size/color), and finding similar products."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "keyword": { "type": "string", "description": "Product name or search term" },
                    "max_price": { "type": "number", "description": "Upper price limit in USD" },
                    "size": { "type": "string", "description": "Variant size to check, e.g. 'medium', 'XL'" },
                    "color": { "type": "string", "description": "Variant color to check, e.g. 'black'" },
                    "find_similar_to": { "type": "string", "description": "Product title to base a similarity search on" },
                    "limit": { "type": "integer", "description": "Max results to return (default 10)" }
                }
            }),
        },
        ToolSpec {
            name: "get_best_selling_products".to_string(),
            description: "Top-selling products by units sold over the past N days. Use for \
                          best sellers, popular items, what's trending."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "days": { "type": "integer", "description": "Lookback window in days (default 30)" },
                    "top_n": { "type": "integer", "description": "Number of top products to return (default 5)" }
                }
            }),
        },
        ToolSpec {
            name: "track_order".to_string(),
            description: "Look up an order by its numeric ID and return status, fulfillment, \
                          line items, and shipping tracking details."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "integer", "description": "The numeric order ID (e.g. 45821)" }
                },
                "required": ["order_id"]
            }),
        },
        ToolSpec {
            name: "get_store_policy".to_string(),
            description: "Store policy information and common support guidance: shipping \
                          times, returns, discounts, damaged items."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "enum": ["shipping", "returns", "discounts", "damaged_item"],
                        "description": "Which policy area to explain"
                    },
                    "destination": { "type": "string", "description": "Shipping destination, used with topic='shipping'" },
                    "order_id": { "type": "integer", "description": "Order to reference, used with topic='damaged_item'" }
                },
                "required": ["topic"]
            }),
        },
        // --- Admin Tools ---
        ToolSpec {
            name: "get_sales_report".to_string(),
            description: "Sales report for a time period: revenue, order count, average \
                          order value, daily breakdown, month-over-month comparison."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "period": {
                        "type": "string",
                        "enum": ["today", "last_7_days", "last_30_days", "this_month", "month_over_month"],
                        "description": "Reporting period (default 'today')"
                    }
                }
            }),
        },
        ToolSpec {
            name: "get_product_performance".to_string(),
            description: "Product-level sales performance: top sellers, or active products \
                          with no sales in the window."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "report_type": {
                        "type": "string",
                        "enum": ["top_sellers", "unsold"],
                        "description": "Which report to produce (default 'top_sellers')"
                    },
                    "days": { "type": "integer", "description": "Lookback window in days (default 30)" },
                    "top_n": { "type": "integer", "description": "Number of top products (default 5)" }
                }
            }),
        },
        ToolSpec {
            name: "get_inventory_status".to_string(),
            description: "List product variants at or below a stock threshold, split into \
                          out-of-stock and low-stock."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "threshold": { "type": "integer", "description": "Units-on-hand threshold (default 10)" }
                }
            }),
        },
        ToolSpec {
            name: "get_orders_report".to_string(),
            description: "Filtered order report for admin review: unfulfilled orders, or \
                          refunded orders with refund totals."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "filter_type": {
                        "type": "string",
                        "enum": ["unfulfilled", "refunded"],
                        "description": "Which orders to list (default 'unfulfilled')"
                    },
                    "days": { "type": "integer", "description": "Lookback window for refunded orders (default 7)" }
                }
            }),
        },
        ToolSpec {
            name: "get_customer_insights".to_string(),
            description: "Top repeat customers ranked by order count and total spend."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "top_n": { "type": "integer", "description": "Number of top customers to display (default 10)" }
                }
            }),
        },
    ]
}
