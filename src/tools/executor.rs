//! Tool Executor
//!
//! Resolves tool-invocation requests against the currently bound
//! capability set, validates arguments, runs the commerce query, and
//! absorbs every failure into a typed `ToolError`. This layer rejects
//! unauthorized tools on its own, even if router and agent-schema
//! filtering were both bypassed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ToolError, ToolExecutionKind};
use crate::types::{CommerceClient, ToolCallResult, ToolInvocation};

use super::format::preview;
use super::registry::{validate_arguments, CapabilitySet, ToolRegistry};
use super::{admin, customer};

#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    commerce: Arc<dyn CommerceClient>,
    tool_timeout: Duration,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        commerce: Arc<dyn CommerceClient>,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            commerce,
            tool_timeout,
        }
    }

    /// Execute one request. Never fails past this boundary: every
    /// error lands in the result's `error` field, ready to be fed
    /// back to the agent as a tool-result message.
    pub async fn execute(&self, request: &ToolInvocation, set: &CapabilitySet) -> ToolCallResult {
        let started = Instant::now();
        debug!(
            tool = %request.name,
            args = %preview(&request.arguments.to_string(), 100),
            "executing tool"
        );

        let outcome = self.run(request, set).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                info!(
                    tool = %request.name,
                    duration_ms,
                    result = %preview(&result, 200),
                    "tool ok"
                );
                ToolCallResult {
                    id: request.id.clone(),
                    name: request.name.clone(),
                    arguments: request.arguments.clone(),
                    result,
                    duration_ms,
                    error: None,
                }
            }
            Err(err) => {
                info!(tool = %request.name, duration_ms, error = %err, "tool failed");
                ToolCallResult {
                    id: request.id.clone(),
                    name: request.name.clone(),
                    arguments: request.arguments.clone(),
                    result: String::new(),
                    duration_ms,
                    error: Some(err),
                }
            }
        }
    }

    /// Execute a batch of requests concurrently. Results come back in
    /// request order regardless of completion order; concurrency is
    /// permitted in execution, never in the observable history.
    pub async fn execute_batch(
        &self,
        requests: &[ToolInvocation],
        set: &CapabilitySet,
    ) -> Vec<ToolCallResult> {
        let handles: Vec<_> = requests
            .iter()
            .map(|request| {
                let executor = self.clone();
                let request = request.clone();
                let set = set.clone();
                tokio::spawn(async move { executor.execute(&request, &set).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (handle, request) in handles.into_iter().zip(requests) {
            let result = handle.await.unwrap_or_else(|join_err| ToolCallResult {
                id: request.id.clone(),
                name: request.name.clone(),
                arguments: request.arguments.clone(),
                result: String::new(),
                duration_ms: 0,
                error: Some(ToolError::Execution {
                    kind: ToolExecutionKind::Unknown,
                    message: format!("tool task failed: {join_err}"),
                }),
            });
            results.push(result);
        }
        results
    }

    async fn run(&self, request: &ToolInvocation, set: &CapabilitySet) -> Result<String, ToolError> {
        let spec = self.registry.resolve(&request.name, set)?;
        validate_arguments(spec, &request.arguments)?;

        let query = dispatch(self.commerce.as_ref(), &request.name, &request.arguments);
        match tokio::time::timeout(self.tool_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Execution {
                kind: ToolExecutionKind::Timeout,
                message: format!(
                    "tool '{}' timed out after {}s",
                    request.name,
                    self.tool_timeout.as_secs()
                ),
            }),
        }
    }
}

/// Dispatch a validated request to its implementation.
async fn dispatch(
    commerce: &dyn CommerceClient,
    name: &str,
    args: &Value,
) -> Result<String, ToolError> {
    match name {
        "search_products" => customer::search_products(commerce, args).await,
        "get_best_selling_products" => customer::get_best_selling_products(commerce, args).await,
        "track_order" => customer::track_order(commerce, args).await,
        "get_store_policy" => customer::get_store_policy(commerce, args).await,
        "get_sales_report" => admin::get_sales_report(commerce, args).await,
        "get_product_performance" => admin::get_product_performance(commerce, args).await,
        "get_inventory_status" => admin::get_inventory_status(commerce, args).await,
        "get_orders_report" => admin::get_orders_report(commerce, args).await,
        "get_customer_insights" => admin::get_customer_insights(commerce, args).await,
        other => Err(ToolError::UnknownTool {
            tool: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{MockCommerce, MockFailure};
    use crate::types::Order;
    use serde_json::json;

    fn executor(commerce: MockCommerce, timeout_ms: u64) -> ToolExecutor {
        ToolExecutor::new(
            Arc::new(ToolRegistry::with_builtin_tools()),
            Arc::new(commerce),
            Duration::from_millis(timeout_ms),
        )
    }

    fn invocation(id: &str, name: &str, args: Value) -> ToolInvocation {
        ToolInvocation {
            id: id.to_string(),
            name: name.to_string(),
            arguments: args,
        }
    }

    fn order(id: u64) -> Order {
        Order {
            id,
            created_at: "2025-06-01T10:00:00Z".to_string(),
            financial_status: "paid".to_string(),
            total_price: "10.00".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_tool_outside_bound_set() {
        let executor = executor(MockCommerce::default(), 1_000);
        let set = ToolRegistry::customer_capability_set();

        let result = executor
            .execute(
                &invocation("call_1", "get_sales_report", json!({"period": "today"})),
                &set,
            )
            .await;

        assert!(matches!(
            result.error,
            Some(ToolError::NotAuthorized { .. })
        ));
        assert_eq!(result.id, "call_1");
    }

    #[tokio::test]
    async fn test_rejects_invalid_arguments_before_execution() {
        let executor = executor(MockCommerce::default(), 1_000);
        let set = ToolRegistry::customer_capability_set();

        let result = executor
            .execute(
                &invocation("call_2", "track_order", json!({"order_id": "45821"})),
                &set,
            )
            .await;

        match result.error {
            Some(ToolError::InvalidArguments { fields }) => {
                assert!(fields.iter().any(|f| f.contains("order_id")));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collaborator_failure_maps_to_typed_kind() {
        let executor = executor(
            MockCommerce::default().failing(MockFailure::RateLimited),
            1_000,
        );
        let set = ToolRegistry::customer_capability_set();

        let result = executor
            .execute(
                &invocation("call_3", "search_products", json!({"keyword": "wallet"})),
                &set,
            )
            .await;

        assert!(matches!(
            result.error,
            Some(ToolError::Execution {
                kind: ToolExecutionKind::RateLimited,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_slow_tool_yields_timeout_error() {
        let commerce = MockCommerce::default()
            .with_order(order(1))
            .with_order_delay(1, 200);
        let executor = executor(commerce, 50);
        let set = ToolRegistry::customer_capability_set();

        let result = executor
            .execute(&invocation("call_4", "track_order", json!({"order_id": 1})), &set)
            .await;

        assert!(matches!(
            result.error,
            Some(ToolError::Execution {
                kind: ToolExecutionKind::Timeout,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_batch_results_keep_request_order() {
        // Slowest first: completion order is c, b, a
        let commerce = MockCommerce::default()
            .with_order(order(1))
            .with_order(order(2))
            .with_order(order(3))
            .with_order_delay(1, 80)
            .with_order_delay(2, 40)
            .with_order_delay(3, 5);
        let executor = executor(commerce, 1_000);
        let set = ToolRegistry::customer_capability_set();

        let requests = vec![
            invocation("a", "track_order", json!({"order_id": 1})),
            invocation("b", "track_order", json!({"order_id": 2})),
            invocation("c", "track_order", json!({"order_id": 3})),
        ];

        let results = executor.execute_batch(&requests, &set).await;
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results.iter().all(|r| r.error.is_none()));
    }
}
