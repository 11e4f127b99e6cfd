//! Orchestration Loop
//!
//! The per-turn state machine: ROUTING -> AGENT_TURN -> (TOOL_EXEC ->
//! AGENT_TURN)* -> DONE. One incoming user message enters at ROUTING;
//! the loop ends with a final answer (possibly degraded) and a single
//! atomic commit of the turn's history.
//!
//! All history additions are buffered in memory until DONE, so a turn
//! cancelled mid-flight leaves the session store untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ToolLoopExceededError, TurnError};
use crate::session::SessionStore;
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::types::{
    AgentKind, AgentOutput, CommerceClient, ModelClient, Role, SessionMessage, StorebotConfig,
    TokenUsage, ToolCallResult, ToolInvocation, TurnOutcome,
};

use super::profile::AgentProfile;
use super::router::route;

/// States of the turn state machine.
enum TurnState {
    Routing,
    AgentTurn(AgentProfile),
    ToolExec(AgentProfile, Vec<ToolInvocation>),
    Done { answer: String, degraded: bool },
}

impl TurnState {
    fn name(&self) -> &'static str {
        match self {
            TurnState::Routing => "ROUTING",
            TurnState::AgentTurn(_) => "AGENT_TURN",
            TurnState::ToolExec(_, _) => "TOOL_EXEC",
            TurnState::Done { .. } => "DONE",
        }
    }
}

pub struct Orchestrator {
    config: StorebotConfig,
    registry: Arc<ToolRegistry>,
    model: Arc<dyn ModelClient>,
    executor: ToolExecutor,
    store: Arc<SessionStore>,
}

impl Orchestrator {
    pub fn new(
        config: StorebotConfig,
        model: Arc<dyn ModelClient>,
        commerce: Arc<dyn CommerceClient>,
        store: Arc<SessionStore>,
    ) -> Self {
        let registry = Arc::new(ToolRegistry::with_builtin_tools());
        let executor = ToolExecutor::new(
            Arc::clone(&registry),
            commerce,
            Duration::from_secs(config.tool_timeout_secs),
        );
        Self {
            config,
            registry,
            model,
            executor,
            store,
        }
    }

    /// Process one user message through the full loop.
    ///
    /// Only `SessionBusy` and store I/O failures escape; every agent
    /// or tool failure is absorbed into the conversation or into a
    /// degraded final answer.
    pub async fn run_turn(
        &self,
        role: Role,
        thread_id: &str,
        user_text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let _guard = self.store.begin_turn(thread_id)?;

        // Point-in-time read; the buffer holds everything this turn adds
        let prior = self.store.read(thread_id)?;
        let mut buffer: Vec<SessionMessage> = vec![SessionMessage::user(user_text)];
        let mut provenance: Vec<ToolCallResult> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut cycles: u32 = 0;
        let mut agent_kind = AgentKind::Customer;

        let mut state = TurnState::Routing;
        let (answer, degraded) = loop {
            debug!(thread = thread_id, state = state.name(), "turn state");
            state = match state {
                TurnState::Routing => {
                    let marker = self.store.get_active_agent(thread_id)?;
                    let kind = route(role, marker);
                    agent_kind = kind;
                    TurnState::AgentTurn(AgentProfile::for_kind(kind))
                }

                TurnState::AgentTurn(profile) => {
                    let history: Vec<SessionMessage> =
                        prior.iter().chain(buffer.iter()).cloned().collect();

                    match profile
                        .invoke(
                            self.model.as_ref(),
                            &self.registry,
                            &self.config,
                            &history,
                        )
                        .await
                    {
                        Ok(reply) => {
                            usage.accumulate(&reply.usage);
                            match reply.output {
                                AgentOutput::ToolRequests(requests) => {
                                    buffer.push(SessionMessage::assistant(
                                        reply.deferred_text,
                                        requests.clone(),
                                    ));
                                    TurnState::ToolExec(profile, requests)
                                }
                                AgentOutput::FinalAnswer { text, .. } => {
                                    buffer.push(SessionMessage::assistant(
                                        text.clone(),
                                        Vec::new(),
                                    ));
                                    TurnState::Done {
                                        answer: text,
                                        degraded: false,
                                    }
                                }
                            }
                        }
                        Err(err) => {
                            // Model failure degrades the turn, never kills the session
                            warn!(thread = thread_id, error = %err, "model call failed");
                            let apology = apology_for(profile.kind, &err);
                            buffer.push(SessionMessage::assistant(apology.clone(), Vec::new()));
                            TurnState::Done {
                                answer: apology,
                                degraded: true,
                            }
                        }
                    }
                }

                TurnState::ToolExec(profile, requests) => {
                    cycles += 1;
                    if cycles > self.config.max_tool_cycles {
                        let err = ToolLoopExceededError {
                            max_cycles: self.config.max_tool_cycles,
                        };
                        warn!(thread = thread_id, error = %err, "turn degraded");

                        // Resolve the pending requests with errors so
                        // the committed history stays well-formed
                        for request in &requests {
                            buffer.push(SessionMessage::tool_result(
                                request.id.clone(),
                                format!("Error: {err}"),
                            ));
                        }
                        let answer = "I wasn't able to complete this request within the \
                                      allowed number of tool steps. Please try rephrasing \
                                      or narrowing your question."
                            .to_string();
                        buffer.push(SessionMessage::assistant(answer.clone(), Vec::new()));
                        TurnState::Done {
                            answer,
                            degraded: true,
                        }
                    } else {
                        // Concurrent execution, request-order results
                        let results = self
                            .executor
                            .execute_batch(&requests, &profile.capability_set)
                            .await;
                        for result in results {
                            buffer.push(SessionMessage::tool_result(
                                result.id.clone(),
                                result.as_message_content(),
                            ));
                            provenance.push(result);
                        }
                        // Back to the same agent, never the router
                        TurnState::AgentTurn(profile)
                    }
                }

                TurnState::Done { answer, degraded } => break (answer, degraded),
            };
        };

        self.store.commit_turn(thread_id, &buffer, agent_kind)?;

        Ok(TurnOutcome {
            answer,
            degraded,
            provenance,
            usage,
        })
    }
}

/// Role-appropriate apology when the model backend fails mid-turn.
fn apology_for(kind: AgentKind, err: &anyhow::Error) -> String {
    match kind {
        AgentKind::Customer => "I apologize, I'm having trouble processing your request \
                                right now. Please try again or contact our support team \
                                directly."
            .to_string(),
        AgentKind::Admin => format!(
            "Error processing admin request: {err}. Please verify your store API \
             credentials and try again."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{BlockingModel, MockModel};
    use crate::error::{ToolError, ToolExecutionKind};
    use crate::tools::testing::MockCommerce;
    use crate::types::{default_config, MessageKind, Order};
    use serde_json::json;

    fn invocation(id: &str, name: &str, args: serde_json::Value) -> ToolInvocation {
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
            fulfillment_status: Some("fulfilled".to_string()),
            total_price: "129.99".to_string(),
            ..Default::default()
        }
    }

    fn orchestrator(model: MockModel, commerce: MockCommerce) -> Orchestrator {
        let mut config = default_config();
        config.max_tool_cycles = 10;
        Orchestrator::new(
            config,
            Arc::new(model),
            Arc::new(commerce),
            Arc::new(SessionStore::open_in_memory().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_order_tracking_scenario() {
        let model = MockModel::new()
            .push_tool_calls(vec![invocation(
                "call_a",
                "track_order",
                json!({"order_id": 45821}),
            )])
            .push_final("Your order #45821 was paid and has been fulfilled.");
        let commerce = MockCommerce::default().with_order(order(45821));
        let orchestrator = orchestrator(model, commerce);

        let outcome = orchestrator
            .run_turn(Role::Customer, "t1", "Where is my order #45821?")
            .await
            .unwrap();

        assert!(!outcome.degraded);
        assert!(outcome.answer.contains("45821"));
        assert_eq!(outcome.provenance.len(), 1);
        assert_eq!(outcome.provenance[0].name, "track_order");
        assert!(outcome.provenance[0].error.is_none());

        // Committed history: user, assistant(tool call), tool result, final answer
        let history = orchestrator.store.read("t1").unwrap();
        let kinds: Vec<MessageKind> = history.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::User,
                MessageKind::Assistant,
                MessageKind::ToolResult,
                MessageKind::Assistant
            ]
        );
        assert_eq!(history[2].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(
            orchestrator.store.get_active_agent("t1").unwrap(),
            Some(AgentKind::Customer)
        );
    }

    #[tokio::test]
    async fn test_customer_routed_to_customer_agent_despite_admin_marker() {
        let model = Arc::new(MockModel::new().push_final("Happy to help!"));
        let orchestrator = Orchestrator::new(
            default_config(),
            Arc::clone(&model) as Arc<dyn ModelClient>,
            Arc::new(MockCommerce::default()),
            Arc::new(SessionStore::open_in_memory().unwrap()),
        );

        // Seed an elevated marker, as a replayed session would
        orchestrator
            .store
            .set_active_agent("t2", AgentKind::Admin)
            .unwrap();

        orchestrator
            .run_turn(Role::Customer, "t2", "hello")
            .await
            .unwrap();

        let calls = model.calls.lock().unwrap();
        assert!(calls[0].system_prompt.contains("customer support assistant"));
        assert!(!calls[0].tool_names.contains(&"get_sales_report".to_string()));
        assert_eq!(
            orchestrator.store.get_active_agent("t2").unwrap(),
            Some(AgentKind::Customer)
        );
    }

    #[tokio::test]
    async fn test_hallucinated_admin_tool_is_rejected_for_customer() {
        let model = MockModel::new()
            .push_tool_calls(vec![invocation(
                "call_x",
                "get_sales_report",
                json!({"period": "today"}),
            )])
            .push_final("I'm sorry, I can't share sales data.");
        let orchestrator = orchestrator(model, MockCommerce::default());

        let outcome = orchestrator
            .run_turn(Role::Customer, "t3", "Show me today's total sales")
            .await
            .unwrap();

        assert!(!outcome.degraded);
        assert!(matches!(
            outcome.provenance[0].error,
            Some(ToolError::NotAuthorized { .. })
        ));

        // The rejection was fed back as an agent-visible tool result
        let history = orchestrator.store.read("t3").unwrap();
        let tool_result = history
            .iter()
            .find(|m| m.kind == MessageKind::ToolResult)
            .unwrap();
        assert!(tool_result.content.starts_with("Error: "));
        assert!(tool_result.content.contains("not authorized"));
    }

    #[tokio::test]
    async fn test_concurrent_tool_results_keep_request_order() {
        // Slowest first: completion order is c, b, a
        let model = MockModel::new()
            .push_tool_calls(vec![
                invocation("a", "track_order", json!({"order_id": 1})),
                invocation("b", "track_order", json!({"order_id": 2})),
                invocation("c", "track_order", json!({"order_id": 3})),
            ])
            .push_final("All three orders are on their way.");
        let commerce = MockCommerce::default()
            .with_order(order(1))
            .with_order(order(2))
            .with_order(order(3))
            .with_order_delay(1, 80)
            .with_order_delay(2, 40)
            .with_order_delay(3, 5);
        let orchestrator = orchestrator(model, commerce);

        let outcome = orchestrator
            .run_turn(Role::Customer, "t4", "Track orders 1, 2 and 3")
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.provenance.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let history = orchestrator.store.read("t4").unwrap();
        let result_ids: Vec<&str> = history
            .iter()
            .filter(|m| m.kind == MessageKind::ToolResult)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(result_ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_tool_loop_terminates_at_cap() {
        let model = MockModel::new().with_fallback(
            "",
            vec![invocation("loop", "get_store_policy", json!({"topic": "returns"}))],
        );
        let mut config = default_config();
        config.max_tool_cycles = 3;
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(model),
            Arc::new(MockCommerce::default()),
            Arc::new(SessionStore::open_in_memory().unwrap()),
        );

        let outcome = orchestrator
            .run_turn(Role::Customer, "t5", "What's your return policy?")
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert!(outcome.answer.contains("tool steps"));
        // Three batches executed before the cap tripped
        assert_eq!(outcome.provenance.len(), 3);

        // Committed history is well-formed: the final pending request
        // was resolved with a loop-exceeded error
        let history = orchestrator.store.read("t5").unwrap();
        let last_results: Vec<&SessionMessage> = history
            .iter()
            .filter(|m| m.kind == MessageKind::ToolResult)
            .collect();
        assert!(last_results
            .last()
            .unwrap()
            .content
            .contains("tool loop exceeded"));
    }

    #[tokio::test]
    async fn test_model_failure_degrades_with_apology() {
        let model = MockModel::new().push_error("backend unavailable");
        let orchestrator = orchestrator(model, MockCommerce::default());

        let outcome = orchestrator
            .run_turn(Role::Customer, "t6", "hello")
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert!(outcome.answer.contains("apologize"));

        // The degraded turn still commits
        let history = orchestrator.store.read("t6").unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_busy_session_is_rejected() {
        let model = MockModel::new().push_final("ok");
        let orchestrator = orchestrator(model, MockCommerce::default());

        let _guard = orchestrator.store.begin_turn("t7").unwrap();
        let err = orchestrator
            .run_turn(Role::Customer, "t7", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::SessionBusy(_)));
    }

    #[tokio::test]
    async fn test_cancelled_turn_leaves_store_untouched() {
        let orchestrator = Arc::new(Orchestrator::new(
            default_config(),
            Arc::new(BlockingModel),
            Arc::new(MockCommerce::default()),
            Arc::new(SessionStore::open_in_memory().unwrap()),
        ));

        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator.run_turn(Role::Customer, "t8", "hello").await
            })
        };

        // Let the turn reach the (never-resolving) model call, then cancel
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;

        assert!(orchestrator.store.read("t8").unwrap().is_empty());
        // The thread claim was released by the guard on drop
        assert!(orchestrator.store.begin_turn("t8").is_ok());
    }

    #[tokio::test]
    async fn test_tool_timeout_is_fed_back_not_fatal() {
        let model = MockModel::new()
            .push_tool_calls(vec![invocation("slow", "track_order", json!({"order_id": 9}))])
            .push_final("That lookup is taking too long, sorry.");
        let commerce = MockCommerce::default()
            .with_order(order(9))
            .with_order_delay(9, 500);
        let mut config = default_config();
        config.tool_timeout_secs = 0; // rounds down to an immediate timeout budget
        config.max_tool_cycles = 10;
        let orchestrator = Orchestrator::new(
            config,
            Arc::new(model),
            Arc::new(commerce),
            Arc::new(SessionStore::open_in_memory().unwrap()),
        );

        let outcome = orchestrator
            .run_turn(Role::Customer, "t9", "Where is order 9?")
            .await
            .unwrap();

        assert!(!outcome.degraded);
        assert!(matches!(
            outcome.provenance[0].error,
            Some(ToolError::Execution {
                kind: ToolExecutionKind::Timeout,
                ..
            })
        ));
    }
}
