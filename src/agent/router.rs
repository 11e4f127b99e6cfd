//! Router
//!
//! The sole authorization checkpoint. Routing is a pure function of
//! the authenticated role and the stored active-agent marker; message
//! content can never influence it. Every component downstream trusts
//! this decision and performs no independent role re-check (tool-level
//! restriction is capability-set membership, which routing implicitly
//! selects by choosing the agent).

use tracing::info;

use crate::types::{AgentKind, Role};

/// Select the agent for a turn.
///
/// A customer is always routed to the customer agent, regardless of
/// any prior active-agent marker: a replayed or tampered session can
/// never retain elevated routing. Admins go to the admin agent. Pure
/// and idempotent.
pub fn route(role: Role, active_agent: Option<AgentKind>) -> AgentKind {
    let chosen = match role {
        Role::Customer => AgentKind::Customer,
        Role::Admin => AgentKind::Admin,
    };
    info!(
        role = %role,
        prior = ?active_agent,
        agent = chosen.as_str(),
        "routing decision"
    );
    chosen
}
