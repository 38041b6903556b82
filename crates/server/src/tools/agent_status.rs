//! agent_status tool implementation.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use store_finder_client::{CacheAgent, Network};
use store_finder_core::{CacheStorage, Error};

/// Output structure for agent_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentStatusOutput {
    /// One of installing, installed, activating, active.
    pub state: String,
    pub skip_waiting: bool,
    pub clients_claimed: bool,
    pub installed_at: Option<String>,
    pub activated_at: Option<String>,
    pub precache: String,
    pub runtime: String,
    /// Every bucket in storage, in creation order.
    pub buckets: Vec<String>,
    /// Background revalidations not yet finished.
    pub pending_tasks: usize,
}

/// Implementation of the agent_status tool.
pub async fn status_impl<S, N>(agent: &CacheAgent<S, N>) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let status = agent.status();
    let buckets = agent.storage().keys().await?;

    let output = AgentStatusOutput {
        state: status.state.to_string(),
        skip_waiting: status.skip_waiting,
        clients_claimed: status.clients_claimed,
        installed_at: status.installed_at,
        activated_at: status.activated_at,
        precache: agent.config().precache_name.clone(),
        runtime: agent.config().runtime_name.clone(),
        buckets,
        pending_tasks: agent.tasks().len(),
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize status: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
