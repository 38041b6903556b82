//! cache_get tool implementation.
//!
//! Retrieves the stored response for a request, using the same bucket
//! priority as interception.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use store_finder_client::{CacheAgent, Network, fetch::canonicalize};
use store_finder_core::{CacheStorage, Error, RequestKey, ResponseType};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the agent origin.
    pub url: String,

    /// HTTP method of the stored request (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub key: RequestKey,
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: ResponseType,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl<S, N>(agent: &CacheAgent<S, N>, params: CacheGetParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let config = agent.config();
    let url = canonicalize(&params.url, &config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let key = RequestKey::new(params.method.as_deref().unwrap_or("GET"), url.as_str());

    let priority = [config.precache_name.as_str(), config.runtime_name.as_str()];
    let response = agent
        .storage()
        .match_any(&key, &priority)
        .await?
        .ok_or_else(|| Error::CacheMiss(key.to_string()))?;

    let output = CacheGetOutput {
        key,
        body: response.text(),
        url: response.url,
        status: response.status,
        status_text: response.status_text,
        response_type: response.response_type,
        headers: response.headers,
    };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize entry: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
