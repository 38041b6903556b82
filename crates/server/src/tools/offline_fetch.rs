//! offline_fetch tool implementation.
//!
//! Dispatches a fetch event to the cache agent. Requests the agent declines
//! are sent to the network unaltered.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use store_finder_client::{CacheAgent, FetchOutcome, Method, Network, RequestDescriptor, fetch::canonicalize};
use store_finder_core::{CacheStorage, Error};

/// Input parameters for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchParams {
    /// Absolute URL, or a path resolved against the agent origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Optional request body, sent as-is.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for offline_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OfflineFetchOutput {
    /// The canonical request URL.
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Response body decoded as UTF-8 (lossy).
    pub body: String,
    /// "cache", "network", "offline", or "passthrough".
    pub source: String,
}

/// Implementation of the offline_fetch tool.
pub async fn fetch_impl<S, N>(agent: &CacheAgent<S, N>, params: OfflineFetchParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let url = canonicalize(&params.url, &agent.config().origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
    let method = Method::from_bytes(params.method.to_ascii_uppercase().as_bytes())
        .map_err(|e| Error::InvalidInput(format!("invalid method {:?}: {e}", params.method)))?;

    let canonical_url = url.to_string();
    let mut request = RequestDescriptor::new(method, url);
    if let Some(body) = params.body {
        request = request.with_body(body);
    }

    let (response, source) = match agent.on_fetch(request).await {
        FetchOutcome::Responded { response, source } => (response, source.as_str()),
        FetchOutcome::PassThrough(request) => (agent.network().fetch(&request).await?, "passthrough"),
    };

    let output = OfflineFetchOutput {
        url: canonical_url,
        status: response.status,
        status_text: response.status_text.clone(),
        body: response.text(),
        headers: response.headers,
        source: source.to_string(),
    };

    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&output).unwrap_or_default(),
    )]))
}
