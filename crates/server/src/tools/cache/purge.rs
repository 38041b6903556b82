//! cache_purge tool implementation.
//!
//! Deletes one bucket and every entry in it.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use store_finder_client::{CacheAgent, Network};
use store_finder_core::{CacheStorage, Error};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Name of the bucket to delete.
    pub bucket: String,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub bucket: String,
    pub deleted: bool,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl<S, N>(agent: &CacheAgent<S, N>, params: CachePurgeParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    if params.bucket.trim().is_empty() {
        return Err(Error::InvalidInput("bucket must not be empty".to_string()).into());
    }

    if !agent.storage().delete(&params.bucket).await? {
        return Err(Error::BucketNotFound(params.bucket).into());
    }
    tracing::info!(bucket = %params.bucket, "bucket purged");

    let output = CachePurgeOutput { bucket: params.bucket, deleted: true };
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
