//! cache_list tool implementation.
//!
//! Lists buckets with entry counts, or the request keys inside one bucket.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use store_finder_client::{CacheAgent, Network};
use store_finder_core::{BucketSummary, CacheStorage, Error, RequestKey};

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the entries of this bucket instead of the buckets themselves.
    #[serde(default)]
    pub bucket: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheListOutput {
    Buckets { buckets: Vec<BucketSummary> },
    Entries { bucket: String, entries: Vec<RequestKey> },
}

/// Implementation of the cache_list tool.
pub async fn list_impl<S, N>(agent: &CacheAgent<S, N>, params: CacheListParams) -> Result<CallToolResult, McpError>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    let storage = agent.storage();
    let output = match params.bucket {
        None => CacheListOutput::Buckets { buckets: storage.summaries().await? },
        Some(bucket) => {
            if !storage.has(&bucket).await? {
                return Err(Error::BucketNotFound(bucket).into());
            }
            let entries = storage.entries(&bucket).await?;
            CacheListOutput::Entries { bucket, entries }
        }
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize listing: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
