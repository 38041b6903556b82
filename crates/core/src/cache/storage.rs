//! Storage API consumed by the cache agent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::snapshot::{RequestKey, ResponseSnapshot};
use crate::Error;

/// Bucket name with the number of entries it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BucketSummary {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

/// Named, durable buckets of response snapshots.
///
/// Implementations must tolerate concurrent calls; a `put` racing another
/// `put` on the same key leaves one of the two values (last write wins).
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if it does not exist.
    async fn open(&self, bucket: &str) -> Result<(), Error>;

    async fn has(&self, bucket: &str) -> Result<bool, Error>;

    /// Store a snapshot, creating the bucket on demand and overwriting any
    /// entry with the same key.
    async fn put(&self, bucket: &str, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error>;

    /// Look up a key in one bucket.
    async fn match_in(&self, bucket: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error>;

    /// Look up a key in every bucket.
    ///
    /// Buckets named in `priority` are consulted first, in that order; the
    /// rest follow in creation order.
    async fn match_any(&self, key: &RequestKey, priority: &[&str]) -> Result<Option<ResponseSnapshot>, Error>;

    /// All bucket names in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a bucket and its entries. Returns false if it did not exist.
    async fn delete(&self, bucket: &str) -> Result<bool, Error>;

    /// Keys stored in a bucket, oldest first.
    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, Error>;

    async fn summaries(&self) -> Result<Vec<BucketSummary>, Error>;
}
