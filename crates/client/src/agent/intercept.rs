//! Fetch interception: cache-first with background revalidation.

use std::sync::Arc;

use reqwest::Method;
use store_finder_core::{CacheStorage, RequestKey, ResponseSnapshot};

use super::{AgentState, CacheAgent, FetchOutcome, ResponseSource};
use crate::fetch::{is_extension_url, is_same_origin};
use crate::network::{Network, RequestDescriptor};

/// Why a request is or is not intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NotGet,
    CrossOrigin,
    Extension,
    /// The agent has not activated and does not control clients yet.
    NotControlling,
}

impl<S, N> CacheAgent<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    pub fn eligibility(&self, request: &RequestDescriptor) -> Eligibility {
        let status = self.status.borrow();
        if status.state != AgentState::Active || !status.clients_claimed {
            Eligibility::NotControlling
        } else if request.method != Method::GET {
            Eligibility::NotGet
        } else if is_extension_url(&request.url) {
            Eligibility::Extension
        } else if !is_same_origin(&request.url, &self.config.origin) {
            Eligibility::CrossOrigin
        } else {
            Eligibility::Eligible
        }
    }

    /// Whether a hit on this URL also triggers a background refresh.
    pub fn is_api_request(&self, url: &url::Url) -> bool {
        url.path().starts_with(&self.config.api_prefix)
    }

    /// Answer one fetch event.
    ///
    /// Never fails: ineligible requests come back as
    /// [`FetchOutcome::PassThrough`], and when neither cache nor network can
    /// answer the caller gets the 503 offline response.
    pub async fn on_fetch(&self, request: RequestDescriptor) -> FetchOutcome {
        let eligibility = self.eligibility(&request);
        if eligibility != Eligibility::Eligible {
            tracing::trace!(url = %request.url, ?eligibility, "passing request through");
            return FetchOutcome::PassThrough(request);
        }

        let key = request.key();
        if let Some(cached) = self.lookup(&key).await {
            tracing::debug!(url = %request.url, "cache hit");
            if self.is_api_request(&request.url) {
                self.revalidate(request);
            }
            return FetchOutcome::Responded { response: cached, source: ResponseSource::Cache };
        }

        match self.network.fetch(&request).await {
            Ok(response) if response.is_cacheable() => {
                tracing::debug!(url = %request.url, "cache miss, storing network response");
                self.store_runtime(key, response.clone());
                FetchOutcome::Responded { response, source: ResponseSource::Network }
            }
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "cache miss, not storing");
                FetchOutcome::Responded { response, source: ResponseSource::Network }
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed with nothing cached");
                FetchOutcome::Responded {
                    response: ResponseSnapshot::offline(request.url.as_str()),
                    source: ResponseSource::Offline,
                }
            }
        }
    }

    /// Precache first, then runtime, then any other bucket. A storage error
    /// counts as a miss.
    async fn lookup(&self, key: &RequestKey) -> Option<ResponseSnapshot> {
        let priority = [self.config.precache_name.as_str(), self.config.runtime_name.as_str()];
        match self.storage.match_any(key, &priority).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    fn store_runtime(&self, key: RequestKey, response: ResponseSnapshot) {
        let storage = Arc::clone(&self.storage);
        let bucket = self.config.runtime_name.clone();
        self.tasks.wait_until("cache-put", async move {
            if let Err(e) = storage.put(&bucket, &key, &response).await {
                tracing::warn!(bucket = %bucket, key = %key, error = %e, "failed to store response");
            }
        });
    }

    /// Refetch in the background and overwrite the runtime entry on a 200.
    fn revalidate(&self, request: RequestDescriptor) {
        let storage = Arc::clone(&self.storage);
        let network = Arc::clone(&self.network);
        let bucket = self.config.runtime_name.clone();
        self.tasks.wait_until("revalidate", async move {
            let key = request.key();
            match network.fetch(&request).await {
                Ok(fresh) if fresh.is_cacheable() => {
                    if let Err(e) = storage.put(&bucket, &key, &fresh).await {
                        tracing::warn!(
                            bucket = %bucket,
                            key = %key,
                            error = %e,
                            "failed to store revalidated response"
                        );
                    } else {
                        tracing::debug!(key = %key, "revalidated");
                    }
                }
                Ok(stale) => tracing::debug!(key = %key, status = stale.status, "revalidation not cacheable"),
                Err(e) => tracing::debug!(key = %key, error = %e, "revalidation failed, keeping cached copy"),
            }
        });
    }
}
