//! The offline cache agent.
//!
//! A [`CacheAgent`] owns two buckets: a versioned precache filled from a
//! fixed manifest at install, and an unversioned runtime bucket filled by
//! successful fetches. The host drives it through three lifecycle methods:
//!
//! - [`CacheAgent::on_install`] populates the precache
//! - [`CacheAgent::on_activate`] evicts buckets from other versions
//! - [`CacheAgent::on_fetch`] answers a request cache-first, falling back to
//!   the network and finally to a synthesized offline response
//!
//! Storage and network are injected, so tests drive the agent with fakes.

mod intercept;
mod lifecycle;
mod tasks;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::Serialize;
use store_finder_core::{AppConfig, CacheStorage, Error, ResponseSnapshot};
use tokio::sync::{Mutex, watch};
use url::Url;

use crate::network::{Network, RequestDescriptor};

pub use intercept::Eligibility;
pub use lifecycle::{ActivationReport, AgentState, AgentStatus, InstallReport};
pub use tasks::PendingTasks;

/// Everything the agent needs to know about its scope and buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Only requests to this origin are intercepted.
    pub origin: Url,
    pub precache_name: String,
    pub runtime_name: String,
    /// Origin-relative paths stored at install.
    pub manifest: Vec<String>,
    /// Path prefix of API requests, which are revalidated on every hit.
    pub api_prefix: String,
}

impl AgentConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self {
            origin,
            precache_name: config.precache_name(),
            runtime_name: config.runtime_name(),
            manifest: config.precache_urls.clone(),
            api_prefix: config.api_prefix.clone(),
        })
    }

    /// True for the two buckets this agent version owns.
    pub fn owns_bucket(&self, name: &str) -> bool {
        name == self.precache_name || name == self.runtime_name
    }
}

/// Where the response handed back to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    Offline,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Offline => "offline",
        }
    }
}

/// Result of dispatching one fetch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The agent declined the request; the host must send it unaltered.
    PassThrough(RequestDescriptor),
    Responded { response: ResponseSnapshot, source: ResponseSource },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&ResponseSnapshot> {
        match self {
            FetchOutcome::Responded { response, .. } => Some(response),
            FetchOutcome::PassThrough(_) => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Responded { source, .. } => Some(*source),
            FetchOutcome::PassThrough(_) => None,
        }
    }
}

/// Offline cache agent over injected storage and network.
pub struct CacheAgent<S, N> {
    config: AgentConfig,
    storage: Arc<S>,
    network: Arc<N>,
    status: watch::Sender<AgentStatus>,
    /// Serializes install and activate.
    lifecycle: Mutex<()>,
    tasks: PendingTasks,
}

impl<S, N> CacheAgent<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    /// A fresh agent starts in [`AgentState::Installing`].
    pub fn new(config: AgentConfig, storage: Arc<S>, network: Arc<N>) -> Self {
        let (status, _) = watch::channel(AgentStatus::default());
        Self { config, storage, network, status, lifecycle: Mutex::new(()), tasks: PendingTasks::new() }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    /// Background work the host must settle before dropping the agent.
    pub fn tasks(&self) -> &PendingTasks {
        &self.tasks
    }

    pub fn status(&self) -> AgentStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> AgentState {
        self.status.borrow().state
    }

    /// Receive every status change.
    pub fn subscribe(&self) -> watch::Receiver<AgentStatus> {
        self.status.subscribe()
    }
}
