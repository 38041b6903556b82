//! Install and activate transitions.

use std::fmt;

use futures_util::future::join_all;
use serde::Serialize;
use store_finder_core::{CacheStorage, Error};

use super::CacheAgent;
use crate::network::{Network, RequestDescriptor};

/// Lifecycle position of one agent version. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    #[default]
    Installing,
    Installed,
    Activating,
    Active,
}

impl AgentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Installing => "installing",
            AgentState::Installed => "installed",
            AgentState::Activating => "activating",
            AgentState::Active => "active",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable lifecycle flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub state: AgentState,
    /// Set after install: activate without waiting for old clients to close.
    pub skip_waiting: bool,
    /// Set after activate: open clients are controlled without a reload.
    pub clients_claimed: bool,
    pub installed_at: Option<String>,
    pub activated_at: Option<String>,
}

/// What an install did to the precache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub bucket: String,
    pub precached: usize,
    pub manifest_len: usize,
    /// Bulk-add failure, if any. Installation proceeds regardless.
    pub error: Option<String>,
}

/// Buckets removed by an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
}

impl<S, N> CacheAgent<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    /// Open the precache bucket and fill it from the manifest.
    ///
    /// A failed asset is logged and skipped; the agent still ends up
    /// `installed`, with `skip_waiting` set.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the agent is `installing`; a storage error
    /// if the precache bucket cannot be opened.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let _event = self.lifecycle.lock().await;
        self.expect_state(&[AgentState::Installing], "install")?;

        let bucket = self.config.precache_name.clone();
        tracing::info!(bucket = %bucket, assets = self.config.manifest.len(), "installing cache agent");

        self.storage.open(&bucket).await?;

        let manifest_len = self.config.manifest.len();
        let (precached, error) = match self.add_all(&bucket, &self.config.manifest).await {
            Ok(stored) => (stored, None),
            Err(e) => {
                tracing::warn!(bucket = %bucket, error = %e, "precache population incomplete");
                let stored = match &e {
                    Error::PrecacheFailed { failed, total } => total - failed.len(),
                    _ => 0,
                };
                (stored, Some(e.to_string()))
            }
        };

        self.status.send_modify(|status| {
            status.state = AgentState::Installed;
            status.skip_waiting = true;
            status.installed_at = Some(chrono::Utc::now().to_rfc3339());
        });
        tracing::info!(bucket = %bucket, precached, "cache agent installed");

        Ok(InstallReport { bucket, precached, manifest_len, error })
    }

    /// Delete every bucket this version does not own, then claim clients.
    ///
    /// Running it again while `active` repeats the cleanup and changes
    /// nothing else.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the agent is `installed` or `active`; any
    /// storage error, in which case the previous state is restored.
    pub async fn on_activate(&self) -> Result<ActivationReport, Error> {
        let _event = self.lifecycle.lock().await;
        let previous = self.expect_state(&[AgentState::Installed, AgentState::Active], "activate")?;

        if previous == AgentState::Installed {
            self.status.send_modify(|status| status.state = AgentState::Activating);
        }

        let report = match self.evict_stale_buckets().await {
            Ok(report) => report,
            Err(e) => {
                self.status.send_modify(|status| status.state = previous);
                return Err(e);
            }
        };

        self.status.send_modify(|status| {
            status.state = AgentState::Active;
            status.clients_claimed = true;
            if status.activated_at.is_none() {
                status.activated_at = Some(chrono::Utc::now().to_rfc3339());
            }
        });
        tracing::info!(deleted = report.deleted.len(), "cache agent active");

        Ok(report)
    }

    fn expect_state(&self, allowed: &[AgentState], event: &str) -> Result<AgentState, Error> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            Err(Error::InvalidTransition { state: state.to_string(), event: event.to_string() })
        }
    }

    async fn evict_stale_buckets(&self) -> Result<ActivationReport, Error> {
        let mut report = ActivationReport { deleted: Vec::new(), kept: Vec::new() };
        for name in self.storage.keys().await? {
            if self.config.owns_bucket(&name) {
                report.kept.push(name);
            } else {
                self.storage.delete(&name).await?;
                tracing::debug!(bucket = %name, "deleted stale bucket");
                report.deleted.push(name);
            }
        }
        Ok(report)
    }

    /// Fetch every path concurrently and store each 2xx response.
    ///
    /// Returns the number stored, or `PrecacheFailed` naming each path that
    /// could not be fetched or stored. Stored assets stay stored either way.
    pub(crate) async fn add_all(&self, bucket: &str, paths: &[String]) -> Result<usize, Error> {
        let fetches = paths.iter().map(|path| async move {
            let url = self
                .config
                .origin
                .join(path)
                .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
            let request = RequestDescriptor::get(url);
            let response = self.network.fetch(&request).await?;
            if !response.ok() {
                return Err(Error::Network(format!("{path}: status {}", response.status)));
            }
            self.storage.put(bucket, &request.key(), &response).await
        });

        let mut failed = Vec::new();
        for (path, result) in paths.iter().zip(join_all(fetches).await) {
            if let Err(e) = result {
                tracing::debug!(path = %path, error = %e, "precache asset failed");
                failed.push(path.clone());
            }
        }

        if failed.is_empty() { Ok(paths.len()) } else { Err(Error::PrecacheFailed { failed, total: paths.len() }) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use store_finder_core::{CacheDb, CacheStorage, RequestKey, ResponseSnapshot};

    use super::*;
    use crate::agent::testing::{ORIGIN, FakeNetwork, agent_config, new_agent};

    fn serve_manifest(network: &FakeNetwork) {
        network.respond("/", 200, "<!doctype html>");
        network.respond("/manifest.json", 200, r#"{"name":"Store Finder"}"#);
        network.respond("/icon-192.png", 200, "png-192");
        network.respond("/icon-512.png", 200, "png-512");
    }

    #[tokio::test]
    async fn test_install_populates_precache() {
        let (agent, db, network) = new_agent().await;
        serve_manifest(&network);

        let report = agent.on_install().await.unwrap();
        assert_eq!(report.bucket, "store-finder-v1");
        assert_eq!(report.precached, 4);
        assert!(report.error.is_none());

        for path in ["/", "/manifest.json", "/icon-192.png", "/icon-512.png"] {
            let key = RequestKey::get(format!("{ORIGIN}{path}"));
            assert!(db.match_in("store-finder-v1", &key).await.unwrap().is_some(), "{path} missing");
        }

        let status = agent.status();
        assert_eq!(status.state, AgentState::Installed);
        assert!(status.skip_waiting);
        assert!(!status.clients_claimed);
    }

    #[tokio::test]
    async fn test_install_survives_failed_asset() {
        let (agent, db, network) = new_agent().await;
        serve_manifest(&network);
        network.fail("/icon-512.png");

        let report = agent.on_install().await.unwrap();
        assert_eq!(report.precached, 3);
        assert!(report.error.as_deref().unwrap().contains("/icon-512.png"));
        assert_eq!(agent.state(), AgentState::Installed);

        let stored = db.entries("store-finder-v1").await.unwrap();
        assert_eq!(stored.len(), 3);
        assert!(!stored.contains(&RequestKey::get(format!("{ORIGIN}/icon-512.png"))));
    }

    #[tokio::test]
    async fn test_install_skips_non_ok_asset() {
        let (agent, db, network) = new_agent().await;
        serve_manifest(&network);
        network.respond("/manifest.json", 404, "not found");

        let report = agent.on_install().await.unwrap();
        assert_eq!(report.precached, 3);
        let key = RequestKey::get(format!("{ORIGIN}/manifest.json"));
        assert!(db.match_in("store-finder-v1", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_install_offline_still_installs() {
        let (agent, db, network) = new_agent().await;
        network.go_offline();

        let report = agent.on_install().await.unwrap();
        assert_eq!(report.precached, 0);
        assert_eq!(agent.state(), AgentState::Installed);
        assert!(db.has("store-finder-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_twice_rejected() {
        let (agent, _db, network) = new_agent().await;
        serve_manifest(&network);

        agent.on_install().await.unwrap();
        let err = agent.on_install().await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let (agent, _db, _network) = new_agent().await;
        let err = agent.on_activate().await.unwrap_err();
        assert_eq!(err.to_string(), "INVALID_STATE: cannot activate while installing");
    }

    #[tokio::test]
    async fn test_activate_evicts_stale_buckets() {
        let (agent, db, network) = new_agent().await;
        serve_manifest(&network);
        let stale = ResponseSnapshot::new(format!("{ORIGIN}/"), 200, "old shell");
        db.put("store-finder-v0", &RequestKey::get(format!("{ORIGIN}/")), &stale)
            .await
            .unwrap();
        db.open("store-finder-runtime").await.unwrap();

        agent.on_install().await.unwrap();
        let report = agent.on_activate().await.unwrap();

        assert_eq!(report.deleted, vec!["store-finder-v0"]);
        let mut remaining = db.keys().await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["store-finder-runtime", "store-finder-v1"]);

        let status = agent.status();
        assert_eq!(status.state, AgentState::Active);
        assert!(status.clients_claimed);
        assert!(status.activated_at.is_some());
    }

    #[tokio::test]
    async fn test_activate_twice_is_idempotent() {
        let (agent, db, network) = new_agent().await;
        serve_manifest(&network);
        db.open("store-finder-runtime").await.unwrap();
        db.open("legacy-cache").await.unwrap();

        agent.on_install().await.unwrap();
        agent.on_activate().await.unwrap();
        let first_activation = agent.status().activated_at;

        let second = agent.on_activate().await.unwrap();
        assert!(second.deleted.is_empty());
        assert_eq!(agent.state(), AgentState::Active);
        assert_eq!(agent.status().activated_at, first_activation);

        let mut remaining = db.keys().await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["store-finder-runtime", "store-finder-v1"]);
    }

    #[tokio::test]
    async fn test_new_version_replaces_old() {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(FakeNetwork::new());
        serve_manifest(&network);

        let v1 = CacheAgent::new(agent_config("v1"), Arc::clone(&db), Arc::clone(&network));
        v1.on_install().await.unwrap();
        v1.on_activate().await.unwrap();

        let v2 = CacheAgent::new(agent_config("v2"), Arc::clone(&db), Arc::clone(&network));
        assert_eq!(v2.state(), AgentState::Installing);
        v2.on_install().await.unwrap();
        let report = v2.on_activate().await.unwrap();

        assert_eq!(report.deleted, vec!["store-finder-v1"]);
        assert_eq!(db.keys().await.unwrap(), vec!["store-finder-v2"]);
    }

    #[tokio::test]
    async fn test_status_changes_are_observable() {
        let (agent, _db, network) = new_agent().await;
        serve_manifest(&network);
        let mut rx = agent.subscribe();

        agent.on_install().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().state, AgentState::Installed);

        agent.on_activate().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, AgentState::Active);
    }

    #[test]
    fn test_state_ordering_and_display() {
        assert!(AgentState::Installing < AgentState::Installed);
        assert!(AgentState::Activating < AgentState::Active);
        assert_eq!(AgentState::Activating.to_string(), "activating");
    }
}
