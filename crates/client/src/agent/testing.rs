//! Scripted collaborators for agent tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use store_finder_core::{AppConfig, BucketSummary, CacheDb, CacheStorage, Error, RequestKey, ResponseSnapshot};
use tokio::sync::Notify;

use super::{AgentConfig, CacheAgent};
use crate::network::{Network, RequestDescriptor};

pub const ORIGIN: &str = "http://localhost:5000";

pub fn url(path: &str) -> url::Url {
    url::Url::parse(&format!("{ORIGIN}{path}")).unwrap()
}

pub fn agent_config(version: &str) -> AgentConfig {
    let app = AppConfig { cache_version: version.into(), ..Default::default() };
    AgentConfig::from_app(&app).unwrap()
}

pub async fn new_agent() -> (CacheAgent<CacheDb, FakeNetwork>, Arc<CacheDb>, Arc<FakeNetwork>) {
    let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let network = Arc::new(FakeNetwork::new());
    let agent = CacheAgent::new(agent_config("v1"), Arc::clone(&db), Arc::clone(&network));
    (agent, db, network)
}

enum Reply {
    Respond(ResponseSnapshot),
    Fail,
}

/// Network double answering from a route table keyed by absolute URL.
///
/// Unknown URLs and everything while offline fail as a refused connection.
#[derive(Default)]
pub struct FakeNetwork {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        let url = format!("{ORIGIN}{path}");
        self.respond_with(path, ResponseSnapshot::new(url, status, body));
    }

    pub fn respond_with(&self, path: &str, response: ResponseSnapshot) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{ORIGIN}{path}"), Reply::Respond(response));
    }

    pub fn fail(&self, path: &str) {
        self.routes.lock().unwrap().insert(format!("{ORIGIN}{path}"), Reply::Fail);
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Block every later fetch until the returned gate is notified.
    pub fn hold(&self) -> Arc<Notify> {
        hold(&self.gate)
    }

    /// Requests seen for `path`, counting failed ones.
    pub fn calls(&self, path: &str) -> usize {
        let url = format!("{ORIGIN}{path}");
        self.calls.lock().unwrap().iter().filter(|u| **u == url).count()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());
        pass(&self.gate).await;
        tokio::task::yield_now().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{url}: network unreachable")));
        }
        match self.routes.lock().unwrap().get(&url) {
            Some(Reply::Respond(response)) => Ok(response.clone()),
            Some(Reply::Fail) | None => Err(Error::Network(format!("{url}: connection refused"))),
        }
    }
}

fn hold(gate: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let notify = Arc::new(Notify::new());
    *gate.lock().unwrap() = Some(Arc::clone(&notify));
    notify
}

async fn pass(gate: &Mutex<Option<Arc<Notify>>>) {
    let notify = gate.lock().unwrap().clone();
    if let Some(notify) = notify {
        notify.notified().await;
    }
}

/// SQLite storage whose writes can be held open.
pub struct GatedStorage {
    db: CacheDb,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl GatedStorage {
    pub fn new(db: CacheDb) -> Self {
        Self { db, gate: Mutex::new(None) }
    }

    /// Block every later `put` until the returned gate is notified.
    pub fn hold(&self) -> Arc<Notify> {
        hold(&self.gate)
    }
}

#[async_trait]
impl CacheStorage for GatedStorage {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        self.db.open(bucket).await
    }

    async fn has(&self, bucket: &str) -> Result<bool, Error> {
        self.db.has(bucket).await
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &ResponseSnapshot) -> Result<(), Error> {
        pass(&self.gate).await;
        self.db.put(bucket, key, response).await
    }

    async fn match_in(&self, bucket: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        self.db.match_in(bucket, key).await
    }

    async fn match_any(&self, key: &RequestKey, priority: &[&str]) -> Result<Option<ResponseSnapshot>, Error> {
        self.db.match_any(key, priority).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.db.keys().await
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        self.db.delete(bucket).await
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<RequestKey>, Error> {
        self.db.entries(bucket).await
    }

    async fn summaries(&self) -> Result<Vec<BucketSummary>, Error> {
        self.db.summaries().await
    }
}

/// Storage whose every operation fails.
pub struct BrokenStorage;

fn broken() -> Error {
    Error::CorruptEntry("storage unavailable".into())
}

#[async_trait]
impl CacheStorage for BrokenStorage {
    async fn open(&self, _bucket: &str) -> Result<(), Error> {
        Err(broken())
    }

    async fn has(&self, _bucket: &str) -> Result<bool, Error> {
        Err(broken())
    }

    async fn put(&self, _bucket: &str, _key: &RequestKey, _response: &ResponseSnapshot) -> Result<(), Error> {
        Err(broken())
    }

    async fn match_in(&self, _bucket: &str, _key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        Err(broken())
    }

    async fn match_any(&self, _key: &RequestKey, _priority: &[&str]) -> Result<Option<ResponseSnapshot>, Error> {
        Err(broken())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Err(broken())
    }

    async fn delete(&self, _bucket: &str) -> Result<bool, Error> {
        Err(broken())
    }

    async fn entries(&self, _bucket: &str) -> Result<Vec<RequestKey>, Error> {
        Err(broken())
    }

    async fn summaries(&self) -> Result<Vec<BucketSummary>, Error> {
        Err(broken())
    }
}
