//! Agent builders shared by the tool tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use store_finder_client::{AgentConfig, CacheAgent, Network, RequestDescriptor};
use store_finder_core::{AppConfig, CacheDb, Error, ResponseSnapshot};

pub type TestAgent = CacheAgent<CacheDb, StubNetwork>;

/// Answers every request with 200 and the request path as body, until
/// switched offline.
#[derive(Default)]
pub struct StubNetwork {
    offline: AtomicBool,
}

impl StubNetwork {
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: network unreachable", request.url)));
        }
        let response = ResponseSnapshot::new(request.url.as_str(), 200, request.url.path());
        Ok(response.with_header("Content-Type", "text/plain"))
    }
}

/// Agent straight out of construction, still installing.
pub async fn new_agent() -> TestAgent {
    let config = AgentConfig::from_app(&AppConfig::default()).unwrap();
    let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
    CacheAgent::new(config, db, Arc::new(StubNetwork::default()))
}

/// Installed and activated agent with the default manifest precached.
pub async fn active_agent() -> TestAgent {
    let agent = new_agent().await;
    agent.on_install().await.unwrap();
    agent.on_activate().await.unwrap();
    agent
}

/// Decode the JSON text of a tool result's first content block.
pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
