//! Client code for the store-finder cache agent.
//!
//! This crate provides the HTTP fetch pipeline, the network seam the agent
//! talks through, and the cache agent itself.

pub mod agent;
pub mod fetch;
pub mod network;

pub use agent::{
    ActivationReport, AgentConfig, AgentState, AgentStatus, CacheAgent, Eligibility, FetchOutcome, InstallReport,
    PendingTasks, ResponseSource,
};
pub use fetch::{FetchClient, FetchConfig};
pub use network::{Network, RequestDescriptor};
pub use reqwest::Method;
