//! MCP tool implementations.
//!
//! This module contains all tools exposed by the store-finder server. Each
//! tool takes the shared cache agent, so tests run them over in-memory
//! storage and a stub network.

pub mod agent_status;
pub mod cache;
pub mod offline_fetch;

#[cfg(test)]
pub(crate) mod testing;

pub use agent_status::status_impl;
pub use offline_fetch::{OfflineFetchParams, fetch_impl};
