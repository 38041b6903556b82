//! Bucket inspection tools.
//!
//! These read and prune the agent's storage directly, bypassing the
//! interception rules.

pub mod get;
pub mod list;
pub mod purge;

pub use get::{CacheGetParams, get_impl};
pub use list::{CacheListParams, list_impl};
pub use purge::{CachePurgeParams, purge_impl};
