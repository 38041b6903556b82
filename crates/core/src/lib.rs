//! Core types and shared functionality for the store-finder cache agent.
//!
//! This crate provides:
//! - Bucketed response cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{BucketSummary, CacheDb, CacheStorage, RequestKey, ResponseSnapshot, ResponseType};
pub use config::AppConfig;
pub use error::Error;
