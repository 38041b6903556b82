//! SQLite-backed bucket storage for response snapshots.
//!
//! This module provides named, durable cache buckets using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Request keys hashed with SHA-256 over method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Priority-ordered lookup across buckets

pub mod buckets;
pub mod connection;
pub mod hash;
pub mod migrations;
pub mod snapshot;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use snapshot::{RequestKey, ResponseSnapshot, ResponseType};
pub use storage::{BucketSummary, CacheStorage};
