//! SQLite-backed versioned cache stores.
//!
//! A single database holds every named store. Each store maps a request
//! key to a captured response. Access is async via tokio-rusqlite. It supports:
//!
//! - Named stores, one per deployed version
//! - Request keys derived by SHA-256 over method and URL
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Whole-store eviction of stale versions

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use stores::CacheStore;
