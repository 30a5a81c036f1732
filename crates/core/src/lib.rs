//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Versioned cache stores with a SQLite backend
//! - Request/response types shared by the controller and its surfaces
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheStore, CachedEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{RequestMode, ResponseKind, ShellRequest, ShellResponse};
