//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Versioned response buckets with in-memory and SQLite backends
//! - Request/response snapshots exchanged with the host
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod request;

pub use cache::{BucketNames, CacheDb, CacheStorage, CachedEntry, MemoryStorage, RequestKey};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::{Destination, InterceptedRequest, Response};
