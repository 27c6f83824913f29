//! Named, versioned response buckets.
//!
//! This module provides the bucket store consumed by the caching layer:
//!
//! - The [`CacheStorage`] capability (open/match/put/delete by bucket name)
//! - Version-tagged bucket naming ([`BucketNames`])
//! - Normalized request keys ([`RequestKey`])
//! - An in-memory store and a SQLite-backed store with migrations
//!
//! Every entry is a per-key upsert; there are no multi-key transactions
//! except [`CacheStorage::put_all`], which install uses to write the
//! application shell all-or-nothing.

pub mod buckets;
pub mod connection;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod version;

pub use crate::Error;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Response;

pub use connection::CacheDb;
pub use hash::RequestKey;
pub use memory::MemoryStorage;
pub use version::BucketNames;

/// A stored response together with the time it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub response: Response,
    pub stored_at: DateTime<Utc>,
}

/// Listing view of a bucket entry.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub size: usize,
    pub stored_at: DateTime<Utc>,
}

/// Bucket store capability.
///
/// Writing to a bucket that does not exist yet creates it.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the bucket if it does not exist.
    async fn open(&self, bucket: &str) -> Result<(), Error>;

    /// Names of all existing buckets, oldest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete a bucket and all its entries. Returns whether it existed.
    async fn delete(&self, bucket: &str) -> Result<bool, Error>;

    /// Look up the entry stored under `key`.
    async fn match_entry(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error>;

    /// Insert or overwrite the entry stored under `key`.
    async fn put(&self, bucket: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Write all entries or none of them.
    async fn put_all(&self, bucket: &str, entries: Vec<(RequestKey, Response)>) -> Result<(), Error>;

    /// List a bucket's entries, oldest first. Unknown buckets list as empty.
    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error>;

    /// Delete the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the number of deleted entries.
    async fn trim(&self, bucket: &str, max_entries: usize) -> Result<u64, Error>;
}
