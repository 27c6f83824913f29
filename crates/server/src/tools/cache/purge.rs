//! cache_purge tool implementation.
//!
//! Deletes a bucket, or trims it to its newest N entries.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Registration;
use swcache_core::{CacheStorage, Error};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Bucket to purge.
    pub bucket: String,

    /// Keep only the newest N entries instead of deleting the bucket.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub bucket: String,
    /// Whether the bucket itself was deleted.
    pub bucket_deleted: bool,
    /// Number of entries deleted by trimming.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(registration: &Registration, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    let storage = registration.storage();
    let bucket = params.bucket.trim().to_string();
    if bucket.is_empty() {
        return Err(Error::InvalidInput("bucket cannot be empty".to_string()).into());
    }

    let output = match params.max_entries {
        Some(max_entries) => {
            let deleted = storage.trim(&bucket, max_entries).await?;
            CachePurgeOutput { bucket, bucket_deleted: false, deleted }
        }
        None => {
            if !storage.delete(&bucket).await? {
                return Err(Error::CacheMiss(format!("no bucket named {bucket}")).into());
            }
            tracing::info!(bucket = %bucket, "purged bucket");
            CachePurgeOutput { bucket, bucket_deleted: true, deleted: 0 }
        }
    };

    json_result(&output)
}
