//! cache_list tool implementation.
//!
//! Lists buckets with entry counts, or the entries of one bucket.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::Registration;
use swcache_core::cache::EntryMeta;
use swcache_core::{CacheStorage, Error};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the entries of this bucket instead of the buckets.
    #[serde(default)]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BucketSummary {
    pub name: String,
    pub entries: usize,
    /// Belongs to the active version.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheListOutput {
    Buckets { buckets: Vec<BucketSummary> },
    Entries { bucket: String, entries: Vec<EntryMeta> },
}

/// Implementation of the cache_list tool.
pub async fn list_impl(registration: &Registration, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let storage = registration.storage();

    let output = match params.bucket {
        Some(bucket) => {
            if !storage.keys().await?.contains(&bucket) {
                return Err(Error::CacheMiss(format!("no bucket named {bucket}")).into());
            }
            let entries = storage.entries(&bucket).await?;
            CacheListOutput::Entries { bucket, entries }
        }
        None => {
            let current = registration.active().await.map(|w| w.buckets().clone());
            let mut buckets = Vec::new();
            for name in storage.keys().await? {
                let entries = storage.entries(&name).await?.len();
                let current = current.as_ref().is_some_and(|c| c.is_current(&name));
                buckets.push(BucketSummary { name, entries, current });
            }
            CacheListOutput::Buckets { buckets }
        }
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{harness, output_json};

    #[tokio::test]
    async fn test_list_buckets() {
        let h = harness();
        h.storage.open("static-v0").await.unwrap();
        h.registration.register(None).await.unwrap();
        h.storage.open("runtime-v1").await.unwrap();

        let output = output_json(&list_impl(&h.registration, CacheListParams::default()).await.unwrap());
        let buckets = output["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0]["name"], "static-v1");
        assert_eq!(buckets[0]["entries"], 5);
        assert_eq!(buckets[0]["current"], true);
        assert_eq!(buckets[1]["name"], "runtime-v1");
        assert_eq!(buckets[1]["entries"], 0);
    }

    #[tokio::test]
    async fn test_list_entries() {
        let h = harness();
        h.registration.register(None).await.unwrap();

        let params = CacheListParams { bucket: Some("static-v1".into()) };
        let output = output_json(&list_impl(&h.registration, params).await.unwrap());
        assert_eq!(output["bucket"], "static-v1");
        let entries = output["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 5);
        assert!(entries.iter().all(|e| e["status"] == 200));
    }

    #[tokio::test]
    async fn test_list_unknown_bucket() {
        let h = harness();
        let params = CacheListParams { bucket: Some("static-v9".into()) };
        let err = list_impl(&h.registration, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }
}
