//! Version-tagged bucket naming.
//!
//! Bucket names are `<label>-<version>`. Bumping the version string is the
//! only way to invalidate previously cached entries: activation deletes
//! every bucket that is not one of the current names.

use serde::{Deserialize, Serialize};

/// The two buckets owned by one worker version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BucketNames {
    /// Application shell and static assets (cache-first).
    pub static_bucket: String,
    /// API and other runtime responses (network-first / stale-while-revalidate).
    pub runtime_bucket: String,
}

impl BucketNames {
    pub fn new(static_label: &str, runtime_label: &str, version: &str) -> Self {
        Self { static_bucket: format!("{static_label}-{version}"), runtime_bucket: format!("{runtime_label}-{version}") }
    }

    /// Whether `name` belongs to this version and must survive activation.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.static_bucket || name == self.runtime_bucket
    }
}
