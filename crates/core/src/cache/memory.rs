//! In-process bucket store.
//!
//! Uses a HashMap per bucket behind a tokio RwLock. Insertion sequence
//! numbers order buckets and entries so listings and trimming are
//! deterministic even when timestamps collide.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CacheStorage, CachedEntry, EntryMeta, RequestKey};
use crate::{Error, Response};

struct StoredEntry {
    url: String,
    response: Response,
    stored_at: DateTime<Utc>,
    seq: u64,
}

struct Bucket {
    entries: HashMap<String, StoredEntry>,
    seq: u64,
}

#[derive(Default)]
struct State {
    buckets: HashMap<String, Bucket>,
    next_seq: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn bucket_mut(&mut self, name: &str) -> &mut Bucket {
        let next_seq = &mut self.next_seq;
        self.buckets.entry(name.to_string()).or_insert_with(|| {
            *next_seq += 1;
            Bucket { entries: HashMap::new(), seq: *next_seq }
        })
    }

    fn insert(&mut self, bucket: &str, key: &RequestKey, response: &Response) {
        let seq = self.bump();
        let entry = StoredEntry { url: key.url.clone(), response: response.clone(), stored_at: Utc::now(), seq };
        self.bucket_mut(bucket).entries.insert(key.hash.clone(), entry);
    }
}

/// Bucket store that lives for the lifetime of the process.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, bucket: &str) -> Result<(), Error> {
        self.state.write().await.bucket_mut(bucket);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        let mut names: Vec<(&String, u64)> = state.buckets.iter().map(|(name, b)| (name, b.seq)).collect();
        names.sort_by_key(|(_, seq)| *seq);
        Ok(names.into_iter().map(|(name, _)| name.clone()).collect())
    }

    async fn delete(&self, bucket: &str) -> Result<bool, Error> {
        Ok(self.state.write().await.buckets.remove(bucket).is_some())
    }

    async fn match_entry(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>, Error> {
        let state = self.state.read().await;
        let entry = state
            .buckets
            .get(bucket)
            .and_then(|b| b.entries.get(&key.hash))
            .map(|e| CachedEntry { response: e.response.clone(), stored_at: e.stored_at });
        Ok(entry)
    }

    async fn put(&self, bucket: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        self.state.write().await.insert(bucket, key, response);
        Ok(())
    }

    async fn put_all(&self, bucket: &str, entries: Vec<(RequestKey, Response)>) -> Result<(), Error> {
        let mut state = self.state.write().await;
        state.bucket_mut(bucket);
        for (key, response) in &entries {
            state.insert(bucket, key, response);
        }
        Ok(())
    }

    async fn entries(&self, bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        let state = self.state.read().await;
        let Some(b) = state.buckets.get(bucket) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<&StoredEntry> = b.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        Ok(entries
            .into_iter()
            .map(|e| EntryMeta {
                url: e.url.clone(),
                status: e.response.status,
                content_type: e.response.content_type().map(str::to_string),
                size: e.response.body.len(),
                stored_at: e.stored_at,
            })
            .collect())
    }

    async fn trim(&self, bucket: &str, max_entries: usize) -> Result<u64, Error> {
        let mut state = self.state.write().await;
        let Some(b) = state.buckets.get_mut(bucket) else {
            return Ok(0);
        };
        if b.entries.len() <= max_entries {
            return Ok(0);
        }

        let mut by_age: Vec<(u64, String)> = b.entries.iter().map(|(k, e)| (e.seq, k.clone())).collect();
        by_age.sort();
        let to_delete = b.entries.len() - max_entries;
        for (_, hash) in by_age.into_iter().take(to_delete) {
            b.entries.remove(&hash);
        }
        Ok(to_delete as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(url: &str) -> RequestKey {
        RequestKey::for_url(&Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let storage = MemoryStorage::new();
        let k = key("https://example.com/app.js");
        storage.put("static-v1", &k, &Response::new(200, "js")).await.unwrap();

        let entry = storage.match_entry("static-v1", &k).await.unwrap().unwrap();
        assert_eq!(&entry.response.body[..], b"js");
        assert!(storage.match_entry("runtime-v1", &k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_single_entry_per_key() {
        let storage = MemoryStorage::new();
        let k = key("https://example.com/api/providers");
        storage.put("runtime-v1", &k, &Response::new(200, "v1")).await.unwrap();
        storage.put("runtime-v1", &k, &Response::new(200, "v2")).await.unwrap();

        let entries = storage.entries("runtime-v1").await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = storage.match_entry("runtime-v1", &k).await.unwrap().unwrap();
        assert_eq!(&entry.response.body[..], b"v2");
    }

    #[tokio::test]
    async fn test_keys_in_creation_order_and_delete() {
        let storage = MemoryStorage::new();
        storage.open("static-v1").await.unwrap();
        storage.open("runtime-v1").await.unwrap();
        storage.open("static-v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["static-v1", "runtime-v1"]);

        assert!(storage.delete("static-v1").await.unwrap());
        assert!(!storage.delete("static-v1").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["runtime-v1"]);
    }

    #[tokio::test]
    async fn test_trim_keeps_newest() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            let k = key(&format!("https://example.com/api/item/{i}"));
            storage.put("runtime-v1", &k, &Response::new(200, "x")).await.unwrap();
        }

        let deleted = storage.trim("runtime-v1", 2).await.unwrap();
        assert_eq!(deleted, 3);

        let urls: Vec<String> = storage.entries("runtime-v1").await.unwrap().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["https://example.com/api/item/3", "https://example.com/api/item/4"]);
        assert_eq!(storage.trim("runtime-v1", 2).await.unwrap(), 0);
        assert_eq!(storage.trim("missing", 2).await.unwrap(), 0);
    }
}
