//! Test doubles for the network and storage capabilities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use swcache_core::cache::EntryMeta;
use swcache_core::{CacheStorage, CachedEntry, Error, InterceptedRequest, RequestKey, Response};
use tokio::sync::Semaphore;
use url::Url;

use crate::fetch::Network;

pub fn ok(body: impl Into<Bytes>) -> Response {
    Response::new(200, body).with_status_text("OK").with_header("Content-Type", "text/plain")
}

pub fn html(body: impl Into<Bytes>) -> Response {
    Response::new(200, body).with_status_text("OK").with_header("Content-Type", "text/html")
}

/// Network that answers from a table; unknown URLs fail like a refused connection.
#[derive(Default)]
pub struct ScriptedNetwork {
    responses: Mutex<HashMap<String, Response>>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
    url_gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// Holds scripted fetches until released, one permit per fetch.
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn release(&self) {
        self.0.add_permits(1);
    }
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: Url, response: Response) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn fail(&self, url: Url) {
        self.responses.lock().unwrap().remove(url.as_str());
    }

    pub fn go_offline(&self) {
        self.responses.lock().unwrap().clear();
    }

    /// Make every later fetch wait for a [`Gate::release`].
    pub fn hold(&self) -> Gate {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(semaphore.clone());
        Gate(semaphore)
    }

    /// Make later fetches of `url` wait for a [`Gate::release`].
    pub fn hold_url(&self, url: Url) -> Gate {
        let semaphore = Arc::new(Semaphore::new(0));
        self.url_gates.lock().unwrap().insert(url.to_string(), semaphore.clone());
        Gate(semaphore)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        let gate = gate.or_else(|| self.url_gates.lock().unwrap().get(request.url.as_str()).cloned());
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        let response = self.responses.lock().unwrap().get(request.url.as_str()).cloned();
        response.ok_or_else(|| Error::HttpError(format!("connection refused: {}", request.url)))
    }
}

/// Storage whose every operation fails.
pub struct FailingStorage;

fn unavailable() -> Error {
    Error::CorruptEntry("storage unavailable".to_string())
}

#[async_trait]
impl CacheStorage for FailingStorage {
    async fn open(&self, _bucket: &str) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Err(unavailable())
    }

    async fn delete(&self, _bucket: &str) -> Result<bool, Error> {
        Err(unavailable())
    }

    async fn match_entry(&self, _bucket: &str, _key: &RequestKey) -> Result<Option<CachedEntry>, Error> {
        Err(unavailable())
    }

    async fn put(&self, _bucket: &str, _key: &RequestKey, _response: &Response) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn put_all(&self, _bucket: &str, _entries: Vec<(RequestKey, Response)>) -> Result<(), Error> {
        Err(unavailable())
    }

    async fn entries(&self, _bucket: &str) -> Result<Vec<EntryMeta>, Error> {
        Err(unavailable())
    }

    async fn trim(&self, _bucket: &str, _max_entries: usize) -> Result<u64, Error> {
        Err(unavailable())
    }
}
