//! Cache strategies.
//!
//! | Class         | Strategy               | Bucket  |
//! |---------------|------------------------|---------|
//! | `StaticAsset` | cache-first            | static  |
//! | `ApiCall`     | network-first          | runtime |
//! | `Other`       | stale-while-revalidate | runtime |
//! | `Navigation`  | network, then app shell| static  |
//!
//! Every strategy returns a [`StrategyOutcome`]; nothing fails out to the
//! caller. Cache I/O errors count as misses, network errors as "offline",
//! and when both paths are exhausted the synthetic 503 is returned.
//!
//! Only 2xx responses are written to a bucket. A non-success response is
//! "network unavailable" for fallback purposes, but if there is nothing to
//! fall back to it is passed through as received.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use swcache_core::{BucketNames, CacheStorage, CachedEntry, InterceptedRequest, RequestKey, Response};
use tokio::sync::Notify;
use tokio::task::JoinSet;

use super::classify::RequestClass;
use crate::fetch::Network;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Cache,
    Network,
    /// Synthetic offline response.
    Fallback,
}

/// Result of applying a strategy to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyOutcome {
    pub response: Response,
    pub origin: Origin,
    /// Whether the network response was stored before returning.
    pub cached_after: bool,
    /// When the served cache entry was written (`origin == Cache` only).
    pub stored_at: Option<DateTime<Utc>>,
}

impl StrategyOutcome {
    fn from_cache(entry: CachedEntry) -> Self {
        Self { response: entry.response, origin: Origin::Cache, cached_after: false, stored_at: Some(entry.stored_at) }
    }

    fn from_network(response: Response, cached_after: bool) -> Self {
        Self { response, origin: Origin::Network, cached_after, stored_at: None }
    }

    fn offline() -> Self {
        Self { response: Response::offline(), origin: Origin::Fallback, cached_after: false, stored_at: None }
    }
}

/// Detached tasks spawned while answering requests (revalidations).
///
/// Errors inside the tasks are absorbed; [`Background::wait_idle`] lets a
/// host wait until every pending refresh has landed.
#[derive(Clone, Default)]
pub struct Background {
    tasks: Arc<Mutex<JoinSet<()>>>,
    running: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

/// Decrements the running count when a task ends, panics included.
struct Running {
    running: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for Running {
    fn drop(&mut self) {
        if self.running.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl Background {
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.running.fetch_add(1, Ordering::SeqCst);
        let guard = Running { running: self.running.clone(), idle: self.idle.clone() };

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        reap(&mut tasks);
        tasks.spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Number of tasks still running.
    pub fn pending(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for every spawned task, including ones spawned while waiting.
    ///
    /// Any number of callers may wait at once; each returns only when
    /// nothing is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                break;
            }
            notified.await;
        }
        reap(&mut self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            tracing::warn!(error = %e, "background cache task panicked");
        }
    }
}

/// Everything a strategy needs, owned so revalidations can outlive the request.
#[derive(Clone)]
pub struct StrategyContext {
    pub storage: Arc<dyn CacheStorage>,
    pub network: Arc<dyn Network>,
    pub buckets: BucketNames,
    /// Key of the app shell document served to offline navigations.
    pub shell_key: RequestKey,
    pub runtime_max_entries: Option<usize>,
    pub background: Background,
    /// Set once the owning worker is redundant; later writes are dropped.
    pub retired: Arc<AtomicBool>,
}

enum Fetched {
    Usable(Response),
    Unusable(Response),
    Failed,
}

impl StrategyContext {
    async fn lookup(&self, bucket: &str, key: &RequestKey) -> Option<CachedEntry> {
        match self.storage.match_entry(bucket, key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(bucket, url = %key.url, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Store a response; returns whether it was written.
    async fn store(&self, bucket: &str, key: &RequestKey, response: &Response) -> bool {
        if self.retired.load(Ordering::SeqCst) {
            tracing::debug!(bucket, url = %key.url, "worker retired, not storing");
            return false;
        }
        if let Err(e) = self.storage.put(bucket, key, response).await {
            tracing::warn!(bucket, url = %key.url, error = %e, "cache write failed");
            return false;
        }

        if bucket == self.buckets.runtime_bucket
            && let Some(max) = self.runtime_max_entries
        {
            match self.storage.trim(bucket, max).await {
                Ok(0) => {}
                Ok(trimmed) => tracing::debug!(bucket, trimmed, "trimmed runtime bucket"),
                Err(e) => tracing::warn!(bucket, error = %e, "runtime bucket trim failed"),
            }
        }
        true
    }

    async fn fetch(&self, request: &InterceptedRequest) -> Fetched {
        match self.network.fetch(request).await {
            Ok(response) if response.is_success() => Fetched::Usable(response),
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "network returned non-success status");
                Fetched::Unusable(response)
            }
            Err(e) if e.is_network() => {
                tracing::debug!(url = %request.url, error = %e, "network unavailable");
                Fetched::Failed
            }
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "fetch failed before reaching the network");
                Fetched::Failed
            }
        }
    }
}

/// Run the strategy for `class`.
pub async fn run(class: RequestClass, ctx: &StrategyContext, request: &InterceptedRequest) -> StrategyOutcome {
    match class {
        RequestClass::StaticAsset => cache_first(ctx, request).await,
        RequestClass::ApiCall => network_first(ctx, request).await,
        RequestClass::Navigation => navigation(ctx, request).await,
        RequestClass::Other => stale_while_revalidate(ctx, request).await,
    }
}

/// Serve from the static bucket; fetch and store only on a miss.
pub async fn cache_first(ctx: &StrategyContext, request: &InterceptedRequest) -> StrategyOutcome {
    let bucket = &ctx.buckets.static_bucket;
    let key = RequestKey::for_request(request);

    if let Some(entry) = ctx.lookup(bucket, &key).await {
        tracing::debug!(url = %key.url, "cache-first hit");
        return StrategyOutcome::from_cache(entry);
    }

    match ctx.fetch(request).await {
        Fetched::Usable(response) => {
            let cached = ctx.store(bucket, &key, &response).await;
            StrategyOutcome::from_network(response, cached)
        }
        Fetched::Unusable(response) => StrategyOutcome::from_network(response, false),
        Fetched::Failed => StrategyOutcome::offline(),
    }
}

/// Fetch first and refresh the runtime bucket; fall back to it when offline.
pub async fn network_first(ctx: &StrategyContext, request: &InterceptedRequest) -> StrategyOutcome {
    let bucket = &ctx.buckets.runtime_bucket;
    let key = RequestKey::for_request(request);

    let passthrough = match ctx.fetch(request).await {
        Fetched::Usable(response) => {
            let cached = ctx.store(bucket, &key, &response).await;
            return StrategyOutcome::from_network(response, cached);
        }
        Fetched::Unusable(response) => Some(response),
        Fetched::Failed => None,
    };

    if let Some(entry) = ctx.lookup(bucket, &key).await {
        tracing::debug!(url = %key.url, "network-first served from cache");
        return StrategyOutcome::from_cache(entry);
    }

    match passthrough {
        Some(response) => StrategyOutcome::from_network(response, false),
        None => StrategyOutcome::offline(),
    }
}

enum Revalidated {
    Stored(Response, bool),
    Unusable(Response),
    Failed,
}

async fn revalidate(ctx: &StrategyContext, request: &InterceptedRequest, key: &RequestKey) -> Revalidated {
    match ctx.fetch(request).await {
        Fetched::Usable(response) => {
            let cached = ctx.store(&ctx.buckets.runtime_bucket, key, &response).await;
            Revalidated::Stored(response, cached)
        }
        Fetched::Unusable(response) => Revalidated::Unusable(response),
        Fetched::Failed => Revalidated::Failed,
    }
}

/// Serve the cached entry immediately and refresh it in the background.
///
/// The refreshed value is only visible to the next request for the key.
pub async fn stale_while_revalidate(ctx: &StrategyContext, request: &InterceptedRequest) -> StrategyOutcome {
    let key = RequestKey::for_request(request);
    let cached = ctx.lookup(&ctx.buckets.runtime_bucket, &key).await;

    if let Some(entry) = cached {
        let refresh_ctx = ctx.clone();
        let refresh_request = request.clone();
        ctx.background.spawn(async move {
            if let Revalidated::Failed = revalidate(&refresh_ctx, &refresh_request, &key).await {
                tracing::debug!(url = %key.url, "background revalidation failed");
            }
        });
        return StrategyOutcome::from_cache(entry);
    }

    match revalidate(ctx, request, &key).await {
        Revalidated::Stored(response, cached) => StrategyOutcome::from_network(response, cached),
        Revalidated::Unusable(response) => StrategyOutcome::from_network(response, false),
        Revalidated::Failed => StrategyOutcome::offline(),
    }
}

/// Fetch the document; when offline serve the app shell from the static bucket.
///
/// Navigations are never written to a bucket.
pub async fn navigation(ctx: &StrategyContext, request: &InterceptedRequest) -> StrategyOutcome {
    let passthrough = match ctx.fetch(request).await {
        Fetched::Usable(response) => return StrategyOutcome::from_network(response, false),
        Fetched::Unusable(response) => Some(response),
        Fetched::Failed => None,
    };

    if let Some(entry) = ctx.lookup(&ctx.buckets.static_bucket, &ctx.shell_key).await {
        tracing::debug!(url = %request.url, shell = %ctx.shell_key.url, "serving app shell to navigation");
        return StrategyOutcome::from_cache(entry);
    }

    match passthrough {
        Some(response) => StrategyOutcome::from_network(response, false),
        None => StrategyOutcome::offline(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingStorage, ScriptedNetwork, html, ok};
    use swcache_core::MemoryStorage;
    use url::Url;

    const ORIGIN: &str = "http://localhost:3000";

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn context(storage: Arc<dyn CacheStorage>, network: Arc<ScriptedNetwork>) -> StrategyContext {
        StrategyContext {
            storage,
            network,
            buckets: BucketNames::new("static", "runtime", "v1"),
            shell_key: RequestKey::for_url(&url("/index.html")),
            runtime_max_entries: None,
            background: Background::default(),
            retired: Arc::default(),
        }
    }

    fn get(path: &str) -> InterceptedRequest {
        InterceptedRequest::get(url(path))
    }

    async fn seed(storage: &MemoryStorage, bucket: &str, path: &str, response: Response) {
        storage.put(bucket, &RequestKey::for_url(&url(path)), &response).await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_first_hit_makes_no_network_call() {
        let storage = MemoryStorage::new();
        seed(&storage, "static-v1", "/static/js/bundle.js", ok("cached js")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/static/js/bundle.js"), ok("fresh js"));
        let ctx = context(Arc::new(storage), network.clone());

        let outcome = cache_first(&ctx, &get("/static/js/bundle.js")).await;

        assert_eq!(outcome.origin, Origin::Cache);
        assert!(!outcome.cached_after);
        assert!(outcome.stored_at.is_some());
        assert_eq!(&outcome.response.body[..], b"cached js");
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/logo.png"), ok("png"));
        let ctx = context(Arc::new(storage.clone()), network.clone());

        let outcome = cache_first(&ctx, &get("/logo.png")).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert!(outcome.cached_after);

        network.respond(url("/logo.png"), ok("png v2"));
        let again = cache_first(&ctx, &get("/logo.png")).await;
        assert_eq!(again.origin, Origin::Cache);
        assert_eq!(&again.response.body[..], b"png");
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_non_success_not_stored() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/missing.css"), Response::new(404, "nope"));
        let ctx = context(Arc::new(storage.clone()), network);

        let outcome = cache_first(&ctx, &get("/missing.css")).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert_eq!(outcome.response.status, 404);
        assert!(!outcome.cached_after);
        assert!(storage.entries("static-v1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_network_first_overwrites_stale_entry() {
        let storage = MemoryStorage::new();
        seed(&storage, "runtime-v1", "/api/providers", ok("stale")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/api/providers"), ok("fresh"));
        let ctx = context(Arc::new(storage.clone()), network);

        let outcome = network_first(&ctx, &get("/api/providers")).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert!(outcome.cached_after);
        assert_eq!(&outcome.response.body[..], b"fresh");

        let stored = storage
            .match_entry("runtime-v1", &RequestKey::for_url(&url("/api/providers")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&stored.response.body[..], b"fresh");
    }

    #[tokio::test]
    async fn test_network_first_degrades_to_cache() {
        let storage = MemoryStorage::new();
        seed(&storage, "runtime-v1", "/api/providers", ok("[{\"id\":1}]")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.fail(url("/api/providers"));
        let ctx = context(Arc::new(storage), network);

        let outcome = network_first(&ctx, &get("/api/providers")).await;
        assert_eq!(outcome.origin, Origin::Cache);
        assert!(!outcome.cached_after);
        assert_eq!(&outcome.response.body[..], b"[{\"id\":1}]");
    }

    #[tokio::test]
    async fn test_network_first_server_error_prefers_cache_then_passthrough() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/api/messages"), Response::new(500, "boom"));
        let ctx = context(Arc::new(storage.clone()), network);

        let outcome = network_first(&ctx, &get("/api/messages")).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert_eq!(outcome.response.status, 500);

        seed(&storage, "runtime-v1", "/api/messages", ok("old messages")).await;
        let outcome = network_first(&ctx, &get("/api/messages")).await;
        assert_eq!(outcome.origin, Origin::Cache);
        assert_eq!(&outcome.response.body[..], b"old messages");
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_serves_old_then_new() {
        let storage = MemoryStorage::new();
        seed(&storage, "runtime-v1", "/locales/en", ok("V1")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/locales/en"), ok("V2"));
        let ctx = context(Arc::new(storage), network.clone());

        let first = stale_while_revalidate(&ctx, &get("/locales/en")).await;
        assert_eq!(first.origin, Origin::Cache);
        assert_eq!(&first.response.body[..], b"V1");

        ctx.background.wait_idle().await;
        assert_eq!(network.calls(), 1);

        let second = stale_while_revalidate(&ctx, &get("/locales/en")).await;
        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(&second.response.body[..], b"V2");
        ctx.background.wait_idle().await;
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_returns_before_network_completes() {
        let storage = MemoryStorage::new();
        seed(&storage, "runtime-v1", "/feed", ok("V1")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/feed"), ok("V2"));
        let gate = network.hold();
        let ctx = context(Arc::new(storage), network.clone());

        let first = stale_while_revalidate(&ctx, &get("/feed")).await;
        assert_eq!(&first.response.body[..], b"V1");
        assert_eq!(ctx.background.pending(), 1);

        gate.release();
        ctx.background.wait_idle().await;
        let second = stale_while_revalidate(&ctx, &get("/feed")).await;
        assert_eq!(&second.response.body[..], b"V2");
        gate.release();
        ctx.background.wait_idle().await;
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_miss_waits_for_network() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/feed"), ok("fresh"));
        let ctx = context(Arc::new(storage), network);

        let outcome = stale_while_revalidate(&ctx, &get("/feed")).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert!(outcome.cached_after);
        assert_eq!(ctx.background.pending(), 0);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_background_failure_absorbed() {
        let storage = MemoryStorage::new();
        seed(&storage, "runtime-v1", "/feed", ok("V1")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.fail(url("/feed"));
        let ctx = context(Arc::new(storage), network);

        let outcome = stale_while_revalidate(&ctx, &get("/feed")).await;
        assert_eq!(&outcome.response.body[..], b"V1");
        ctx.background.wait_idle().await;

        let again = stale_while_revalidate(&ctx, &get("/feed")).await;
        assert_eq!(&again.response.body[..], b"V1");
        ctx.background.wait_idle().await;
    }

    #[tokio::test]
    async fn test_navigation_online_not_cached() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/therapists"), html("<html>list</html>"));
        let ctx = context(Arc::new(storage.clone()), network);

        let outcome = navigation(&ctx, &get("/therapists").navigate()).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert!(!outcome.cached_after);
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_offline_serves_shell() {
        let storage = MemoryStorage::new();
        seed(&storage, "static-v1", "/index.html", html("<html>shell</html>")).await;
        let network = Arc::new(ScriptedNetwork::new());
        let ctx = context(Arc::new(storage), network);

        let outcome = navigation(&ctx, &get("/therapists/42").navigate()).await;
        assert_eq!(outcome.origin, Origin::Cache);
        assert_eq!(outcome.response.status, 200);
        assert_eq!(&outcome.response.body[..], b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_server_error_serves_shell() {
        let storage = MemoryStorage::new();
        seed(&storage, "static-v1", "/index.html", html("<html>shell</html>")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/therapists"), Response::new(500, "upstream down"));
        let ctx = context(Arc::new(storage), network);

        let outcome = navigation(&ctx, &get("/therapists").navigate()).await;
        assert_eq!(outcome.origin, Origin::Cache);
        assert_eq!(outcome.response.status, 200);
        assert_eq!(&outcome.response.body[..], b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_not_found_without_shell_passes_through() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/nowhere"), Response::new(404, "not found"));
        let ctx = context(Arc::new(storage.clone()), network);

        let outcome = navigation(&ctx, &get("/nowhere").navigate()).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert_eq!(outcome.response.status, 404);
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_keeps_entry_on_server_error() {
        let storage = MemoryStorage::new();
        seed(&storage, "runtime-v1", "/locales/en", ok("V1")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/locales/en"), Response::new(500, "boom"));
        let ctx = context(Arc::new(storage), network.clone());

        let first = stale_while_revalidate(&ctx, &get("/locales/en")).await;
        assert_eq!(&first.response.body[..], b"V1");
        ctx.background.wait_idle().await;
        assert_eq!(network.calls(), 1);

        let second = stale_while_revalidate(&ctx, &get("/locales/en")).await;
        assert_eq!(second.origin, Origin::Cache);
        assert_eq!(second.response.status, 200);
        assert_eq!(&second.response.body[..], b"V1");
        ctx.background.wait_idle().await;
    }

    #[tokio::test]
    async fn test_retired_context_does_not_store() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/api/providers"), ok("fresh"));
        let ctx = context(Arc::new(storage.clone()), network);
        ctx.retire();

        let outcome = network_first(&ctx, &get("/api/providers")).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert!(!outcome.cached_after);
        assert!(storage.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_waiters_all_see_refresh_land() {
        let storage = MemoryStorage::new();
        seed(&storage, "runtime-v1", "/feed", ok("V1")).await;
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/feed"), ok("V2"));
        let gate = network.hold();
        let ctx = context(Arc::new(storage.clone()), network);

        stale_while_revalidate(&ctx, &get("/feed")).await;
        assert_eq!(ctx.background.pending(), 1);

        let key = RequestKey::for_url(&url("/feed"));
        let waiter = |ctx: StrategyContext, storage: MemoryStorage, key: RequestKey| async move {
            ctx.background.wait_idle().await;
            storage.match_entry("runtime-v1", &key).await.unwrap().unwrap().response.body
        };
        let a = tokio::spawn(waiter(ctx.clone(), storage.clone(), key.clone()));
        let b = tokio::spawn(waiter(ctx.clone(), storage.clone(), key));
        tokio::task::yield_now().await;

        gate.release();
        assert_eq!(&a.await.unwrap()[..], b"V2");
        assert_eq!(&b.await.unwrap()[..], b"V2");
        assert_eq!(ctx.background.pending(), 0);
    }

    #[tokio::test]
    async fn test_every_strategy_falls_back_to_503() {
        let network = Arc::new(ScriptedNetwork::new());
        let ctx = context(Arc::new(MemoryStorage::new()), network);

        for class in [RequestClass::StaticAsset, RequestClass::ApiCall, RequestClass::Navigation, RequestClass::Other] {
            let outcome = run(class, &ctx, &get("/anything")).await;
            assert_eq!(outcome.origin, Origin::Fallback, "{class:?}");
            assert_eq!(outcome.response.status, 503, "{class:?}");
            assert!(!outcome.cached_after);
        }
    }

    #[tokio::test]
    async fn test_cache_errors_are_misses() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(url("/app.js"), ok("js"));
        let ctx = context(Arc::new(FailingStorage), network.clone());

        let outcome = cache_first(&ctx, &get("/app.js")).await;
        assert_eq!(outcome.origin, Origin::Network);
        assert!(!outcome.cached_after);

        for class in [RequestClass::StaticAsset, RequestClass::ApiCall, RequestClass::Navigation, RequestClass::Other] {
            let outcome = run(class, &ctx, &get("/offline")).await;
            assert_eq!(outcome.response.status, 503, "{class:?}");
        }
    }

    #[tokio::test]
    async fn test_runtime_bucket_is_trimmed() {
        let storage = MemoryStorage::new();
        let network = Arc::new(ScriptedNetwork::new());
        for i in 0..3 {
            network.respond(url(&format!("/api/p/{i}")), ok("p"));
        }
        let mut ctx = context(Arc::new(storage.clone()), network);
        ctx.runtime_max_entries = Some(2);

        for i in 0..3 {
            network_first(&ctx, &get(&format!("/api/p/{i}"))).await;
        }

        let urls: Vec<String> = storage.entries("runtime-v1").await.unwrap().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec![url("/api/p/1").to_string(), url("/api/p/2").to_string()]);
    }
}
