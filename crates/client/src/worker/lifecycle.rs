//! One worker version: install, activate, message and fetch handling.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use swcache_core::{AppConfig, BucketNames, CacheStorage, Error, InterceptedRequest, RequestKey};

use super::classify::{BypassReason, Classifier, RequestClass, Route};
use super::strategy::{self, Background, StrategyContext, StrategyOutcome};
use crate::fetch::Network;

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    /// Installed and waiting to take over.
    Installed,
    Activating,
    Activated,
    /// Failed to install or replaced by a newer version.
    Redundant,
}

/// Control message posted by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Number of application-shell entries written.
    pub cached: usize,
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    /// Buckets removed because they belong to another version.
    pub deleted: Vec<String>,
    pub claim: bool,
}

/// What a worker did with an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not handled; the host sends the request to the network itself.
    Bypass(BypassReason),
    Respond { class: RequestClass, outcome: StrategyOutcome },
}

/// A single version of the caching layer.
pub struct Worker {
    generation: u64,
    config: AppConfig,
    classifier: Classifier,
    ctx: StrategyContext,
    state: Mutex<WorkerState>,
}

impl Worker {
    /// Build a worker for `config.version`. The configuration is validated.
    pub fn new(
        generation: u64, config: AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let classifier = Classifier::from_config(&config)?;
        let shell_key = RequestKey::for_url(&config.resolve(&config.navigation_fallback)?);

        let ctx = StrategyContext {
            storage,
            network,
            buckets: config.bucket_names(),
            shell_key,
            runtime_max_entries: config.runtime_max_entries,
            background: Background::default(),
            retired: Arc::default(),
        };

        Ok(Self { generation, config, classifier, ctx, state: Mutex::new(WorkerState::Installing) })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn buckets(&self) -> &BucketNames {
        &self.ctx.buckets
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state == WorkerState::Redundant {
            self.ctx.retire();
        }
        if *current != state {
            tracing::debug!(version = %self.config.version, generation = self.generation, from = ?*current, to = ?state, "worker state");
            *current = state;
        }
    }

    /// Pre-cache the application shell into this version's static bucket.
    ///
    /// All manifest paths are fetched concurrently. Any failed fetch or
    /// non-success status fails the whole install and nothing is written.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.set_state(WorkerState::Installing);
        let bucket = &self.ctx.buckets.static_bucket;

        let requests = self
            .config
            .app_shell
            .iter()
            .map(|path| -> Result<InterceptedRequest, Error> { Ok(InterceptedRequest::get(self.config.resolve(path)?)) })
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = requests.iter().map(|request| async move {
            let response = self
                .ctx
                .network
                .fetch(request)
                .await
                .map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url)))?;
            if !response.is_success() {
                return Err(Error::InstallFailed(format!("{}: status {}", request.url, response.status)));
            }
            Ok::<_, Error>((RequestKey::for_request(request), response))
        });
        let entries = try_join_all(fetches).await?;
        let cached = entries.len();

        self.ctx
            .storage
            .put_all(bucket, entries)
            .await
            .map_err(|e| Error::InstallFailed(format!("writing {bucket}: {e}")))?;

        self.set_state(WorkerState::Installed);
        tracing::info!(version = %self.config.version, bucket = %bucket, cached, "installed application shell");

        Ok(InstallReport { cached, skip_waiting: self.config.skip_waiting_on_install })
    }

    /// Delete every bucket that does not belong to this version.
    ///
    /// Storage errors are logged and never stop activation.
    pub async fn activate(&self) -> ActivateReport {
        self.set_state(WorkerState::Activating);
        let mut deleted = Vec::new();

        match self.ctx.storage.keys().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !self.ctx.buckets.is_current(n)) {
                    match self.ctx.storage.delete(&name).await {
                        Ok(true) => {
                            tracing::info!(bucket = %name, "deleted stale bucket");
                            deleted.push(name);
                        }
                        Ok(false) => {}
                        Err(e) => tracing::warn!(bucket = %name, error = %e, "failed to delete stale bucket"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to list buckets, skipping cleanup"),
        }

        self.set_state(WorkerState::Activated);
        tracing::info!(version = %self.config.version, deleted = deleted.len(), "activated");

        ActivateReport { deleted, claim: self.config.claim_on_activate }
    }

    /// Returns whether the message asks this worker to skip waiting.
    pub fn on_message(&self, message: &ControlMessage) -> bool {
        match message {
            ControlMessage::SkipWaiting => true,
            ControlMessage::Unknown => {
                tracing::debug!(version = %self.config.version, "ignoring unknown control message");
                false
            }
        }
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Route {
        self.classifier.classify(request)
    }

    /// Answer an intercepted request, or decline it.
    pub async fn handle(&self, request: &InterceptedRequest) -> Dispatch {
        match self.classify(request) {
            Route::Bypass(reason) => {
                tracing::debug!(url = %request.url, method = %request.method, ?reason, "bypass");
                Dispatch::Bypass(reason)
            }
            Route::Handle(class) => {
                let outcome = strategy::run(class, &self.ctx, request).await;
                tracing::debug!(
                    url = %request.url,
                    ?class,
                    origin = ?outcome.origin,
                    status = outcome.response.status,
                    cached_after = outcome.cached_after,
                    "handled"
                );
                Dispatch::Respond { class, outcome }
            }
        }
    }

    /// Wait for pending background revalidations.
    pub async fn wait_until_idle(&self) {
        self.ctx.background.wait_idle().await;
    }
}
