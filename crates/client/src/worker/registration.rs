//! Worker versions over time.
//!
//! A [`Registration`] owns at most one installing, one waiting and one
//! active [`Worker`], plus the set of open clients. Skip-waiting and claim
//! are signals reported by the worker; this type is where they take effect.
//!
//! Install and activation run under a single lifecycle lock, so bucket
//! cleanup of one version never overlaps the install of another.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use swcache_core::{AppConfig, CacheStorage, Error, InterceptedRequest};
use tokio::sync::{Mutex, RwLock};

use super::classify::BypassReason;
use super::lifecycle::{ActivateReport, ControlMessage, Dispatch, Worker, WorkerState};
use crate::fetch::Network;

pub type ClientId = u64;

#[derive(Default)]
struct Slots {
    installing: Option<Arc<Worker>>,
    waiting: Option<Arc<Worker>>,
    active: Option<Arc<Worker>>,
    /// Open clients and whether the active worker controls them.
    clients: BTreeMap<ClientId, bool>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct WorkerInfo {
    pub version: String,
    pub generation: u64,
    pub state: WorkerState,
    pub static_bucket: String,
    pub runtime_bucket: String,
}

impl From<&Worker> for WorkerInfo {
    fn from(worker: &Worker) -> Self {
        Self {
            version: worker.version().to_string(),
            generation: worker.generation(),
            state: worker.state(),
            static_bucket: worker.buckets().static_bucket.clone(),
            runtime_bucket: worker.buckets().runtime_bucket.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ClientInfo {
    pub id: ClientId,
    pub controlled: bool,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct RegistrationStatus {
    pub installing: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub active: Option<WorkerInfo>,
    pub clients: Vec<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct RegisterReport {
    pub version: String,
    pub generation: u64,
    /// Application-shell entries written by install.
    pub cached: usize,
    /// Activated right away rather than left waiting.
    pub activated: bool,
    /// Buckets deleted by activation.
    pub deleted: Vec<String>,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct MessageReport {
    /// Version that received the message.
    pub version: String,
    /// Whether the message activated a waiting worker.
    pub activated: bool,
}

/// Registration of the caching layer for one origin.
pub struct Registration {
    config: AppConfig,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    slots: RwLock<Slots>,
    lifecycle: Mutex<()>,
    generations: AtomicU64,
    client_ids: AtomicU64,
}

impl Registration {
    pub fn new(config: AppConfig, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self {
            config,
            storage,
            network,
            slots: RwLock::new(Slots::default()),
            lifecycle: Mutex::new(()),
            generations: AtomicU64::new(0),
            client_ids: AtomicU64::new(0),
        }
    }

    /// Base configuration new versions are derived from.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub async fn active(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.waiting.clone()
    }

    /// Install a new worker version and activate it when allowed.
    ///
    /// `version` overrides the configured version string. On install failure
    /// the new version is discarded and the active one keeps serving.
    pub async fn register(&self, version: Option<&str>) -> Result<RegisterReport, Error> {
        let _lifecycle = self.lifecycle.lock().await;

        let config = match version {
            Some(v) => self.config.with_version(v),
            None => self.config.clone(),
        };
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let worker = Arc::new(Worker::new(generation, config, self.storage.clone(), self.network.clone())?);
        tracing::info!(version = %worker.version(), generation, "installing");

        self.slots.write().await.installing = Some(worker.clone());
        let installed = worker.install().await;
        self.slots.write().await.installing = None;

        let install = match installed {
            Ok(report) => report,
            Err(e) => {
                worker.set_state(WorkerState::Redundant);
                tracing::error!(version = %worker.version(), generation, error = %e, "install failed");
                return Err(e);
            }
        };

        let has_active = self.slots.read().await.active.is_some();
        let mut report = RegisterReport {
            version: worker.version().to_string(),
            generation,
            cached: install.cached,
            activated: false,
            deleted: Vec::new(),
        };

        if !has_active || install.skip_waiting {
            let activation = self.activate_locked(worker).await;
            report.activated = true;
            report.deleted = activation.deleted;
        } else {
            let mut slots = self.slots.write().await;
            if let Some(previous) = slots.waiting.replace(worker.clone()) {
                previous.set_state(WorkerState::Redundant);
                tracing::info!(version = %previous.version(), "replaced waiting worker");
            }
            tracing::info!(version = %worker.version(), "waiting for clients to close");
        }

        Ok(report)
    }

    /// Promote `worker` to active. The lifecycle lock must be held.
    async fn activate_locked(&self, worker: Arc<Worker>) -> ActivateReport {
        let retired = {
            let mut slots = self.slots.write().await;
            if let Some(waiting) = slots.waiting.take()
                && !Arc::ptr_eq(&waiting, &worker)
            {
                waiting.set_state(WorkerState::Redundant);
            }
            if let Some(previous) = slots.active.replace(worker.clone())
                && !Arc::ptr_eq(&previous, &worker)
            {
                previous.set_state(WorkerState::Redundant);
                tracing::info!(version = %previous.version(), "retired previous worker");
                Some(previous)
            } else {
                None
            }
        };

        // Refreshes started by the old version must land before its buckets go.
        if let Some(previous) = retired {
            previous.wait_until_idle().await;
        }

        let report = worker.activate().await;

        if report.claim {
            let mut slots = self.slots.write().await;
            slots.clients.values_mut().for_each(|controlled| *controlled = true);
            tracing::debug!(clients = slots.clients.len(), "claimed clients");
        }

        report
    }

    /// Deliver a control message to the waiting worker, or the active one.
    pub async fn post_message(&self, message: &ControlMessage) -> Result<MessageReport, Error> {
        let _lifecycle = self.lifecycle.lock().await;

        let (waiting, active) = {
            let slots = self.slots.read().await;
            (slots.waiting.clone(), slots.active.clone())
        };
        let Some(target) = waiting.clone().or(active) else {
            return Err(Error::InvalidState("no worker registered".to_string()));
        };

        let skip_waiting = target.on_message(message);
        let is_waiting = waiting.is_some_and(|w| Arc::ptr_eq(&w, &target));
        let activated = skip_waiting && is_waiting;
        if activated {
            tracing::info!(version = %target.version(), "skip waiting requested");
            self.activate_locked(target.clone()).await;
        }

        Ok(MessageReport { version: target.version().to_string(), activated })
    }

    /// Open a client (tab). It is controlled when a worker is active.
    pub async fn open_client(&self) -> ClientInfo {
        let id = self.client_ids.fetch_add(1, Ordering::SeqCst) + 1;
        let mut slots = self.slots.write().await;
        let controlled = slots.active.is_some();
        slots.clients.insert(id, controlled);
        ClientInfo { id, controlled }
    }

    /// Close a client. Returns whether closing it activated the waiting worker.
    pub async fn close_client(&self, id: ClientId) -> Result<bool, Error> {
        let _lifecycle = self.lifecycle.lock().await;

        let waiting = {
            let mut slots = self.slots.write().await;
            if slots.clients.remove(&id).is_none() {
                return Err(Error::InvalidInput(format!("unknown client {id}")));
            }
            if slots.clients.values().any(|controlled| *controlled) {
                return Ok(false);
            }
            slots.waiting.clone()
        };

        match waiting {
            Some(worker) => {
                tracing::info!(version = %worker.version(), "last controlled client closed");
                self.activate_locked(worker).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Route a request from `client` through the active worker.
    ///
    /// A navigation puts the client under control; other requests from an
    /// uncontrolled client are not intercepted.
    pub async fn fetch(&self, client: ClientId, request: &InterceptedRequest) -> Result<Dispatch, Error> {
        let worker = {
            let mut slots = self.slots.write().await;
            let controlled = *slots
                .clients
                .get(&client)
                .ok_or_else(|| Error::InvalidInput(format!("unknown client {client}")))?;
            let Some(active) = slots.active.clone() else {
                return Ok(Dispatch::Bypass(BypassReason::NoController));
            };

            if !controlled {
                if !request.is_navigation() {
                    return Ok(Dispatch::Bypass(BypassReason::NoController));
                }
                slots.clients.insert(client, true);
            }
            active
        };

        Ok(worker.handle(request).await)
    }

    /// Route a request through the active worker as if from a controlled client.
    pub async fn handle(&self, request: &InterceptedRequest) -> Dispatch {
        match self.active().await {
            Some(worker) => worker.handle(request).await,
            None => Dispatch::Bypass(BypassReason::NoController),
        }
    }

    pub async fn status(&self) -> RegistrationStatus {
        let slots = self.slots.read().await;
        let info = |w: &Option<Arc<Worker>>| w.as_deref().map(WorkerInfo::from);
        RegistrationStatus {
            installing: info(&slots.installing),
            waiting: info(&slots.waiting),
            active: info(&slots.active),
            clients: slots.clients.iter().map(|(&id, &controlled)| ClientInfo { id, controlled }).collect(),
        }
    }

    /// Wait for background revalidations of the live workers.
    pub async fn wait_until_idle(&self) {
        let workers: Vec<Arc<Worker>> = {
            let slots = self.slots.read().await;
            [&slots.active, &slots.waiting].into_iter().flatten().cloned().collect()
        };
        for worker in workers {
            worker.wait_until_idle().await;
        }
    }
}
