//! The caching layer: classification, strategies and version lifecycle.
//!
//! ### Routing
//! - Non-`GET` and browser-extension requests are never intercepted
//! - Static assets: cache-first from the static bucket
//! - API calls: network-first, runtime bucket as offline fallback
//! - Navigations: network, then the cached app shell
//! - Everything else: stale-while-revalidate on the runtime bucket
//!
//! ### Versions
//! - Buckets are named `<label>-<version>`; activating a version deletes
//!   every bucket of other versions
//! - A [`Registration`] drives install, waiting, activation and claim

pub mod classify;
pub mod lifecycle;
pub mod registration;
pub mod strategy;

pub use classify::{BypassReason, Classifier, RequestClass, Route};
pub use lifecycle::{ActivateReport, ControlMessage, Dispatch, InstallReport, Worker, WorkerState};
pub use registration::{ClientId, ClientInfo, MessageReport, RegisterReport, Registration, RegistrationStatus, WorkerInfo};
pub use strategy::{Origin, StrategyOutcome};
