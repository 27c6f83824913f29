//! Offline-first request caching for swcache.
//!
//! This crate provides the network capability and the caching layer that
//! answers intercepted requests from versioned buckets or the network.

pub mod fetch;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use fetch::{FetchClient, FetchConfig, Network};
pub use worker::{ControlMessage, Dispatch, Registration, Worker};
