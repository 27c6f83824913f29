//! Lifecycle MCP tools.
//!
//! These tools play the part of the page and the browser: registering new
//! versions, posting control messages and opening or closing clients.

pub mod client;
pub mod message;
pub mod register;
pub mod status;

pub use client::{SwClientParams, client_impl};
pub use message::{SwMessageParams, message_impl};
pub use register::{SwRegisterParams, register_impl};
pub use status::status_impl;
