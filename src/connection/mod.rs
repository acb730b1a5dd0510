// src/connection/mod.rs

//! Binds AT-TLS contexts to the worker threads handling inbound connections.

mod guard;
pub mod inbound;

pub use guard::InboundGuard;
