// src/lib.rs

//! Lazily cached AT-TLS session metadata for inbound connections.
//!
//! [`core::AttlsContext`] caches what the privileged AT-TLS facility reports
//! for one connection. [`inbound`] binds one context to each worker thread so
//! code deep in a request handler can ask for "its" connection's metadata.
//!
//! ```no_run
//! use attls::core::{ConnectionHandle, StatPolicy};
//! use attls::inbound;
//!
//! # fn handle_request(fd: i32) -> attls::core::Result<()> {
//! let _guard = attls::connection::InboundGuard::attach(ConnectionHandle::new(fd));
//! if inbound::stat_policy()? == StatPolicy::Enabled {
//!     let user = inbound::user_id()?;
//!     println!("partner user id: {user}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod core;

// Re-export
pub use crate::connection::inbound;
