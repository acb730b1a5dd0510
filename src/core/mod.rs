// src/core/mod.rs

//! The AT-TLS metadata core: codes, the metadata block, the facility contract
//! and the per-connection cache.

pub mod block;
pub mod codec;
pub mod context;
pub mod errors;
pub mod facility;
pub mod metrics;
pub mod usermap;

pub use codec::{AttlsFlags, ByteCode, Fips140, Protocol, SecurityType, StatConn, StatPolicy};
pub use context::AttlsContext;
pub use errors::{AttlsError, Result};
pub use facility::{AttlsFacility, CallStatus, ConnectionHandle, ControlOp};
