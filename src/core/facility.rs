// src/core/facility.rs

//! The contract of the privileged AT-TLS facility.
//!
//! The facility itself (a device-control call on the connection's socket) is
//! external to this crate. Platform adapters implement [`AttlsFacility`];
//! everything above it depends only on the trait.

use crate::core::block::MetadataBlock;
use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

/// Identifies the connection to the facility (the socket descriptor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub i32);

impl ConnectionHandle {
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

/// The failure triple of a privileged call, passed through verbatim.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rc={rc} errno={errno} errno2={errno2:#010x}")]
pub struct CallStatus {
    /// The (nonzero) return code of the call.
    pub rc: i32,
    pub errno: i32,
    /// The facility-specific reason code.
    pub errno2: i32,
}

impl CallStatus {
    pub const fn new(rc: i32, errno: i32, errno2: i32) -> Self {
        Self { rc, errno, errno2 }
    }
}

bitflags! {
    /// Request type bits understood by the facility.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RequestType: u16 {
        const INIT_CONNECTION     = 0x0001;
        const RESET_SESSION       = 0x0002;
        const RESET_CIPHER        = 0x0004;
        const STOP_CONNECTION     = 0x0008;
        const ALLOW_HS_TIMEOUT    = 0x0010;
        const QUERY_ONLY          = 0x0020;
        const RETURN_CERTIFICATE  = 0x0040;
        /// TLSv1.3 or later.
        const RESET_WRITE_CIPHER  = 0x0100;
        /// TLSv1.3 or later.
        const SEND_SESSION_TICKET = 0x0200;
    }
}

/// A control operation that mutates the secure session instead of reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter, strum_macros::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ControlOp {
    InitConnection,
    ResetSession,
    ResetCipher,
    ResetWriteCipher,
    StopConnection,
    AllowHandshakeTimeout,
    SendSessionTicket,
}

impl ControlOp {
    pub fn request_type(self) -> RequestType {
        match self {
            ControlOp::InitConnection => RequestType::INIT_CONNECTION,
            ControlOp::ResetSession => RequestType::RESET_SESSION,
            ControlOp::ResetCipher => RequestType::RESET_CIPHER,
            ControlOp::ResetWriteCipher => RequestType::RESET_WRITE_CIPHER,
            ControlOp::StopConnection => RequestType::STOP_CONNECTION,
            ControlOp::AllowHandshakeTimeout => RequestType::ALLOW_HS_TIMEOUT,
            ControlOp::SendSessionTicket => RequestType::SEND_SESSION_TICKET,
        }
    }
}

/// The privileged calls the cache depends on.
///
/// Every call is blocking and may hold the calling thread for the duration of
/// the underlying control operation; there is no cancellation.
pub trait AttlsFacility: Send + Sync {
    /// Queries the fixed-size session metadata block.
    fn query_metadata(&self, handle: ConnectionHandle) -> Result<MetadataBlock, CallStatus>;

    /// Fills `buffer` with the partner certificate and returns the length the
    /// facility reports, which may be smaller than the buffer.
    fn query_certificate(
        &self,
        handle: ConnectionHandle,
        buffer: &mut [u8],
    ) -> Result<usize, CallStatus>;

    /// Queries metadata and certificate together. Adapters that can do this in
    /// a single call (`QUERY_ONLY | RETURN_CERTIFICATE`) should override it.
    fn query_with_certificate(
        &self,
        handle: ConnectionHandle,
        buffer: &mut [u8],
    ) -> Result<(MetadataBlock, usize), CallStatus> {
        let block = self.query_metadata(handle)?;
        let len = self.query_certificate(handle, buffer)?;
        Ok((block, len))
    }

    /// Issues one control operation.
    fn control(&self, handle: ConnectionHandle, op: ControlOp) -> Result<(), CallStatus>;
}

/// The adapter used where no AT-TLS facility exists. Every call fails with
/// `ENOSYS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableFacility;

impl UnavailableFacility {
    const STATUS: CallStatus = CallStatus::new(-1, libc::ENOSYS, 0);
}

impl AttlsFacility for UnavailableFacility {
    fn query_metadata(&self, _handle: ConnectionHandle) -> Result<MetadataBlock, CallStatus> {
        Err(Self::STATUS)
    }

    fn query_certificate(
        &self,
        _handle: ConnectionHandle,
        _buffer: &mut [u8],
    ) -> Result<usize, CallStatus> {
        Err(Self::STATUS)
    }

    fn control(&self, _handle: ConnectionHandle, _op: ControlOp) -> Result<(), CallStatus> {
        Err(Self::STATUS)
    }
}
