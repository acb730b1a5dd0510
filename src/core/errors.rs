// src/core/errors.rs

//! Defines the error types surfaced by the AT-TLS metadata core.

use crate::core::facility::CallStatus;
use std::fmt;
use thiserror::Error;

/// The value domains a raw facility code can be decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum CodeDomain {
    StatPolicy,
    StatConn,
    Protocol,
    SecurityType,
    Fips140,
}

/// A raw code returned by the facility that has no variant in its domain.
///
/// This usually means the facility is newer than this library. `code2` is only
/// set for two-byte domains (the protocol modifier byte).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnrecognizedCode {
    pub domain: CodeDomain,
    pub code: u8,
    pub code2: Option<u8>,
}

impl fmt::Display for UnrecognizedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized {} code {}", self.domain, self.code)?;
        if let Some(code2) = self.code2 {
            write!(f, "/{code2}")?;
        }
        Ok(())
    }
}

impl UnrecognizedCode {
    pub(crate) fn single(domain: CodeDomain, code: u8) -> Self {
        Self {
            domain,
            code,
            code2: None,
        }
    }

    pub(crate) fn pair(domain: CodeDomain, code: u8, code2: u8) -> Self {
        Self {
            domain,
            code,
            code2: Some(code2),
        }
    }
}

/// The main error enum for every cache, registry and control operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttlsError {
    /// A registry-level call was made on a thread with no attached context.
    #[error("no AT-TLS context is attached to the current thread")]
    NoActiveContext,

    /// A registry call was made while the thread's context was already in use
    /// by an enclosing registry call.
    #[error("the AT-TLS context of this thread is in use by an enclosing call")]
    ContextBusy,

    /// The privileged facility reported a nonzero return code.
    #[error("privileged AT-TLS call failed: {0}")]
    PrivilegedCall(#[from] CallStatus),

    /// A decoded field carried a raw value outside its domain.
    #[error(transparent)]
    UnrecognizedCode(#[from] UnrecognizedCode),

    /// The facility reported a certificate longer than the receive buffer.
    #[error("certificate of {reported} bytes does not fit the {capacity} byte receive buffer")]
    CertificateTruncated { reported: usize, capacity: usize },
}

/// A convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AttlsError>;
