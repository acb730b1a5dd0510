// src/core/context.rs

//! The per-connection AT-TLS metadata cache.
//!
//! Nothing is fetched until a value is first requested. The first scalar read
//! issues one metadata query and decodes every scalar field at once; later
//! reads are answered from memory until [`AttlsContext::invalidate`] starts a
//! new epoch. The partner certificate is fetched by a separate query the first
//! time it is requested, or together with the metadata when the context was
//! created with `always_load_certificate`.

use crate::core::block::{MetadataBlock, SessionInfo};
use crate::core::codec::{AttlsFlags, Fips140, Protocol, SecurityType, StatConn, StatPolicy};
use crate::core::errors::{AttlsError, Result};
use crate::core::facility::{AttlsFacility, CallStatus, ConnectionHandle, ControlOp};
use crate::core::metrics;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Default capacity of the certificate receive buffer.
pub const DEFAULT_CERTIFICATE_BUFFER_LEN: usize = 10240;

/// Scalar metadata epoch.
#[derive(Debug, Clone)]
enum QueryState {
    Unloaded,
    Loaded(Box<SessionInfo>),
}

/// Certificate epoch. An empty certificate is `Loaded(Bytes::new())`.
#[derive(Debug, Clone)]
enum CertificateState {
    Unloaded,
    Loaded(Bytes),
}

/// Cached AT-TLS metadata for one connection.
///
/// A context is owned by the thread handling its connection and is not shared;
/// every accessor takes `&mut self`.
pub struct AttlsContext {
    handle: ConnectionHandle,
    always_load_certificate: bool,
    certificate_buffer_len: usize,
    facility: Arc<dyn AttlsFacility>,
    query: QueryState,
    certificate: CertificateState,
}

impl fmt::Debug for AttlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttlsContext")
            .field("handle", &self.handle)
            .field("always_load_certificate", &self.always_load_certificate)
            .field("certificate_buffer_len", &self.certificate_buffer_len)
            .field("query", &self.query)
            .field("certificate", &self.certificate)
            .finish_non_exhaustive()
    }
}

impl AttlsContext {
    /// Creates an empty context for `handle`. No call is made until a value is read.
    pub fn new(
        handle: ConnectionHandle,
        always_load_certificate: bool,
        facility: Arc<dyn AttlsFacility>,
    ) -> Self {
        Self {
            handle,
            always_load_certificate,
            certificate_buffer_len: DEFAULT_CERTIFICATE_BUFFER_LEN,
            facility,
            query: QueryState::Unloaded,
            certificate: CertificateState::Unloaded,
        }
    }

    /// Sets the capacity of the certificate receive buffer.
    pub fn with_certificate_buffer_len(mut self, len: usize) -> Self {
        self.certificate_buffer_len = len;
        self
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    pub fn always_load_certificate(&self) -> bool {
        self.always_load_certificate
    }

    pub fn certificate_buffer_len(&self) -> usize {
        self.certificate_buffer_len
    }

    pub fn is_query_loaded(&self) -> bool {
        matches!(self.query, QueryState::Loaded(_))
    }

    pub fn is_certificate_loaded(&self) -> bool {
        matches!(self.certificate, CertificateState::Loaded(_))
    }

    /// Drops every cached value, certificate included. The next read queries again.
    pub fn invalidate(&mut self) {
        debug!("Invalidating cached AT-TLS data for {}", self.handle);
        self.query = QueryState::Unloaded;
        self.certificate = CertificateState::Unloaded;
    }

    /// All scalar fields of the current epoch, loading them if needed.
    pub fn session_info(&mut self) -> Result<&SessionInfo> {
        if let QueryState::Unloaded = self.query {
            self.load_query()?;
        } else {
            metrics::CACHE_HITS_TOTAL.inc();
            trace!("AT-TLS metadata for {} served from cache", self.handle);
        }
        match &self.query {
            QueryState::Loaded(info) => Ok(info.as_ref()),
            QueryState::Unloaded => unreachable!("metadata is loaded by load_query"),
        }
    }

    /// Policy status at the time of policy lookup.
    pub fn stat_policy(&mut self) -> Result<StatPolicy> {
        Ok(self.session_info()?.stat_policy?)
    }

    /// Security status of the connection.
    pub fn stat_conn(&mut self) -> Result<StatConn> {
        Ok(self.session_info()?.stat_conn?)
    }

    /// Protocol in use; [`Protocol::NonSecure`] when the connection is not secure.
    pub fn protocol(&mut self) -> Result<Protocol> {
        Ok(self.session_info()?.protocol?)
    }

    /// Two-character negotiated cipher, `4X` if the cipher needs four characters.
    pub fn negotiated_cipher2(&mut self) -> Result<&str> {
        Ok(self.session_info()?.negotiated_cipher2.as_str())
    }

    pub fn security_type(&mut self) -> Result<SecurityType> {
        Ok(self.session_info()?.security_type?)
    }

    /// Partner user id, empty when none is available.
    pub fn user_id(&mut self) -> Result<&str> {
        Ok(self.session_info()?.user_id.as_str())
    }

    /// FIPS 140 compliance level.
    pub fn fips140(&mut self) -> Result<Fips140> {
        Ok(self.session_info()?.fips140?)
    }

    pub fn flags(&mut self) -> Result<AttlsFlags> {
        Ok(self.session_info()?.flags)
    }

    pub fn negotiated_cipher4(&mut self) -> Result<&str> {
        Ok(self.session_info()?.negotiated_cipher4.as_str())
    }

    /// Negotiated key share; only reported for TLSv1.3 or later.
    pub fn negotiated_key_share(&mut self) -> Result<&str> {
        Ok(self.session_info()?.negotiated_key_share.as_str())
    }

    /// Partner certificate, exactly as long as the facility reports.
    pub fn certificate(&mut self) -> Result<Bytes> {
        if let CertificateState::Loaded(cert) = &self.certificate {
            metrics::CACHE_HITS_TOTAL.inc();
            return Ok(cert.clone());
        }

        debug!("Querying AT-TLS certificate for {}", self.handle);
        let mut buffer = vec![0u8; self.certificate_buffer_len];
        let result = self.facility.query_certificate(self.handle, &mut buffer);
        let len = record_query(metrics::QUERY_KIND_CERTIFICATE, result)?;
        let cert = self.take_certificate(buffer, len)?;
        self.certificate = CertificateState::Loaded(cert.clone());
        Ok(cert)
    }

    fn load_query(&mut self) -> Result<()> {
        if self.always_load_certificate && !self.is_certificate_loaded() {
            debug!("Querying AT-TLS metadata and certificate for {}", self.handle);
            let mut buffer = vec![0u8; self.certificate_buffer_len];
            let result = self.facility.query_with_certificate(self.handle, &mut buffer);
            let (block, len) = record_query(metrics::QUERY_KIND_COMBINED, result)?;
            self.store_query(&block);
            // An oversized certificate stays unloaded; certificate() reports it.
            match self.take_certificate(buffer, len) {
                Ok(cert) => self.certificate = CertificateState::Loaded(cert),
                Err(err) => debug!("Certificate for {} not cached: {}", self.handle, err),
            }
        } else {
            debug!("Querying AT-TLS metadata for {}", self.handle);
            let result = self.facility.query_metadata(self.handle);
            let block = record_query(metrics::QUERY_KIND_METADATA, result)?;
            self.store_query(&block);
        }
        Ok(())
    }

    fn store_query(&mut self, block: &MetadataBlock) {
        self.query = QueryState::Loaded(Box::new(SessionInfo::decode(block)));
    }

    fn take_certificate(&self, mut buffer: Vec<u8>, len: usize) -> Result<Bytes> {
        if len > buffer.len() {
            return Err(AttlsError::CertificateTruncated {
                reported: len,
                capacity: buffer.len(),
            });
        }
        buffer.truncate(len);
        Ok(Bytes::from(buffer))
    }

    /// Initializes the secure connection (application-controlled policies).
    pub fn init_connection(&self) -> Result<()> {
        self.control(ControlOp::InitConnection)
    }

    pub fn reset_session(&self) -> Result<()> {
        self.control(ControlOp::ResetSession)
    }

    pub fn reset_cipher(&self) -> Result<()> {
        self.control(ControlOp::ResetCipher)
    }

    /// Resets the write cipher. TLSv1.3 or later.
    pub fn reset_write_cipher(&self) -> Result<()> {
        self.control(ControlOp::ResetWriteCipher)
    }

    pub fn stop_connection(&self) -> Result<()> {
        self.control(ControlOp::StopConnection)
    }

    /// Allows the handshake to time out.
    pub fn allow_handshake_timeout(&self) -> Result<()> {
        self.control(ControlOp::AllowHandshakeTimeout)
    }

    /// Sends a session ticket. TLSv1.3 or later.
    pub fn send_session_ticket(&self) -> Result<()> {
        self.control(ControlOp::SendSessionTicket)
    }

    /// Issues a control operation. Cached values are left as they are; call
    /// [`invalidate`](Self::invalidate) afterwards to observe the new state.
    pub fn control(&self, op: ControlOp) -> Result<()> {
        debug!("Issuing AT-TLS control '{}' for {}", op, self.handle);
        let name: &'static str = op.into();
        metrics::CONTROL_CALLS_TOTAL.with_label_values(&[name]).inc();
        self.facility.control(self.handle, op)?;
        Ok(())
    }
}

fn record_query<T>(kind: &str, result: std::result::Result<T, CallStatus>) -> Result<T> {
    metrics::QUERIES_TOTAL.with_label_values(&[kind]).inc();
    result.map_err(|status| {
        metrics::QUERY_FAILURES_TOTAL.with_label_values(&[kind]).inc();
        AttlsError::PrivilegedCall(status)
    })
}
