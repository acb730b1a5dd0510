// src/connection/inbound.rs

//! The per-thread registry of inbound AT-TLS contexts.
//!
//! The connection-accepting layer calls [`attach`] with the socket of the
//! connection a worker thread is about to handle, and [`detach`] when the
//! worker is done. In between, any code running on that thread can read the
//! connection's metadata through the free functions of this module without
//! being handed the context.
//!
//! The binding is per OS thread, not per async task: a context attached on a
//! thread is invisible to every other thread, and a task that migrates between
//! threads does not take its context along.

use crate::core::codec::{AttlsFlags, Fips140, Protocol, SecurityType, StatConn, StatPolicy};
use crate::core::context::{AttlsContext, DEFAULT_CERTIFICATE_BUFFER_LEN};
use crate::core::errors::{AttlsError, Result};
use crate::core::facility::{AttlsFacility, ConnectionHandle, UnavailableFacility};
use crate::core::metrics;
use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::debug;

/// Process-wide settings consulted by future [`attach`] calls.
struct InboundDefaults {
    facility: Arc<dyn AttlsFacility>,
    always_load_certificate: bool,
    certificate_buffer_len: usize,
}

static DEFAULTS: Lazy<RwLock<InboundDefaults>> = Lazy::new(|| {
    RwLock::new(InboundDefaults {
        facility: Arc::new(UnavailableFacility),
        always_load_certificate: false,
        certificate_buffer_len: DEFAULT_CERTIFICATE_BUFFER_LEN,
    })
});

/// A context bound to a thread. It holds one slot of the bound-contexts gauge
/// until dropped, either by [`detach`] or when the thread exits.
struct Binding(AttlsContext);

impl Binding {
    fn new(context: AttlsContext) -> Self {
        metrics::BOUND_CONTEXTS.inc();
        Self(context)
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        metrics::BOUND_CONTEXTS.dec();
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Binding>> = const { RefCell::new(None) };
}

/// Installs the facility adapter used by contexts attached from now on.
pub fn set_facility(facility: Arc<dyn AttlsFacility>) {
    DEFAULTS.write().facility = facility;
}

/// Sets whether contexts attached from now on fetch the certificate together
/// with the first metadata query. Attached contexts keep their setting.
pub fn set_always_load_certificate(always_load_certificate: bool) {
    DEFAULTS.write().always_load_certificate = always_load_certificate;
}

pub fn always_load_certificate() -> bool {
    DEFAULTS.read().always_load_certificate
}

/// Sets the certificate receive buffer capacity for contexts attached from now on.
pub fn set_certificate_buffer_len(len: usize) {
    DEFAULTS.write().certificate_buffer_len = len;
}

pub fn certificate_buffer_len() -> usize {
    DEFAULTS.read().certificate_buffer_len
}

/// Attaches a fresh context for `handle` to the current thread using the
/// process defaults. Any previous binding of this thread is dropped.
pub fn attach(handle: ConnectionHandle) {
    let always_load_certificate = always_load_certificate();
    attach_with(handle, always_load_certificate);
}

/// Like [`attach`], overriding the certificate policy for this context.
pub fn attach_with(handle: ConnectionHandle, always_load_certificate: bool) {
    let context = {
        let defaults = DEFAULTS.read();
        AttlsContext::new(handle, always_load_certificate, defaults.facility.clone())
            .with_certificate_buffer_len(defaults.certificate_buffer_len)
    };
    attach_context(context);
}

/// Binds an already built context to the current thread, replacing any
/// previous binding without touching the replaced context's connection.
///
/// # Panics
///
/// If called from inside [`with_current`] on the same thread.
pub fn attach_context(context: AttlsContext) {
    let handle = context.handle();
    let replaced = CURRENT.with(|current| current.borrow_mut().replace(Binding::new(context)));
    match replaced {
        Some(previous) => debug!(
            "Replaced AT-TLS context for {} with {} on this thread",
            previous.0.handle(),
            handle
        ),
        None => debug!("Attached AT-TLS context for {}", handle),
    }
}

/// Removes the current thread's binding. Does nothing if there is none.
///
/// # Panics
///
/// If called from inside [`with_current`] on the same thread.
pub fn detach() {
    let removed = CURRENT.with(|current| current.borrow_mut().take());
    if let Some(binding) = removed {
        debug!("Detached AT-TLS context for {}", binding.0.handle());
    }
}

/// True if a context is bound to this thread, including one that is
/// currently in use by [`with_current`].
pub fn is_attached() -> bool {
    CURRENT.with(|current| match current.try_borrow() {
        Ok(slot) => slot.is_some(),
        Err(_) => true,
    })
}

/// Runs `f` with the context bound to the current thread.
///
/// Every registry accessor and control below goes through this function.
///
/// # Errors
///
/// [`AttlsError::NoActiveContext`] if nothing is attached, and
/// [`AttlsError::ContextBusy`] if called again from inside `f`, for example
/// by a facility adapter that calls back into this module.
pub fn with_current<R>(f: impl FnOnce(&mut AttlsContext) -> Result<R>) -> Result<R> {
    CURRENT.with(|current| {
        let mut slot = current
            .try_borrow_mut()
            .map_err(|_| AttlsError::ContextBusy)?;
        match slot.as_mut() {
            Some(binding) => f(&mut binding.0),
            None => Err(AttlsError::NoActiveContext),
        }
    })
}

/// The handle of the connection bound to the current thread.
pub fn current_handle() -> Result<ConnectionHandle> {
    with_current(|ctx| Ok(ctx.handle()))
}

/// See [`AttlsContext::invalidate`].
pub fn invalidate() -> Result<()> {
    with_current(|ctx| {
        ctx.invalidate();
        Ok(())
    })
}

pub fn stat_policy() -> Result<StatPolicy> {
    with_current(|ctx| ctx.stat_policy())
}

pub fn stat_conn() -> Result<StatConn> {
    with_current(|ctx| ctx.stat_conn())
}

pub fn protocol() -> Result<Protocol> {
    with_current(|ctx| ctx.protocol())
}

pub fn negotiated_cipher2() -> Result<String> {
    with_current(|ctx| ctx.negotiated_cipher2().map(str::to_owned))
}

pub fn security_type() -> Result<SecurityType> {
    with_current(|ctx| ctx.security_type())
}

pub fn user_id() -> Result<String> {
    with_current(|ctx| ctx.user_id().map(str::to_owned))
}

pub fn fips140() -> Result<Fips140> {
    with_current(|ctx| ctx.fips140())
}

pub fn flags() -> Result<AttlsFlags> {
    with_current(|ctx| ctx.flags())
}

pub fn negotiated_cipher4() -> Result<String> {
    with_current(|ctx| ctx.negotiated_cipher4().map(str::to_owned))
}

pub fn negotiated_key_share() -> Result<String> {
    with_current(|ctx| ctx.negotiated_key_share().map(str::to_owned))
}

pub fn certificate() -> Result<Bytes> {
    with_current(|ctx| ctx.certificate())
}

pub fn init_connection() -> Result<()> {
    with_current(|ctx| ctx.init_connection())
}

pub fn reset_session() -> Result<()> {
    with_current(|ctx| ctx.reset_session())
}

pub fn reset_cipher() -> Result<()> {
    with_current(|ctx| ctx.reset_cipher())
}

pub fn reset_write_cipher() -> Result<()> {
    with_current(|ctx| ctx.reset_write_cipher())
}

pub fn stop_connection() -> Result<()> {
    with_current(|ctx| ctx.stop_connection())
}

pub fn allow_handshake_timeout() -> Result<()> {
    with_current(|ctx| ctx.allow_handshake_timeout())
}

pub fn send_session_ticket() -> Result<()> {
    with_current(|ctx| ctx.send_session_ticket())
}
