// src/connection/guard.rs

//! Defines `InboundGuard`, an RAII guard for the per-thread context binding.

use crate::connection::inbound;
use crate::core::context::AttlsContext;
use crate::core::facility::ConnectionHandle;
use std::marker::PhantomData;
use tracing::debug;

/// Attaches a context to the current thread on construction and detaches it
/// when dropped, so the binding cannot outlive the connection's handling even
/// if the handler returns early or panics.
///
/// The guard is `!Send`: the binding belongs to the thread that created it.
pub struct InboundGuard {
    handle: ConnectionHandle,
    _not_send: PhantomData<*const ()>,
}

impl InboundGuard {
    /// Attaches a context for `handle` using the process defaults.
    pub fn attach(handle: ConnectionHandle) -> Self {
        inbound::attach(handle);
        Self::bound(handle)
    }

    /// Attaches a context for `handle` with an explicit certificate policy.
    pub fn attach_with(handle: ConnectionHandle, always_load_certificate: bool) -> Self {
        inbound::attach_with(handle, always_load_certificate);
        Self::bound(handle)
    }

    /// Binds a pre-built context.
    pub fn from_context(context: AttlsContext) -> Self {
        let handle = context.handle();
        inbound::attach_context(context);
        Self::bound(handle)
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    fn bound(handle: ConnectionHandle) -> Self {
        Self {
            handle,
            _not_send: PhantomData,
        }
    }
}

impl Drop for InboundGuard {
    fn drop(&mut self) {
        debug!("InboundGuard for {} dropping, detaching context", self.handle);
        inbound::detach();
    }
}
