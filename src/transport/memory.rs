//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! - Once `register_listener()` returns successfully, messages sent *after*
//!   that point and matching the listener's filters are delivered.
//! - Each delivery runs on its own tokio task, so listeners observe the same
//!   kind of concurrency a networked transport would produce.
//! - No messages are dropped due to timing, scheduling, or background IO.
//!
//! ## Non-Goals
//!
//! This transport does not attempt to emulate the failure modes, persistence,
//! or delivery guarantees of any specific network. It exists to provide a
//! clear, deterministic baseline against which higher-level behavior can be
//! validated.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    // ---
    log_debug,
    same_listener,
    Address,
    Code,
    ListenerPtr,
    Message,
    Status,
    Transport,
};

struct Registration {
    owner: usize,
    source_filter: Address,
    sink_filter: Option<Address>,
    listener: ListenerPtr,
}

impl Registration {
    fn accepts(&self, msg: &Message) -> bool {
        // ---
        let source_ok = msg
            .source()
            .is_some_and(|source| self.source_filter.matches(source));

        let sink_ok = match (&self.sink_filter, msg.sink()) {
            (None, None) => true,
            (Some(filter), Some(sink)) => filter.matches(sink),
            _ => false,
        };

        source_ok && sink_ok
    }

    fn is(&self, source_filter: &Address, sink_filter: Option<&Address>, listener: &ListenerPtr) -> bool {
        &self.source_filter == source_filter
            && self.sink_filter.as_ref() == sink_filter
            && same_listener(&self.listener, listener)
    }
}

/// Shared message bus for in-memory transports.
///
/// All [`MemoryTransport`]s created on the same hub can reach each other's
/// listeners, as entities attached to one network would. Hubs are explicit
/// values; there is no process-global instance, so parallel tests stay
/// isolated.
#[derive(Default)]
pub struct MemoryHub {
    // ---
    registrations: RwLock<Vec<Registration>>,
    next_owner: AtomicUsize,
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn deliver(&self, msg: Message) {
        // ---
        let listeners: Vec<ListenerPtr> = {
            let regs = self.registrations.read().await;
            regs.iter()
                .filter(|reg| reg.accepts(&msg))
                .map(|reg| reg.listener.clone())
                .collect()
        };

        log_debug!(
            "deliver {} {:?} to {} listener(s)",
            msg.message_type(),
            msg.id(),
            listeners.len()
        );

        for listener in listeners {
            let msg = msg.clone();
            tokio::spawn(async move {
                listener.on_receive(msg).await;
            });
        }
    }

    /// Number of active listener registrations on the hub.
    pub async fn listener_count(&self) -> usize {
        self.registrations.read().await.len()
    }
}

/// In-memory transport bound to one entity address.
///
/// Routes messages through a shared [`MemoryHub`]. Several transports on one
/// hub model several entities; a single transport whose invoker and
/// dispatcher talk to each other models a self-looping entity.
pub struct MemoryTransport {
    // ---
    source: Address,
    hub: Arc<MemoryHub>,
    owner: usize,
    closed: AtomicBool,
}

impl MemoryTransport {
    /// Close the transport.
    ///
    /// Removes every listener registered through this transport and makes
    /// later `send` / `register_listener` calls fail with `UNAVAILABLE`.
    /// Registrations of other transports on the same hub are untouched.
    pub async fn close(&self) {
        // ---
        self.closed.store(true, Ordering::SeqCst);
        let mut regs = self.hub.registrations.write().await;
        regs.retain(|reg| reg.owner != self.owner);
        log_debug!("{}: transport closed", self.source);
    }

    fn ensure_open(&self) -> Result<(), Status> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Status::new(Code::Unavailable, "transport is closed"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    fn source(&self) -> &Address {
        &self.source
    }

    /// Deliver `msg` to every matching listener on the hub.
    async fn send(&self, msg: Message) -> Result<(), Status> {
        // ---
        self.ensure_open()?;
        self.hub.deliver(msg).await;
        Ok(())
    }

    async fn register_listener(
        &self,
        source_filter: &Address,
        sink_filter: Option<&Address>,
        listener: ListenerPtr,
    ) -> Result<(), Status> {
        // ---
        self.ensure_open()?;

        let mut regs = self.hub.registrations.write().await;
        if regs
            .iter()
            .any(|reg| reg.is(source_filter, sink_filter, &listener))
        {
            return Err(Status::new(
                Code::AlreadyExists,
                "listener already registered for these filters",
            ));
        }

        log_debug!(
            "{}: register listener source={source_filter} sink={sink_filter:?}",
            self.source
        );

        regs.push(Registration {
            owner: self.owner,
            source_filter: source_filter.clone(),
            sink_filter: sink_filter.cloned(),
            listener,
        });
        Ok(())
    }

    async fn unregister_listener(
        &self,
        source_filter: &Address,
        sink_filter: Option<&Address>,
        listener: &ListenerPtr,
    ) -> Result<(), Status> {
        // ---
        let mut regs = self.hub.registrations.write().await;
        let before = regs.len();
        regs.retain(|reg| !reg.is(source_filter, sink_filter, listener));

        if regs.len() == before {
            return Err(Status::new(Code::NotFound, "no such listener registration"));
        }

        log_debug!(
            "{}: unregister listener source={source_filter} sink={sink_filter:?}",
            self.source
        );
        Ok(())
    }
}

/// Create an in-memory transport for `source` on `hub`.
pub fn create_memory_transport(source: Address, hub: &Arc<MemoryHub>) -> Arc<MemoryTransport> {
    // ---
    let owner = hub.next_owner.fetch_add(1, Ordering::Relaxed);
    log_debug!("{source}: create memory transport");

    Arc::new(MemoryTransport {
        source,
        hub: hub.clone(),
        owner,
        closed: AtomicBool::new(false),
    })
}
