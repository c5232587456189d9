// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the seam between the RPC/pub-sub layer and whatever
//! actually moves messages between entities. It intentionally avoids any
//! reference to concrete protocols, brokers, or client libraries.
//!
//! The transport is responsible only for delivering messages to registered
//! listeners. RPC correlation, timeouts and validation are handled by the
//! layers above.
//!
//! Concrete implementations live under `src/transport/`.

use std::sync::Arc;

use crate::{Address, Message, Status};

/// Callback invoked by a transport for every message matching a listener's
/// filters.
///
/// Transports may call `on_receive` concurrently and from tasks not owned by
/// the caller, so implementations must be `Send + Sync`.
#[async_trait::async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_receive(&self, msg: Message);
}

/// Shared listener pointer.
///
/// Listener identity (for unregistration) is the identity of the allocation
/// this points to, see [`same_listener`].
pub type ListenerPtr = Arc<dyn MessageListener>;

/// True when both pointers refer to the same listener instance.
pub fn same_listener(a: &ListenerPtr, b: &ListenerPtr) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Transport abstraction.
///
/// A `Transport` delivers messages between entities with best-effort
/// semantics. Implementations must ensure that:
///
/// - once `register_listener()` returns successfully, messages sent *after*
///   that point whose source and sink match the filters are delivered to the
///   listener;
/// - `send()` does not wait for listeners to finish processing.
///
/// Filter matching follows [`Address::matches`]: a `sink_filter` of `None`
/// matches only messages without a sink (plain PUBLISH traffic).
///
/// # Notes
///
/// This trait uses `async_trait`; treat its methods as normal `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Address of the entity this transport instance belongs to.
    fn source(&self) -> &Address;

    /// Send a message.
    async fn send(&self, msg: Message) -> Result<(), Status>;

    /// Register `listener` for messages matching both filters.
    async fn register_listener(
        &self,
        source_filter: &Address,
        sink_filter: Option<&Address>,
        listener: ListenerPtr,
    ) -> Result<(), Status>;

    /// Remove a registration made with identical filters and the same
    /// listener instance.
    async fn unregister_listener(
        &self,
        source_filter: &Address,
        sink_filter: Option<&Address>,
        listener: &ListenerPtr,
    ) -> Result<(), Status>;
}

/// Shared transport pointer.
///
/// This is an `Arc<dyn Transport>`, which means:
/// - `.clone()` is cheap (only increments a reference count)
/// - Multiple clones share the same underlying connection
pub type TransportPtr = Arc<dyn Transport>;
