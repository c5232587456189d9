//! Request/response correlation over an asynchronous, message-oriented
//! transport.
//!
//! Messages carry typed attributes (`id`, `source`, `sink`, `ttl`,
//! `request_id`, ...). On top of a [`Transport`] that can only send messages
//! and deliver them to listeners, this crate provides:
//!
//! - [`RpcInvoker`]: sends REQUEST messages and resolves each call exactly
//!   once, with the matching RESPONSE, a deadline or a send failure;
//! - [`RpcDispatcher`]: routes inbound REQUEST messages to handlers and
//!   answers each with a RESPONSE;
//! - [`AttributesValidator`]: the per-message-type attribute rules both
//!   sides apply;
//! - [`Publisher`], [`Notifier`] and [`Subscriber`] for plain messaging.
//!
//! A process-local [`MemoryTransport`] is included.
//!
//! ```no_run
//! use uplink_rpc::*;
//!
//! # async fn example() -> Result<()> {
//! let hub = MemoryHub::new();
//! let transport = create_memory_transport(Address::new("hvac", 0x20, 1, 0), &hub);
//!
//! let method = Address::new("hvac", 0x20, 1, 0x1);
//! let dispatcher = RpcDispatcher::new(transport.clone());
//! dispatcher
//!     .register_request_handler(method.clone(), handler_fn(|req| async move { Ok(req.payload) }))
//!     .await?;
//!
//! let invoker = RpcInvoker::new(transport);
//! let reply = invoker
//!     .call(method, Some(Payload::text("X")), CallOptions::default())
//!     .await?;
//! assert_eq!(reply, Payload::text("X"));
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod macros;

mod client;
mod domain;
mod pubsub;
mod server;
mod transport;

mod error;
mod message_id;
mod rpc_config;
mod validator;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use client::{ResponseFuture, RpcInvoker, RpcInvokerBuilder, UnexpectedMessageFn};
pub use server::{
    //
    handler_fn,
    json_handler,
    HandlerPtr,
    HandlerResult,
    RequestHandler,
    RpcDispatcher,
};
pub use pubsub::{MessageOptions, Notifier, Publisher, Subscriber};

pub use rpc_config::{CallOptions, DEFAULT_CALL_TIMEOUT};

pub use error::{Code, HandlerError, Result, RpcError, Status};
pub use message_id::MessageId;
pub use validator::{
    //
    is_expired,
    is_expired_now,
    validate,
    AttributesValidator,
    ValidationError,
};

pub use transport::{create_memory_transport, MemoryHub, MemoryTransport};

// --- public re-exports
pub use domain::{
    //
    same_listener,
    Address,
    ListenerPtr,
    Message,
    MessageAttributes,
    MessageBuilder,
    MessageListener,
    MessageType,
    Payload,
    PayloadFormat,
    Priority,
    Transport,
    TransportPtr,
    DEFAULT_PRIORITY,
    RESOURCE_ID_MAX_METHOD,
    RESOURCE_ID_MIN_METHOD,
    RESOURCE_ID_MIN_TOPIC,
    RESOURCE_ID_RESPONSE,
    WILDCARD_AUTHORITY,
    WILDCARD_ENTITY_ID,
    WILDCARD_ENTITY_VERSION,
    WILDCARD_RESOURCE_ID,
};
