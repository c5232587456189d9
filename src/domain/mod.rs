//! Domain layer public interface.
//!
//! This module defines the message model, addressing and the transport seam.
//! None of it depends on a concrete transport.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod address;
mod builder;
mod message;
mod transport;

pub use address::{
    //
    Address,
    RESOURCE_ID_MAX_METHOD,
    RESOURCE_ID_MIN_METHOD,
    RESOURCE_ID_MIN_TOPIC,
    RESOURCE_ID_RESPONSE,
    WILDCARD_AUTHORITY,
    WILDCARD_ENTITY_ID,
    WILDCARD_ENTITY_VERSION,
    WILDCARD_RESOURCE_ID,
};

pub use builder::{MessageBuilder, DEFAULT_PRIORITY};

pub use message::{
    //
    Message,
    MessageAttributes,
    MessageType,
    Payload,
    PayloadFormat,
    Priority,
};

pub use transport::{
    //
    same_listener,
    ListenerPtr,
    MessageListener,
    Transport,
    TransportPtr,
};
