// src/domain/builder.rs

//! Validating message builder.
//!
//! Each constructor fixes the message type and the attributes that type
//! requires; optional attributes are added with `with_*` setters. `build()`
//! assigns a fresh id (unless one was set) and runs the
//! [`AttributesValidator`](crate::AttributesValidator) for the type, so a
//! built message is always valid.

use crate::{
    // ---
    validator,
    Address,
    Code,
    Message,
    MessageAttributes,
    MessageId,
    MessageType,
    Payload,
    Priority,
    Result,
};

/// Default priority for RPC and notification traffic.
pub const DEFAULT_PRIORITY: Priority = Priority::Interactive;

/// Fluent builder for [`Message`]s.
///
/// # Example
///
/// ```
/// use uplink_rpc::{Address, MessageBuilder, Payload};
///
/// let source = Address::new("vcu", 0x10, 1, 0);
/// let method = Address::new("hvac", 0x20, 1, 0x1);
///
/// let request = MessageBuilder::request(source, method, 5_000)
///     .with_token("secret")
///     .build_with_payload(Payload::text("on"))
///     .unwrap();
/// assert_eq!(request.attributes.ttl, Some(5_000));
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    attributes: MessageAttributes,
}

impl MessageBuilder {
    fn new(message_type: MessageType, source: Option<Address>, priority: Priority) -> Self {
        // ---
        Self {
            attributes: MessageAttributes {
                message_type,
                source,
                priority,
                ..Default::default()
            },
        }
    }

    /// PUBLISH from a topic address; no sink.
    pub fn publish(topic: Address) -> Self {
        Self::new(MessageType::Publish, Some(topic), Priority::Standard)
    }

    /// NOTIFICATION from a topic address to a single destination.
    pub fn notification(topic: Address, destination: Address) -> Self {
        Self::new(MessageType::Notification, Some(topic), DEFAULT_PRIORITY).with_sink(destination)
    }

    /// REQUEST from `reply_to` to a method address, with a TTL in ms.
    pub fn request(reply_to: Address, method: Address, ttl: u32) -> Self {
        // ---
        let mut builder =
            Self::new(MessageType::Request, Some(reply_to), DEFAULT_PRIORITY).with_sink(method);
        builder.attributes.ttl = Some(ttl);
        builder
    }

    /// RESPONSE answering `request`.
    ///
    /// The response is addressed to the request's source, comes from the
    /// method that was invoked, and inherits its id (as `request_id`),
    /// priority and TTL.
    pub fn response_for(request: &MessageAttributes) -> Self {
        // ---
        let mut builder =
            Self::new(MessageType::Response, request.sink.clone(), request.priority);
        builder.attributes.sink = request.source.clone();
        builder.attributes.request_id = request.id;
        builder.attributes.ttl = request.ttl;
        builder
    }

    /// RESPONSE from a method to a reply-to address for a given request id.
    pub fn response(reply_to: Address, method: Address, request_id: MessageId) -> Self {
        // ---
        let mut builder = Self::new(MessageType::Response, Some(method), DEFAULT_PRIORITY);
        builder.attributes.sink = Some(reply_to);
        builder.attributes.request_id = Some(request_id);
        builder
    }

    pub fn with_sink(mut self, sink: Address) -> Self {
        self.attributes.sink = Some(sink);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.attributes.priority = priority;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.attributes.ttl = Some(ttl);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.attributes.token = Some(token.into());
        self
    }

    /// Use a specific id instead of generating one.
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.attributes.id = Some(id);
        self
    }

    /// Attach an in-band status.
    pub fn with_comm_status(mut self, code: Code, message: impl Into<String>) -> Self {
        // ---
        let message = message.into();
        self.attributes.comm_status = Some(code);
        self.attributes.comm_message = (!message.is_empty()).then_some(message);
        self
    }

    /// Build a message without payload.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidArgument`](crate::RpcError::InvalidArgument)
    /// listing every failed attribute check.
    pub fn build(self) -> Result<Message> {
        self.finish(None)
    }

    /// Build a message carrying `payload`.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with_payload(self, payload: Payload) -> Result<Message> {
        self.finish(Some(payload))
    }

    fn finish(mut self, payload: Option<Payload>) -> Result<Message> {
        // ---
        if self.attributes.id.is_none() {
            self.attributes.id = Some(MessageId::generate());
        }
        validator::validate(&self.attributes)?;

        Ok(Message {
            attributes: self.attributes,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::RpcError;

    fn client() -> Address {
        Address::new("client", 0x100, 1, 0)
    }

    fn method() -> Address {
        Address::new("server", 0x200, 1, 0x7)
    }

    #[test]
    fn test_request_defaults() {
        // ---
        let msg = MessageBuilder::request(client(), method(), 1_000)
            .build()
            .unwrap();
        let attrs = &msg.attributes;

        assert_eq!(attrs.message_type, MessageType::Request);
        assert_eq!(attrs.priority, Priority::Interactive);
        assert_eq!(attrs.sink.as_ref(), Some(&method()));
        assert!(attrs.id.unwrap().is_valid());
        assert!(msg.payload.is_none());
    }

    #[test]
    fn test_request_with_zero_ttl_is_rejected() {
        // ---
        let err = MessageBuilder::request(client(), method(), 0)
            .build()
            .unwrap_err();
        assert!(matches!(err, RpcError::InvalidArgument(ref m) if m.contains("TTL")));
    }

    #[test]
    fn test_response_for_request() {
        // ---
        let request = MessageBuilder::request(client(), method(), 2_000)
            .with_priority(Priority::Realtime)
            .build()
            .unwrap();
        let response = MessageBuilder::response_for(&request.attributes)
            .with_comm_status(Code::FailedPrecondition, "boom")
            .build()
            .unwrap();
        let attrs = &response.attributes;

        assert_eq!(attrs.request_id, request.attributes.id);
        assert_eq!(attrs.sink.as_ref(), Some(&client()));
        assert_eq!(attrs.source.as_ref(), Some(&method()));
        assert_eq!(attrs.priority, Priority::Realtime);
        assert_eq!(attrs.comm_status, Some(Code::FailedPrecondition));
        assert_eq!(attrs.comm_message.as_deref(), Some("boom"));
        assert_ne!(attrs.id, request.attributes.id);
    }

    #[test]
    fn test_publish_has_no_sink() {
        // ---
        let topic = Address::new("server", 0x200, 1, 0x8001);
        let msg = MessageBuilder::publish(topic.clone())
            .build_with_payload(Payload::text("hello"))
            .unwrap();
        assert!(msg.attributes.sink.is_none());

        let err = MessageBuilder::publish(topic).with_sink(client()).build();
        assert!(err.is_err());
    }

    #[test]
    fn test_notification() {
        // ---
        let topic = Address::new("server", 0x200, 1, 0x8002);
        let msg = MessageBuilder::notification(topic, client())
            .build()
            .unwrap();
        assert_eq!(msg.attributes.message_type, MessageType::Notification);
        assert_eq!(msg.attributes.sink, Some(client()));
    }
}
