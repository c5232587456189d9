//! Publish, notify and subscribe.
//!
//! Thin wrappers that build PUBLISH and NOTIFICATION messages with the
//! validating [`MessageBuilder`] and hand them to the transport, or register
//! plain listeners. There is no correlation here.

use crate::{
    // ---
    log_debug,
    Address,
    ListenerPtr,
    Message,
    MessageBuilder,
    Payload,
    Priority,
    Result,
    RpcError,
    TransportPtr,
};

/// Optional attributes for published and notified messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageOptions {
    /// Overrides the builder default for the message type.
    pub priority: Option<Priority>,

    /// Time to live in milliseconds.
    pub ttl: Option<u32>,

    pub token: Option<String>,
}

impl MessageOptions {
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn apply(self, mut builder: MessageBuilder) -> MessageBuilder {
        // ---
        if let Some(priority) = self.priority {
            builder = builder.with_priority(priority);
        }
        if let Some(ttl) = self.ttl {
            builder = builder.with_ttl(ttl);
        }
        if let Some(token) = self.token {
            builder = builder.with_token(token);
        }
        builder
    }
}

fn build(builder: MessageBuilder, payload: Option<Payload>) -> Result<Message> {
    match payload {
        Some(payload) => builder.build_with_payload(payload),
        None => builder.build(),
    }
}

fn topic_of(source: &Address, topic_resource_id: u16) -> Result<Address> {
    // ---
    let topic = source.with_resource(topic_resource_id);
    if !topic.is_topic() {
        return Err(RpcError::InvalidArgument(format!(
            "{topic} is not a topic address"
        )));
    }
    Ok(topic)
}

/// Sends PUBLISH messages on topics of the transport's entity.
pub struct Publisher {
    transport: TransportPtr,
    source: Address,
}

impl Publisher {
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        let source = transport.source().entity();
        Self { transport, source }
    }

    /// Publish `payload` on the entity's topic `topic_resource_id`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::InvalidArgument`] for a non-topic resource id or
    ///   invalid options;
    /// - [`RpcError::SendFailed`] if the transport refuses the message.
    pub async fn publish(
        &self,
        topic_resource_id: u16,
        payload: Option<Payload>,
        options: MessageOptions,
    ) -> Result<()> {
        // ---
        let topic = topic_of(&self.source, topic_resource_id)?;
        let msg = build(options.apply(MessageBuilder::publish(topic)), payload)?;

        log_debug!("publish {:?} from {}", msg.id(), self.source);
        self.transport.send(msg).await.map_err(RpcError::SendFailed)
    }
}

/// Sends NOTIFICATION messages to single destinations and listens for the
/// ones addressed to this entity.
pub struct Notifier {
    transport: TransportPtr,
    source: Address,
}

impl Notifier {
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        let source = transport.source().entity();
        Self { transport, source }
    }

    /// Notify `destination` on the entity's topic `topic_resource_id`.
    ///
    /// # Errors
    ///
    /// As for [`Publisher::publish`].
    pub async fn notify(
        &self,
        topic_resource_id: u16,
        destination: Address,
        payload: Option<Payload>,
        options: MessageOptions,
    ) -> Result<()> {
        // ---
        let topic = topic_of(&self.source, topic_resource_id)?;
        let builder = MessageBuilder::notification(topic, destination);
        let msg = build(options.apply(builder), payload)?;

        self.transport.send(msg).await.map_err(RpcError::SendFailed)
    }

    /// Receive notifications from `topic` addressed to this entity.
    pub async fn start_listening(&self, topic: &Address, listener: ListenerPtr) -> Result<()> {
        self.transport
            .register_listener(topic, Some(&self.source), listener)
            .await
            .map_err(RpcError::Transport)
    }

    pub async fn stop_listening(&self, topic: &Address, listener: &ListenerPtr) -> Result<()> {
        self.transport
            .unregister_listener(topic, Some(&self.source), listener)
            .await
            .map_err(RpcError::Transport)
    }
}

/// Registers listeners for published topics.
pub struct Subscriber {
    transport: TransportPtr,
}

impl Subscriber {
    pub fn new(transport: TransportPtr) -> Self {
        Self { transport }
    }

    /// Receive PUBLISH messages whose source matches `topic`; wildcards
    /// are allowed.
    pub async fn subscribe(&self, topic: &Address, listener: ListenerPtr) -> Result<()> {
        self.transport
            .register_listener(topic, None, listener)
            .await
            .map_err(RpcError::Transport)
    }

    pub async fn unsubscribe(&self, topic: &Address, listener: &ListenerPtr) -> Result<()> {
        self.transport
            .unregister_listener(topic, None, listener)
            .await
            .map_err(RpcError::Transport)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{create_memory_transport, Code, MemoryHub, MessageListener, MessageType};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct ChannelListener(mpsc::UnboundedSender<Message>);

    #[async_trait::async_trait]
    impl MessageListener for ChannelListener {
        async fn on_receive(&self, msg: Message) {
            let _ = self.0.send(msg);
        }
    }

    fn channel_listener() -> (ListenerPtr, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelListener(tx)), rx)
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        // ---
        let hub = MemoryHub::new();
        let publisher = Publisher::new(create_memory_transport(Address::new("gps", 7, 1, 0), &hub));
        let subscriber = Subscriber::new(create_memory_transport(Address::new("map", 8, 1, 0), &hub));

        let (listener, mut rx) = channel_listener();
        let topic = Address::new("gps", 7, 1, 0x8001);
        subscriber.subscribe(&topic, listener.clone()).await.unwrap();

        publisher
            .publish(0x8001, Some(Payload::text("52.1,4.3")), MessageOptions::default())
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.message_type(), MessageType::Publish);
        assert_eq!(msg.source(), Some(&topic));
        assert!(msg.sink().is_none());
        assert_eq!(msg.attributes.priority, Priority::Standard);
        assert_eq!(msg.payload, Some(Payload::text("52.1,4.3")));

        subscriber.unsubscribe(&topic, &listener).await.unwrap();
        let err = subscriber.unsubscribe(&topic, &listener).await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_publish_rejects_method_resource() {
        // ---
        let hub = MemoryHub::new();
        let publisher = Publisher::new(create_memory_transport(Address::new("gps", 7, 1, 0), &hub));

        let err = publisher
            .publish(0x1, None, MessageOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_notification_reaches_destination_only() {
        // ---
        let hub = MemoryHub::new();
        let door = Address::new("door", 3, 1, 0);
        let body = Address::new("body", 4, 1, 0);
        let notifier = Notifier::new(create_memory_transport(door.clone(), &hub));
        let receiver = Notifier::new(create_memory_transport(body.clone(), &hub));

        let topic = door.with_resource(0x8002);
        let (listener, mut rx) = channel_listener();
        receiver.start_listening(&topic, listener.clone()).await.unwrap();

        notifier
            .notify(
                0x8002,
                body.clone(),
                Some(Payload::text("open")),
                MessageOptions::default().with_priority(Priority::Realtime),
            )
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.message_type(), MessageType::Notification);
        assert_eq!(msg.sink(), Some(&body));
        assert_eq!(msg.attributes.priority, Priority::Realtime);

        receiver.stop_listening(&topic, &listener).await.unwrap();
        assert_eq!(hub.listener_count().await, 0);
    }
}
