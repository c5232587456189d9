// tests/transport_memory.rs

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use uplink_rpc::{
    // ---
    Address,
    Code,
    ListenerPtr,
    Message,
    MessageBuilder,
    MessageListener,
    MemoryHub,
    Payload,
    Transport,
};

struct ChannelListener(mpsc::UnboundedSender<Message>);

#[async_trait::async_trait]
impl MessageListener for ChannelListener {
    async fn on_receive(&self, msg: Message) {
        let _ = self.0.send(msg);
    }
}

#[tokio::test]
async fn memory_register_then_send_delivers() {
    // ---
    // Arrange
    // ---
    let hub = MemoryHub::new();
    let sender = uplink_rpc::create_memory_transport(Address::new("tx", 1, 1, 0), &hub);
    let receiver = uplink_rpc::create_memory_transport(Address::new("rx", 2, 1, 0), &hub);

    let (tx, mut inbox) = mpsc::unbounded_channel();
    let listener: ListenerPtr = Arc::new(ChannelListener(tx));
    receiver
        .register_listener(&Address::any(), Some(receiver.source()), listener)
        .await
        .expect("register failed");

    let payload = Payload::raw(Bytes::from_static(b"hello"));
    let msg = MessageBuilder::request(sender.source().clone(), Address::new("rx", 2, 1, 0x1), 1000)
        .build_with_payload(payload.clone())
        .unwrap();
    let notification = MessageBuilder::notification(
        Address::new("tx", 1, 1, 0x8000),
        receiver.source().clone(),
    )
    .build_with_payload(payload.clone())
    .unwrap();

    // ---
    // Act
    // ---
    sender.send(msg).await.expect("send failed");
    sender.send(notification.clone()).await.expect("send failed");

    // ---
    // Assert
    // ---
    let received = timeout(Duration::from_millis(100), inbox.recv())
        .await
        .expect("timed out waiting for message")
        .expect("listener channel closed unexpectedly");

    // the request targets a method resource, not the entity itself
    assert_eq!(received, notification);
    assert_eq!(received.payload, Some(payload));
}

#[tokio::test]
async fn memory_closed_transport_rejects_send() {
    // ---
    let hub = MemoryHub::new();
    let transport = uplink_rpc::create_memory_transport(Address::new("tx", 1, 1, 0), &hub);
    transport.close().await;

    let msg = MessageBuilder::publish(Address::new("tx", 1, 1, 0x8000))
        .build()
        .unwrap();
    let status = transport.send(msg).await.unwrap_err();
    assert_eq!(status.code, Code::Unavailable);
}
