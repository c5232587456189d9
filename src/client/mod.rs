// src/client/mod.rs
//! RPC client implementation.
//!
//! This module contains [`RpcInvoker`], which sends REQUEST messages to
//! method addresses and matches the RESPONSE messages that come back.
//!
//! # Architecture
//!
//! Every call gets a fresh time-ordered id. A pending-call entry keyed by
//! that id is inserted *before* the request is sent, so even a response
//! produced synchronously by a local handler finds its caller.
//!
//! A single shared listener, registered with the transport on first use
//! (any source, sink = this entity), receives all inbound responses and
//! completes the matching pending call.
//!
//! # Completion
//!
//! Each call completes exactly once, through whichever happens first:
//! - the matching response arrives,
//! - the per-call deadline timer fires,
//! - the transport refuses the request.
//!
//! All three paths claim the pending entry with an atomic remove; whoever
//! loses the race finds nothing and does nothing.
//!
//! # Concurrency
//!
//! The pending map is protected by a mutex held only for single
//! insert/remove operations, never across an `.await`.

mod pending;
mod response;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::{
    // ---
    log_debug,
    log_warn,
    validator,
    Address,
    CallOptions,
    ListenerPtr,
    Message,
    MessageBuilder,
    MessageId,
    MessageListener,
    Payload,
    Result,
    RpcError,
    Status,
    TransportPtr,
};

use pending::{CallOutcome, PendingCalls};
pub use response::ResponseFuture;

/// Callback receiving inbound messages that match no pending call.
pub type UnexpectedMessageFn = Arc<dyn Fn(Message) + Send + Sync>;

/// Client-side RPC correlation engine.
///
/// Wraps exactly one transport and owns one pending-call registry.
/// Cheap to clone (internally `Arc`-backed).
/// Dropping the last clone unregisters the shared listener.
///
/// # Example
///
/// ```no_run
/// use uplink_rpc::{create_memory_transport, Address, CallOptions, MemoryHub, Payload, RpcInvoker};
///
/// # async fn example() -> uplink_rpc::Result<()> {
/// let hub = MemoryHub::new();
/// let transport = create_memory_transport(Address::new("vcu", 0x10, 1, 0), &hub);
/// let invoker = RpcInvoker::new(transport);
///
/// let method = Address::new("hvac", 0x20, 1, 0x1);
/// let reply = invoker
///     .invoke_method(method, Some(Payload::text("on")), CallOptions::default())?
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcInvoker {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    reply_to: Address,
    pending: PendingCalls,
    listener: OnceCell<ListenerPtr>,
    unexpected: Option<UnexpectedMessageFn>,
    closed: AtomicBool,
}

/// The shared inbound listener.
///
/// Holds only a weak reference so the transport's listener table does not
/// keep the invoker alive.
struct ResponseListener {
    inner: Weak<Inner>,
}

#[async_trait::async_trait]
impl MessageListener for ResponseListener {
    async fn on_receive(&self, msg: Message) {
        // ---
        match self.inner.upgrade() {
            Some(inner) => inner.handle_message(msg),
            None => log_debug!("invoker dropped, ignoring {:?}", msg.id()),
        }
    }
}

/// Builder for [`RpcInvoker`].
pub struct RpcInvokerBuilder {
    // ---
    transport: TransportPtr,
    unexpected: Option<UnexpectedMessageFn>,
}

impl RpcInvokerBuilder {
    pub fn new(transport: TransportPtr) -> Self {
        Self {
            transport,
            unexpected: None,
        }
    }

    /// Receive inbound messages that are not a response to a pending call
    /// (wrong type, unknown or already completed `request_id`).
    ///
    /// Without a callback such messages are dropped.
    pub fn on_unexpected_message<F>(mut self, callback: F) -> Self
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.unexpected = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> RpcInvoker {
        // ---
        let reply_to = self.transport.source().entity();

        RpcInvoker {
            inner: Arc::new(Inner {
                transport: self.transport,
                reply_to,
                pending: PendingCalls::new(),
                listener: OnceCell::new(),
                unexpected: self.unexpected,
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl RpcInvoker {
    // ---
    /// Create an invoker without an unexpected-message callback.
    pub fn new(transport: TransportPtr) -> Self {
        RpcInvokerBuilder::new(transport).build()
    }

    pub fn builder(transport: TransportPtr) -> RpcInvokerBuilder {
        RpcInvokerBuilder::new(transport)
    }

    /// Address responses are sent to.
    pub fn reply_to(&self) -> &Address {
        &self.inner.reply_to
    }

    /// Number of calls still waiting for completion.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Invoke the method at `method` and return a handle to the outcome.
    ///
    /// Does not block: the request is sent from a spawned task. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returned immediately, nothing is sent:
    /// - [`RpcError::InvalidArgument`] if the request attributes do not
    ///   validate (e.g. a timeout below one millisecond);
    /// - [`RpcError::Unavailable`] after [`close`](Self::close).
    ///
    /// The handle itself resolves to the response payload, or to
    /// [`RpcError::SendFailed`], [`RpcError::DeadlineExceeded`] or
    /// [`RpcError::Remote`].
    pub fn invoke_method(
        &self,
        method: Address,
        payload: Option<Payload>,
        options: CallOptions,
    ) -> Result<ResponseFuture> {
        // ---
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Unavailable("invoker is closed".into()));
        }

        let id = MessageId::generate();

        let mut builder =
            MessageBuilder::request(self.inner.reply_to.clone(), method, options.ttl_millis())
                .with_priority(options.priority)
                .with_id(id);
        if let Some(token) = options.token {
            builder = builder.with_token(token);
        }
        let request = match payload {
            Some(payload) => builder.build_with_payload(payload)?,
            None => builder.build()?,
        };

        let rx = self.inner.pending.register(id)?;

        let timeout = options.timeout;
        let timer = tokio::spawn({
            let inner = self.inner.clone();
            async move {
                tokio::time::sleep(timeout).await;
                inner.expire(&id, timeout);
            }
        });
        self.inner.pending.attach_timer(&id, timer.abort_handle());

        tokio::spawn({
            let inner = self.inner.clone();
            async move { inner.send_request(id, request).await }
        });

        Ok(ResponseFuture::new(id, rx))
    }

    /// Invoke a method and wait for its outcome.
    ///
    /// # Errors
    ///
    /// See [`invoke_method`](Self::invoke_method).
    pub async fn call(
        &self,
        method: Address,
        payload: Option<Payload>,
        options: CallOptions,
    ) -> Result<Payload> {
        self.invoke_method(method, payload, options)?.await
    }

    /// Invoke a method with a JSON-encoded request and decode the JSON
    /// response.
    ///
    /// # Errors
    ///
    /// Everything [`call`](Self::call) returns, plus
    /// [`RpcError::Serialization`] if either side does not (de)serialize.
    pub async fn call_json<TReq, TResp>(
        &self,
        method: Address,
        req: &TReq,
        options: CallOptions,
    ) -> Result<TResp>
    where
        TReq: Serialize,
        TResp: DeserializeOwned,
    {
        // ---
        let payload = Payload::from_json(req)?;
        let response = self.call(method, Some(payload), options).await?;
        let resp: TResp = serde_json::from_slice(&response.data)?;
        Ok(resp)
    }

    /// Unregister the shared listener.
    ///
    /// Calls already in flight are not failed; they resolve by deadline.
    /// Later `invoke_method` calls fail with [`RpcError::Unavailable`].
    pub async fn close(&self) -> Result<()> {
        // ---
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(listener) = self.inner.listener.get() {
            self.inner
                .transport
                .unregister_listener(&Address::any(), Some(&self.inner.reply_to), listener)
                .await
                .map_err(RpcError::Transport)?;
            log_debug!("{}: response listener unregistered", self.inner.reply_to);
        }
        Ok(())
    }
}

impl Inner {
    // ---
    /// Register the shared response listener once.
    ///
    /// Concurrent first calls wait on the same registration; a failed
    /// registration is retried by the next call.
    async fn ensure_listener(self: &Arc<Self>) -> std::result::Result<(), Status> {
        // ---
        self.listener
            .get_or_try_init(|| async {
                let listener: ListenerPtr = Arc::new(ResponseListener {
                    inner: Arc::downgrade(self),
                });
                self.transport
                    .register_listener(&Address::any(), Some(&self.reply_to), listener.clone())
                    .await?;
                log_debug!("{}: response listener registered", self.reply_to);
                Ok::<_, Status>(listener)
            })
            .await
            .map(|_| ())
    }

    async fn send_request(self: Arc<Self>, id: MessageId, request: Message) {
        // ---
        let sent = match self.ensure_listener().await {
            Ok(()) => self.transport.send(request).await,
            Err(status) => Err(status),
        };

        if let Err(status) = sent {
            log_warn!("request {id} was not sent: {status}");
            self.complete(&id, Err(RpcError::SendFailed(status)));
        }
    }

    fn expire(&self, id: &MessageId, timeout: Duration) {
        // ---
        if let Some(call) = self.pending.claim(id) {
            log_debug!("request {id} timed out after {timeout:?}");
            call.complete(Err(RpcError::DeadlineExceeded(timeout)));
        }
    }

    fn complete(&self, id: &MessageId, outcome: CallOutcome) {
        if let Some(call) = self.pending.claim(id) {
            call.complete(outcome);
        }
    }

    fn handle_message(&self, msg: Message) {
        // ---
        let request_id = match msg.attributes.request_id {
            Some(id) if msg.attributes.is_response() => id,
            _ => return self.unexpected(msg),
        };

        if let Err(err) = validator::validate(&msg.attributes) {
            log_warn!("discarding malformed response to {request_id}: {err}");
            return self.unexpected(msg);
        }

        let Some(call) = self.pending.claim(&request_id) else {
            return self.unexpected(msg);
        };

        let outcome = match msg.attributes.comm_status {
            Some(code) if msg.attributes.has_failure_status() => {
                let message = msg.attributes.comm_message.unwrap_or_default();
                Err(RpcError::Remote(Status::new(code, message)))
            }
            _ => Ok(msg.payload.unwrap_or_default()),
        };
        call.complete(outcome);
    }

    fn unexpected(&self, msg: Message) {
        // ---
        match &self.unexpected {
            Some(callback) => callback(msg),
            None => log_debug!(
                "dropping unexpected {} message {:?}",
                msg.message_type(),
                msg.id()
            ),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // ---
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let Some(listener) = self.listener.take() else {
            return;
        };

        let transport = self.transport.clone();
        let reply_to = self.reply_to.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(status) = transport
                        .unregister_listener(&Address::any(), Some(&reply_to), &listener)
                        .await
                    {
                        log_debug!("{reply_to}: response listener not removed: {status}");
                    }
                });
            }
            Err(_) => log_warn!(
                "{}: invoker dropped outside a runtime, response listener left registered",
                self.reply_to
            ),
        }
    }
}
