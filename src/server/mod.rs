// src/server/mod.rs
//! RPC server implementation.
//!
//! [`RpcDispatcher`] maps method addresses of its own entity to request
//! handlers. One shared listener, registered on the first handler
//! registration, receives every REQUEST addressed to the entity; each
//! request is answered with exactly one RESPONSE.

mod handler;

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::FutureExt;
use tokio::sync::OnceCell;

use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    log_warn,
    validator,
    Address,
    Code,
    HandlerError,
    ListenerPtr,
    Message,
    MessageBuilder,
    MessageListener,
    Result,
    RpcError,
    Status,
    TransportPtr,
    WILDCARD_RESOURCE_ID,
};

use handler::same_handler;
pub use handler::{handler_fn, json_handler, HandlerPtr, HandlerResult, RequestHandler};

/// Registry of RPC method handlers.
///
/// Key: exact method address, Value: the handler serving it.
type HandlerRegistry = Mutex<HashMap<Address, HandlerPtr>>;

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Server-side RPC dispatcher.
///
/// Wraps exactly one transport. Only methods of the transport's own entity
/// can be served.
/// Dropping the last clone unregisters the shared listener.
///
/// # Example
///
/// ```no_run
/// use uplink_rpc::{create_memory_transport, handler_fn, Address, MemoryHub, RpcDispatcher};
///
/// # async fn example() -> uplink_rpc::Result<()> {
/// let hub = MemoryHub::new();
/// let transport = create_memory_transport(Address::new("hvac", 0x20, 1, 0), &hub);
/// let dispatcher = RpcDispatcher::new(transport);
///
/// let echo = handler_fn(|request| async move { Ok(request.payload) });
/// dispatcher
///     .register_request_handler(Address::new("hvac", 0x20, 1, 0x1), echo)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    source: Address,
    handlers: HandlerRegistry,
    listener: OnceCell<ListenerPtr>,
    closed: AtomicBool,
}

struct RequestListener {
    inner: Weak<Inner>,
}

#[async_trait::async_trait]
impl MessageListener for RequestListener {
    async fn on_receive(&self, msg: Message) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch(msg).await;
        }
    }
}

impl RpcDispatcher {
    // ---
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        let source = transport.source().entity();
        Self {
            inner: Arc::new(Inner {
                transport,
                source,
                handlers: Mutex::new(HashMap::new()),
                listener: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Entity whose methods this dispatcher serves.
    pub fn source(&self) -> &Address {
        &self.inner.source
    }

    /// Serve `method` with `handler`.
    ///
    /// The first successful registration also registers the dispatcher's
    /// listener with the transport.
    ///
    /// # Errors
    ///
    /// - [`RpcError::InvalidArgument`] if `method` is not a concrete RPC
    ///   method address of the transport's own entity;
    /// - [`RpcError::AlreadyExists`] if a handler already serves `method`;
    /// - [`RpcError::Transport`] if the listener cannot be registered, in
    ///   which case the handler is not kept;
    /// - [`RpcError::Unavailable`] after [`close`](Self::close).
    pub async fn register_request_handler(
        &self,
        method: Address,
        handler: HandlerPtr,
    ) -> Result<()> {
        // ---
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(RpcError::Unavailable("dispatcher is closed".into()));
        }
        self.inner.check_method(&method)?;

        {
            let mut handlers = lock_ignore_poison(&self.inner.handlers);
            if handlers.contains_key(&method) {
                return Err(RpcError::AlreadyExists(format!(
                    "a handler is already registered for {method}"
                )));
            }
            handlers.insert(method.clone(), handler.clone());
        }

        if let Err(status) = self.inner.ensure_listener().await {
            let mut handlers = lock_ignore_poison(&self.inner.handlers);
            if handlers
                .get(&method)
                .is_some_and(|current| same_handler(current, &handler))
            {
                handlers.remove(&method);
            }
            return Err(RpcError::Transport(status));
        }

        log_info!("{}: serving {method}", self.inner.source);
        Ok(())
    }

    /// Stop serving `method`.
    ///
    /// `handler` must be the same `Arc` that was registered. The transport
    /// listener stays registered.
    ///
    /// # Errors
    ///
    /// - [`RpcError::InvalidArgument`] as for registration;
    /// - [`RpcError::NotFound`] unless exactly this handler serves `method`.
    pub async fn unregister_request_handler(
        &self,
        method: Address,
        handler: HandlerPtr,
    ) -> Result<()> {
        // ---
        self.inner.check_method(&method)?;

        let mut handlers = lock_ignore_poison(&self.inner.handlers);
        match handlers.get(&method) {
            Some(current) if same_handler(current, &handler) => {
                handlers.remove(&method);
                log_debug!("{}: stopped serving {method}", self.inner.source);
                Ok(())
            }
            _ => Err(RpcError::NotFound(format!(
                "handler is not registered for {method}"
            ))),
        }
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        lock_ignore_poison(&self.inner.handlers).len()
    }

    /// Unregister the dispatcher's listener from the transport.
    ///
    /// Registered handlers are kept but no longer receive requests, and
    /// later registrations fail with [`RpcError::Unavailable`].
    pub async fn close(&self) -> Result<()> {
        // ---
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(listener) = self.inner.listener.get() {
            self.inner
                .transport
                .unregister_listener(&Address::any(), Some(&self.inner.sink_filter()), listener)
                .await
                .map_err(RpcError::Transport)?;
        }
        Ok(())
    }
}

impl Inner {
    // ---
    fn check_method(&self, method: &Address) -> Result<()> {
        // ---
        if !method.is_rpc_method() {
            return Err(RpcError::InvalidArgument(format!(
                "{method} is not an RPC method address"
            )));
        }
        if !method.is_same_entity(&self.source) {
            return Err(RpcError::InvalidArgument(
                "method address does not match the transport's source address".into(),
            ));
        }
        Ok(())
    }

    /// All resources of this entity.
    fn sink_filter(&self) -> Address {
        self.source.with_resource(WILDCARD_RESOURCE_ID)
    }

    async fn ensure_listener(self: &Arc<Self>) -> std::result::Result<(), Status> {
        // ---
        self.listener
            .get_or_try_init(|| async {
                let listener: ListenerPtr = Arc::new(RequestListener {
                    inner: Arc::downgrade(self),
                });
                self.transport
                    .register_listener(&Address::any(), Some(&self.sink_filter()), listener.clone())
                    .await?;
                log_debug!("{}: request listener registered", self.source);
                Ok::<_, Status>(listener)
            })
            .await
            .map(|_| ())
    }

    /// Run a handler, turning a panic into an `INTERNAL` error.
    async fn run_handler(handler: &HandlerPtr, request: Message) -> HandlerResult {
        // ---
        AssertUnwindSafe(handler.handle_request(request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic_message(panic.as_ref());
                Err(HandlerError::Status(Status::new(
                    Code::Internal,
                    format!("handler panicked: {reason}"),
                )))
            })
    }

    async fn dispatch(&self, request: Message) {
        // ---
        if !request.attributes.is_request() {
            return;
        }

        if let Err(err) = validator::validate(&request.attributes) {
            log_warn!("dropping invalid request {:?}: {err}", request.id());
            return;
        }
        if validator::is_expired_now(&request.attributes) {
            log_debug!("dropping expired request {:?}", request.id());
            return;
        }

        let attributes = request.attributes.clone();
        let handler = attributes
            .sink
            .as_ref()
            .and_then(|method| lock_ignore_poison(&self.handlers).get(method).cloned());

        let response = match handler {
            None => {
                let method = attributes.sink.clone().unwrap_or_else(Address::any);
                MessageBuilder::response_for(&attributes)
                    .with_comm_status(Code::NotFound, format!("no handler registered for {method}"))
                    .build()
            }
            Some(handler) => match Self::run_handler(&handler, request).await {
                Ok(Some(payload)) => MessageBuilder::response_for(&attributes).build_with_payload(payload),
                Ok(None) => MessageBuilder::response_for(&attributes).build(),
                Err(err) => {
                    let status = err.to_status();
                    log_warn!("handler for {:?} failed: {status}", attributes.sink);
                    MessageBuilder::response_for(&attributes)
                        .with_comm_status(status.code, status.message)
                        .build()
                }
            },
        };

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                log_error!("cannot build response to {:?}: {err}", attributes.id);
                return;
            }
        };

        if let Err(status) = self.transport.send(response).await {
            log_warn!("response to {:?} was not sent: {status}", attributes.id);
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
        let sink_filter = self.sink_filter();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(status) = transport
                        .unregister_listener(&Address::any(), Some(&sink_filter), &listener)
                        .await
                    {
                        log_debug!("{sink_filter}: request listener not removed: {status}");
                    }
                });
            }
            Err(_) => log_warn!(
                "{}: dispatcher dropped outside a runtime, request listener left registered",
                self.source
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    // ---
    if let Some(msg) = panic.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}
