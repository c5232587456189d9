use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Code, HandlerError, Message, Payload, Status};

/// Outcome of a request handler: an optional response payload.
pub type HandlerResult = Result<Option<Payload>, HandlerError>;

/// Server-side handler for one RPC method.
///
/// Returning `Err(HandlerError::Status(..))` sends that code and message back
/// to the caller; any other error is reported as `INTERNAL`.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, request: Message) -> HandlerResult;
}

/// Shared handler reference.
///
/// Unregistration compares handlers by pointer identity, so keep the `Arc`
/// returned at registration time.
pub type HandlerPtr = Arc<dyn RequestHandler>;

/// Compare two handlers by identity.
pub(super) fn same_handler(a: &HandlerPtr, b: &HandlerPtr) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

// Closure over the full request message
struct FnHandler<F, Fut> {
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

#[async_trait::async_trait]
impl<F, Fut> RequestHandler for FnHandler<F, Fut>
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle_request(&self, request: Message) -> HandlerResult {
        (self.func)(request).await
    }
}

/// Wrap an async closure taking the request [`Message`] as a handler.
///
/// ```
/// use uplink_rpc::handler_fn;
///
/// let echo = handler_fn(|request| async move { Ok(request.payload) });
/// # let _ = echo;
/// ```
pub fn handler_fn<F, Fut>(func: F) -> HandlerPtr
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler {
        func,
        _phantom: PhantomData,
    })
}

// Typed closure: JSON request payload in, JSON response payload out
struct JsonHandler<F, Fut, TReq, TResp> {
    func: F,
    _phantom: PhantomData<fn(TReq, TResp, Fut)>,
}

#[async_trait::async_trait]
impl<F, Fut, TReq, TResp> RequestHandler for JsonHandler<F, Fut, TReq, TResp>
where
    F: Fn(TReq) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TResp, HandlerError>> + Send + 'static,
    TReq: DeserializeOwned + Send + 'static,
    TResp: Serialize + Send + 'static,
{
    async fn handle_request(&self, request: Message) -> HandlerResult {
        // ---
        let payload = request.payload_or_default();
        let req: TReq = serde_json::from_slice(&payload.data).map_err(|e| {
            Status::new(Code::InvalidArgument, format!("malformed request payload: {e}"))
        })?;

        let resp = (self.func)(req).await?;
        Ok(Some(Payload::from_json(&resp)?))
    }
}

/// Wrap a typed async closure as a handler.
///
/// The request payload is decoded as JSON into `TReq`; a payload that does
/// not decode is answered with `INVALID_ARGUMENT` without calling `func`.
/// The returned value is encoded as a JSON payload.
pub fn json_handler<F, Fut, TReq, TResp>(func: F) -> HandlerPtr
where
    F: Fn(TReq) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TResp, HandlerError>> + Send + 'static,
    TReq: DeserializeOwned + Send + 'static,
    TResp: Serialize + Send + 'static,
{
    Arc::new(JsonHandler {
        func,
        _phantom: PhantomData,
    })
}
