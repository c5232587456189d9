use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{MessageId, Payload, Result, RpcError};

use super::pending::CallOutcome;

/// Handle to the eventual outcome of one `invoke_method` call.
///
/// Resolves exactly once, to the response payload or to one of
/// `SendFailed`, `DeadlineExceeded` or `Remote`. Await it, block on it with
/// [`blocking_wait`](Self::blocking_wait), or hand it a callback with
/// [`on_complete`](Self::on_complete).
///
/// Dropping the handle does not cancel the call; the outcome is simply
/// discarded.
#[must_use = "the call outcome is only observable through this handle"]
pub struct ResponseFuture {
    // ---
    correlation_id: MessageId,
    rx: oneshot::Receiver<CallOutcome>,
}

impl ResponseFuture {
    pub(super) fn new(correlation_id: MessageId, rx: oneshot::Receiver<CallOutcome>) -> Self {
        Self { correlation_id, rx }
    }

    /// Id of the request this handle waits on.
    pub fn correlation_id(&self) -> &MessageId {
        &self.correlation_id
    }

    /// Block the current thread until the call completes.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// await the handle there instead.
    pub fn blocking_wait(self) -> Result<Payload> {
        flatten(self.rx.blocking_recv())
    }

    /// Run `callback` with the outcome once the call completes.
    ///
    /// The callback runs on a spawned tokio task.
    pub fn on_complete<F>(self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Payload>) + Send + 'static,
    {
        tokio::spawn(async move { callback(self.await) })
    }
}

fn flatten(received: std::result::Result<CallOutcome, oneshot::error::RecvError>) -> Result<Payload> {
    // ---
    match received {
        Ok(outcome) => outcome,
        Err(_) => Err(RpcError::Unavailable(
            "invoker dropped before the call completed".into(),
        )),
    }
}

impl Future for ResponseFuture {
    type Output = Result<Payload>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // ---
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(flatten)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{Code, Status};

    #[tokio::test]
    async fn test_await_outcome() {
        // ---
        let (tx, rx) = oneshot::channel();
        let id = MessageId::generate();
        let fut = ResponseFuture::new(id, rx);
        assert_eq!(fut.correlation_id(), &id);

        tx.send(Err(RpcError::Remote(Status::new(Code::NotFound, "x"))))
            .unwrap();
        let err = fut.await.unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_dropped_sender_is_unavailable() {
        // ---
        let (tx, rx) = oneshot::channel::<CallOutcome>();
        drop(tx);
        let err = ResponseFuture::new(MessageId::generate(), rx)
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_on_complete_callback() {
        // ---
        let (tx, rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let handle = ResponseFuture::new(MessageId::generate(), rx).on_complete(move |outcome| {
            let _ = done_tx.send(outcome.map(|p| p.data.len()));
        });
        tx.send(Ok(Payload::text("four"))).unwrap();

        handle.await.unwrap();
        assert_eq!(done_rx.await.unwrap().unwrap(), 4);
    }

    #[test]
    fn test_blocking_wait() {
        // ---
        let (tx, rx) = oneshot::channel();
        let fut = ResponseFuture::new(MessageId::generate(), rx);
        let sender = std::thread::spawn(move || {
            tx.send(Ok(Payload::text("hi"))).unwrap();
        });

        assert_eq!(fut.blocking_wait().unwrap(), Payload::text("hi"));
        sender.join().unwrap();
    }
}
