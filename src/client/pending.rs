use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::{MessageId, Payload, Result, RpcError};

/// Outcome delivered to a waiting caller.
pub(super) type CallOutcome = Result<Payload>;

/// Acquire a mutex guard, intentionally ignoring poisoning.
///
/// The protected state is a map of independent entries with no invariant
/// spanning several of them; a panic while the lock was held can at worst
/// lose one entry, whose caller then observes a closed channel.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One in-flight request.
pub(super) struct PendingCall {
    // ---
    tx: oneshot::Sender<CallOutcome>,
    timer: Option<AbortHandle>,
}

impl PendingCall {
    /// Deliver the outcome and cancel the deadline timer.
    ///
    /// Consumes the call: once claimed from [`PendingCalls`] a call can be
    /// completed exactly once.
    pub(super) fn complete(self, outcome: CallOutcome) {
        // ---
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // Receiver gone means the caller stopped waiting; nothing to do.
        let _ = self.tx.send(outcome);
    }
}

/// Tracks pending calls by correlation id.
///
/// Every completion path (response, deadline, send failure) goes through
/// [`claim`](Self::claim), which removes the entry under the lock. Only the
/// first claimant gets the call; later ones get `None`.
pub(super) struct PendingCalls {
    // ---
    calls: Mutex<HashMap<MessageId, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new pending call.
    ///
    /// Returns the receiver the outcome will be delivered on.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a call with this id is still pending.
    pub fn register(&self, id: MessageId) -> Result<oneshot::Receiver<CallOutcome>> {
        // ---
        let mut calls = lock_ignore_poison(&self.calls);
        if calls.contains_key(&id) {
            return Err(RpcError::AlreadyExists(format!(
                "a call with correlation id {id} is already pending"
            )));
        }

        let (tx, rx) = oneshot::channel();
        calls.insert(id, PendingCall { tx, timer: None });
        Ok(rx)
    }

    /// Associate a deadline timer with a pending call.
    ///
    /// If the call was already claimed the timer is cancelled right away.
    pub fn attach_timer(&self, id: &MessageId, timer: AbortHandle) {
        // ---
        let mut calls = lock_ignore_poison(&self.calls);
        match calls.get_mut(id) {
            Some(call) => call.timer = Some(timer),
            None => timer.abort(),
        }
    }

    /// Atomically remove and return the call for `id`, if still pending.
    pub fn claim(&self, id: &MessageId) -> Option<PendingCall> {
        lock_ignore_poison(&self.calls).remove(id)
    }

    /// Get the number of pending calls
    pub fn len(&self) -> usize {
        lock_ignore_poison(&self.calls).len()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_register_and_complete() {
        // ---
        let pending = PendingCalls::new();
        let id = MessageId::generate();

        let rx = pending.register(id).unwrap();
        assert_eq!(pending.len(), 1);

        let call = pending.claim(&id).expect("call is pending");
        call.complete(Ok(Payload::text("done")));

        // Should be removed after the claim
        assert_eq!(pending.len(), 0);

        let received = rx.blocking_recv().unwrap().unwrap();
        assert_eq!(received, Payload::text("done"));
    }

    #[test]
    fn test_second_claim_is_a_noop() {
        // ---
        let pending = PendingCalls::new();
        let id = MessageId::generate();
        let _rx = pending.register(id).unwrap();

        assert!(pending.claim(&id).is_some());
        assert!(pending.claim(&id).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        // ---
        let pending = PendingCalls::new();
        let id = MessageId::generate();
        let _rx = pending.register(id).unwrap();

        let err = pending.register(id).unwrap_err();
        assert!(matches!(err, RpcError::AlreadyExists(_)));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_claim_unknown_id() {
        // ---
        let pending = PendingCalls::new();
        assert!(pending.claim(&MessageId::generate()).is_none());
    }

    #[tokio::test]
    async fn test_timer_attached_after_claim_is_aborted() {
        // ---
        let pending = PendingCalls::new();
        let id = MessageId::generate();
        let _rx = pending.register(id).unwrap();
        pending.claim(&id).unwrap().complete(Err(RpcError::Unavailable("gone".into())));

        let timer = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        pending.attach_timer(&id, timer.abort_handle());

        let joined = timer.await;
        assert!(joined.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_complete_cancels_timer() {
        // ---
        let pending = PendingCalls::new();
        let id = MessageId::generate();
        let rx = pending.register(id).unwrap();

        let timer = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        pending.attach_timer(&id, timer.abort_handle());

        pending.claim(&id).unwrap().complete(Ok(Payload::default()));

        assert!(timer.await.unwrap_err().is_cancelled());
        assert!(rx.await.unwrap().is_ok());
    }
}
