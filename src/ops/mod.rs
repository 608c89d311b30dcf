// Asynchronous operations
// The exactly-once completion contract and its concrete operations

mod auth;
mod create;

pub use auth::{AuthenticateOperation, RetryPolicy};
pub use create::{normalize_entities, CreateEntityOperation};

use tokio::sync::oneshot;

use crate::error::{AsyncError, ClientError, OpResult};

/// A unit of asynchronous work with exactly-once completion semantics.
///
/// `go()` spawns the work onto the current tokio runtime and returns a
/// handle immediately; it never blocks. The outcome is delivered through
/// the handle exactly once. Starting the same operation twice is a
/// programming error and panics.
pub trait Operation {
    type Output: Send + 'static;

    fn go(&mut self) -> OperationHandle<Self::Output>;
}

/// Sending half of the one-shot completion contract.
///
/// Owned by the operation driver; fires exactly once with either the final
/// result or a captured failure. A second completion attempt panics.
pub(crate) struct CompletionSlot<T> {
    tx: Option<oneshot::Sender<OpResult<T>>>,
}

impl<T: Send + 'static> CompletionSlot<T> {
    pub(crate) fn new() -> (CompletionSlot<T>, OperationHandle<T>) {
        let (tx, rx) = oneshot::channel();
        (CompletionSlot { tx: Some(tx) }, OperationHandle { rx })
    }

    pub(crate) fn complete(&mut self, outcome: OpResult<T>) {
        match self.tx.take() {
            // A caller that dropped its handle stops caring about the
            // outcome; that is not an error on our side.
            Some(tx) => {
                let _ = tx.send(outcome);
            }
            None => panic!("operation completed twice"),
        }
    }
}

/// Receiving half of the one-shot completion contract.
pub struct OperationHandle<T> {
    rx: oneshot::Receiver<OpResult<T>>,
}

impl<T> OperationHandle<T> {
    /// Wait for the operation's terminal outcome.
    pub async fn wait(self) -> OpResult<T> {
        match self.rx.await {
            Ok(outcome) => outcome,
            // Unreachable for a correctly written driver; surfaced as an
            // error rather than a hang in case one is not.
            Err(_) => Err(AsyncError::capture(ClientError::Protocol(
                "operation dropped without completing".to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_completion_delivers_once() {
        let (mut slot, handle) = CompletionSlot::new();
        slot.complete(Ok(42));
        assert_eq!(handle.wait().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_completion_delivers_captured_error() {
        let (mut slot, handle) = CompletionSlot::<u32>::new();
        slot.complete(Err(AsyncError::capture(ClientError::EmptyReply)));
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    #[should_panic(expected = "operation completed twice")]
    fn test_double_completion_panics() {
        let (mut slot, _handle) = CompletionSlot::new();
        slot.complete(Ok(1));
        slot.complete(Ok(2));
    }

    #[tokio::test]
    async fn test_dropped_slot_surfaces_as_error() {
        let (slot, handle) = CompletionSlot::<u32>::new();
        drop(slot);
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn test_completion_with_dropped_handle_is_quiet() {
        let (mut slot, handle) = CompletionSlot::new();
        drop(handle);
        slot.complete(Ok(7));
    }
}
