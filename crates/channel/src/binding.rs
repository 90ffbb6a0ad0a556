//! Deferred protocol binding: a write-once, read-many cell publishing the
//! ALPN outcome of one connection.
//!
//! The application protocol is not known until the security handshake
//! completes, yet request-issuing contexts may already exist. They park on
//! [`DeferredProtocolBinding::await_result`], which suspends cooperatively
//! (a `tokio::sync::watch` wait, no busy loop, no blocking OS wait) and so
//! composes with single-threaded and multi-threaded runtimes alike.
//!
//! Resolution happens exactly once. The handshake-completion path calls
//! [`resolve`](DeferredProtocolBinding::resolve); every connection-teardown
//! path (timeout, transport error, explicit close) calls
//! [`fail_if_pending`](DeferredProtocolBinding::fail_if_pending) so that no
//! waiter can hang on a connection that will never produce a result.

use crate::error::{ChannelError, CloseReason, Result};
use tokio::sync::watch;
use weft_wire_protocol::NegotiationResult;

/// Resolution state of a binding. Tests assert on these transitions directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    /// Handshake still in flight; readers suspend.
    Pending,
    /// The ALPN outcome is known (selection or no-overlap).
    Resolved(NegotiationResult),
    /// The connection went away before an outcome was produced.
    Failed(CloseReason),
}

impl BindingState {
    pub fn is_pending(&self) -> bool {
        matches!(self, BindingState::Pending)
    }
}

/// Per-connection single-assignment cell for the negotiation outcome.
#[derive(Debug)]
pub struct DeferredProtocolBinding {
    tx: watch::Sender<BindingState>,
}

impl DeferredProtocolBinding {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BindingState::Pending);
        Self { tx }
    }

    /// Current state, without suspending.
    pub fn state(&self) -> BindingState {
        self.tx.borrow().clone()
    }

    /// Non-blocking peek: `None` while pending, the outcome afterwards.
    pub fn try_result(&self) -> Option<Result<NegotiationResult>> {
        match self.state() {
            BindingState::Pending => None,
            BindingState::Resolved(result) => Some(Ok(result)),
            BindingState::Failed(reason) => Some(Err(ChannelError::ClosedChannel(reason))),
        }
    }

    /// Publishes the negotiation outcome. Single-assignment: a second call is
    /// a programming error and panics, because the outcome of a connection is
    /// never retracted or replaced.
    ///
    /// # Panics
    ///
    /// If the binding has already been resolved or failed.
    pub fn resolve(&self, result: NegotiationResult) {
        let updated = self.tx.send_if_modified(|state| {
            if state.is_pending() {
                *state = BindingState::Resolved(result.clone());
                true
            } else {
                false
            }
        });
        if !updated {
            panic!(
                "DeferredProtocolBinding resolved twice (current state: {:?})",
                self.state()
            );
        }
        tracing::debug!(target: "weft::channel::binding", ?result, "protocol binding resolved");
    }

    /// Cancellation path: moves a still-pending binding to `Failed` so no
    /// waiter hangs. Returns whether this call performed the transition; a
    /// call after resolution is a no-op, not a double-resolution violation.
    pub fn fail_if_pending(&self, reason: CloseReason) -> bool {
        let failed = self.tx.send_if_modified(|state| {
            if state.is_pending() {
                *state = BindingState::Failed(reason);
                true
            } else {
                false
            }
        });
        if failed {
            tracing::debug!(
                target: "weft::channel::binding",
                %reason,
                "pending protocol binding failed"
            );
        }
        failed
    }

    /// Suspends until the binding leaves `Pending`, then returns the same
    /// outcome every other caller sees. Safe to call from any number of
    /// concurrent contexts, before or after resolution.
    pub async fn await_result(&self) -> Result<NegotiationResult> {
        let mut rx = self.tx.subscribe();
        let state = rx
            .wait_for(|state| !state.is_pending())
            .await
            .map(|guard| guard.clone())
            // The sender lives inside `self`, so this arm is unreachable in
            // practice; map it to a closed-channel failure all the same.
            .map_err(|_| ChannelError::ClosedChannel(CloseReason::LocallyClosed))?;
        match state {
            BindingState::Resolved(result) => Ok(result),
            BindingState::Failed(reason) => Err(ChannelError::ClosedChannel(reason)),
            BindingState::Pending => unreachable!("wait_for only yields settled states"),
        }
    }
}

impl Default for DeferredProtocolBinding {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weft_wire_protocol::ProtocolId;

    #[test]
    fn starts_pending() {
        let binding = DeferredProtocolBinding::new();
        assert_eq!(binding.state(), BindingState::Pending);
        assert!(binding.try_result().is_none());
    }

    #[test]
    fn resolve_moves_to_resolved() {
        let binding = DeferredProtocolBinding::new();
        binding.resolve(NegotiationResult::Selected(ProtocolId::HTTP_2));
        assert_eq!(
            binding.state(),
            BindingState::Resolved(NegotiationResult::Selected(ProtocolId::HTTP_2))
        );
        match binding.try_result() {
            Some(Ok(NegotiationResult::Selected(id))) => assert_eq!(id, ProtocolId::HTTP_2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "resolved twice")]
    fn double_resolution_panics() {
        let binding = DeferredProtocolBinding::new();
        binding.resolve(NegotiationResult::Selected(ProtocolId::HTTP_2));
        binding.resolve(NegotiationResult::Selected(ProtocolId::HTTP_1_1));
    }

    #[test]
    #[should_panic(expected = "resolved twice")]
    fn resolving_a_failed_binding_panics() {
        let binding = DeferredProtocolBinding::new();
        binding.fail_if_pending(CloseReason::TransportError);
        binding.resolve(NegotiationResult::NoOverlap);
    }

    #[test]
    fn fail_after_resolution_is_a_noop() {
        let binding = DeferredProtocolBinding::new();
        binding.resolve(NegotiationResult::Selected(ProtocolId::HTTP_1_1));
        assert!(!binding.fail_if_pending(CloseReason::IdleTimeout));
        assert_eq!(
            binding.state(),
            BindingState::Resolved(NegotiationResult::Selected(ProtocolId::HTTP_1_1))
        );
    }

    #[tokio::test]
    async fn waiters_before_and_after_resolution_see_the_same_result() {
        let binding = Arc::new(DeferredProtocolBinding::new());

        let mut early = Vec::new();
        for _ in 0..8 {
            let binding = Arc::clone(&binding);
            early.push(tokio::spawn(
                async move { binding.await_result().await },
            ));
        }
        // Let the early waiters park before resolving.
        tokio::task::yield_now().await;

        binding.resolve(NegotiationResult::Selected(ProtocolId::HTTP_2));

        for handle in early {
            let result = handle.await.unwrap().unwrap();
            assert_eq!(result, NegotiationResult::Selected(ProtocolId::HTTP_2));
        }
        // Late waiter observes the same outcome immediately.
        let late = binding.await_result().await.unwrap();
        assert_eq!(late, NegotiationResult::Selected(ProtocolId::HTTP_2));
    }

    #[tokio::test]
    async fn failing_a_pending_binding_unblocks_waiters() {
        let binding = Arc::new(DeferredProtocolBinding::new());
        let waiter = {
            let binding = Arc::clone(&binding);
            tokio::spawn(async move { binding.await_result().await })
        };
        tokio::task::yield_now().await;

        assert!(binding.fail_if_pending(CloseReason::IdleTimeout));

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ChannelError::ClosedChannel(CloseReason::IdleTimeout)
        ));
    }

    #[tokio::test]
    async fn no_overlap_is_a_resolution_not_a_failure() {
        let binding = DeferredProtocolBinding::new();
        binding.resolve(NegotiationResult::NoOverlap);
        let result = binding.await_result().await.unwrap();
        assert!(result.is_no_overlap());
    }
}
