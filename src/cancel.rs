//! Cooperative cancellation token for long-running query/update calls.
//!
//! A plain `Arc<AtomicBool>` flipped from another thread, the same shape as
//! the Ctrl+C interrupt flag in `jamie8johnson-cqs/src/cli/signal.rs` —
//! checked rather than signalled, since cursor iteration and per-triple
//! update loops poll it cooperatively instead of being interrupted
//! asynchronously.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::EngineError;

/// Shared cancellation flag passed into `Engine::query_cancellable`/
/// `update_cancellable`. Cloning shares the same underlying flag; cancel
/// any clone and every holder observes it.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(EngineError::Interrupted)` if cancellation has been requested,
    /// otherwise `Ok(())` — the poll point suspension points call between
    /// rows/triples.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn cancel_is_observed_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(EngineError::Interrupted)));
    }
}
