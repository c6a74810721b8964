//! Cancellation and deadlines for running searches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{QuiverError, Result};

/// Carries a cancellation flag and an optional deadline into a search.
///
/// Clones share the flag, so a search can be cancelled from another thread:
///
/// ```
/// use quiver::search::context::SearchContext;
///
/// let ctx = SearchContext::new();
/// let handle = ctx.clone();
/// handle.cancel();
/// assert!(ctx.check().is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl SearchContext {
    /// A context that never expires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire `timeout` from now. A timeout too large to represent as an
    /// [`Instant`] leaves the context without a deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Expire at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Request cancellation of every search using this context.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with [`QuiverError::Cancelled`] if cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(QuiverError::cancelled("search cancelled"));
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(QuiverError::cancelled("search deadline exceeded"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_context_passes() {
        assert!(SearchContext::new().check().is_ok());
        assert!(
            SearchContext::new()
                .with_timeout(Duration::from_secs(60))
                .check()
                .is_ok()
        );
    }

    #[test]
    fn test_expired_deadline() {
        let ctx = SearchContext::new().with_deadline(Instant::now());
        assert!(matches!(ctx.check(), Err(QuiverError::Cancelled(_))));
    }

    #[test]
    fn test_unrepresentable_timeout_never_expires() {
        let ctx = SearchContext::new().with_timeout(Duration::MAX);
        assert!(ctx.deadline.is_none());
        assert!(ctx.check().is_ok());

        ctx.cancel();
        assert!(matches!(ctx.check(), Err(QuiverError::Cancelled(_))));
    }
}
