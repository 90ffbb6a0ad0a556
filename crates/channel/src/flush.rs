//! Flush strategies for buffered channel writes.
//!
//! A strategy is an opaque handle from the config snapshot's point of view:
//! shared as `Arc<dyn FlushStrategy>`, never owned or cloned by value, so the
//! same strategy instance can serve every connection built from one builder.

use std::fmt;
use std::sync::Arc;

/// Decides when buffered writes are flushed to the socket.
pub trait FlushStrategy: fmt::Debug + Send + Sync {
    /// Whether the transport should flush with `pending_writes` items queued.
    fn should_flush(&self, pending_writes: usize) -> bool;
}

/// Flush after every write. The conservative default.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlushOnEach;

impl FlushStrategy for FlushOnEach {
    fn should_flush(&self, pending_writes: usize) -> bool {
        pending_writes > 0
    }
}

/// Flush once a batch of writes has accumulated.
#[derive(Debug, Clone, Copy)]
pub struct BatchFlush {
    max_pending: usize,
}

impl BatchFlush {
    pub fn new(max_pending: usize) -> Self {
        Self {
            max_pending: max_pending.max(1),
        }
    }
}

impl FlushStrategy for BatchFlush {
    fn should_flush(&self, pending_writes: usize) -> bool {
        pending_writes >= self.max_pending
    }
}

pub fn default_flush_strategy() -> Arc<dyn FlushStrategy> {
    Arc::new(FlushOnEach)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_on_each_flushes_any_pending_write() {
        assert!(!FlushOnEach.should_flush(0));
        assert!(FlushOnEach.should_flush(1));
    }

    #[test]
    fn batch_flush_waits_for_the_batch() {
        let strategy = BatchFlush::new(4);
        assert!(!strategy.should_flush(3));
        assert!(strategy.should_flush(4));
        assert!(strategy.should_flush(9));
    }

    #[test]
    fn batch_size_zero_is_clamped() {
        let strategy = BatchFlush::new(0);
        assert!(strategy.should_flush(1));
    }
}
