//! Multi-producer, single-consumer async send queue (spec §4.3).
//!
//! The Design Notes call out the sentinel-leak pitfall of a hand-rolled intrusive
//! MPSC queue if the destructor doesn't drain it. Rather than write that unsafe code
//! ourselves, this wraps `crossbeam_queue::SegQueue` — a lock-free queue already
//! reached for elsewhere in this corpus for exactly this kind of hot send path — which
//! drains correctly on drop and gives every ordering guarantee the spec requires:
//! per-producer FIFO order, no loss, no duplication, and push that never blocks the
//! consumer.

use crossbeam_queue::SegQueue;

/// One item queued for delivery by the I/O thread. Only the I/O thread ever writes to
/// the socket, so the heartbeat worker and any caller of `sendAsync`/`sendPing` funnel
/// their frames through here instead of writing directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundItem {
    Text(Vec<u8>),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
}

/// An owned item queued for asynchronous delivery (spec's "Async queue node").
pub struct SendQueue {
    inner: SegQueue<OutboundItem>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Enqueues an item. Never blocks; any number of producer threads may call this
    /// concurrently.
    pub fn push(&self, item: OutboundItem) {
        self.inner.push(item);
    }

    /// Dequeues the next item in FIFO order for the calling producer, or `None` if
    /// the queue is currently empty. Only the I/O thread calls this.
    pub fn pop(&self) -> Option<OutboundItem> {
        self.inner.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl Default for SendQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn preserves_single_producer_fifo_order() {
        let queue = SendQueue::new();
        for i in 0..100 {
            queue.push(OutboundItem::Text(format!("m{i}").into_bytes()));
        }
        for i in 0..100 {
            assert_eq!(
                queue.pop().unwrap(),
                OutboundItem::Text(format!("m{i}").into_bytes())
            );
        }
        assert!(queue.pop().is_none());
    }

    #[test]
    fn concurrent_producers_deliver_every_item_exactly_once() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 500;

        let queue = Arc::new(SendQueue::new());
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push(OutboundItem::Text(format!("{p}:{i}").into_bytes()));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0;
        while let Some(item) = queue.pop() {
            assert!(seen.insert(item), "duplicate item dequeued");
            count += 1;
        }
        assert_eq!(count, PRODUCERS * PER_PRODUCER);
    }

    #[test]
    fn empty_queue_pop_returns_none() {
        let queue = SendQueue::new();
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn distinguishes_item_kinds_in_fifo_order() {
        let queue = SendQueue::new();
        queue.push(OutboundItem::Ping(vec![1]));
        queue.push(OutboundItem::Text(b"hi".to_vec()));
        queue.push(OutboundItem::Pong(vec![2]));
        assert_eq!(queue.pop().unwrap(), OutboundItem::Ping(vec![1]));
        assert_eq!(queue.pop().unwrap(), OutboundItem::Text(b"hi".to_vec()));
        assert_eq!(queue.pop().unwrap(), OutboundItem::Pong(vec![2]));
    }
}
