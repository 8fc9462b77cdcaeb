//! Bounded work queue between node event producers and the control loop

use crate::event::NodeEvent;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
#[error("Work queue consumer has stopped")]
pub struct QueueClosed(pub NodeEvent);

/// Producer half of the work queue. Cheap to clone, one per event source.
#[derive(Clone, Debug)]
pub struct WorkQueueSender {
    tx: mpsc::Sender<NodeEvent>,
}

impl WorkQueueSender {
    /// Enqueue an event, waiting for a free slot when the queue is full
    pub async fn enqueue(&self, event: NodeEvent) -> Result<(), QueueClosed> {
        self.tx.send(event).await.map_err(|e| QueueClosed(e.0))
    }

    /// Enqueue without waiting. Returns the event back if the queue is full.
    pub fn try_enqueue(&self, event: NodeEvent) -> Result<(), NodeEvent> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(ev) | mpsc::error::TrySendError::Closed(ev) => ev,
        })
    }

    /// Free slots left before producers block
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

/// Consumer half of the work queue, owned by the control loop
#[derive(Debug)]
pub struct WorkQueue {
    rx: mpsc::Receiver<NodeEvent>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> (WorkQueueSender, WorkQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        (WorkQueueSender { tx }, WorkQueue { rx })
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once `shutdown` is cancelled or every sender has been
    /// dropped. Queued events are not drained on shutdown.
    pub async fn dequeue(&mut self, shutdown: &CancellationToken) -> Option<NodeEvent> {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    /// Number of events waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Enforces a minimum spacing between processed items
#[derive(Clone, Debug)]
pub struct Throttle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last: None }
    }

    /// Record that an item finished processing at `at`
    pub fn mark(&mut self, at: Instant) {
        self.last = Some(at);
    }

    /// Time left to wait before the next item may be processed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last?;
        let since = now.saturating_duration_since(last);
        if since < self.min_interval {
            Some(self.min_interval - since)
        } else {
            None
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_events_dequeue_in_order() {
        let (tx, mut queue) = WorkQueue::new(4);
        let shutdown = CancellationToken::new();
        tx.enqueue(NodeEvent::added("node-a")).await.unwrap();
        tx.enqueue(NodeEvent::updated("node-b")).await.unwrap();
        tx.enqueue(NodeEvent::deleted("node-a")).await.unwrap();
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.dequeue(&shutdown).await, Some(NodeEvent::added("node-a")));
        assert_eq!(queue.dequeue(&shutdown).await, Some(NodeEvent::updated("node-b")));
        assert_eq!(queue.dequeue(&shutdown).await, Some(NodeEvent::deleted("node-a")));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_on_shutdown() {
        let (tx, mut queue) = WorkQueue::new(4);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tx.enqueue(NodeEvent::added("node-a")).await.unwrap();
        assert_eq!(queue.dequeue(&shutdown).await, None);
    }

    #[tokio::test]
    async fn test_dequeue_returns_none_when_senders_dropped() {
        let (tx, mut queue) = WorkQueue::new(4);
        drop(tx);
        assert_eq!(queue.dequeue(&CancellationToken::new()).await, None);
    }

    #[tokio::test]
    async fn test_enqueue_blocks_when_full() {
        let (tx, mut queue) = WorkQueue::new(2);
        let shutdown = CancellationToken::new();
        tx.enqueue(NodeEvent::added("n1")).await.unwrap();
        tx.enqueue(NodeEvent::added("n2")).await.unwrap();
        assert_eq!(tx.available(), 0);
        assert_eq!(tx.try_enqueue(NodeEvent::added("n3")), Err(NodeEvent::added("n3")));

        let done = Arc::new(AtomicBool::new(false));
        let producer = {
            let tx = tx.clone();
            let done = done.clone();
            tokio::spawn(async move {
                tx.enqueue(NodeEvent::added("n3")).await.unwrap();
                done.store(true, Ordering::SeqCst);
            })
        };

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!done.load(Ordering::SeqCst));

        assert_eq!(queue.dequeue(&shutdown).await, Some(NodeEvent::added("n1")));
        producer.await.unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_fails_after_consumer_dropped() {
        let (tx, queue) = WorkQueue::new(1);
        drop(queue);
        let err = tx.enqueue(NodeEvent::added("n1")).await.unwrap_err();
        assert_eq!(err.0, NodeEvent::added("n1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_remaining() {
        let mut throttle = Throttle::new(Duration::from_secs(5));
        let start = Instant::now();
        assert_eq!(throttle.remaining(start), None);

        throttle.mark(start);
        assert_eq!(throttle.remaining(start), Some(Duration::from_secs(5)));
        assert_eq!(
            throttle.remaining(start + Duration::from_secs(2)),
            Some(Duration::from_secs(3))
        );
        assert_eq!(throttle.remaining(start + Duration::from_secs(5)), None);
        assert_eq!(throttle.remaining(start + Duration::from_secs(60)), None);
    }
}
