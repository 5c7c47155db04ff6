//! Publisher module for consumer delivery
//!
//! Hands snapshots to the consumer through a bounded queue drained by a
//! single forwarding task. The dispatch loop never waits on the consumer:
//! when the queue is full the newest snapshot is dropped.

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::{FeedMetrics, DROP_QUEUE_FULL};
use crate::orderbook::BestOrderBook;

/// Non-blocking entry point into the delivery queue
pub struct Publisher {
    queue: mpsc::Sender<BestOrderBook>,
    metrics: Arc<FeedMetrics>,
}

impl Publisher {
    /// Start the forwarding task feeding `output`
    ///
    /// The task owns `output`, so the consumer sees the channel close once
    /// the task exits: on shutdown, when the consumer goes away, or after
    /// every `Publisher` handle is dropped and the queue has drained.
    pub fn spawn(
        output: mpsc::Sender<BestOrderBook>,
        capacity: usize,
        shutdown: CancellationToken,
        metrics: Arc<FeedMetrics>,
    ) -> (Self, JoinHandle<()>) {
        let (queue, pending) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(forward(pending, output, shutdown, metrics.clone()));
        (Self { queue, metrics }, handle)
    }

    /// Queue a snapshot for delivery; returns false if it was dropped
    pub fn publish(&self, book: BestOrderBook) -> bool {
        match self.queue.try_send(book) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Delivery queue full, dropping update");
                self.metrics.record_dropped(DROP_QUEUE_FULL);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Delivery stopped, dropping update");
                false
            }
        }
    }
}

async fn forward(
    mut pending: mpsc::Receiver<BestOrderBook>,
    output: mpsc::Sender<BestOrderBook>,
    shutdown: CancellationToken,
    metrics: Arc<FeedMetrics>,
) {
    loop {
        let book = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = pending.recv() => match next {
                Some(book) => book,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!("Shutdown during delivery, abandoning update");
                break;
            }
            sent = output.send(book) => {
                if sent.is_err() {
                    debug!("Consumer dropped the delivery queue");
                    break;
                }
                metrics.updates_delivered.inc();
            }
        }
    }

    debug!("Delivery task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Order;
    use std::time::Duration;
    use tokio::time::timeout;

    fn book(price: f64) -> BestOrderBook {
        BestOrderBook {
            bid: Order { price, amount: 1.0 },
            ask: Order {
                price: price + 0.01,
                amount: 2.0,
            },
        }
    }

    fn metrics() -> Arc<FeedMetrics> {
        Arc::new(FeedMetrics::new().unwrap())
    }

    #[tokio::test]
    async fn test_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let metrics = metrics();
        let (publisher, handle) =
            Publisher::spawn(tx, 8, CancellationToken::new(), metrics.clone());

        for i in 0..5 {
            assert!(publisher.publish(book(100.0 + i as f64)));
        }
        drop(publisher);

        for i in 0..5 {
            let received = rx.recv().await.unwrap();
            assert_eq!(received.bid.price, 100.0 + i as f64);
        }
        assert!(rx.recv().await.is_none());
        handle.await.unwrap();
        assert_eq!(metrics.updates_delivered.get(), 5);
    }

    #[tokio::test]
    async fn test_drops_when_queue_full() {
        // Consumer never reads: one slot in the output, one in flight, one queued
        let (tx, _rx) = mpsc::channel(1);
        let metrics = metrics();
        let (publisher, _handle) =
            Publisher::spawn(tx, 1, CancellationToken::new(), metrics.clone());

        let mut accepted = 0;
        for i in 0..10 {
            if publisher.publish(book(i as f64)) {
                accepted += 1;
            }
            tokio::task::yield_now().await;
        }

        assert!(accepted < 10);
        assert_eq!(metrics.dropped(DROP_QUEUE_FULL), 10 - accepted);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_pending_delivery() {
        let (tx, mut rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let (publisher, handle) = Publisher::spawn(tx, 4, shutdown.clone(), metrics());

        publisher.publish(book(1.0));
        publisher.publish(book(2.0));
        tokio::time::sleep(Duration::from_millis(20)).await;

        shutdown.cancel();
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("delivery task did not stop")
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().bid.price, 1.0);
        assert!(rx.recv().await.is_none());
        assert!(!publisher.publish(book(3.0)));
    }
}
