//! Prometheus counters for the feed client

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Result;

/// Reason label for updates that never reached the consumer
pub const DROP_PARSE: &str = "parse";
pub const DROP_QUEUE_FULL: &str = "queue_full";

/// Counters describing feed activity
#[derive(Clone)]
pub struct FeedMetrics {
    registry: Registry,
    pub messages_received: IntCounter,
    pub pings_answered: IntCounter,
    pub keepalives_sent: IntCounter,
    pub updates_delivered: IntCounter,
    pub updates_dropped: IntCounterVec,
    pub decode_failures: IntCounter,
}

impl FeedMetrics {
    /// Create counters registered in a private registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new_custom(Some("bbo_stream".to_string()), None)?;

        let messages_received = IntCounter::new(
            "messages_received_total",
            "Messages read from the feed transport",
        )?;
        let pings_answered =
            IntCounter::new("pings_answered_total", "Server pings answered with a pong")?;
        let keepalives_sent =
            IntCounter::new("keepalives_sent_total", "Client-initiated keep-alive pings")?;
        let updates_delivered = IntCounter::new(
            "updates_delivered_total",
            "Best order book snapshots accepted by the consumer",
        )?;
        let updates_dropped = IntCounterVec::new(
            Opts::new(
                "updates_dropped_total",
                "BBO updates that were not delivered",
            ),
            &["reason"],
        )?;
        let decode_failures = IntCounter::new(
            "decode_failures_total",
            "Messages that could not be decoded",
        )?;

        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(pings_answered.clone()))?;
        registry.register(Box::new(keepalives_sent.clone()))?;
        registry.register(Box::new(updates_delivered.clone()))?;
        registry.register(Box::new(updates_dropped.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;

        Ok(Self {
            registry,
            messages_received,
            pings_answered,
            keepalives_sent,
            updates_delivered,
            updates_dropped,
            decode_failures,
        })
    }

    pub fn record_dropped(&self, reason: &str) {
        self.updates_dropped.with_label_values(&[reason]).inc();
    }

    pub fn dropped(&self, reason: &str) -> u64 {
        self.updates_dropped.with_label_values(&[reason]).get()
    }

    /// Render all counters in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
