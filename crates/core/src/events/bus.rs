use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::time::Instant;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::{
    events::{BusConfig, BusMetrics, EnrichedEvent, Event},
    routes::{Delivery, Routes},
};

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    session_id: Uuid,
    next_ingest_seq: AtomicU64,
    routes: Routes,
    metrics: Arc<BusMetrics>,
    strict_routing: bool,
}

impl EventBus {
    pub fn new(cfg: BusConfig, routes: Routes, metrics: Arc<BusMetrics>) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                session_id: cfg.session_id,
                next_ingest_seq: AtomicU64::new(0),
                routes,
                metrics,
                strict_routing: cfg.strict_routing,
            }),
        }
    }

    /// Fan `event` out to every subscriber of its type.
    pub fn publish(&self, event: Arc<dyn Event>) {
        let ingest_seq = self.inner.next_ingest_seq.fetch_add(1, Ordering::Relaxed);
        let event_type = event.event_type();

        let enriched = Arc::new(EnrichedEvent {
            event,
            session_id: self.inner.session_id,
            ingest_seq,
            ingested_at: Instant::now(),
        });

        let Some(routes) = self.inner.routes.table.get(event_type) else {
            self.inner.metrics.record_unrouted(event_type);
            if self.inner.strict_routing {
                panic!("Unrouted event type: {event_type}");
            }
            warn!(event_type, "published event has no subscribers");
            return;
        };

        for route in routes {
            match route.inbox.try_deliver(Arc::clone(&enriched)) {
                Delivery::Queued => {}
                Delivery::Replaced => {
                    route.coalesced_total.fetch_add(1, Ordering::Relaxed);
                }
                Delivery::Dropped => {
                    route.drops_total.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        event_type,
                        subscriber = route.subscriber_id,
                        "subscriber inbox full, event dropped"
                    );
                }
            }
            trace!(event_type, subscriber = route.subscriber_id, ingest_seq, "delivered");
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.inner.metrics
    }

    /// Events lost on the way to `subscriber_id`, summed over its inputs.
    pub fn drops_for(&self, subscriber_id: &str) -> u64 {
        self.inner
            .routes
            .table
            .values()
            .flatten()
            .filter(|r| r.subscriber_id == subscriber_id)
            .map(|r| r.drops_total.load(Ordering::Relaxed))
            .sum()
    }
}
