use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::{
    events::{EnrichedEvent, EventBus},
    queues::{
        BoundedDropNewestQueue, FifoDropOldestQueue, IsolatedForwarder, Latest1Queue, QueueKind,
        StartupTasks,
    },
    routes::{Route, RouteInbox, Routes},
    workers::{
        FifoInput, FifoReceiver, InputSpec, Latest1Input, SubscriptionSpec, WorkerInputs,
        WorkerWiring,
    },
};

pub struct BusConfig {
    pub session_id: Uuid,
    /// Panic on publishing an event nobody subscribed to.
    pub strict_routing: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            strict_routing: false,
        }
    }
}

#[derive(Default)]
pub struct BusMetrics {
    pub unrouted_publish_total: AtomicU64,
}

impl BusMetrics {
    pub fn record_unrouted(&self, _event_type: &'static str) {
        self.unrouted_publish_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unrouted(&self) -> u64 {
        self.unrouted_publish_total.load(Ordering::Relaxed)
    }
}

fn validate(subs: &[SubscriptionSpec]) -> Result<()> {
    let mut seen_subscribers: HashSet<&'static str> = HashSet::new();
    for s in subs {
        if s.subscriber_id.trim().is_empty() {
            anyhow::bail!("empty subscriber_id");
        }
        if !seen_subscribers.insert(s.subscriber_id) {
            anyhow::bail!("duplicate subscriber_id={}", s.subscriber_id);
        }
        if s.inputs.is_empty() {
            anyhow::bail!("subscriber_id={} has no inputs", s.subscriber_id);
        }

        let mut seen_inputs: HashSet<&'static str> = HashSet::new();
        for i in &s.inputs {
            if i.event_type.trim().is_empty() {
                anyhow::bail!("subscriber_id={} has empty event_type", s.subscriber_id);
            }
            if !seen_inputs.insert(i.event_type) {
                anyhow::bail!(
                    "subscriber_id={} has duplicate input event_type={}",
                    s.subscriber_id,
                    i.event_type
                );
            }

            match i.queue_kind {
                QueueKind::Latest1 => {}
                QueueKind::FifoDropOldest { capacity }
                | QueueKind::BoundedDropNewest { capacity } => {
                    anyhow::ensure!(capacity > 0, "capacity must be > 0")
                }
                QueueKind::Isolated { output_buffer } => {
                    anyhow::ensure!(output_buffer > 0, "output_buffer must be > 0")
                }
            }
        }
    }
    Ok(())
}

/// Inbox created for one subscriber input: the bus end and the worker end.
enum Wired {
    Latest(RouteInbox, Latest1Input),
    Fifo(RouteInbox, FifoInput),
}

fn wire_input(input: &InputSpec, notify_any: &Arc<Notify>, tasks: &mut StartupTasks) -> Wired {
    let event_type = input.event_type;
    match input.queue_kind {
        QueueKind::Latest1 => {
            let q = Arc::new(Latest1Queue::new(Arc::clone(notify_any)));
            Wired::Latest(
                RouteInbox::Latest1(Arc::clone(&q)),
                Latest1Input {
                    event_type,
                    queue: q,
                },
            )
        }
        QueueKind::FifoDropOldest { capacity } => {
            let q = FifoDropOldestQueue::new(capacity, Arc::clone(notify_any));
            let receiver = FifoReceiver::FifoDropOldest(q.receiver());
            Wired::Fifo(
                RouteInbox::FifoDropOldest(q),
                FifoInput {
                    event_type,
                    receiver,
                },
            )
        }
        QueueKind::BoundedDropNewest { capacity } => {
            let q = BoundedDropNewestQueue::new(capacity, Arc::clone(notify_any));
            let receiver = FifoReceiver::BoundedDropNewest(q.receiver());
            Wired::Fifo(
                RouteInbox::BoundedDropNewest(q),
                FifoInput {
                    event_type,
                    receiver,
                },
            )
        }
        QueueKind::Isolated { output_buffer } => {
            let (fwd, out_rx, drain_task) =
                IsolatedForwarder::<Arc<EnrichedEvent>>::new(output_buffer, Arc::clone(notify_any));
            tasks.tokio.push(drain_task);
            Wired::Fifo(
                RouteInbox::Isolated(fwd),
                FifoInput {
                    event_type,
                    receiver: FifoReceiver::Isolated(out_rx),
                },
            )
        }
    }
}

pub struct EventBusBuilder {
    cfg: BusConfig,
    subs: Vec<SubscriptionSpec>,
}

impl EventBusBuilder {
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            subs: Vec::new(),
        }
    }

    pub fn subscribe(mut self, s: SubscriptionSpec) -> Self {
        self.subs.push(s);
        self
    }

    /// Validate subscriptions and create one inbox per input.
    ///
    /// The returned startup tasks must be spawned before anything is published.
    pub fn build(self) -> Result<(EventBus, WorkerWiring, StartupTasks)> {
        validate(&self.subs)?;

        let mut routes: HashMap<&'static str, Vec<Route>> = HashMap::new();
        let mut wiring: HashMap<&'static str, WorkerInputs> = HashMap::new();
        let mut tasks = StartupTasks::default();

        for spec in self.subs {
            let notify_any = Arc::new(Notify::new());
            let mut latest = Vec::new();
            let mut fifos = Vec::new();

            for input in &spec.inputs {
                let inbox = match wire_input(input, &notify_any, &mut tasks) {
                    Wired::Latest(inbox, l) => {
                        latest.push(l);
                        inbox
                    }
                    Wired::Fifo(inbox, f) => {
                        fifos.push(f);
                        inbox
                    }
                };
                routes.entry(input.event_type).or_default().push(Route {
                    subscriber_id: spec.subscriber_id,
                    inbox,
                    drops_total: Arc::new(AtomicU64::new(0)),
                    coalesced_total: Arc::new(AtomicU64::new(0)),
                });
            }

            debug!(
                subscriber = spec.subscriber_id,
                latest = latest.len(),
                fifos = fifos.len(),
                "subscriber wired"
            );
            wiring.insert(
                spec.subscriber_id,
                WorkerInputs::new(latest, fifos, notify_any),
            );
        }

        let bus = EventBus::new(
            self.cfg,
            Routes { table: routes },
            Arc::new(BusMetrics::default()),
        );
        Ok((bus, WorkerWiring::new(wiring), tasks))
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;
    use crate::{
        events::EventHeader,
        workers::{InputSpec, WorkerBatch},
    };

    #[derive(Serialize)]
    struct Tick {
        header: EventHeader,
        n: u32,
    }

    impl Tick {
        const EVENT_TYPE: &'static str = "test.tick";
    }

    crate::impl_event!(Tick);

    fn tick(n: u32) -> Arc<Tick> {
        Arc::new(Tick {
            header: EventHeader::root(),
            n,
        })
    }

    fn sub(id: &'static str, queue_kind: QueueKind) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: id,
            inputs: vec![InputSpec {
                event_type: Tick::EVENT_TYPE,
                queue_kind,
            }],
        }
    }

    #[test]
    fn rejects_duplicate_subscribers_and_zero_capacity() {
        let dup = EventBusBuilder::new(BusConfig::default())
            .subscribe(sub("a", QueueKind::Latest1))
            .subscribe(sub("a", QueueKind::Latest1))
            .build();
        assert!(dup.is_err());

        let zero = EventBusBuilder::new(BusConfig::default())
            .subscribe(sub("a", QueueKind::BoundedDropNewest { capacity: 0 }))
            .build();
        assert!(zero.is_err());
    }

    #[tokio::test]
    async fn fans_out_to_every_subscriber() {
        let (bus, mut wiring, tasks) = EventBusBuilder::new(BusConfig::default())
            .subscribe(sub("latest", QueueKind::Latest1))
            .subscribe(sub("bounded", QueueKind::BoundedDropNewest { capacity: 1 }))
            .build()
            .unwrap();
        tasks.spawn_all();

        bus.publish(tick(1));
        bus.publish(tick(2));

        let mut latest = wiring.take("latest").unwrap();
        match latest.next().await {
            WorkerBatch::Snapshots(snaps) => {
                assert_eq!(snaps.len(), 1);
                let t = crate::events::downcast_ref::<Tick>(&snaps[0].event.event).unwrap();
                assert_eq!(t.n, 2);
            }
            WorkerBatch::FifoItem { .. } => panic!("expected snapshots"),
        }

        let mut bounded = wiring.take("bounded").unwrap();
        match bounded.next().await {
            WorkerBatch::FifoItem { event, .. } => {
                let t = crate::events::downcast_ref::<Tick>(&event.event).unwrap();
                assert_eq!(t.n, 1);
            }
            WorkerBatch::Snapshots(_) => panic!("expected fifo item"),
        }
        assert_eq!(bus.drops_for("bounded"), 1);
        assert_eq!(bus.drops_for("latest"), 0);
    }

    #[test]
    fn unrouted_events_are_counted() {
        let (bus, _, _) = EventBusBuilder::new(BusConfig::default())
            .subscribe(sub("a", QueueKind::Latest1))
            .build()
            .unwrap();

        #[derive(Serialize)]
        struct Other {
            header: EventHeader,
        }
        impl Other {
            const EVENT_TYPE: &'static str = "test.other";
        }
        crate::impl_event!(Other);

        bus.publish(Arc::new(Other {
            header: EventHeader::root(),
        }));
        assert_eq!(bus.metrics().unrouted(), 1);
    }
}
