use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    events::{EnrichedEvent, EventBus},
    workers::{PipelineFailed, SnapshotUpdate, SubscriptionSpec, WorkerBatch, WorkerInputs},
};

pub trait Worker: Send + Sized + 'static {
    const SUBSCRIBER_ID: &'static str;

    fn subscription() -> SubscriptionSpec;

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> Result<()>;

    /// Called with every latest-only input that changed since the last turn.
    ///
    /// Workers that must see those inputs as one consistent state override this;
    /// the default handles them one by one in publish order.
    async fn handle_snapshots(
        &mut self,
        updates: Vec<SnapshotUpdate>,
        bus: &EventBus,
    ) -> Result<()> {
        for update in updates {
            self.handle(update.event, bus).await?;
        }
        Ok(())
    }

    async fn run(
        mut self,
        mut inputs: WorkerInputs,
        bus: Arc<EventBus>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        debug!(worker = Self::SUBSCRIBER_ID, "worker started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    debug!(worker = Self::SUBSCRIBER_ID, "worker stopped");
                    return Ok(());
                }
                batch = inputs.next() => {
                    let (parent, outcome) = match batch {
                        WorkerBatch::Snapshots(updates) => {
                            let parent = updates.last().map(|u| Arc::clone(&u.event));
                            (parent, self.handle_snapshots(updates, &bus).await)
                        }
                        WorkerBatch::FifoItem { event, .. } => {
                            let parent = Some(Arc::clone(&event));
                            (parent, self.handle(event, &bus).await)
                        }
                    };

                    if let (Err(e), Some(parent)) = (outcome, parent) {
                        warn!(
                            worker = Self::SUBSCRIBER_ID,
                            event_type = parent.event.event_type(),
                            error = %e,
                            "handler failed"
                        );
                        bus.publish(Arc::new(PipelineFailed::new(
                            &parent.event,
                            Self::SUBSCRIBER_ID,
                            format!("{e:#}"),
                        )));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        events::{BusConfig, EventBusBuilder, EventHeader, downcast_ref},
        workers::InputSpec,
    };

    #[derive(Serialize)]
    struct Flag {
        header: EventHeader,
        on: bool,
    }

    impl Flag {
        const EVENT_TYPE: &'static str = "test.flag";
    }

    crate::impl_event!(Flag);

    #[derive(Serialize)]
    struct Level {
        header: EventHeader,
        value: u32,
    }

    impl Level {
        const EVENT_TYPE: &'static str = "test.level";
    }

    crate::impl_event!(Level);

    /// Reports how many snapshots arrived per batch; fails on a zero level.
    struct BatchProbe {
        seen: mpsc::UnboundedSender<usize>,
    }

    impl Worker for BatchProbe {
        const SUBSCRIBER_ID: &'static str = "test.batch_probe";

        fn subscription() -> SubscriptionSpec {
            SubscriptionSpec {
                subscriber_id: Self::SUBSCRIBER_ID,
                inputs: vec![
                    InputSpec::latest(Flag::EVENT_TYPE),
                    InputSpec::latest(Level::EVENT_TYPE),
                ],
            }
        }

        async fn handle(&mut self, _event: Arc<EnrichedEvent>, _bus: &EventBus) -> Result<()> {
            unreachable!("snapshots are handled as a batch")
        }

        async fn handle_snapshots(
            &mut self,
            updates: Vec<SnapshotUpdate>,
            _bus: &EventBus,
        ) -> Result<()> {
            let _ = self.seen.send(updates.len());
            for u in &updates {
                if let Some(level) = downcast_ref::<Level>(&u.event.event) {
                    anyhow::ensure!(level.value > 0, "level must be positive");
                }
            }
            Ok(())
        }
    }

    /// Collects pipeline failures.
    struct FailureSink {
        failures: mpsc::UnboundedSender<PipelineFailed>,
    }

    impl Worker for FailureSink {
        const SUBSCRIBER_ID: &'static str = "test.failure_sink";

        fn subscription() -> SubscriptionSpec {
            SubscriptionSpec {
                subscriber_id: Self::SUBSCRIBER_ID,
                inputs: vec![InputSpec::fifo(PipelineFailed::EVENT_TYPE, 4)],
            }
        }

        async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> Result<()> {
            if let Some(f) = downcast_ref::<PipelineFailed>(&event.event) {
                let _ = self.failures.send(f.clone());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn snapshots_arrive_as_one_batch_and_failures_are_published() {
        let (bus, mut wiring, tasks) = EventBusBuilder::new(BusConfig::default())
            .subscribe(BatchProbe::subscription())
            .subscribe(FailureSink::subscription())
            .build()
            .unwrap();
        tasks.spawn_all();
        let bus = Arc::new(bus);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let flag = Arc::new(Flag {
            header: EventHeader::root(),
            on: true,
        });
        let level = Arc::new(Level {
            header: EventHeader::root(),
            value: 0,
        });
        let level_id = level.header.event_id;
        bus.publish(flag);
        bus.publish(level);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let (failed_tx, mut failed_rx) = mpsc::unbounded_channel();
        tokio::spawn(
            BatchProbe { seen: seen_tx }.run(
                wiring.claim(BatchProbe::SUBSCRIBER_ID).unwrap(),
                bus.clone(),
                shutdown_rx.resubscribe(),
            ),
        );
        tokio::spawn(
            FailureSink { failures: failed_tx }.run(
                wiring.claim(FailureSink::SUBSCRIBER_ID).unwrap(),
                bus.clone(),
                shutdown_rx,
            ),
        );

        assert_eq!(seen_rx.recv().await, Some(2));
        let failure = failed_rx.recv().await.unwrap();
        assert_eq!(failure.stage, BatchProbe::SUBSCRIBER_ID);
        assert_eq!(failure.message, "level must be positive");
        assert_eq!(failure.header.parent_ids, vec![level_id]);

        shutdown_tx.send(()).unwrap();
    }
}
