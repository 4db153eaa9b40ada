use std::sync::Arc;

use tokio::sync::{Notify, mpsc};

use crate::{
    events::EnrichedEvent,
    queues::{BoundedDropNewestReceiver, FifoDropOldestReceiver, Latest1Queue},
};

pub struct Latest1Input {
    pub event_type: &'static str,
    pub queue: Arc<Latest1Queue<Arc<EnrichedEvent>>>,
}

pub enum FifoReceiver {
    FifoDropOldest(FifoDropOldestReceiver<Arc<EnrichedEvent>>),
    BoundedDropNewest(BoundedDropNewestReceiver<Arc<EnrichedEvent>>),
    Isolated(mpsc::Receiver<Arc<EnrichedEvent>>),
}

impl FifoReceiver {
    fn try_recv(&mut self) -> Option<Arc<EnrichedEvent>> {
        match self {
            FifoReceiver::FifoDropOldest(r) => r.try_recv(),
            FifoReceiver::BoundedDropNewest(r) => r.try_recv(),
            FifoReceiver::Isolated(r) => r.try_recv().ok(),
        }
    }
}

pub struct FifoInput {
    pub event_type: &'static str,
    pub receiver: FifoReceiver,
}

/// All inboxes of one worker, woken through a shared notifier.
pub struct WorkerInputs {
    latest: Vec<Latest1Input>,
    fifos: Vec<FifoInput>,
    notify_any: Arc<Notify>,
    fifo_index: usize,
}

pub enum WorkerBatch {
    /// Every latest-only input that changed, drained together.
    Snapshots(Vec<SnapshotUpdate>),
    FifoItem {
        event_type: &'static str,
        event: Arc<EnrichedEvent>,
    },
}

pub struct SnapshotUpdate {
    pub event_type: &'static str,
    pub event: Arc<EnrichedEvent>,
}

impl WorkerInputs {
    pub fn new(latest: Vec<Latest1Input>, fifos: Vec<FifoInput>, notify_any: Arc<Notify>) -> Self {
        Self {
            latest,
            fifos,
            notify_any,
            fifo_index: 0,
        }
    }

    fn drain_snapshots(&self) -> Vec<SnapshotUpdate> {
        let mut snaps: Vec<SnapshotUpdate> = self
            .latest
            .iter()
            .filter_map(|l| {
                l.queue.try_recv().map(|event| SnapshotUpdate {
                    event_type: l.event_type,
                    event,
                })
            })
            .collect();
        snaps.sort_by_key(|s| s.event.ingest_seq);
        snaps
    }

    /// Round-robin over FIFO inputs so a busy one cannot starve the rest.
    fn next_fifo_item(&mut self) -> Option<WorkerBatch> {
        let len = self.fifos.len();
        for _ in 0..len {
            let i = self.fifo_index;
            self.fifo_index = (self.fifo_index + 1) % len;
            let fifo = &mut self.fifos[i];
            if let Some(event) = fifo.receiver.try_recv() {
                return Some(WorkerBatch::FifoItem {
                    event_type: fifo.event_type,
                    event,
                });
            }
        }
        None
    }

    /// Wait for the next unit of work. Snapshots take priority over FIFO items.
    pub async fn next(&mut self) -> WorkerBatch {
        loop {
            let snaps = self.drain_snapshots();
            if !snaps.is_empty() {
                return WorkerBatch::Snapshots(snaps);
            }

            if let Some(item) = self.next_fifo_item() {
                return item;
            }

            self.notify_any.notified().await;
        }
    }
}
