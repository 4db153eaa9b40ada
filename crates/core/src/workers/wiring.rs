use std::collections::HashMap;

use crate::{queues::QueueKind, workers::WorkerInputs};

/// What a worker listens to, and how each input is buffered.
pub struct SubscriptionSpec {
    pub subscriber_id: &'static str,
    pub inputs: Vec<InputSpec>,
}

pub struct InputSpec {
    pub event_type: &'static str,
    pub queue_kind: QueueKind,
}

impl InputSpec {
    pub fn latest(event_type: &'static str) -> Self {
        Self {
            event_type,
            queue_kind: QueueKind::Latest1,
        }
    }

    pub fn fifo(event_type: &'static str, capacity: usize) -> Self {
        Self {
            event_type,
            queue_kind: QueueKind::FifoDropOldest { capacity },
        }
    }
}

/// Worker inboxes produced by the bus builder, claimed once per subscriber.
pub struct WorkerWiring {
    inputs: HashMap<&'static str, WorkerInputs>,
}

impl WorkerWiring {
    pub fn new(inputs: HashMap<&'static str, WorkerInputs>) -> Self {
        Self { inputs }
    }

    pub fn take(&mut self, subscriber_id: &'static str) -> Option<WorkerInputs> {
        self.inputs.remove(subscriber_id)
    }

    /// Like [`take`](Self::take), failing for a subscriber that was never registered.
    pub fn claim(&mut self, subscriber_id: &'static str) -> anyhow::Result<WorkerInputs> {
        self.take(subscriber_id)
            .ok_or_else(|| anyhow::anyhow!("no inputs wired for subscriber_id={subscriber_id}"))
    }
}
