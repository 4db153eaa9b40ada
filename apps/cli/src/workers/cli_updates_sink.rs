use std::sync::Arc;

use insightcast_core::{
    events::{EnrichedEvent, EventBus, downcast_ref},
    queues::QueueKind,
    workers::{InputSpec, PipelineFailed, SubscriptionSpec, Worker},
};
use tokio::sync::mpsc;

use crate::workers::events::{DownloadSettled, SessionChanged};

/// What the terminal front end reacts to.
pub enum CliUpdate {
    Session(SessionChanged),
    Download(DownloadSettled),
    Failed(PipelineFailed),
}

/// Forwards session reports to the terminal front end.
pub struct CliUpdatesSinkWorker {
    updates: mpsc::UnboundedSender<CliUpdate>,
}

impl CliUpdatesSinkWorker {
    pub fn new(updates: mpsc::UnboundedSender<CliUpdate>) -> Self {
        Self { updates }
    }
}

impl Worker for CliUpdatesSinkWorker {
    const SUBSCRIBER_ID: &'static str = "cli.updates_sink";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![
                InputSpec {
                    event_type: SessionChanged::EVENT_TYPE,
                    queue_kind: QueueKind::Latest1,
                },
                InputSpec {
                    event_type: DownloadSettled::EVENT_TYPE,
                    queue_kind: QueueKind::Isolated { output_buffer: 4 },
                },
                InputSpec {
                    event_type: PipelineFailed::EVENT_TYPE,
                    queue_kind: QueueKind::FifoDropOldest { capacity: 4 },
                },
            ],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        let update = if let Some(s) = downcast_ref::<SessionChanged>(&event.event) {
            CliUpdate::Session(s.clone())
        } else if let Some(d) = downcast_ref::<DownloadSettled>(&event.event) {
            CliUpdate::Download(d.clone())
        } else if let Some(f) = downcast_ref::<PipelineFailed>(&event.event) {
            CliUpdate::Failed(f.clone())
        } else {
            anyhow::bail!("unexpected event_type={}", event.event.event_type());
        };

        // the front end may already be gone during shutdown
        let _ = self.updates.send(update);
        Ok(())
    }
}
