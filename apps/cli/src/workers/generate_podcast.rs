use std::sync::Arc;

use insightcast_core::{
    PodcastApi,
    events::{EnrichedEvent, EventBus, expect},
    generation::GenerationFailure,
    queues::QueueKind,
    workers::{InputSpec, SubscriptionSpec, Worker},
};
use tracing::{info, warn};

use crate::workers::events::{
    GenerationDispatched, PodcastErrorChanged, PodcastGeneratingChanged, PodcastResultChanged,
};

pub const EMPTY_SELECTION_MESSAGE: &str = "Please select some text first to generate a podcast";

/// Calls the backend for each dispatched request and reports back through the three signals.
pub struct GeneratePodcastWorker {
    api: PodcastApi,
}

impl GeneratePodcastWorker {
    pub fn new(api: PodcastApi) -> Self {
        Self { api }
    }
}

impl Worker for GeneratePodcastWorker {
    const SUBSCRIBER_ID: &'static str = "podcast.generate";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec {
                event_type: GenerationDispatched::EVENT_TYPE,
                queue_kind: QueueKind::FifoDropOldest { capacity: 4 },
            }],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let dispatched =
            expect::<GenerationDispatched>(&event.event, GenerationDispatched::EVENT_TYPE)?;
        let request = &dispatched.request;
        let parent = dispatched.header.event_id;
        let request_id = Some(request.request_id);

        // a new attempt starts without the previous error
        bus.publish(Arc::new(PodcastErrorChanged::new(parent, None)));

        if request.source.selected_text.trim().is_empty() {
            warn!(request_id = request.request_id, "no text selected");
            bus.publish(Arc::new(PodcastErrorChanged::new(
                parent,
                Some(GenerationFailure::new(request_id, EMPTY_SELECTION_MESSAGE)),
            )));
            return Ok(());
        }

        bus.publish(Arc::new(PodcastGeneratingChanged::new(
            parent, request_id, true,
        )));

        match self.api.generate_audio(request).await {
            Ok(result) => {
                info!(
                    request_id = request.request_id,
                    bytes = result.file_size,
                    duration = result.duration_seconds,
                    "podcast audio generated"
                );
                bus.publish(Arc::new(PodcastResultChanged::new(parent, Some(result))));
            }
            Err(e) => {
                warn!(request_id = request.request_id, error = %e, "podcast generation failed");
                bus.publish(Arc::new(PodcastErrorChanged::new(
                    parent,
                    Some(GenerationFailure::new(request_id, e.to_string())),
                )));
            }
        }

        bus.publish(Arc::new(PodcastGeneratingChanged::new(
            parent, request_id, false,
        )));
        Ok(())
    }
}
