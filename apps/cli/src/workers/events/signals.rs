//! The generation source's three signals, plus the request that starts it.
//!
//! Each signal is published on its own event type so subscribers can keep only
//! the latest value of each.

use insightcast_core::{
    events::EventHeader,
    generation::GenerationFailure,
    impl_event,
    types::{GenerationRequest, GenerationResult},
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Serialize)]
pub struct GenerationDispatched {
    pub header: EventHeader,
    pub request: GenerationRequest,
}

impl GenerationDispatched {
    pub const EVENT_TYPE: &'static str = "podcast.generation_dispatched";

    pub fn new(request: GenerationRequest) -> Self {
        Self {
            header: EventHeader::root(),
            request,
        }
    }
}

impl_event!(GenerationDispatched);

#[derive(Clone, Serialize)]
pub struct PodcastGeneratingChanged {
    pub header: EventHeader,
    pub request_id: Option<u64>,
    pub is_generating: bool,
}

impl PodcastGeneratingChanged {
    pub const EVENT_TYPE: &'static str = "podcast.generating";

    pub fn new(parent: Uuid, request_id: Option<u64>, is_generating: bool) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            request_id,
            is_generating,
        }
    }
}

impl_event!(PodcastGeneratingChanged);

#[derive(Clone, Serialize)]
pub struct PodcastResultChanged {
    pub header: EventHeader,
    pub result: Option<GenerationResult>,
}

impl PodcastResultChanged {
    pub const EVENT_TYPE: &'static str = "podcast.result";

    pub fn new(parent: Uuid, result: Option<GenerationResult>) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            result,
        }
    }
}

impl_event!(PodcastResultChanged);

#[derive(Clone, Serialize)]
pub struct PodcastErrorChanged {
    pub header: EventHeader,
    pub error: Option<GenerationFailure>,
}

impl PodcastErrorChanged {
    pub const EVENT_TYPE: &'static str = "podcast.error";

    pub fn new(parent: Uuid, error: Option<GenerationFailure>) -> Self {
        Self {
            header: EventHeader::child_of(parent),
            error,
        }
    }
}

impl_event!(PodcastErrorChanged);
