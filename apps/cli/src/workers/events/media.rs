use std::sync::Arc;

use insightcast_core::{
    events::{Event, EventHeader},
    impl_event,
    playback::MediaEvent,
};
use serde::Serialize;

#[derive(Clone, Serialize)]
pub struct MediaTimeUpdated {
    pub header: EventHeader,
}

impl MediaTimeUpdated {
    pub const EVENT_TYPE: &'static str = "media.time_update";
}

impl_event!(MediaTimeUpdated);

#[derive(Clone, Serialize)]
pub struct MediaMetadataLoaded {
    pub header: EventHeader,
}

impl MediaMetadataLoaded {
    pub const EVENT_TYPE: &'static str = "media.metadata_loaded";
}

impl_event!(MediaMetadataLoaded);

#[derive(Clone, Serialize)]
pub struct MediaEnded {
    pub header: EventHeader,
}

impl MediaEnded {
    pub const EVENT_TYPE: &'static str = "media.ended";
}

impl_event!(MediaEnded);

/// Wrap an element event for the bus.
pub fn media_event(event: MediaEvent) -> Arc<dyn Event> {
    let header = EventHeader::root();
    match event {
        MediaEvent::TimeUpdate => Arc::new(MediaTimeUpdated { header }),
        MediaEvent::MetadataLoaded => Arc::new(MediaMetadataLoaded { header }),
        MediaEvent::Ended => Arc::new(MediaEnded { header }),
    }
}
