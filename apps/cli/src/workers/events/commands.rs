//! Requests coming from the user.

use insightcast_core::{
    events::EventHeader,
    impl_event,
    types::{LanguageCode, PodcastLength, SourceContentRef},
};
use serde::Serialize;

#[derive(Clone, Serialize)]
pub struct PodcastRequested {
    pub header: EventHeader,
    pub language: LanguageCode,
    pub length: PodcastLength,
    pub source: SourceContentRef,
}

impl PodcastRequested {
    pub const EVENT_TYPE: &'static str = "podcast.requested";

    pub fn new(language: LanguageCode, length: PodcastLength, source: SourceContentRef) -> Self {
        Self {
            header: EventHeader::root(),
            language,
            length,
            source,
        }
    }
}

impl_event!(PodcastRequested);

#[derive(Clone, Serialize)]
pub struct DownloadRequested {
    pub header: EventHeader,
}

impl DownloadRequested {
    pub const EVENT_TYPE: &'static str = "podcast.download_requested";

    pub fn new() -> Self {
        Self {
            header: EventHeader::root(),
        }
    }
}

impl_event!(DownloadRequested);

#[derive(Clone, Serialize)]
pub struct PlaybackToggleRequested {
    pub header: EventHeader,
}

impl PlaybackToggleRequested {
    pub const EVENT_TYPE: &'static str = "playback.toggle_requested";

    pub fn new() -> Self {
        Self {
            header: EventHeader::root(),
        }
    }
}

impl_event!(PlaybackToggleRequested);

#[derive(Clone, Serialize)]
pub struct SeekRequested {
    pub header: EventHeader,
    pub fraction: f64,
}

impl SeekRequested {
    pub const EVENT_TYPE: &'static str = "playback.seek_requested";

    pub fn new(fraction: f64) -> Self {
        Self {
            header: EventHeader::root(),
            fraction,
        }
    }
}

impl_event!(SeekRequested);

#[derive(Clone, Serialize)]
pub struct SessionResetRequested {
    pub header: EventHeader,
}

impl SessionResetRequested {
    pub const EVENT_TYPE: &'static str = "session.reset_requested";

    pub fn new() -> Self {
        Self {
            header: EventHeader::root(),
        }
    }
}

impl_event!(SessionResetRequested);
