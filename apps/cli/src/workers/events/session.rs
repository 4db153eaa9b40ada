//! What the session reports back to the front end.

use std::sync::Arc;

use insightcast_core::{
    DownloadOutcome, GenerationState, PlaybackState, PodcastError, events::EventHeader,
    impl_event,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Generating,
    Ready,
    Failed,
}

impl From<&GenerationState> for SessionPhase {
    fn from(state: &GenerationState) -> Self {
        match state {
            GenerationState::Idle => SessionPhase::Idle,
            GenerationState::Generating => SessionPhase::Generating,
            GenerationState::Ready(_) => SessionPhase::Ready,
            GenerationState::Failed(_) => SessionPhase::Failed,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct SessionChanged {
    pub header: EventHeader,
    pub phase: SessionPhase,
    /// Latest request issued, if any.
    pub request_id: Option<u64>,
    pub failure: Option<String>,
    pub transcript: String,
    pub language: Option<String>,
    pub playback: PlaybackState,
    pub is_downloading: bool,
    pub notice: Option<String>,
}

impl SessionChanged {
    pub const EVENT_TYPE: &'static str = "session.changed";

    /// The generation failure, verbatim, when the session ended up `Failed`.
    pub fn generation_error(&self) -> Option<PodcastError> {
        (self.phase == SessionPhase::Failed)
            .then(|| PodcastError::GenerationFailed(self.failure.clone().unwrap_or_default()))
    }
}

impl_event!(SessionChanged);

#[derive(Clone, Serialize)]
pub struct DownloadSettled {
    pub header: EventHeader,
    pub summary: String,
    #[serde(skip)]
    pub outcome: Arc<insightcast_core::Result<DownloadOutcome>>,
}

impl DownloadSettled {
    pub const EVENT_TYPE: &'static str = "podcast.download_settled";

    pub fn new(parent: Uuid, outcome: insightcast_core::Result<DownloadOutcome>) -> Self {
        let summary = match &outcome {
            Ok(DownloadOutcome::Saved(path)) => format!("saved to {}", path.display()),
            Ok(DownloadOutcome::OpenedExternally(url)) => format!("opened {url}"),
            Ok(DownloadOutcome::AlreadyInProgress) => "already in progress".to_string(),
            Err(e) => e.to_string(),
        };
        Self {
            header: EventHeader::child_of(parent),
            summary,
            outcome: Arc::new(outcome),
        }
    }
}

impl_event!(DownloadSettled);

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(phase: SessionPhase, failure: Option<&str>) -> SessionChanged {
        SessionChanged {
            header: EventHeader::root(),
            phase,
            request_id: Some(1),
            failure: failure.map(str::to_string),
            transcript: String::new(),
            language: None,
            playback: PlaybackState::default(),
            is_downloading: false,
            notice: None,
        }
    }

    #[test]
    fn failed_session_carries_the_message_verbatim() {
        let err = changed(SessionPhase::Failed, Some("Authentication required"))
            .generation_error()
            .unwrap();
        assert!(matches!(err, PodcastError::GenerationFailed(_)));
        assert_eq!(err.to_string(), "Authentication required");
    }

    #[test]
    fn other_phases_have_no_generation_error() {
        assert!(changed(SessionPhase::Ready, None).generation_error().is_none());
        assert!(changed(SessionPhase::Idle, Some("stale")).generation_error().is_none());
    }
}
