use std::sync::Arc;

use insightcast_core::{
    PodcastSession,
    events::{EnrichedEvent, Event, EventBus, EventHeader, downcast_ref, expect},
    generation::{GenerationDispatcher, GenerationSignals},
    playback::MediaEvent,
    queues::QueueKind,
    types::GenerationRequest,
    workers::{InputSpec, SnapshotUpdate, SubscriptionSpec, Worker},
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    headless::HeadlessElement,
    workers::events::{
        DownloadRequested, DownloadSettled, GenerationDispatched, MediaEnded, MediaMetadataLoaded,
        MediaTimeUpdated, PlaybackToggleRequested, PodcastErrorChanged, PodcastGeneratingChanged,
        PodcastRequested, PodcastResultChanged, SeekRequested, SessionChanged,
        SessionResetRequested, media_event,
    },
};

/// Hands generation requests to whichever worker talks to the backend.
pub struct BusDispatcher {
    bus: Arc<EventBus>,
}

impl BusDispatcher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

impl GenerationDispatcher for BusDispatcher {
    fn dispatch(&self, request: GenerationRequest) {
        self.bus.publish(Arc::new(GenerationDispatched::new(request)));
    }
}

/// Owns the podcast session and keeps it in step with signals, media events and user commands.
pub struct PodcastSessionWorker {
    session: PodcastSession<HeadlessElement>,
    signals: GenerationSignals,
    selection: Option<String>,
}

impl PodcastSessionWorker {
    pub fn new(session: PodcastSession<HeadlessElement>) -> Self {
        Self {
            session,
            signals: GenerationSignals::default(),
            selection: None,
        }
    }

    /// Merge one signal into the running snapshot. Returns false for non-signal events.
    fn fold_signal(&mut self, event: &Arc<dyn Event>) -> bool {
        if let Some(e) = downcast_ref::<PodcastGeneratingChanged>(event) {
            self.signals.is_generating = e.is_generating;
        } else if let Some(e) = downcast_ref::<PodcastResultChanged>(event) {
            self.signals.result = e.result.clone();
        } else if let Some(e) = downcast_ref::<PodcastErrorChanged>(event) {
            self.signals.external_error = e.error.clone();
        } else {
            return false;
        }
        true
    }

    fn on_request(&mut self, request: &PodcastRequested) {
        if self.selection.as_deref() != Some(request.source.selected_text.as_str()) {
            // a new selection clears what the source reported for the old one
            self.signals = GenerationSignals::default();
            self.selection = Some(request.source.selected_text.clone());
        }
        self.session.set_source(request.source.clone());
        self.session.set_length(request.length);
        self.session.request_generation(request.language.clone());
    }

    fn start_download(&self, parent: Uuid, bus: &EventBus) {
        let download = self.session.download();
        let bus = bus.clone();
        tokio::spawn(async move {
            let outcome = download.await;
            bus.publish(Arc::new(DownloadSettled::new(parent, outcome)));
        });
    }

    /// Forward element events and publish the session as it now stands.
    fn report(&mut self, parent: Uuid, bus: &EventBus) {
        for event in self.session.playback_mut().element_mut().take_events() {
            bus.publish(media_event(event));
        }

        let state = self.session.generation_state();
        bus.publish(Arc::new(SessionChanged {
            header: EventHeader::child_of(parent),
            phase: state.into(),
            request_id: self.session.generation().latest_request_id(),
            failure: state.failure().map(str::to_string),
            transcript: self.session.transcript().to_string(),
            language: state.handle().map(|h| h.language().to_string()),
            playback: self.session.playback_state(),
            is_downloading: self.session.is_downloading(),
            notice: self.session.notice().map(str::to_string),
        }));
    }
}

impl Worker for PodcastSessionWorker {
    const SUBSCRIBER_ID: &'static str = "podcast.session";

    fn subscription() -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![
                InputSpec::latest(PodcastGeneratingChanged::EVENT_TYPE),
                InputSpec::latest(PodcastResultChanged::EVENT_TYPE),
                InputSpec::latest(PodcastErrorChanged::EVENT_TYPE),
                InputSpec::latest(MediaTimeUpdated::EVENT_TYPE),
                InputSpec::fifo(PodcastRequested::EVENT_TYPE, 4),
                InputSpec::fifo(MediaMetadataLoaded::EVENT_TYPE, 4),
                InputSpec::fifo(MediaEnded::EVENT_TYPE, 4),
                InputSpec::fifo(PlaybackToggleRequested::EVENT_TYPE, 4),
                InputSpec::fifo(SeekRequested::EVENT_TYPE, 8),
                InputSpec::fifo(SessionResetRequested::EVENT_TYPE, 2),
                InputSpec::fifo(DownloadSettled::EVENT_TYPE, 4),
                InputSpec {
                    event_type: DownloadRequested::EVENT_TYPE,
                    queue_kind: QueueKind::BoundedDropNewest { capacity: 1 },
                },
            ],
        }
    }

    /// Signals changed together are reconciled together.
    async fn handle_snapshots(
        &mut self,
        updates: Vec<SnapshotUpdate>,
        bus: &EventBus,
    ) -> anyhow::Result<()> {
        let mut signals_changed = false;
        let mut ticked = false;
        for update in &updates {
            if update.event_type == MediaTimeUpdated::EVENT_TYPE {
                ticked = true;
            } else {
                signals_changed |= self.fold_signal(&update.event.event);
            }
        }

        if signals_changed {
            self.session.apply_signals(&self.signals)?;
        }
        if ticked && self.session.playback().element().is_playing() {
            self.session.playback_mut().element_mut().poll();
            self.session.on_media_event(MediaEvent::TimeUpdate);
        }

        if let Some(last) = updates.last() {
            self.report(last.event.event.event_id(), bus);
        }
        Ok(())
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let parent = event.event.event_id();

        match event.event.event_type() {
            PodcastRequested::EVENT_TYPE => {
                let request = expect::<PodcastRequested>(&event.event, PodcastRequested::EVENT_TYPE)?;
                self.on_request(request);
            }
            MediaMetadataLoaded::EVENT_TYPE => {
                self.session.on_media_event(MediaEvent::MetadataLoaded)
            }
            MediaEnded::EVENT_TYPE => self.session.on_media_event(MediaEvent::Ended),
            PlaybackToggleRequested::EVENT_TYPE => {
                let playing = self.session.toggle_play_pause()?;
                debug!(playing, "transport toggled");
            }
            SeekRequested::EVENT_TYPE => {
                let seek = expect::<SeekRequested>(&event.event, SeekRequested::EVENT_TYPE)?;
                self.session.seek(seek.fraction);
            }
            SessionResetRequested::EVENT_TYPE => self.session.reset(),
            DownloadRequested::EVENT_TYPE => self.start_download(parent, bus),
            DownloadSettled::EVENT_TYPE => {
                let settled = expect::<DownloadSettled>(&event.event, DownloadSettled::EVENT_TYPE)?;
                self.session.note_download(&settled.outcome);
            }
            other => anyhow::bail!("unexpected event_type={other}"),
        }

        self.report(parent, bus);
        Ok(())
    }
}
