use std::{future::Future, sync::Arc};

use tracing::{debug, warn};

use crate::{
    download::{DownloadController, DownloadOutcome},
    error::{DOWNLOAD_FAILED_MESSAGE, PodcastError, Result},
    generation::{GenerationController, GenerationSignals, GenerationState},
    playback::{MediaElement, MediaEvent, PlaybackController, PlaybackState},
    types::{GenerationRequest, LanguageCode, PodcastLength, SourceContentRef},
};

/// Everything the view needs: generation lifecycle, transport and download gating.
pub struct PodcastSession<E: MediaElement> {
    generation: GenerationController,
    playback: PlaybackController<E>,
    downloads: Arc<DownloadController>,
    notice: Option<String>,
}

impl<E: MediaElement> PodcastSession<E> {
    pub fn new(
        generation: GenerationController,
        playback: PlaybackController<E>,
        downloads: Arc<DownloadController>,
    ) -> Self {
        Self {
            generation,
            playback,
            downloads,
            notice: None,
        }
    }

    pub fn generation_state(&self) -> &GenerationState {
        self.generation.state()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn is_downloading(&self) -> bool {
        self.downloads.is_downloading()
    }

    pub fn transcript(&self) -> &str {
        self.generation.transcript()
    }

    /// Last non-fatal problem worth showing, e.g. a failed download.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn generation(&self) -> &GenerationController {
        &self.generation
    }

    pub fn playback(&self) -> &PlaybackController<E> {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackController<E> {
        &mut self.playback
    }

    pub fn set_source(&mut self, source: SourceContentRef) {
        self.generation.set_source(source);
    }

    pub fn set_length(&mut self, length: PodcastLength) {
        self.generation.set_length(length);
    }

    /// Reconcile one batch of external signals and keep the element in step with it.
    pub fn apply_signals(&mut self, signals: &GenerationSignals) -> Result<bool> {
        let playback = &mut self.playback;
        let changed = self.generation.update(signals, |old| playback.detach(old))?;

        match self.generation.state() {
            GenerationState::Ready(handle) => self.playback.bind(handle),
            GenerationState::Generating => self.notice = None,
            GenerationState::Idle | GenerationState::Failed(_) => {}
        }
        Ok(changed)
    }

    pub fn request_generation(&mut self, language: LanguageCode) -> GenerationRequest {
        let playback = &mut self.playback;
        self.generation
            .request_generation(language, |old| playback.detach(old))
    }

    pub fn reset(&mut self) {
        let playback = &mut self.playback;
        self.generation.reset(|old| playback.detach(old));
        self.playback.unbind();
        self.notice = None;
    }

    pub fn toggle_play_pause(&mut self) -> Result<bool> {
        self.playback.toggle_play_pause()
    }

    pub fn seek(&mut self, fraction: f64) {
        self.playback.seek(fraction);
    }

    pub fn on_media_event(&mut self, event: MediaEvent) {
        self.playback.on_event(event);
    }

    /// Start a download of the current podcast.
    ///
    /// The returned future owns a lease on the podcast, so it can be spawned and
    /// outlive a subsequent regeneration or reset.
    pub fn download(&self) -> impl Future<Output = Result<DownloadOutcome>> + Send + 'static {
        let downloads = Arc::clone(&self.downloads);
        let lease = self.generation.handle().cloned();
        async move {
            match lease {
                Some(handle) => downloads.download(handle).await,
                None => Err(PodcastError::NoResource),
            }
        }
    }

    /// Record how a download ended so the view can surface failures.
    pub fn note_download(&mut self, outcome: &Result<DownloadOutcome>) {
        match outcome {
            Ok(outcome) => debug!(?outcome, "download settled"),
            Err(e) => {
                warn!(error = %e, "download failed");
                self.notice = Some(DOWNLOAD_FAILED_MESSAGE.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Mutex};

    use async_trait::async_trait;
    use tokio::sync::Notify;
    use url::Url;

    use super::*;
    use crate::{
        download::{AudioFetcher, ExternalOpener, SaveTarget},
        generation::{GenerationDispatcher, GenerationFailure},
        playback::tests::RecordingElement,
        resource::AudioResourceManager,
        types::{AudioPayload, GenerationResult},
    };

    #[derive(Default)]
    struct NullDispatcher;

    impl GenerationDispatcher for NullDispatcher {
        fn dispatch(&self, _request: GenerationRequest) {}
    }

    struct NoFetch;

    #[async_trait]
    impl AudioFetcher for NoFetch {
        async fn fetch_audio(&self, url: &Url) -> Result<AudioPayload> {
            panic!("unexpected fetch of {url}");
        }
    }

    /// Blocks every save until released, to hold a download open.
    #[derive(Default)]
    struct GatedSaver {
        gate: Notify,
        entered: Notify,
        saved: Mutex<usize>,
    }

    #[async_trait]
    impl SaveTarget for GatedSaver {
        async fn save(&self, file_name: &str, _payload: &AudioPayload) -> Result<PathBuf> {
            self.entered.notify_one();
            self.gate.notified().await;
            *self.saved.lock().unwrap() += 1;
            Ok(PathBuf::from(file_name))
        }
    }

    struct NoOpen;

    impl ExternalOpener for NoOpen {
        fn open(&self, _url: &Url) -> Result<()> {
            Ok(())
        }
    }

    fn session(saver: Arc<GatedSaver>) -> (PodcastSession<RecordingElement>, Arc<AudioResourceManager>) {
        let manager = AudioResourceManager::new();
        let generation = GenerationController::new(manager.clone(), Arc::new(NullDispatcher));
        let downloads = Arc::new(DownloadController::new(Arc::new(NoFetch), saver, Arc::new(NoOpen)));
        let session = PodcastSession::new(
            generation,
            PlaybackController::new(RecordingElement::default()),
            downloads,
        );
        (session, manager)
    }

    fn ready(request_id: u64, duration: f64) -> GenerationSignals {
        GenerationSignals {
            is_generating: false,
            result: Some(
                GenerationResult::from_payload(Some(request_id), AudioPayload::new(vec![5u8; 10]))
                    .with_duration(duration),
            ),
            external_error: None,
        }
    }

    #[test]
    fn ready_podcast_plays_and_rewinds_on_end() {
        let (mut s, _) = session(Arc::new(GatedSaver::default()));
        let request = s.request_generation(LanguageCode::En);
        s.apply_signals(&GenerationSignals {
            is_generating: true,
            ..Default::default()
        })
        .unwrap();
        s.apply_signals(&ready(request.request_id, 42.0)).unwrap();

        assert_eq!(s.generation_state().label(), "ready");
        assert_eq!(s.playback_state().duration_seconds, 42.0);
        assert!(s.playback().element().source.is_some());

        assert!(s.toggle_play_pause().unwrap());
        assert!(s.playback_state().is_playing);

        s.on_media_event(MediaEvent::Ended);
        assert!(!s.playback_state().is_playing);
        assert_eq!(s.playback_state().current_time_seconds, 0.0);
    }

    #[test]
    fn failure_detaches_the_element_before_revoking() {
        let (mut s, manager) = session(Arc::new(GatedSaver::default()));
        s.apply_signals(&ready(1, 10.0)).unwrap();
        s.toggle_play_pause().unwrap();
        let url = manager.current().unwrap();

        s.apply_signals(&GenerationSignals {
            external_error: Some(GenerationFailure::new(None, "Authentication required")),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(s.generation_state().failure(), Some("Authentication required"));
        assert!(s.playback().element().source.is_none());
        assert_eq!(s.playback_state(), PlaybackState::default());
        assert!(!manager.is_live(&url));
    }

    #[test]
    fn reset_returns_to_idle_and_clears_transport() {
        let (mut s, manager) = session(Arc::new(GatedSaver::default()));
        s.apply_signals(&ready(1, 10.0)).unwrap();
        s.seek(0.5);
        assert_eq!(s.playback_state().current_time_seconds, 5.0);

        s.reset();
        assert_eq!(s.generation_state(), &GenerationState::Idle);
        assert_eq!(s.playback_state(), PlaybackState::default());
        assert_eq!(manager.stats().live, 0);
        assert_eq!(manager.stats().revoked, 1);
    }

    #[tokio::test]
    async fn download_without_podcast_reports_no_resource() {
        let (mut s, _) = session(Arc::new(GatedSaver::default()));
        let outcome = s.download().await;
        assert!(matches!(outcome, Err(PodcastError::NoResource)));
        s.note_download(&outcome);
        assert_eq!(s.notice(), Some(DOWNLOAD_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn regeneration_during_download_defers_revocation() {
        let saver = Arc::new(GatedSaver::default());
        let (mut s, manager) = session(saver.clone());
        let first = s.request_generation(LanguageCode::Fr);
        s.apply_signals(&ready(first.request_id, 10.0)).unwrap();
        let old_url = manager.current().unwrap();

        let download = tokio::spawn(s.download());
        saver.entered.notified().await;
        assert!(s.is_downloading());

        let second = s.request_generation(LanguageCode::De);
        s.apply_signals(&ready(second.request_id, 20.0)).unwrap();

        let new_url = manager.current().unwrap();
        assert_ne!(old_url, new_url);
        assert!(manager.is_live(&old_url), "old payload still being read");
        assert_eq!(s.playback().source(), Some(&new_url));

        saver.gate.notify_one();
        let outcome = download.await.unwrap().unwrap();
        assert!(matches!(outcome, DownloadOutcome::Saved(_)));
        assert!(!manager.is_live(&old_url));
        assert!(manager.is_live(&new_url));
        assert_eq!(manager.stats().live, 1);
        assert!(!s.is_downloading());
    }
}
