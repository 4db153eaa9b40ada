use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    error::Result,
    resource::{AccessUrl, ResourceHandle},
};

/// Transport state shown to the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PlaybackState {
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
}

impl PlaybackState {
    /// Fraction of the track already played, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration_seconds > 0.0 {
            (self.current_time_seconds / self.duration_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Transport events a media element emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MediaEvent {
    TimeUpdate,
    MetadataLoaded,
    Ended,
}

/// The playback surface, e.g. an `<audio>` element or a headless clock.
pub trait MediaElement {
    fn set_source(&mut self, url: Option<&AccessUrl>);
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    /// Measured duration, `None` until metadata has loaded.
    fn duration(&self) -> Option<f64>;
}

pub struct PlaybackController<E: MediaElement> {
    element: E,
    state: PlaybackState,
    source: Option<AccessUrl>,
}

impl<E: MediaElement> PlaybackController<E> {
    pub fn new(element: E) -> Self {
        Self {
            element,
            state: PlaybackState::default(),
            source: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn source(&self) -> Option<&AccessUrl> {
        self.source.as_ref()
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut E {
        &mut self.element
    }

    /// Point the element at `handle`. Rebinding the same URL is a no-op.
    pub fn bind(&mut self, handle: &ResourceHandle) {
        if self.source.as_ref() == Some(handle.access_url()) {
            return;
        }
        self.unbind();

        debug!(url = %handle.access_url(), "binding media element");
        self.element.set_source(Some(handle.access_url()));
        self.source = Some(handle.access_url().clone());
        self.state = PlaybackState {
            current_time_seconds: 0.0,
            duration_seconds: handle.duration_seconds(),
            is_playing: false,
        };
    }

    /// Stop and rewind before clearing the source, so no event fires against a dead URL.
    pub fn unbind(&mut self) {
        let Some(url) = self.source.take() else {
            return;
        };

        self.element.pause();
        self.element.set_current_time(0.0);
        self.state.is_playing = false;
        self.state.current_time_seconds = 0.0;

        self.element.set_source(None);
        self.state.duration_seconds = 0.0;
        debug!(url = %url, "media element unbound");
    }

    /// Unbind only if the element currently plays `handle`.
    pub fn detach(&mut self, handle: &ResourceHandle) {
        if self.source.as_ref() == Some(handle.access_url()) {
            self.unbind();
        }
    }

    pub fn on_event(&mut self, event: MediaEvent) {
        if self.source.is_none() {
            trace!(?event, "dropping media event with no bound resource");
            return;
        }

        match event {
            MediaEvent::MetadataLoaded => {
                if let Some(duration) = self.element.duration().filter(|d| d.is_finite() && *d >= 0.0) {
                    debug!(duration, "media element reported duration");
                    self.state.duration_seconds = duration;
                    self.state.current_time_seconds =
                        self.state.current_time_seconds.min(duration);
                }
            }
            MediaEvent::TimeUpdate => {
                let position = self.element.current_time().max(0.0);
                self.state.current_time_seconds = if self.state.duration_seconds > 0.0 {
                    position.min(self.state.duration_seconds)
                } else {
                    position
                };
            }
            MediaEvent::Ended => {
                self.state.is_playing = false;
                self.state.current_time_seconds = 0.0;
            }
        }
    }

    /// Returns the new `is_playing`. Does nothing without a bound resource.
    pub fn toggle_play_pause(&mut self) -> Result<bool> {
        if self.source.is_none() {
            return Ok(false);
        }

        if self.state.is_playing {
            self.element.pause();
            self.state.is_playing = false;
        } else {
            self.element.play()?;
            self.state.is_playing = true;
        }
        Ok(self.state.is_playing)
    }

    /// Jump to `fraction` of the track. The scrubber is updated without waiting for a time update.
    pub fn seek(&mut self, fraction: f64) {
        if !fraction.is_finite() {
            return;
        }
        self.seek_to(fraction.clamp(0.0, 1.0) * self.state.duration_seconds);
    }

    pub fn seek_to(&mut self, seconds: f64) {
        if self.source.is_none() || self.state.duration_seconds <= 0.0 || !seconds.is_finite() {
            return;
        }
        let target = seconds.clamp(0.0, self.state.duration_seconds);
        self.element.set_current_time(target);
        self.state.current_time_seconds = target;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        error::PodcastError,
        resource::AudioResourceManager,
        types::{AudioPayload, GenerationResult},
    };

    /// Scripted element that records every call made on it.
    #[derive(Default)]
    pub(crate) struct RecordingElement {
        pub calls: Vec<String>,
        pub source: Option<AccessUrl>,
        pub position: f64,
        pub measured: Option<f64>,
        pub refuse_play: bool,
    }

    impl MediaElement for RecordingElement {
        fn set_source(&mut self, url: Option<&AccessUrl>) {
            self.calls.push(match url {
                Some(_) => "set_source".to_string(),
                None => "clear_source".to_string(),
            });
            self.source = url.cloned();
        }

        fn play(&mut self) -> Result<()> {
            if self.refuse_play {
                return Err(PodcastError::Media("play() rejected".into()));
            }
            self.calls.push("play".to_string());
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.push("pause".to_string());
        }

        fn current_time(&self) -> f64 {
            self.position
        }

        fn set_current_time(&mut self, seconds: f64) {
            self.calls.push(format!("seek:{seconds}"));
            self.position = seconds;
        }

        fn duration(&self) -> Option<f64> {
            self.measured
        }
    }

    fn handle(manager: &Arc<AudioResourceManager>, duration: f64) -> ResourceHandle {
        let result = GenerationResult::from_payload(Some(1), AudioPayload::new(vec![0u8; 4]))
            .with_duration(duration);
        ResourceHandle::from_result(manager, &result).unwrap()
    }

    #[test]
    fn toggle_without_resource_is_a_noop() {
        let mut p = PlaybackController::new(RecordingElement::default());
        assert!(!p.toggle_play_pause().unwrap());
        assert!(p.element().calls.is_empty());
    }

    #[test]
    fn play_then_ended_rewinds_to_start() {
        let manager = AudioResourceManager::new();
        let h = handle(&manager, 42.0);
        let mut p = PlaybackController::new(RecordingElement::default());
        p.bind(&h);
        assert_eq!(p.state().duration_seconds, 42.0);

        assert!(p.toggle_play_pause().unwrap());
        p.element_mut().position = 12.5;
        p.on_event(MediaEvent::TimeUpdate);
        assert_eq!(p.state().current_time_seconds, 12.5);

        p.on_event(MediaEvent::Ended);
        assert_eq!(
            p.state(),
            PlaybackState {
                current_time_seconds: 0.0,
                duration_seconds: 42.0,
                is_playing: false
            }
        );
    }

    #[test]
    fn measured_duration_overrides_server_value() {
        let manager = AudioResourceManager::new();
        let h = handle(&manager, 40.0);
        let mut p = PlaybackController::new(RecordingElement::default());
        p.bind(&h);

        p.element_mut().measured = Some(41.7);
        p.on_event(MediaEvent::MetadataLoaded);
        assert_eq!(p.state().duration_seconds, 41.7);

        p.element_mut().measured = Some(f64::NAN);
        p.on_event(MediaEvent::MetadataLoaded);
        assert_eq!(p.state().duration_seconds, 41.7);
    }

    #[test]
    fn seek_stays_within_bounds() {
        let manager = AudioResourceManager::new();
        let h = handle(&manager, 90.0);
        let mut p = PlaybackController::new(RecordingElement::default());
        p.bind(&h);

        for i in 0..=20 {
            let f = i as f64 / 20.0;
            p.seek(f);
            let s = p.state();
            assert!(s.current_time_seconds >= 0.0 && s.current_time_seconds <= s.duration_seconds);
            assert_eq!(s.current_time_seconds, f * 90.0);
            assert_eq!(p.element().position, s.current_time_seconds);
        }

        p.seek(1.7);
        assert_eq!(p.state().current_time_seconds, 90.0);
        p.seek(-0.3);
        assert_eq!(p.state().current_time_seconds, 0.0);
    }

    #[test]
    fn seek_without_duration_is_ignored() {
        let manager = AudioResourceManager::new();
        let h = handle(&manager, 0.0);
        let mut p = PlaybackController::new(RecordingElement::default());
        p.bind(&h);
        p.seek(0.5);
        assert_eq!(p.state().current_time_seconds, 0.0);
    }

    #[test]
    fn unbind_stops_before_clearing_source() {
        let manager = AudioResourceManager::new();
        let h = handle(&manager, 10.0);
        let mut p = PlaybackController::new(RecordingElement::default());
        p.bind(&h);
        p.toggle_play_pause().unwrap();
        p.element_mut().calls.clear();

        p.detach(&h);
        assert_eq!(p.element().calls, vec!["pause", "seek:0", "clear_source"]);
        assert_eq!(p.state(), PlaybackState::default());

        p.on_event(MediaEvent::Ended);
        p.on_event(MediaEvent::TimeUpdate);
        assert_eq!(p.state(), PlaybackState::default());
    }

    #[test]
    fn rejected_play_leaves_state_paused() {
        let manager = AudioResourceManager::new();
        let h = handle(&manager, 10.0);
        let mut p = PlaybackController::new(RecordingElement {
            refuse_play: true,
            ..Default::default()
        });
        p.bind(&h);
        assert!(p.toggle_play_pause().is_err());
        assert!(!p.state().is_playing);
    }
}
