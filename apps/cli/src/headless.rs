//! A media element with no audio device: a clock that runs while "playing".

use std::{io::Cursor, sync::Arc};

use insightcast_core::{
    AccessUrl, AudioResourceManager, MediaElement, MediaEvent, PodcastError, Result,
};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Length of a WAV file in seconds, read from its header.
pub fn wav_duration(bytes: &[u8]) -> Option<f64> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}

pub struct HeadlessElement {
    manager: Arc<AudioResourceManager>,
    source: Option<AccessUrl>,
    duration: Option<f64>,
    offset: f64,
    started: Option<Instant>,
    pending: Vec<MediaEvent>,
}

impl HeadlessElement {
    pub fn new(manager: Arc<AudioResourceManager>) -> Self {
        Self {
            manager,
            source: None,
            duration: None,
            offset: 0.0,
            started: None,
            pending: Vec::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    /// Check the clock. Reaching the end stops, rewinds and queues `Ended`.
    pub fn poll(&mut self) {
        let Some(duration) = self.duration else {
            return;
        };
        if self.is_playing() && self.current_time() >= duration {
            self.started = None;
            self.offset = 0.0;
            self.pending.push(MediaEvent::Ended);
        }
    }

    /// Events emitted since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<MediaEvent> {
        std::mem::take(&mut self.pending)
    }
}

impl MediaElement for HeadlessElement {
    fn set_source(&mut self, url: Option<&AccessUrl>) {
        self.started = None;
        self.offset = 0.0;
        self.duration = None;
        self.source = url.cloned();

        let Some(url) = url else {
            return;
        };
        match self.manager.resolve(url).and_then(|p| wav_duration(p.as_slice())) {
            Some(duration) => {
                debug!(%url, duration, "measured podcast length");
                self.duration = Some(duration);
                self.pending.push(MediaEvent::MetadataLoaded);
            }
            None => warn!(%url, "could not read audio metadata"),
        }
    }

    fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            return Err(PodcastError::Media("no source loaded".to_string()));
        }
        if self.duration.is_some_and(|d| self.offset >= d) {
            self.offset = 0.0;
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.offset = self.current_time();
        self.started = None;
    }

    fn current_time(&self) -> f64 {
        let elapsed = self
            .started
            .map(|s| s.elapsed().as_secs_f64())
            .unwrap_or_default();
        let position = self.offset + elapsed;
        match self.duration {
            Some(d) => position.min(d),
            None => position,
        }
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.offset = seconds.max(0.0);
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}
