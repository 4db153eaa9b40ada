//! Ownership of generated audio.
//!
//! An [`AccessUrl`] is a process-local, revocable address for an [`AudioPayload`],
//! the analogue of a browser object URL. The [`AudioResourceManager`] hands them out
//! and keeps at most one *current* URL. A [`ResourceHandle`] wraps one allocation
//! and revokes it when the last clone is dropped, so a download that still holds a
//! clone keeps the payload readable after the handle has been superseded.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;
use tracing::{debug, error, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    error::{PodcastError, Result},
    types::{AudioPayload, AudioSource, GenerationResult, LanguageCode},
};

const OBJECT_URL_SCHEME: &str = "blob:insightcast/";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AccessUrl(String);

impl AccessUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for URLs minted by [`AudioResourceManager`], false for remote ones.
    pub fn is_object_url(&self) -> bool {
        self.0.starts_with(OBJECT_URL_SCHEME)
    }
}

impl From<&Url> for AccessUrl {
    fn from(url: &Url) -> Self {
        AccessUrl(url.to_string())
    }
}

impl fmt::Display for AccessUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceStats {
    pub allocated: u64,
    pub revoked: u64,
    pub live: usize,
}

#[derive(Default)]
struct ManagerState {
    current: Option<AccessUrl>,
    live: HashMap<AccessUrl, AudioPayload>,
}

#[derive(Default)]
pub struct AudioResourceManager {
    state: Mutex<ManagerState>,
    allocated_total: AtomicU64,
    revoked_total: AtomicU64,
}

impl AudioResourceManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mint a URL for `payload` and make it the current one.
    ///
    /// Fails if the previous current URL was never retired or revoked.
    pub fn allocate(&self, payload: AudioPayload) -> Result<AccessUrl> {
        let mut state = self.state.lock().expect("AudioResourceManager poisoned");
        let url = AccessUrl(format!("{OBJECT_URL_SCHEME}{}", Uuid::new_v4()));

        if let Some(live) = &state.current {
            error!(live = %live, attempted = %url, "second object URL allocated without revoking the first");
            return Err(PodcastError::ResourceInvariantViolation {
                live: live.clone(),
                attempted: url.0,
            });
        }

        debug!(url = %url, bytes = payload.len(), "allocated object URL");
        state.live.insert(url.clone(), payload);
        state.current = Some(url.clone());
        self.allocated_total.fetch_add(1, Ordering::Relaxed);
        Ok(url)
    }

    /// Stop treating `url` as current. Its payload stays readable until revoked.
    pub fn retire(&self, url: &AccessUrl) {
        let mut state = self.state.lock().expect("AudioResourceManager poisoned");
        if state.current.as_ref() == Some(url) {
            debug!(url = %url, "retired object URL");
            state.current = None;
        }
    }

    /// Release `url`. Returns false if it was not live.
    pub fn revoke(&self, url: &AccessUrl) -> bool {
        let mut state = self.state.lock().expect("AudioResourceManager poisoned");
        if state.current.as_ref() == Some(url) {
            state.current = None;
        }
        if state.live.remove(url).is_none() {
            warn!(url = %url, "revoke of an object URL that is not live");
            return false;
        }
        self.revoked_total.fetch_add(1, Ordering::Relaxed);
        debug!(url = %url, "revoked object URL");
        true
    }

    /// Read the payload behind `url` without copying it.
    pub fn resolve(&self, url: &AccessUrl) -> Option<AudioPayload> {
        self.state
            .lock()
            .expect("AudioResourceManager poisoned")
            .live
            .get(url)
            .cloned()
    }

    pub fn is_live(&self, url: &AccessUrl) -> bool {
        self.state
            .lock()
            .expect("AudioResourceManager poisoned")
            .live
            .contains_key(url)
    }

    pub fn current(&self) -> Option<AccessUrl> {
        self.state
            .lock()
            .expect("AudioResourceManager poisoned")
            .current
            .clone()
    }

    pub fn stats(&self) -> ResourceStats {
        let live = self
            .state
            .lock()
            .expect("AudioResourceManager poisoned")
            .live
            .len();
        ResourceStats {
            allocated: self.allocated_total.load(Ordering::Relaxed),
            revoked: self.revoked_total.load(Ordering::Relaxed),
            live,
        }
    }
}

struct LiveResource {
    access_url: AccessUrl,
    payload: Option<AudioPayload>,
    remote_url: Option<Url>,
    transcript: String,
    duration_seconds: f64,
    format: String,
    language: LanguageCode,
    owner: Option<Arc<AudioResourceManager>>,
}

impl Drop for LiveResource {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.revoke(&self.access_url);
        }
    }
}

/// One generated podcast. Clones are leases on the same allocation.
#[derive(Clone)]
pub struct ResourceHandle {
    inner: Arc<LiveResource>,
}

impl ResourceHandle {
    /// Build a handle from a successful result, allocating an object URL for inline payloads.
    pub fn from_result(
        manager: &Arc<AudioResourceManager>,
        result: &GenerationResult,
    ) -> Result<Self> {
        let source = result.source.as_ref().ok_or(PodcastError::NoResource)?;

        let (access_url, payload, remote_url, owner) = match source {
            AudioSource::Payload(payload) => {
                let url = manager.allocate(payload.clone())?;
                (url, Some(payload.clone()), None, Some(Arc::clone(manager)))
            }
            AudioSource::Remote(url) => (AccessUrl::from(url), None, Some(url.clone()), None),
        };

        Ok(Self {
            inner: Arc::new(LiveResource {
                access_url,
                payload,
                remote_url,
                transcript: result.transcript.clone(),
                duration_seconds: result.duration_seconds.max(0.0),
                format: result.format.clone(),
                language: result.language.clone(),
                owner,
            }),
        })
    }

    pub fn access_url(&self) -> &AccessUrl {
        &self.inner.access_url
    }

    pub fn payload(&self) -> Option<&AudioPayload> {
        self.inner.payload.as_ref()
    }

    pub fn remote_url(&self) -> Option<&Url> {
        self.inner.remote_url.as_ref()
    }

    pub fn transcript(&self) -> &str {
        &self.inner.transcript
    }

    /// Duration reported by the server. The media element may later report a fresher one.
    pub fn duration_seconds(&self) -> f64 {
        self.inner.duration_seconds
    }

    pub fn format(&self) -> &str {
        &self.inner.format
    }

    pub fn language(&self) -> &LanguageCode {
        &self.inner.language
    }

    /// Number of outstanding clones, including this one.
    pub fn lease_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Give up this lease after detaching the URL from the current slot.
    ///
    /// The URL is revoked now if this was the last lease, otherwise when the last one drops.
    pub fn retire(self) {
        if let Some(owner) = &self.inner.owner {
            owner.retire(&self.inner.access_url);
        }
        if self.lease_count() > 1 {
            debug!(
                url = %self.inner.access_url,
                leases = self.lease_count() - 1,
                "revocation deferred until outstanding leases settle"
            );
        }
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("access_url", &self.inner.access_url)
            .field("payload", &self.inner.payload)
            .field("duration_seconds", &self.inner.duration_seconds)
            .finish()
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
