use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::Result,
    resource::{AudioResourceManager, ResourceHandle},
    types::{
        AudioSource, GenerationRequest, GenerationResult, LanguageCode, PodcastLength,
        SourceContentRef,
    },
};

/// Lifecycle of the podcast being synthesised. Exactly one is current.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating,
    Ready(ResourceHandle),
    Failed(String),
}

impl GenerationState {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationState::Idle => "idle",
            GenerationState::Generating => "generating",
            GenerationState::Ready(_) => "ready",
            GenerationState::Failed(_) => "failed",
        }
    }

    pub fn handle(&self) -> Option<&ResourceHandle> {
        match self {
            GenerationState::Ready(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            GenerationState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Error signal raised by the generation source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationFailure {
    pub request_id: Option<u64>,
    pub message: String,
}

impl GenerationFailure {
    pub fn new(request_id: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            request_id,
            message: message.into(),
        }
    }
}

/// Snapshot of the three externally owned signals.
#[derive(Clone, Debug, Default)]
pub struct GenerationSignals {
    pub is_generating: bool,
    pub result: Option<GenerationResult>,
    pub external_error: Option<GenerationFailure>,
}

/// Where a result's audio lives, compared by buffer address rather than content.
#[derive(Clone, Debug, PartialEq)]
enum SourceKey {
    Payload { addr: usize, len: usize },
    Remote(Url),
}

/// Identity of a result, used so the same result is never adopted twice.
#[derive(Clone, Debug, PartialEq)]
struct ResultKey {
    request_id: Option<u64>,
    file_size: u64,
    source: Option<SourceKey>,
}

impl ResultKey {
    fn of(result: &GenerationResult) -> Self {
        let source = result.source.as_ref().map(|source| match source {
            AudioSource::Payload(payload) => SourceKey::Payload {
                addr: payload.as_slice().as_ptr() as usize,
                len: payload.len(),
            },
            AudioSource::Remote(url) => SourceKey::Remote(url.clone()),
        });
        Self {
            request_id: result.request_id,
            file_size: result.file_size,
            source,
        }
    }
}

/// Bookkeeping the reducer needs besides the current state.
#[derive(Clone, Debug, Default)]
pub struct ReconcileContext {
    latest_request_id: Option<u64>,
    applied: Option<ResultKey>,
}

impl ReconcileContext {
    fn is_stale(&self, request_id: Option<u64>) -> bool {
        matches!((request_id, self.latest_request_id), (Some(id), Some(latest)) if id < latest)
    }

    fn already_applied(&self, result: &GenerationResult) -> bool {
        self.applied.as_ref() == Some(&ResultKey::of(result))
    }
}

/// What a signal batch asks the controller to do.
#[derive(Clone, Debug, PartialEq)]
pub enum Reconciliation {
    Fail(String),
    Adopt(GenerationResult),
    BeginGenerating,
    Keep,
}

/// Pure signal reducer, highest precedence first: error, fresh result, in-flight flag.
pub fn reconcile(
    current: &GenerationState,
    signals: &GenerationSignals,
    ctx: &ReconcileContext,
) -> Reconciliation {
    if let Some(failure) = &signals.external_error {
        if ctx.is_stale(failure.request_id) {
            debug!(request_id = ?failure.request_id, "ignoring error from superseded request");
        } else {
            return Reconciliation::Fail(failure.message.clone());
        }
    }

    if let Some(result) = &signals.result {
        if result.is_usable() {
            if ctx.is_stale(result.request_id) {
                warn!(
                    request_id = ?result.request_id,
                    latest = ?ctx.latest_request_id,
                    "discarding stale generation result"
                );
            } else if ctx.already_applied(result) {
                // the adopted result still outranks the in-flight flag
                if matches!(current, GenerationState::Ready(_)) {
                    return Reconciliation::Keep;
                }
            } else {
                return Reconciliation::Adopt(result.clone());
            }
        }
    }

    if signals.is_generating && !matches!(current, GenerationState::Generating) {
        return Reconciliation::BeginGenerating;
    }

    Reconciliation::Keep
}

/// Issues generation requests on behalf of the controller.
pub trait GenerationDispatcher: Send + Sync {
    fn dispatch(&self, request: GenerationRequest);
}

pub struct GenerationController {
    state: GenerationState,
    ctx: ReconcileContext,
    manager: Arc<AudioResourceManager>,
    dispatcher: Arc<dyn GenerationDispatcher>,
    source: SourceContentRef,
    length: PodcastLength,
    next_request_id: u64,
}

impl GenerationController {
    pub fn new(manager: Arc<AudioResourceManager>, dispatcher: Arc<dyn GenerationDispatcher>) -> Self {
        Self {
            state: GenerationState::Idle,
            ctx: ReconcileContext::default(),
            manager,
            dispatcher,
            source: SourceContentRef::default(),
            length: PodcastLength::default(),
            next_request_id: 1,
        }
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn handle(&self) -> Option<&ResourceHandle> {
        self.state.handle()
    }

    pub fn transcript(&self) -> &str {
        self.handle().map(|h| h.transcript()).unwrap_or_default()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.handle().map(|h| h.duration_seconds()).unwrap_or(0.0)
    }

    pub fn manager(&self) -> &Arc<AudioResourceManager> {
        &self.manager
    }

    pub fn latest_request_id(&self) -> Option<u64> {
        self.ctx.latest_request_id
    }

    pub fn set_source(&mut self, source: SourceContentRef) {
        self.source = source;
    }

    pub fn set_length(&mut self, length: PodcastLength) {
        self.length = length;
    }

    /// Evaluate one batch of signals. Returns true if the state changed.
    ///
    /// `detach` runs for a handle right before it is invalidated, so anything still
    /// pointing at its URL can let go first.
    pub fn update<F>(&mut self, signals: &GenerationSignals, mut detach: F) -> Result<bool>
    where
        F: FnMut(&ResourceHandle),
    {
        match reconcile(&self.state, signals, &self.ctx) {
            Reconciliation::Fail(reason) => {
                if self.state.failure() == Some(reason.as_str()) {
                    return Ok(false);
                }
                self.invalidate(&mut detach);
                self.transition(GenerationState::Failed(reason));
                Ok(true)
            }
            Reconciliation::Adopt(result) => {
                self.invalidate(&mut detach);
                self.ctx.applied = Some(ResultKey::of(&result));
                let handle = match ResourceHandle::from_result(&self.manager, &result) {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!(error = %e, state = self.state.label(), "result not adopted");
                        return Err(e);
                    }
                };
                info!(
                    url = %handle.access_url(),
                    duration = handle.duration_seconds(),
                    transcript_chars = handle.transcript().len(),
                    "podcast ready"
                );
                self.transition(GenerationState::Ready(handle));
                Ok(true)
            }
            Reconciliation::BeginGenerating => {
                self.invalidate(&mut detach);
                self.transition(GenerationState::Generating);
                Ok(true)
            }
            Reconciliation::Keep => Ok(false),
        }
    }

    /// Issue a new request. A ready podcast is reset first; the state itself only
    /// moves once the source reports the request in flight.
    pub fn request_generation<F>(&mut self, language: LanguageCode, detach: F) -> GenerationRequest
    where
        F: FnMut(&ResourceHandle),
    {
        if matches!(self.state, GenerationState::Ready(_)) {
            self.reset(detach);
        }

        let request = GenerationRequest {
            request_id: self.next_request_id,
            language,
            source: self.source.clone(),
            length: self.length,
        };
        self.next_request_id += 1;
        self.ctx.latest_request_id = Some(request.request_id);

        info!(
            request_id = request.request_id,
            language = %request.language,
            "requesting podcast generation"
        );
        self.dispatcher.dispatch(request.clone());
        request
    }

    /// Drop the current podcast and return to `Idle`.
    pub fn reset<F>(&mut self, mut detach: F)
    where
        F: FnMut(&ResourceHandle),
    {
        self.invalidate(&mut detach);
        self.transition(GenerationState::Idle);
    }

    fn invalidate<F>(&mut self, detach: &mut F)
    where
        F: FnMut(&ResourceHandle),
    {
        let previous = std::mem::take(&mut self.state);
        if let GenerationState::Ready(handle) = previous {
            detach(&handle);
            handle.retire();
        } else {
            self.state = previous;
        }
    }

    fn transition(&mut self, next: GenerationState) {
        debug!(from = self.state.label(), to = next.label(), "generation state");
        self.state = next;
    }
}

impl Drop for GenerationController {
    fn drop(&mut self) {
        if let GenerationState::Ready(handle) = std::mem::take(&mut self.state) {
            handle.retire();
        }
    }
}
