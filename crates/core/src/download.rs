//! Persisting a generated podcast to the user's device.
//!
//! Stages, each tried only when the previous one is unavailable or fails:
//! 1. save the in-memory payload,
//! 2. fetch the remote URL and save what comes back,
//! 3. hand the remote URL to the system opener.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    error::{PodcastError, Result},
    format::download_file_name,
    resource::ResourceHandle,
    types::AudioPayload,
};

#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Fetch `url` asking for audio content. Non-success statuses are errors.
    async fn fetch_audio(&self, url: &Url) -> Result<AudioPayload>;
}

#[async_trait]
pub trait SaveTarget: Send + Sync {
    async fn save(&self, file_name: &str, payload: &AudioPayload) -> Result<PathBuf>;
}

pub trait ExternalOpener: Send + Sync {
    fn open(&self, url: &Url) -> Result<()>;
}

/// Writes downloads into a directory.
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// The user's download directory, falling back to the cache directory, then `.`.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::cache_dir().map(|d| d.join("insightcast")))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[async_trait]
impl SaveTarget for DirectorySaver {
    async fn save(&self, file_name: &str, payload: &AudioPayload) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        fs::write(&path, payload.as_slice()).await?;
        Ok(path)
    }
}

/// Opens URLs with the platform's default handler.
pub struct SystemOpener;

impl ExternalOpener for SystemOpener {
    fn open(&self, url: &Url) -> Result<()> {
        open::that(url.as_str())?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(PathBuf),
    OpenedExternally(Url),
    /// Another download was still running; nothing was attempted.
    AlreadyInProgress,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DownloadController {
    fetcher: Arc<dyn AudioFetcher>,
    saver: Arc<dyn SaveTarget>,
    opener: Arc<dyn ExternalOpener>,
    downloading: AtomicBool,
}

impl DownloadController {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        saver: Arc<dyn SaveTarget>,
        opener: Arc<dyn ExternalOpener>,
    ) -> Self {
        Self {
            fetcher,
            saver,
            opener,
            downloading: AtomicBool::new(false),
        }
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::Acquire)
    }

    /// Run the fallback chain for `handle`.
    ///
    /// The handle is a lease: its URL stays live until this returns, even if a newer
    /// podcast replaces it meanwhile.
    pub async fn download(&self, handle: ResourceHandle) -> Result<DownloadOutcome> {
        let Some(_in_flight) = InFlight::acquire(&self.downloading) else {
            debug!("download already in progress");
            return Ok(DownloadOutcome::AlreadyInProgress);
        };

        let file_name = download_file_name(handle.payload().and_then(|p| p.content_type()));
        let mut cause: Option<PodcastError> = None;

        if let Some(payload) = handle.payload() {
            match self.saver.save(&file_name, payload).await {
                Ok(path) => {
                    info!(path = %path.display(), bytes = payload.len(), "podcast saved");
                    return Ok(DownloadOutcome::Saved(path));
                }
                Err(e) => {
                    warn!(error = %e, "saving in-memory podcast failed");
                    cause = Some(e);
                }
            }
        } else if let Some(url) = handle.remote_url() {
            match self.fetch_and_save(url, &file_name).await {
                Ok(path) => {
                    info!(path = %path.display(), %url, "podcast fetched and saved");
                    return Ok(DownloadOutcome::Saved(path));
                }
                Err(e) => {
                    warn!(error = %e, %url, "direct download failed, opening externally");
                    cause = Some(e);
                }
            }
        }

        if let Some(url) = handle.remote_url() {
            match self.opener.open(url) {
                Ok(()) => {
                    info!(%url, "podcast handed to the system opener");
                    return Ok(DownloadOutcome::OpenedExternally(url.clone()));
                }
                Err(e) => cause = Some(e),
            }
        }

        let cause = cause.map_or_else(|| "no downloadable source".to_string(), |e| e.to_string());
        error!(%cause, url = %handle.access_url(), "podcast download failed");
        Err(PodcastError::download_failed(cause))
    }

    async fn fetch_and_save(&self, url: &Url, file_name: &str) -> Result<PathBuf> {
        let payload = self.fetcher.fetch_audio(url).await?;
        let name = match payload.content_type() {
            Some(content_type) => download_file_name(Some(content_type)),
            None => file_name.to_string(),
        };
        self.saver.save(&name, &payload).await
    }
}
