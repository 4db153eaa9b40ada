pub mod api;
pub mod config;
pub mod download;
pub mod error;
pub mod events;
pub mod format;
pub mod generation;
pub mod playback;
pub mod queues;
pub mod resource;
pub mod routes;
pub mod session;
pub mod types;
pub mod workers;

pub use api::PodcastApi;
pub use config::ApiConfig;
pub use download::{DownloadController, DownloadOutcome};
pub use error::{PodcastError, Result};
pub use format::{download_file_name, format_clock};
pub use generation::{
    GenerationController, GenerationDispatcher, GenerationFailure, GenerationSignals,
    GenerationState,
};
pub use playback::{MediaElement, MediaEvent, PlaybackController, PlaybackState};
pub use resource::{AccessUrl, AudioResourceManager, ResourceHandle};
pub use session::PodcastSession;
pub use types::{
    AudioPayload, AudioSource, GenerationRequest, GenerationResult, LanguageCode, PodcastLength,
    SourceContentRef,
};
