use std::{fmt, str::FromStr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Languages offered by the generator. Anything else is passed to the backend untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LanguageCode {
    #[default]
    En,
    Es,
    Fr,
    De,
    Hi,
    Ja,
    Zh,
    Other(String),
}

impl LanguageCode {
    pub const SUPPORTED: [LanguageCode; 7] = [
        LanguageCode::En,
        LanguageCode::Es,
        LanguageCode::Fr,
        LanguageCode::De,
        LanguageCode::Hi,
        LanguageCode::Ja,
        LanguageCode::Zh,
    ];

    pub fn code(&self) -> &str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Es => "es",
            LanguageCode::Fr => "fr",
            LanguageCode::De => "de",
            LanguageCode::Hi => "hi",
            LanguageCode::Ja => "ja",
            LanguageCode::Zh => "zh",
            LanguageCode::Other(code) => code,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Es => "Spanish",
            LanguageCode::Fr => "French",
            LanguageCode::De => "German",
            LanguageCode::Hi => "Hindi",
            LanguageCode::Ja => "Japanese",
            LanguageCode::Zh => "Chinese",
            LanguageCode::Other(code) => code,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, LanguageCode::Other(_))
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => LanguageCode::En,
            "es" => LanguageCode::Es,
            "fr" => LanguageCode::Fr,
            "de" => LanguageCode::De,
            "hi" => LanguageCode::Hi,
            "ja" => LanguageCode::Ja,
            "zh" => LanguageCode::Zh,
            _ => LanguageCode::Other(code.to_string()),
        }
    }
}

impl From<String> for LanguageCode {
    fn from(code: String) -> Self {
        LanguageCode::from(code.as_str())
    }
}

impl From<LanguageCode> for String {
    fn from(lang: LanguageCode) -> Self {
        lang.code().to_string()
    }
}

impl FromStr for LanguageCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LanguageCode::from(s))
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Requested length preset, forwarded as the `duration` field of the request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodcastLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl PodcastLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodcastLength::Short => "short",
            PodcastLength::Medium => "medium",
            PodcastLength::Long => "long",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub pdf_name: Option<String>,
    #[serde(default)]
    pub pdf_id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Insight {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source_documents: Vec<SourceDocument>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// What the podcast is generated from: the user's selection plus the insights derived from it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceContentRef {
    pub document_id: Option<String>,
    pub selected_text: String,
    #[serde(default)]
    pub insights: Vec<Insight>,
}

/// One generation attempt. Never retried automatically.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: u64,
    pub language: LanguageCode,
    pub source: SourceContentRef,
    #[serde(default)]
    pub length: PodcastLength,
}

/// Opaque audio bytes. Cloning shares the buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct AudioPayload {
    bytes: Bytes,
    content_type: Option<String>,
}

impl AudioPayload {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for AudioPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioPayload")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Where the generated audio lives.
#[derive(Clone, Debug, PartialEq)]
pub enum AudioSource {
    Payload(AudioPayload),
    Remote(Url),
}

/// Settled outcome of a generation call, as delivered by the signal source.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationResult {
    /// Id of the request this answers. `None` when the source does not track ids.
    pub request_id: Option<u64>,
    pub success: bool,
    #[serde(skip_serializing)]
    pub source: Option<AudioSource>,
    pub transcript: String,
    pub duration_seconds: f64,
    pub format: String,
    pub language: LanguageCode,
    pub file_size: u64,
}

impl GenerationResult {
    pub fn from_payload(request_id: Option<u64>, payload: AudioPayload) -> Self {
        let file_size = payload.len() as u64;
        Self {
            request_id,
            success: true,
            source: Some(AudioSource::Payload(payload)),
            transcript: String::new(),
            duration_seconds: 0.0,
            format: "podcast".to_string(),
            language: LanguageCode::default(),
            file_size,
        }
    }

    pub fn from_remote(request_id: Option<u64>, url: Url) -> Self {
        Self {
            request_id,
            success: true,
            source: Some(AudioSource::Remote(url)),
            transcript: String::new(),
            duration_seconds: 0.0,
            format: "podcast".to_string(),
            language: LanguageCode::default(),
            file_size: 0,
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }

    pub fn with_duration(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    /// A result only counts as a success when it also carries audio.
    pub fn is_usable(&self) -> bool {
        self.success && self.source.is_some()
    }
}
