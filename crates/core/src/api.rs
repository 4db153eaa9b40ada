//! Backend client for podcast synthesis and audio fetches.

use async_trait::async_trait;
use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::{
    config::ApiConfig,
    download::AudioFetcher,
    error::{PodcastError, Result},
    types::{AudioPayload, GenerationRequest, GenerationResult, Insight, LanguageCode},
};

pub const GENERATE_AUDIO_PATH: &str = "/api/podcast/generate-audio";
pub const GENERATE_AUDIO_DEFAULT_ERROR: &str = "Failed to generate podcast audio";
pub const FETCH_AUDIO_DEFAULT_ERROR: &str = "Failed to fetch audio file";
pub const PODCAST_FORMAT: &str = "podcast";

#[derive(Debug, Serialize)]
struct PodcastSourceDocument {
    pdf_name: String,
    pdf_id: String,
    page: u32,
}

#[derive(Debug, Serialize)]
struct PodcastInsight {
    #[serde(rename = "type")]
    kind: String,
    title: String,
    content: String,
    source_documents: Vec<PodcastSourceDocument>,
    confidence: f64,
}

impl From<&Insight> for PodcastInsight {
    fn from(insight: &Insight) -> Self {
        Self {
            kind: insight
                .kind
                .clone()
                .unwrap_or_else(|| "key_takeaways".to_string()),
            title: insight.title.clone().unwrap_or_else(|| "Insight".to_string()),
            content: insight.content.clone().unwrap_or_default(),
            source_documents: insight
                .source_documents
                .iter()
                .map(|doc| PodcastSourceDocument {
                    pdf_name: doc.pdf_name.clone().unwrap_or_else(|| "Document".to_string()),
                    pdf_id: doc.pdf_id.clone().unwrap_or_default(),
                    page: doc.page.unwrap_or(1),
                })
                .collect(),
            confidence: insight
                .confidence
                .filter(|c| c.is_finite() && *c != 0.0)
                .unwrap_or(0.8),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateAudioBody<'a> {
    selected_text: &'a str,
    insights: Vec<PodcastInsight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<&'a str>,
    format: &'a str,
    duration: &'a str,
    language: &'a str,
}

/// Turn a failed response (or transport error) into the message shown to the user.
pub fn normalize_error(
    status: Option<StatusCode>,
    body: Option<&Value>,
    transport: Option<&str>,
    default_message: &str,
) -> String {
    let detail = body.and_then(|b| b.get("detail"));

    if status == Some(StatusCode::UNPROCESSABLE_ENTITY) {
        if let Some(items) = detail.and_then(Value::as_array) {
            return items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(Value::as_str)
                .unwrap_or("Validation error")
                .to_string();
        }
    }

    if status == Some(StatusCode::UNAUTHORIZED) {
        return "Authentication required".to_string();
    }

    if status.is_some_and(|s| s.is_server_error()) {
        return "Server error. Please try again later.".to_string();
    }

    detail
        .and_then(Value::as_str)
        .or_else(|| body.and_then(|b| b.get("message")).and_then(Value::as_str))
        .or(transport)
        .filter(|m| !m.is_empty())
        .unwrap_or(default_message)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct PodcastApi {
    http: Client,
    config: ApiConfig,
}

impl PodcastApi {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => req,
        }
    }

    /// Synthesize a podcast. The body is the audio; metadata travels in `x-*` headers.
    pub async fn generate_audio(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let url = self.config.endpoint(GENERATE_AUDIO_PATH)?;
        let body = GenerateAudioBody {
            selected_text: &request.source.selected_text,
            insights: request.source.insights.iter().map(PodcastInsight::from).collect(),
            document_id: request.source.document_id.as_deref(),
            format: PODCAST_FORMAT,
            duration: request.length.as_str(),
            language: request.language.code(),
        };

        debug!(
            request_id = request.request_id,
            language = body.language,
            insights = body.insights.len(),
            "POST {}",
            url
        );

        let sent = self
            .authorize(self.http.post(url))
            .timeout(self.config.generation_timeout)
            .json(&body)
            .send()
            .await;
        let response = self.check(sent, GENERATE_AUDIO_DEFAULT_ERROR).await?;

        let headers = response.headers().clone();
        let content_type = header_str(&headers, CONTENT_TYPE.as_str()).map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PodcastError::api(None, e.to_string()))?;

        let mut payload = AudioPayload::new(bytes);
        if let Some(content_type) = content_type {
            payload = payload.with_content_type(content_type);
        }

        let transcript = header_str(&headers, "x-transcript-preview")
            .or_else(|| header_str(&headers, "x-transcript"))
            .unwrap_or_default()
            .to_string();
        let duration_seconds = header_str(&headers, "x-duration")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(0.0);
        let format = header_str(&headers, "x-format")
            .unwrap_or(PODCAST_FORMAT)
            .to_string();
        let language = header_str(&headers, "x-language")
            .map(LanguageCode::from)
            .unwrap_or_else(|| request.language.clone());
        let file_size = header_str(&headers, "x-file-size")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(GenerationResult {
            request_id: Some(request.request_id),
            success: true,
            file_size,
            source: Some(crate::types::AudioSource::Payload(payload)),
            transcript,
            duration_seconds,
            format,
            language,
        })
    }

    /// Map transport errors and non-success statuses onto [`PodcastError::Api`].
    async fn check(
        &self,
        sent: std::result::Result<Response, reqwest::Error>,
        default_message: &str,
    ) -> Result<Response> {
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "API request failed");
                let message = normalize_error(None, None, Some(&e.to_string()), default_message);
                return Err(PodcastError::api(None, message));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("[API] {} -> {}", response.url(), status.as_u16());
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body: Option<Value> = serde_json::from_str(&text).ok();
        error!(status = status.as_u16(), body = %text, "API error");
        let message = normalize_error(Some(status), body.as_ref(), None, default_message);
        Err(PodcastError::api(Some(status.as_u16()), message))
    }
}

#[async_trait]
impl AudioFetcher for PodcastApi {
    async fn fetch_audio(&self, url: &Url) -> Result<AudioPayload> {
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "audio/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PodcastError::api(
                Some(status.as_u16()),
                format!("{FETCH_AUDIO_DEFAULT_ERROR}: {status}"),
            ));
        }

        let content_type = header_str(response.headers(), CONTENT_TYPE.as_str()).map(str::to_string);
        let mut payload = AudioPayload::new(response.bytes().await?);
        if let Some(content_type) = content_type {
            payload = payload.with_content_type(content_type);
        }
        Ok(payload)
    }
}
