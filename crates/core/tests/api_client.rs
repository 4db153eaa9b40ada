//! Backend client and download chain against a mock server

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use insightcast_core::{
    ApiConfig, AudioResourceManager, DownloadController, DownloadOutcome, GenerationRequest,
    GenerationResult, LanguageCode, PodcastApi, PodcastError, PodcastLength, ResourceHandle,
    SourceContentRef,
    download::{DirectorySaver, ExternalOpener},
    types::Insight,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(language: LanguageCode) -> GenerationRequest {
    GenerationRequest {
        request_id: 7,
        language,
        source: SourceContentRef {
            document_id: Some("doc-42".to_string()),
            selected_text: "Ownership makes memory safety a compile-time property.".to_string(),
            insights: vec![Insight {
                title: Some("Borrowing".to_string()),
                content: Some("References never outlive their referent.".to_string()),
                ..Default::default()
            }],
        },
        length: PodcastLength::Short,
    }
}

fn api(server: &MockServer) -> PodcastApi {
    PodcastApi::new(ApiConfig::new(&server.uri()).unwrap()).unwrap()
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("insightcast-test-{}", uuid::Uuid::new_v4()))
}

#[derive(Default)]
struct RecordingOpener {
    opened: Mutex<Vec<Url>>,
}

impl ExternalOpener for RecordingOpener {
    fn open(&self, url: &Url) -> insightcast_core::Result<()> {
        self.opened.lock().unwrap().push(url.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_generate_audio_reads_metadata_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/podcast/generate-audio"))
        .and(body_partial_json(json!({
            "document_id": "doc-42",
            "format": "podcast",
            "duration": "short",
            "language": "ja",
            "insights": [{"type": "key_takeaways", "title": "Borrowing", "confidence": 0.8}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/wav")
                .insert_header("x-transcript-preview", "Host A: Welcome back.")
                .insert_header("x-transcript", "full transcript")
                .insert_header("x-duration", "42.5")
                .insert_header("x-language", "ja")
                .insert_header("x-file-size", "16")
                .set_body_bytes(vec![1u8; 16]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = api(&mock_server)
        .generate_audio(&request(LanguageCode::Ja))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.request_id, Some(7));
    assert_eq!(result.transcript, "Host A: Welcome back.");
    assert_eq!(result.duration_seconds, 42.5);
    assert_eq!(result.format, "podcast");
    assert_eq!(result.language, LanguageCode::Ja);
    assert_eq!(result.file_size, 16);
    assert!(result.is_usable());
}

#[tokio::test]
async fn test_generate_audio_defaults_missing_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/podcast/generate-audio"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-duration", "not-a-number")
                .set_body_bytes(vec![0u8; 4]),
        )
        .mount(&mock_server)
        .await;

    let result = api(&mock_server)
        .generate_audio(&request(LanguageCode::Fr))
        .await
        .unwrap();

    assert_eq!(result.transcript, "");
    assert_eq!(result.duration_seconds, 0.0);
    assert_eq!(result.language, LanguageCode::Fr);
    assert_eq!(result.file_size, 0);
}

#[tokio::test]
async fn test_generate_audio_sends_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/podcast/generate-audio"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = ApiConfig::new(&mock_server.uri())
        .unwrap()
        .with_auth_token("s3cret");
    PodcastApi::new(config)
        .unwrap()
        .generate_audio(&request(LanguageCode::En))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_generate_audio_error_messages() {
    let cases = [
        (422, json!({"detail": [{"msg": "selected_text too short"}]}), "selected_text too short"),
        (401, json!({"detail": "expired"}), "Authentication required"),
        (503, json!({"detail": "overloaded"}), "Server error. Please try again later."),
        (400, json!({"message": "Unsupported language"}), "Unsupported language"),
        (404, json!({}), "Failed to generate podcast audio"),
    ];

    for (status, body, expected) in cases {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/podcast/generate-audio"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&mock_server)
            .await;

        let err = api(&mock_server)
            .generate_audio(&request(LanguageCode::En))
            .await
            .unwrap_err();

        match err {
            PodcastError::Api { status: s, message } => {
                assert_eq!(s, Some(status));
                assert_eq!(message, expected);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_remote_podcast_is_fetched_and_saved() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/podcast.mp3"))
        .and(header("accept", "audio/*"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(vec![7u8; 64]),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let remote = Url::parse(&format!("{}/media/podcast.mp3", mock_server.uri())).unwrap();
    let manager = AudioResourceManager::new();
    let handle =
        ResourceHandle::from_result(&manager, &GenerationResult::from_remote(Some(1), remote))
            .unwrap();

    let dir = scratch_dir();
    let opener = Arc::new(RecordingOpener::default());
    let downloads = DownloadController::new(
        Arc::new(api(&mock_server)),
        Arc::new(DirectorySaver::new(&dir)),
        opener.clone(),
    );

    let outcome = downloads.download(handle).await.unwrap();
    let DownloadOutcome::Saved(saved) = outcome else {
        panic!("expected a saved file, got {outcome:?}");
    };
    assert_eq!(saved.extension().and_then(|e| e.to_str()), Some("mp3"));
    assert_eq!(std::fs::read(&saved).unwrap(), vec![7u8; 64]);
    assert!(opener.opened.lock().unwrap().is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_missing_remote_podcast_opens_externally() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/gone.wav"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let remote = Url::parse(&format!("{}/media/gone.wav", mock_server.uri())).unwrap();
    let manager = AudioResourceManager::new();
    let handle = ResourceHandle::from_result(
        &manager,
        &GenerationResult::from_remote(Some(1), remote.clone()),
    )
    .unwrap();

    let dir = scratch_dir();
    let opener = Arc::new(RecordingOpener::default());
    let downloads = DownloadController::new(
        Arc::new(api(&mock_server)),
        Arc::new(DirectorySaver::new(&dir)),
        opener.clone(),
    );

    let outcome = downloads.download(handle).await.unwrap();
    assert_eq!(outcome, DownloadOutcome::OpenedExternally(remote.clone()));
    assert_eq!(*opener.opened.lock().unwrap(), vec![remote]);
    assert!(!dir.exists());
}
