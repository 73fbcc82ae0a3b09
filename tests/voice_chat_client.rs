//! Runs the HTTP client against an in-process stand-in for the voice chat
//! server.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use voxchat::audio::{AudioBlob, AudioFormat};
use voxchat::client::{
    TrainingRequest, UploadError, UploadPayload, VoiceChatClient, VoiceChatService, VoiceFields,
    VoiceSample,
};
use voxchat::config::ServerConfig;

#[derive(Debug, Clone)]
struct ReceivedPart {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

type Received = Arc<Mutex<Vec<(String, ReceivedPart)>>>;

#[derive(Clone)]
struct FakeServer {
    reply: Arc<dyn Fn() -> (StatusCode, String) + Send + Sync>,
    received: Received,
}

async fn collect_parts(received: &Received, mut multipart: Multipart) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        received.lock().unwrap().push((
            name,
            ReceivedPart {
                file_name,
                content_type,
                data,
            },
        ));
    }
}

fn part<'a>(parts: &'a [(String, ReceivedPart)], name: &str) -> &'a ReceivedPart {
    parts
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, part)| part)
        .unwrap_or_else(|| panic!("no {name} field received"))
}

async fn upload_audio(
    State(server): State<FakeServer>,
    multipart: Multipart,
) -> impl IntoResponse {
    collect_parts(&server.received, multipart).await;
    (server.reply)()
}

async fn train_model(State(server): State<FakeServer>, multipart: Multipart) -> impl IntoResponse {
    collect_parts(&server.received, multipart).await;
    (StatusCode::FOUND, [(header::LOCATION, "/chat")])
}

async fn get_audio(Path(filename): Path<String>) -> impl IntoResponse {
    if filename == "out123.wav" {
        (StatusCode::OK, b"RIFF-reply".to_vec())
    } else {
        (StatusCode::NOT_FOUND, b"missing".to_vec())
    }
}

async fn spawn_server(
    reply: impl Fn() -> (StatusCode, String) + Send + Sync + 'static,
) -> (ServerConfig, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let state = FakeServer {
        reply: Arc::new(reply),
        received: received.clone(),
    };

    let app = Router::new()
        .route("/upload-audio", post(upload_audio))
        .route("/get-audio/:filename", get(get_audio))
        .route("/train-model", post(train_model))
        .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = ServerConfig {
        base_url: format!("http://{addr}"),
        timeout_seconds: 5,
        ..ServerConfig::default()
    };
    (config, received)
}

fn payload() -> UploadPayload {
    UploadPayload {
        audio: AudioBlob {
            format: AudioFormat::mono(16_000),
            pcm: vec![0u8; 3_200],
        },
        fields: VoiceFields {
            emotion: "happy".to_string(),
            voice_id: "grandpa".to_string(),
            prompt_template: "tutor".to_string(),
        },
    }
}

fn ok_reply(body: Value) -> impl Fn() -> (StatusCode, String) + Send + Sync + 'static {
    move || (StatusCode::OK, body.to_string())
}

#[tokio::test]
async fn test_upload_sends_form_and_resolves_reply() {
    let (config, received) = spawn_server(ok_reply(json!({
        "transcription": "hello",
        "response_text": "hi there",
        "response_audio": "/srv/app/responses/out123.wav"
    })))
    .await;
    let client = VoiceChatClient::new(&config).unwrap();

    let handle = client.upload(payload()).await.unwrap();
    assert_eq!(handle.url, format!("{}/get-audio/out123.wav", config.base_url));
    assert_eq!(handle.filename, "out123.wav");

    let received = received.lock().unwrap().clone();
    assert_eq!(received.len(), 4);
    let audio = part(&received, "audio");
    assert_eq!(audio.file_name.as_deref(), Some("recording.wav"));
    assert_eq!(audio.content_type.as_deref(), Some("audio/wav"));
    assert_eq!(&audio.data[..4], b"RIFF");
    assert_eq!(part(&received, "emotion").data, b"happy");
    assert_eq!(part(&received, "voice_id").data, b"grandpa");
    assert_eq!(part(&received, "prompt-template").data, b"tutor");
}

#[tokio::test]
async fn test_fetch_audio_returns_reply_bytes() {
    let (config, _) = spawn_server(ok_reply(json!({"response_audio": "out123.wav"}))).await;
    let client = VoiceChatClient::new(&config).unwrap();

    let handle = client.upload(payload()).await.unwrap();
    let audio = client.fetch_audio(&handle).await.unwrap();
    assert_eq!(audio, b"RIFF-reply");
}

#[tokio::test]
async fn test_fetch_missing_reply_is_status_error() {
    let (config, _) = spawn_server(ok_reply(json!({"response_audio": "gone.wav"}))).await;
    let client = VoiceChatClient::new(&config).unwrap();

    let handle = client.upload(payload()).await.unwrap();
    let err = client.fetch_audio(&handle).await.unwrap_err();
    assert!(matches!(err, UploadError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_server_error_status() {
    let (config, _) = spawn_server(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "TTS generation failed", "details": "model crashed"}).to_string(),
        )
    })
    .await;
    let client = VoiceChatClient::new(&config).unwrap();

    match client.upload(payload()).await {
        Err(UploadError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "TTS generation failed (model crashed)");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let (config, _) = spawn_server(|| (StatusCode::OK, "<html>oops</html>".to_string())).await;
    let client = VoiceChatClient::new(&config).unwrap();

    let err = client.upload(payload()).await.unwrap_err();
    assert!(matches!(err, UploadError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_missing_response_audio() {
    let (config, _) = spawn_server(ok_reply(json!({"response_text": "no audio"}))).await;
    let client = VoiceChatClient::new(&config).unwrap();

    let err = client.upload(payload()).await.unwrap_err();
    assert!(matches!(err, UploadError::MissingReference));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ServerConfig {
        base_url: format!("http://{addr}"),
        timeout_seconds: 5,
        ..ServerConfig::default()
    };
    let client = VoiceChatClient::new(&config).unwrap();

    let err = client.upload(payload()).await.unwrap_err();
    assert!(matches!(err, UploadError::Network(_)));
}

#[tokio::test]
async fn test_train_voice_sends_name_and_every_sample() {
    let (config, received) = spawn_server(ok_reply(json!({}))).await;
    let client = VoiceChatClient::new(&config).unwrap();

    client
        .train_voice(TrainingRequest {
            model_name: "grandpa".to_string(),
            samples: vec![
                VoiceSample {
                    filename: "take1.wav".to_string(),
                    bytes: b"RIFF-one".to_vec(),
                },
                VoiceSample {
                    filename: "take2.mp3".to_string(),
                    bytes: b"ID3-two".to_vec(),
                },
            ],
        })
        .await
        .unwrap();

    let received = received.lock().unwrap().clone();
    assert_eq!(part(&received, "model_name").data, b"grandpa");

    let samples: Vec<&ReceivedPart> = received
        .iter()
        .filter(|(field, _)| field == "voice_samples")
        .map(|(_, part)| part)
        .collect();
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].file_name.as_deref(), Some("take1.wav"));
    assert_eq!(samples[0].content_type.as_deref(), Some("audio/wav"));
    assert_eq!(samples[0].data, b"RIFF-one");
    assert_eq!(samples[1].file_name.as_deref(), Some("take2.mp3"));
    assert_eq!(samples[1].content_type.as_deref(), Some("audio/mpeg"));
    assert_eq!(samples[1].data, b"ID3-two");
}

#[tokio::test]
async fn test_train_voice_missing_endpoint_is_status_error() {
    let (mut config, _) = spawn_server(ok_reply(json!({}))).await;
    config.training_path = "/no-such-route".to_string();
    let client = VoiceChatClient::new(&config).unwrap();

    let err = client
        .train_voice(TrainingRequest {
            model_name: "grandpa".to_string(),
            samples: vec![VoiceSample {
                filename: "take1.wav".to_string(),
                bytes: b"RIFF".to_vec(),
            }],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Status { status: 404, .. }));
}
