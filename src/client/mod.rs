//! Upload-and-playback transport for the voice chat server.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::AudioBlob;

pub mod fields;
pub mod voice_chat_client;

pub use fields::{FieldsHandle, FieldsUpdate, PromptTemplate, VoiceFields};
pub use voice_chat_client::VoiceChatClient;

pub const AUDIO_FIELD: &str = "audio";
pub const EMOTION_FIELD: &str = "emotion";
pub const VOICE_ID_FIELD: &str = "voice_id";
pub const PROMPT_TEMPLATE_FIELD: &str = "prompt-template";
pub const MODEL_NAME_FIELD: &str = "model_name";
pub const VOICE_SAMPLES_FIELD: &str = "voice_samples";
pub const RECORDING_FILENAME: &str = "recording.wav";
pub const WAV_MIME: &str = "audio/wav";

/// Every way an upload or reply retrieval can fail. Users only ever see one
/// generic message; the variants exist for the logs.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("response was not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("response did not include a response_audio reference")]
    MissingReference,
    #[error("could not encode recording: {0}")]
    Encoding(#[from] hound::Error),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// One recording plus the field values current when it stopped.
/// Consumed by the upload.
#[derive(Debug)]
pub struct UploadPayload {
    pub audio: AudioBlob,
    pub fields: VoiceFields,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadReply {
    #[serde(default)]
    pub response_audio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerError {
    pub error: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl ServerError {
    pub fn describe(&self) -> String {
        match &self.details {
            Some(details) => format!("{} ({})", self.error, details),
            None => self.error.clone(),
        }
    }
}

/// One audio file used to train a voice model. Any format the server can
/// decode is accepted.
#[derive(Debug, Clone)]
pub struct VoiceSample {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl VoiceSample {
    pub fn mime(&self) -> &'static str {
        let extension = self
            .filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "wav" => WAV_MIME,
            "mp3" => "audio/mpeg",
            "m4a" => "audio/mp4",
            "ogg" | "opus" => "audio/ogg",
            "flac" => "audio/flac",
            "webm" => "audio/webm",
            _ => "application/octet-stream",
        }
    }
}

/// A named voice model and the samples it is trained from.
#[derive(Debug, Clone)]
pub struct TrainingRequest {
    pub model_name: String,
    pub samples: Vec<VoiceSample>,
}

/// Where the reply audio can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackHandle {
    pub url: String,
    pub filename: String,
}

impl PlaybackHandle {
    /// Combine the retrieval endpoint with the last `/`-separated segment of
    /// the server's `response_audio` path.
    pub fn resolve(retrieval_endpoint: &Url, response_audio: &str) -> Result<Self, UploadError> {
        let filename = response_audio.rsplit('/').next().unwrap_or_default();
        if filename.is_empty() {
            return Err(UploadError::MissingReference);
        }

        let mut url = retrieval_endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidEndpoint(retrieval_endpoint.to_string()))?
            .pop_if_empty()
            .push(filename);

        Ok(Self {
            url: url.to_string(),
            filename: filename.to_string(),
        })
    }
}

#[async_trait]
pub trait VoiceChatService: Send + Sync {
    /// Send the recording and resolve where the reply can be fetched.
    async fn upload(&self, payload: UploadPayload) -> Result<PlaybackHandle, UploadError>;

    /// Download the reply audio.
    async fn fetch_audio(&self, handle: &PlaybackHandle) -> Result<Vec<u8>, UploadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("http://127.0.0.1:5000/get-audio").unwrap()
    }

    #[test]
    fn test_resolve_uses_final_segment() {
        let handle = PlaybackHandle::resolve(&endpoint(), "/some/dir/out123.wav").unwrap();
        assert_eq!(handle.url, "http://127.0.0.1:5000/get-audio/out123.wav");
        assert_eq!(handle.filename, "out123.wav");
    }

    #[test]
    fn test_resolve_relative_server_path() {
        let handle = PlaybackHandle::resolve(
            &endpoint(),
            "responses/5f0c1a52-3b0e-4b8e-9a57-2d4b0c0c3b1e.wav",
        )
        .unwrap();
        assert_eq!(
            handle.url,
            "http://127.0.0.1:5000/get-audio/5f0c1a52-3b0e-4b8e-9a57-2d4b0c0c3b1e.wav"
        );
    }

    #[test]
    fn test_resolve_bare_filename() {
        let handle = PlaybackHandle::resolve(&endpoint(), "reply.wav").unwrap();
        assert_eq!(handle.url, "http://127.0.0.1:5000/get-audio/reply.wav");
    }

    #[test]
    fn test_resolve_trailing_slash_endpoint() {
        let endpoint = Url::parse("http://127.0.0.1:5000/get-audio/").unwrap();
        let handle = PlaybackHandle::resolve(&endpoint, "/a/b.wav").unwrap();
        assert_eq!(handle.url, "http://127.0.0.1:5000/get-audio/b.wav");
    }

    #[test]
    fn test_resolve_keeps_segment_verbatim() {
        let handle = PlaybackHandle::resolve(&endpoint(), "/some/dir/ reply 1.wav").unwrap();
        assert_eq!(handle.filename, " reply 1.wav");
        assert_eq!(
            handle.url,
            "http://127.0.0.1:5000/get-audio/%20reply%201.wav"
        );
    }

    #[test]
    fn test_resolve_rejects_directory_reference() {
        assert!(matches!(
            PlaybackHandle::resolve(&endpoint(), "/some/dir/"),
            Err(UploadError::MissingReference)
        ));
        assert!(matches!(
            PlaybackHandle::resolve(&endpoint(), ""),
            Err(UploadError::MissingReference)
        ));
    }

    #[test]
    fn test_sample_mime_from_extension() {
        let sample = |name: &str| VoiceSample {
            filename: name.to_string(),
            bytes: Vec::new(),
        };
        assert_eq!(sample("grandpa.WAV").mime(), "audio/wav");
        assert_eq!(sample("take2.mp3").mime(), "audio/mpeg");
        assert_eq!(sample("notes").mime(), "application/octet-stream");
    }

    #[test]
    fn test_server_error_description() {
        let err: ServerError =
            serde_json::from_str(r#"{"error": "TTS generation failed", "details": "boom"}"#)
                .unwrap();
        assert_eq!(err.describe(), "TTS generation failed (boom)");

        let err: ServerError = serde_json::from_str(r#"{"error": "Voice model not found"}"#).unwrap();
        assert_eq!(err.describe(), "Voice model not found");
    }
}
