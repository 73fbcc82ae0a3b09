//! HTTP client for the voice chat server.
//!
//! Uploads a recording as a multipart form and downloads the generated
//! reply audio.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{
    PlaybackHandle, ServerError, TrainingRequest, UploadError, UploadPayload, UploadReply,
    VoiceChatService, AUDIO_FIELD, EMOTION_FIELD, MODEL_NAME_FIELD, PROMPT_TEMPLATE_FIELD,
    RECORDING_FILENAME, VOICE_ID_FIELD, VOICE_SAMPLES_FIELD, WAV_MIME,
};
use crate::config::ServerConfig;

pub struct VoiceChatClient {
    client: reqwest::Client,
    upload_url: Url,
    retrieval_url: Url,
    training_url: Url,
}

impl VoiceChatClient {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        // Training answers with a redirect to the chat page; report it as is.
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if server.timeout_seconds > 0 {
            builder = builder.timeout(Duration::from_secs(server.timeout_seconds));
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        let upload_url = endpoint(&server.base_url, &server.upload_path)?;
        let retrieval_url = endpoint(&server.base_url, &server.retrieval_path)?;
        let training_url = endpoint(&server.base_url, &server.training_path)?;
        if retrieval_url.cannot_be_a_base() {
            bail!("Retrieval endpoint cannot hold a filename: {}", retrieval_url);
        }

        info!(
            "Voice chat server: upload {} / replies {}",
            upload_url, retrieval_url
        );

        Ok(Self {
            client,
            upload_url,
            retrieval_url,
            training_url,
        })
    }

    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }

    pub fn retrieval_url(&self) -> &Url {
        &self.retrieval_url
    }

    pub fn training_url(&self) -> &Url {
        &self.training_url
    }

    /// Upload voice samples under a model name. The server stores them and
    /// registers the name as a selectable voice id.
    pub async fn train_voice(&self, request: TrainingRequest) -> Result<(), UploadError> {
        let TrainingRequest {
            model_name,
            samples,
        } = request;

        info!(
            "Training voice {:?} from {} sample(s)",
            model_name,
            samples.len()
        );

        let mut form = Form::new().text(MODEL_NAME_FIELD, model_name.clone());
        for sample in samples {
            let mime = sample.mime();
            let part = Part::bytes(sample.bytes)
                .file_name(sample.filename)
                .mime_str(mime)?;
            form = form.part(VOICE_SAMPLES_FIELD, part);
        }

        let response = self
            .client
            .post(self.training_url.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            info!("Voice {:?} registered", model_name);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!("Training failed with status {}: {}", status, body);
        let message = serde_json::from_str::<ServerError>(&body)
            .map(|e| e.describe())
            .unwrap_or(body);
        Err(UploadError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn build_form(payload: UploadPayload) -> Result<Form, UploadError> {
        let UploadPayload { audio, fields } = payload;

        if !fields.has_known_template() {
            warn!(
                "Prompt template {:?} is not one the server knows; it will fall back to assistant",
                fields.prompt_template
            );
        }

        let wav = audio.to_wav()?;
        info!(
            "Uploading {:.1}s recording ({} bytes): voice={:?} emotion={:?} template={:?}",
            audio.duration().as_secs_f64(),
            wav.len(),
            fields.voice_id,
            fields.emotion,
            fields.prompt_template
        );

        let audio_part = Part::bytes(wav)
            .file_name(RECORDING_FILENAME)
            .mime_str(WAV_MIME)?;

        Ok(Form::new()
            .part(AUDIO_FIELD, audio_part)
            .text(EMOTION_FIELD, fields.emotion)
            .text(VOICE_ID_FIELD, fields.voice_id)
            .text(PROMPT_TEMPLATE_FIELD, fields.prompt_template))
    }
}

#[async_trait]
impl VoiceChatService for VoiceChatClient {
    async fn upload(&self, payload: UploadPayload) -> Result<PlaybackHandle, UploadError> {
        let form = Self::build_form(payload)?;

        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Upload failed with status {}: {}", status, body);
            let message = serde_json::from_str::<ServerError>(&body)
                .map(|e| e.describe())
                .unwrap_or(body);
            return Err(UploadError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: UploadReply = serde_json::from_str(&body)?;
        let reference = reply.response_audio.ok_or(UploadError::MissingReference)?;
        debug!("Server reply audio reference: {}", reference);

        PlaybackHandle::resolve(&self.retrieval_url, &reference)
    }

    async fn fetch_audio(&self, handle: &PlaybackHandle) -> Result<Vec<u8>, UploadError> {
        let response = self.client.get(&handle.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Fetching {} failed with status {}: {}", handle.url, status, body);
            return Err(UploadError::Status {
                status: status.as_u16(),
                message: body,
            });
        }

        let bytes = response.bytes().await?;
        debug!("Fetched {} ({} bytes)", handle.filename, bytes.len());
        Ok(bytes.to_vec())
    }
}

fn endpoint(base_url: &str, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).with_context(|| format!("Invalid server URL: {joined}"))
}
