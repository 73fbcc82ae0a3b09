//! Record → upload → playback orchestrator.
//!
//! All dependencies are injected via constructor so the flow can run against
//! the real microphone, server and speakers or against test doubles.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioOutput, CaptureDevice, PlaybackMonitor};
use crate::client::{FieldsHandle, PlaybackHandle, UploadPayload, VoiceChatService};

use super::archive::ConversationArchive;
use super::recorder_session::{RecorderSession, SessionError};
use super::status::{SessionPhase, StatusHandle, ALERT_MICROPHONE};

/// How one upload-and-playback round trip ended.
#[derive(Debug)]
pub enum FlowOutcome {
    Playing {
        handle: PlaybackHandle,
        monitor: PlaybackMonitor,
    },
    Failed(String),
}

/// Result of a toggle request.
pub enum ToggleOutcome {
    Started,
    Stopped(Option<JoinHandle<FlowOutcome>>),
}

pub struct ChatMachine {
    device: Arc<dyn CaptureDevice>,
    service: Arc<dyn VoiceChatService>,
    output: Arc<dyn AudioOutput>,
    fields: FieldsHandle,
    status: StatusHandle,
    archive: Option<ConversationArchive>,
    session: Mutex<Option<RecorderSession>>,
}

impl ChatMachine {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        service: Arc<dyn VoiceChatService>,
        output: Arc<dyn AudioOutput>,
        fields: FieldsHandle,
        status: StatusHandle,
    ) -> Self {
        Self {
            device,
            service,
            output,
            fields,
            status,
            archive: None,
            session: Mutex::new(None),
        }
    }

    pub fn with_archive(mut self, archive: Option<ConversationArchive>) -> Self {
        self.archive = archive;
        self
    }

    pub fn status(&self) -> &StatusHandle {
        &self.status
    }

    pub fn fields(&self) -> &FieldsHandle {
        &self.fields
    }

    pub async fn is_recording(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(RecorderSession::is_recording)
    }

    /// Begin a new recording with a fresh session.
    ///
    /// Rejected while already recording or while a reply is still pending.
    /// A refused microphone raises an alert and leaves the status untouched.
    pub async fn start(&self) -> Result<(), SessionError> {
        if self.status.get().await.phase == SessionPhase::Processing {
            warn!("ChatMachine: start requested while waiting for a reply");
            return Err(SessionError::Busy);
        }

        let mut slot = self.session.lock().await;
        if slot.as_ref().is_some_and(RecorderSession::is_recording) {
            warn!("ChatMachine: start requested while already recording");
            return Err(SessionError::AlreadyRecording);
        }

        let mut session = RecorderSession::new();
        match session.start(self.device.as_ref()).await {
            Ok(()) => {
                *slot = Some(session);
                self.status.start_recording().await;
                Ok(())
            }
            Err(SessionError::Capture(e)) => {
                error!("Error accessing microphone: {}", e);
                self.status.alert(ALERT_MICROPHONE).await;
                Err(SessionError::Capture(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Stop recording and hand the audio to the upload-and-playback flow.
    ///
    /// Returns `None` (and does nothing) when no recording is active.
    pub async fn stop(&self) -> Result<Option<JoinHandle<FlowOutcome>>, SessionError> {
        let taken = self.session.lock().await.take();
        let Some(mut session) = taken else {
            debug!("ChatMachine: stop requested with no active recording");
            return Ok(None);
        };

        let recording = match session.stop().await {
            Ok(Some(recording)) => recording,
            Ok(None) => return Ok(None),
            Err(e) => {
                error!("Failed to finalize recording: {}", e);
                self.status.fail(e.to_string()).await;
                return Err(e);
            }
        };

        self.status.set_processing().await;

        let payload = UploadPayload {
            audio: recording.audio,
            fields: self.fields.get().await,
        };

        let flow = UploadFlow {
            service: Arc::clone(&self.service),
            output: Arc::clone(&self.output),
            status: self.status.clone(),
            archive: self.archive.clone(),
        };

        Ok(Some(spawn_flow(flow, payload, self.status.clone())))
    }

    pub async fn toggle(&self) -> Result<ToggleOutcome, SessionError> {
        if self.is_recording().await {
            info!("ChatMachine: stopping recording and sending");
            Ok(ToggleOutcome::Stopped(self.stop().await?))
        } else {
            info!("ChatMachine: starting recording");
            self.start().await?;
            Ok(ToggleOutcome::Started)
        }
    }
}

/// Run the flow on its own task. A panic inside it still ends in the error
/// status, so later recordings are not rejected as busy.
fn spawn_flow(
    flow: UploadFlow,
    payload: UploadPayload,
    status: StatusHandle,
) -> JoinHandle<FlowOutcome> {
    let inner = tokio::spawn(flow.run(payload));
    tokio::spawn(async move {
        match inner.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Upload flow aborted: {}", e);
                status.fail(format!("upload flow aborted: {e}")).await;
                FlowOutcome::Failed(e.to_string())
            }
        }
    })
}

struct UploadFlow {
    service: Arc<dyn VoiceChatService>,
    output: Arc<dyn AudioOutput>,
    status: StatusHandle,
    archive: Option<ConversationArchive>,
}

impl UploadFlow {
    async fn run(self, payload: UploadPayload) -> FlowOutcome {
        match self.execute(payload).await {
            Ok((handle, monitor)) => {
                info!("Playing reply {}", handle.filename);
                self.status.playback(handle.clone()).await;
                FlowOutcome::Playing { handle, monitor }
            }
            Err(e) => {
                error!("Error while sending audio: {:#}", e);
                self.status.fail(format!("{e:#}")).await;
                FlowOutcome::Failed(e.to_string())
            }
        }
    }

    async fn execute(&self, payload: UploadPayload) -> Result<(PlaybackHandle, PlaybackMonitor)> {
        if let Some(archive) = &self.archive {
            if let Err(e) = archive.save_recording(&payload.audio) {
                warn!("Failed to archive recording: {:#}", e);
            }
        }

        let handle = self.service.upload(payload).await?;
        let audio = self.service.fetch_audio(&handle).await?;

        if let Some(archive) = &self.archive {
            if let Err(e) = archive.save_reply(&handle.filename, &audio) {
                warn!("Failed to archive reply: {:#}", e);
            }
        }

        let monitor = self.output.play(audio).await?;
        Ok((handle, monitor))
    }
}
