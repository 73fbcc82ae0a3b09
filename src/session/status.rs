//! User-visible session status and shared state handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::client::PlaybackHandle;

pub const STATUS_RECORDING: &str = "Recording...";
pub const STATUS_SENDING: &str = "Sending...";
pub const STATUS_PLAYBACK: &str = "Playback";
pub const STATUS_ERROR: &str = "Error, please try again.";
pub const ALERT_MICROPHONE: &str = "Please grant microphone access to use this feature.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Recording,
    Processing,
    Playback,
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Playback => "playback",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// The status line shown to the user.
    pub text: String,
    /// Last blocking notification (microphone refusal).
    pub last_alert: Option<String>,
    /// Diagnostic detail for the last failure. Never shown as status text.
    pub last_error: Option<String>,
    /// Source of the reply player; only replaced by a successful round trip.
    pub player_source: Option<PlaybackHandle>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            text: String::new(),
            last_alert: None,
            last_error: None,
            player_source: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<SessionStatus>>,
}

impl StatusHandle {
    pub async fn get(&self) -> SessionStatus {
        self.inner.lock().await.clone()
    }

    pub async fn start_recording(&self) {
        let mut status = self.inner.lock().await;
        status.phase = SessionPhase::Recording;
        status.text = STATUS_RECORDING.to_string();
        status.last_error = None;
    }

    pub async fn set_processing(&self) {
        let mut status = self.inner.lock().await;
        status.phase = SessionPhase::Processing;
        status.text = STATUS_SENDING.to_string();
    }

    pub async fn playback(&self, source: PlaybackHandle) {
        let mut status = self.inner.lock().await;
        status.phase = SessionPhase::Playback;
        status.text = STATUS_PLAYBACK.to_string();
        status.player_source = Some(source);
        status.last_error = None;
    }

    pub async fn fail(&self, detail: String) {
        let mut status = self.inner.lock().await;
        status.phase = SessionPhase::Error;
        status.text = STATUS_ERROR.to_string();
        status.last_error = Some(detail);
    }

    /// Record a notification without touching phase or status text.
    pub async fn alert(&self, message: &str) {
        let mut status = self.inner.lock().await;
        status.last_alert = Some(message.to_string());
    }
}
