//! One microphone recording: Idle → Recording → Stopped.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::audio::{
    AudioBlob, AudioFormat, CaptureDevice, CaptureError, CaptureStream, Fragment, FragmentBuffer,
    MicrophoneLease,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("still waiting for the previous reply")]
    Busy,
    #[error("fragment collection failed: {0}")]
    Collector(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped,
}

/// Everything captured between `start()` and `stop()`.
#[derive(Debug)]
pub struct CompletedRecording {
    pub audio: AudioBlob,
    pub fragments: usize,
}

struct ActiveCapture {
    format: AudioFormat,
    lease: MicrophoneLease,
    stop: oneshot::Sender<()>,
    collector: JoinHandle<FragmentBuffer>,
}

pub struct RecorderSession {
    state: SessionState,
    active: Option<ActiveCapture>,
}

impl Default for RecorderSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RecorderSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Open the device and start collecting fragments into a fresh buffer.
    /// Nothing changes when the device refuses.
    pub async fn start(&mut self, device: &dyn CaptureDevice) -> Result<(), SessionError> {
        if self.is_recording() {
            return Err(SessionError::AlreadyRecording);
        }

        let CaptureStream {
            format,
            fragments,
            lease,
        } = device.open().await?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let collector = tokio::spawn(collect_fragments(fragments, stop_rx));

        self.active = Some(ActiveCapture {
            format,
            lease,
            stop: stop_tx,
            collector,
        });
        self.state = SessionState::Recording;

        info!(
            "Recording started on {} ({}Hz, {} channel(s))",
            device.name(),
            format.sample_rate,
            format.channels
        );
        Ok(())
    }

    /// Finish the recording. Returns `None` when nothing was recording.
    ///
    /// The microphone is released before the buffer is finalized.
    pub async fn stop(&mut self) -> Result<Option<CompletedRecording>, SessionError> {
        let Some(active) = self.active.take() else {
            debug!("Stop requested with no active recording");
            return Ok(None);
        };
        self.state = SessionState::Stopped;

        let ActiveCapture {
            format,
            lease,
            stop,
            collector,
        } = active;

        // Releasing joins the capture thread.
        tokio::task::spawn_blocking(move || lease.release())
            .await
            .map_err(|e| SessionError::Collector(e.to_string()))?;
        let _ = stop.send(());

        let buffer = collector
            .await
            .map_err(|e| SessionError::Collector(e.to_string()))?;

        let audio = AudioBlob::from_fragments(format, &buffer);
        info!(
            "Recording stopped: {} fragments, {:.1}s",
            buffer.len(),
            audio.duration().as_secs_f64()
        );

        Ok(Some(CompletedRecording {
            audio,
            fragments: buffer.len(),
        }))
    }
}

impl Drop for RecorderSession {
    fn drop(&mut self) {
        if self.active.is_some() {
            debug!("Dropping active RecorderSession, releasing microphone");
        }
    }
}

async fn collect_fragments(
    mut fragments: mpsc::UnboundedReceiver<Fragment>,
    mut stop: oneshot::Receiver<()>,
) -> FragmentBuffer {
    let mut buffer = FragmentBuffer::default();
    loop {
        tokio::select! {
            biased;
            fragment = fragments.recv() => match fragment {
                Some(fragment) => buffer.push(fragment),
                None => break,
            },
            _ = &mut stop => {
                while let Ok(fragment) = fragments.try_recv() {
                    buffer.push(fragment);
                }
                break;
            }
        }
    }
    buffer
}
