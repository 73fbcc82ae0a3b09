//! Capture device abstraction.
//!
//! A [`CaptureDevice`] hands out a [`CaptureStream`]: a channel of PCM
//! [`Fragment`]s plus a [`MicrophoneLease`] that keeps the hardware open.
//! Releasing (or dropping) the lease stops capture and frees the device.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use super::wav::AudioFormat;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    #[error("no usable capture device: {0}")]
    DeviceUnavailable(String),
}

/// One chunk of 16-bit little-endian PCM delivered while recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(Vec<u8>);

impl Fragment {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Append-only, arrival-ordered fragment storage for one recording.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    fragments: Vec<Fragment>,
}

impl FragmentBuffer {
    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.fragments.iter().map(Fragment::len).sum()
    }

    /// Join every fragment in arrival order.
    pub fn concat(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        for fragment in &self.fragments {
            bytes.extend_from_slice(fragment.as_bytes());
        }
        bytes
    }
}

/// Exclusive hold on a capture device. Released exactly once, on
/// [`MicrophoneLease::release`] or on drop.
///
/// Releasing may block briefly while the device shuts down; async callers
/// should release from a blocking task.
pub struct MicrophoneLease {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl MicrophoneLease {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        self.release_now();
    }

    pub fn is_held(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for MicrophoneLease {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for MicrophoneLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrophoneLease")
            .field("held", &self.is_held())
            .finish()
    }
}

/// An open capture: where fragments arrive, in which format, and the lease
/// that keeps the device open.
#[derive(Debug)]
pub struct CaptureStream {
    pub format: AudioFormat,
    pub fragments: mpsc::UnboundedReceiver<Fragment>,
    pub lease: MicrophoneLease,
}

#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask the host for a capture stream. This is where permission is granted
    /// or denied.
    async fn open(&self) -> Result<CaptureStream, CaptureError>;

    fn name(&self) -> String;
}
