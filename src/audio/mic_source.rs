//! Microphone capture via cpal.
//!
//! cpal streams are not `Send`, so each capture owns a dedicated thread that
//! builds the stream, parks until the lease is released, then drops it.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use std::sync::mpsc as std_mpsc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::audio_mixer::AudioMixer;
use super::audio_source::{CaptureDevice, CaptureError, CaptureStream, Fragment, MicrophoneLease};
use super::wav::AudioFormat;

pub struct MicCaptureDevice {
    preferred_name: Option<String>,
}

impl MicCaptureDevice {
    /// `preferred_name` is matched case-insensitively against input device
    /// names; the host default is used when nothing matches.
    pub fn new(preferred_name: Option<String>) -> Self {
        Self { preferred_name }
    }
}

#[async_trait]
impl CaptureDevice for MicCaptureDevice {
    async fn open(&self) -> Result<CaptureStream, CaptureError> {
        let (fragment_tx, fragment_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let preferred = self.preferred_name.clone();

        let worker = std::thread::Builder::new()
            .name("voxchat-mic".to_string())
            .spawn(move || run_capture_thread(preferred, fragment_tx, ready_tx, stop_rx))
            .map_err(|e| {
                CaptureError::DeviceUnavailable(format!("failed to spawn capture thread: {e}"))
            })?;

        let format = match ready_rx.await {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(CaptureError::DeviceUnavailable(
                    "capture thread exited before opening the device".to_string(),
                ));
            }
        };

        let lease = MicrophoneLease::new(move || {
            let _ = stop_tx.send(());
            if worker.join().is_err() {
                error!("Microphone capture thread panicked");
            }
            debug!("Microphone released");
        });

        Ok(CaptureStream {
            format,
            fragments: fragment_rx,
            lease,
        })
    }

    fn name(&self) -> String {
        self.preferred_name
            .clone()
            .unwrap_or_else(|| "default input".to_string())
    }
}

fn run_capture_thread(
    preferred: Option<String>,
    fragments: mpsc::UnboundedSender<Fragment>,
    ready: oneshot::Sender<Result<AudioFormat, CaptureError>>,
    stop: std_mpsc::Receiver<()>,
) {
    match open_input_stream(preferred.as_deref(), fragments) {
        Ok((stream, format)) => {
            if ready.send(Ok(format)).is_err() {
                return;
            }
            // Returns on release or when the lease is dropped.
            let _ = stop.recv();
            drop(stream);
        }
        Err(e) => {
            let _ = ready.send(Err(e));
        }
    }
}

fn open_input_stream(
    preferred: Option<&str>,
    fragments: mpsc::UnboundedSender<Fragment>,
) -> Result<(cpal::Stream, AudioFormat), CaptureError> {
    let host = cpal::default_host();
    let device = select_device(&host, preferred)?;

    let supported = device
        .default_input_config()
        .map_err(map_default_config_error)?;
    let channels = supported.channels() as usize;
    let format = AudioFormat::mono(supported.sample_rate().0);
    let config: cpal::StreamConfig = supported.clone().into();

    info!(
        "Recording from {} ({}Hz, {} channel(s), {:?})",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        format.sample_rate,
        channels,
        supported.sample_format()
    );

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, fragments)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, fragments)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, fragments)?,
        other => {
            return Err(CaptureError::DeviceUnavailable(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };

    stream.play().map_err(map_play_error)?;
    Ok((stream, format))
}

fn select_device(host: &cpal::Host, preferred: Option<&str>) -> Result<cpal::Device, CaptureError> {
    if let Some(wanted) = preferred {
        let wanted = wanted.to_lowercase();
        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name() {
                    if name.to_lowercase().contains(&wanted) {
                        return Ok(device);
                    }
                }
            }
        }
        warn!(
            "No input device matching {:?}, using the default device",
            wanted
        );
    }

    host.default_input_device()
        .ok_or_else(|| CaptureError::DeviceUnavailable("no input device available".to_string()))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    fragments: mpsc::UnboundedSender<Fragment>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if data.is_empty() {
                    return;
                }
                let samples: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
                let mono = AudioMixer::downmix_to_mono(&samples, channels);
                let _ = fragments.send(Fragment::new(AudioMixer::f32_to_pcm16(&mono)));
            },
            |err| error!("Microphone stream error: {}", err),
            None,
        )
        .map_err(map_build_error)
}

fn map_default_config_error(err: cpal::DefaultStreamConfigError) -> CaptureError {
    match err {
        cpal::DefaultStreamConfigError::BackendSpecific { err } => {
            CaptureError::PermissionDenied(err.to_string())
        }
        other => CaptureError::DeviceUnavailable(other.to_string()),
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::BackendSpecific { err } => {
            CaptureError::PermissionDenied(err.to_string())
        }
        other => CaptureError::DeviceUnavailable(other.to_string()),
    }
}

fn map_play_error(err: cpal::PlayStreamError) -> CaptureError {
    match err {
        cpal::PlayStreamError::BackendSpecific { err } => {
            CaptureError::PermissionDenied(err.to_string())
        }
        other => CaptureError::DeviceUnavailable(other.to_string()),
    }
}
