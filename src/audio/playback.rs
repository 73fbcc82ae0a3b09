//! Reply playback using cpal.
//! Resamples from the reply's rate to the native device rate if needed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::audio_mixer::AudioMixer;
use super::wav::{decode_wav, DecodedAudio};

/// Observes a playback started by an [`AudioOutput`].
#[derive(Debug, Clone)]
pub struct PlaybackMonitor {
    finished: Arc<AtomicBool>,
}

impl PlaybackMonitor {
    pub fn new(finished: Arc<AtomicBool>) -> Self {
        Self { finished }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Wait for playback to complete (or be replaced).
    pub async fn wait(&self) {
        while !self.is_finished() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Start playing a WAV document. Resolves once audio is flowing.
    /// Any playback already in progress is stopped once the new one is
    /// running; it keeps playing if this call fails.
    async fn play(&self, wav: Vec<u8>) -> Result<PlaybackMonitor>;

    fn stop(&self);
}

type OpenStream = fn(DecodedAudio, Arc<AtomicBool>, Arc<AtomicBool>) -> Result<cpal::Stream>;

/// Plays through the default output device.
pub struct SpeakerOutput {
    current: Mutex<Option<Arc<AtomicBool>>>,
    open: OpenStream,
}

impl Default for SpeakerOutput {
    fn default() -> Self {
        Self::with_opener(open_output_stream)
    }
}

impl SpeakerOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_opener(open: OpenStream) -> Self {
        Self {
            current: Mutex::new(None),
            open,
        }
    }

    /// Make `cancel` the current playback and stop whatever it replaces.
    fn replace_current(&self, cancel: Arc<AtomicBool>) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(cancel) {
                previous.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[async_trait]
impl AudioOutput for SpeakerOutput {
    async fn play(&self, wav: Vec<u8>) -> Result<PlaybackMonitor> {
        let audio = decode_wav(&wav).context("reply is not a playable WAV file")?;
        debug!(
            "Decoded reply: {} samples at {}Hz, {} channel(s)",
            audio.samples.len(),
            audio.format.sample_rate,
            audio.format.channels
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        {
            let cancel = cancel.clone();
            let finished = finished.clone();
            let open = self.open;
            std::thread::Builder::new()
                .name("voxchat-playback".to_string())
                .spawn(move || run_playback_thread(open, audio, cancel, finished, ready_tx))
                .context("failed to spawn playback thread")?;
        }

        // The previous reply keeps playing until the new stream is running.
        ready_rx
            .await
            .context("playback thread exited before starting")??;

        self.replace_current(cancel);

        Ok(PlaybackMonitor::new(finished))
    }

    fn stop(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(cancel) = current.take() {
                cancel.store(true, Ordering::SeqCst);
            }
        }
    }
}

fn run_playback_thread(
    open: OpenStream,
    audio: DecodedAudio,
    cancel: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<()>>,
) {
    let stream = match open(audio, cancel.clone(), finished.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            finished.store(true, Ordering::SeqCst);
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(())).is_err() {
        finished.store(true, Ordering::SeqCst);
        return;
    }

    while !finished.load(Ordering::SeqCst) && !cancel.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    finished.store(true, Ordering::SeqCst);
    debug!("Playback stream closed");
}

fn open_output_stream(
    audio: DecodedAudio,
    cancel: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no output device available")?;

    let supported_config = device
        .default_output_config()
        .context("failed to get default output config")?;

    let native_rate = supported_config.sample_rate().0;
    let native_channels = supported_config.channels() as usize;
    let sample_format = supported_config.sample_format();
    let config: StreamConfig = supported_config.into();

    let mono = AudioMixer::downmix_to_mono(&audio.samples, audio.format.channels as usize);
    let resampled = AudioMixer::resample(&mono, audio.format.sample_rate, native_rate);
    let samples = Arc::new(AudioMixer::expand_channels(&resampled, native_channels));

    info!(
        "Playing reply: {:.1}s on {}",
        resampled.len() as f64 / native_rate.max(1) as f64,
        device.name().unwrap_or_else(|_| "unknown".to_string())
    );

    let position = Arc::new(AtomicUsize::new(0));
    let stream = match sample_format {
        SampleFormat::F32 => {
            build_stream::<f32>(&device, &config, samples, position, cancel, finished)?
        }
        SampleFormat::I16 => {
            build_stream::<i16>(&device, &config, samples, position, cancel, finished)?
        }
        SampleFormat::U16 => {
            build_stream::<u16>(&device, &config, samples, position, cancel, finished)?
        }
        format => anyhow::bail!("unsupported sample format: {:?}", format),
    };

    stream.play().context("failed to start playback stream")?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Arc<Vec<f32>>,
    position: Arc<AtomicUsize>,
    cancel: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let pos = position.load(Ordering::SeqCst);
                let remaining = samples.len().saturating_sub(pos);

                if remaining == 0 || cancel.load(Ordering::SeqCst) {
                    data.fill(T::EQUILIBRIUM);
                    finished.store(true, Ordering::SeqCst);
                    return;
                }

                let to_copy = remaining.min(data.len());
                for (slot, &sample) in data.iter_mut().zip(&samples[pos..pos + to_copy]) {
                    *slot = T::from_sample(sample);
                }

                if to_copy < data.len() {
                    data[to_copy..].fill(T::EQUILIBRIUM);
                }

                position.store(pos + to_copy, Ordering::SeqCst);
            },
            |err| error!("Playback stream error: {}", err),
            None,
        )
        .context("failed to build output stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_monitor_wait_returns_when_finished() {
        let finished = Arc::new(AtomicBool::new(false));
        let monitor = PlaybackMonitor::new(finished.clone());
        assert!(!monitor.is_finished());

        let flag = finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::timeout(Duration::from_secs(2), monitor.wait())
            .await
            .unwrap();
        assert!(monitor.is_finished());
    }

    #[tokio::test]
    async fn test_play_rejects_non_wav_before_touching_device() {
        let output = SpeakerOutput::new();
        let err = output.play(b"<html>oops</html>".to_vec()).await.unwrap_err();
        assert!(err.to_string().contains("not a playable WAV"));
    }

    fn reply_wav() -> Vec<u8> {
        let blob = crate::audio::AudioBlob {
            format: crate::audio::AudioFormat::mono(16000),
            pcm: vec![0u8; 640],
        };
        blob.to_wav().unwrap()
    }

    #[tokio::test]
    async fn test_failed_open_keeps_previous_reply_playing() {
        let output =
            SpeakerOutput::with_opener(|_, _, _| anyhow::bail!("no output device available"));
        let previous = Arc::new(AtomicBool::new(false));
        *output.current.lock().unwrap() = Some(previous.clone());

        let err = output.play(reply_wav()).await.unwrap_err();
        assert!(err.to_string().contains("no output device"));
        assert!(!previous.load(Ordering::SeqCst));
        assert!(output.current.lock().unwrap().is_some());
    }

    #[test]
    fn test_replace_current_cancels_previous() {
        let output = SpeakerOutput::with_opener(|_, _, _| anyhow::bail!("unused"));
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        output.replace_current(first.clone());
        output.replace_current(second.clone());
        assert!(first.load(Ordering::SeqCst));
        assert!(!second.load(Ordering::SeqCst));

        output.stop();
        assert!(second.load(Ordering::SeqCst));
    }
}
