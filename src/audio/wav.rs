//! WAV container handling for recordings and server replies.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use std::time::Duration;

use super::audio_mixer::AudioMixer;
use super::audio_source::FragmentBuffer;

/// Layout of 16-bit PCM audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }
}

/// A complete recording: the concatenated fragments and their format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub format: AudioFormat,
    pub pcm: Vec<u8>,
}

impl AudioBlob {
    pub fn from_fragments(format: AudioFormat, fragments: &FragmentBuffer) -> Self {
        Self {
            format,
            pcm: fragments.concat(),
        }
    }

    /// Load an existing WAV file, converting any supported sample format to
    /// 16-bit PCM.
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, hound::Error> {
        let decoded = decode_wav(bytes)?;
        Ok(Self {
            format: decoded.format,
            pcm: AudioMixer::f32_to_pcm16(&decoded.samples),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn duration(&self) -> Duration {
        let bytes_per_second =
            self.format.sample_rate as u64 * self.format.channels as u64 * 2;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.pcm.len() as f64 / bytes_per_second as f64)
    }

    /// Wrap the PCM in a RIFF/WAV container.
    pub fn to_wav(&self) -> Result<Vec<u8>, hound::Error> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.format.wav_spec())?;
            for chunk in self.pcm.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

/// Interleaved samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub format: AudioFormat,
    pub samples: Vec<f32>,
}

pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, hound::Error> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(DecodedAudio {
        format: AudioFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
        samples,
    })
}
