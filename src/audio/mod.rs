pub mod audio_mixer;
pub mod audio_source;
pub mod mic_source;
pub mod playback;
pub mod wav;

pub use audio_mixer::AudioMixer;
pub use audio_source::{
    CaptureDevice, CaptureError, CaptureStream, Fragment, FragmentBuffer, MicrophoneLease,
};
pub use mic_source::MicCaptureDevice;
pub use playback::{AudioOutput, PlaybackMonitor, SpeakerOutput};
pub use wav::{decode_wav, AudioBlob, AudioFormat, DecodedAudio};
