//! Optional on-disk copies of each recording and reply.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::audio::AudioBlob;

#[derive(Debug, Clone)]
pub struct ConversationArchive {
    dir: PathBuf,
}

impl ConversationArchive {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn save_recording(&self, audio: &AudioBlob) -> Result<PathBuf> {
        let wav = audio.to_wav().context("Failed to encode recording")?;
        let path = self.unique_path("recording.wav")?;
        std::fs::write(&path, wav).context("Failed to write recording")?;
        info!("Recording archived: {:?}", path);
        Ok(path)
    }

    pub fn save_reply(&self, filename: &str, audio: &[u8]) -> Result<PathBuf> {
        let path = self.unique_path(&format!("reply-{filename}"))?;
        std::fs::write(&path, audio).context("Failed to write reply audio")?;
        info!("Reply archived: {:?}", path);
        Ok(path)
    }

    fn unique_path(&self, suffix: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).context("Failed to create conversations directory")?;

        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = self.dir.join(format!("{timestamp}-{suffix}"));

        // Handle collision by appending counter
        if path.exists() {
            for i in 1..100 {
                let alt_path = self.dir.join(format!("{timestamp}-{i}-{suffix}"));
                if !alt_path.exists() {
                    return Ok(alt_path);
                }
            }
        }

        Ok(path)
    }
}
