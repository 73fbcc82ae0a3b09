//! Send a WAV file that was recorded elsewhere.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use tracing::error;

use super::args::SendCliArgs;
use super::chat::create_spinner;
use crate::audio::{AudioBlob, AudioOutput, SpeakerOutput};
use crate::client::{UploadPayload, VoiceChatClient, VoiceChatService};
use crate::config::Config;
use crate::session::{STATUS_ERROR, STATUS_PLAYBACK, STATUS_SENDING};

pub async fn handle_send_command(args: SendCliArgs, config: Config) -> Result<()> {
    validate_input(&args.file)?;

    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let audio = AudioBlob::from_wav_bytes(&bytes).context("Failed to decode WAV file")?;
    let fields = args.fields.apply(config.voice.to_fields());

    let client = VoiceChatClient::new(&config.server)?;

    let spinner = create_spinner(STATUS_SENDING);
    let uploaded = client.upload(UploadPayload { audio, fields }).await;
    let reply = match uploaded {
        Ok(handle) => client.fetch_audio(&handle).await.map(|audio| (handle, audio)),
        Err(e) => Err(e),
    };
    spinner.finish_and_clear();

    let (handle, reply) = reply.map_err(|e| {
        error!("Error while sending audio: {}", e);
        anyhow!("{STATUS_ERROR} ({e})")
    })?;
    println!("Reply: {}", handle.url);

    if let Some(path) = &args.output {
        tokio::fs::write(path, &reply)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved reply to {}", path.display());
    }

    if args.no_play {
        return Ok(());
    }

    let output = SpeakerOutput::new();
    let monitor = output.play(reply).await?;
    println!("{STATUS_PLAYBACK}");
    monitor.wait().await;

    Ok(())
}

fn validate_input(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if extension != "wav" {
        bail!(
            "Unsupported format: {:?}. Only .wav recordings can be sent",
            extension
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = validate_input(Path::new("/nonexistent/question.wav")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        let err = validate_input(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported format"));
    }

    #[test]
    fn test_wav_accepted_case_insensitive() {
        let file = tempfile::Builder::new().suffix(".WAV").tempfile().unwrap();
        assert!(validate_input(file.path()).is_ok());
    }
}
