//! Register a new voice from recorded samples.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;

use super::args::TrainCliArgs;
use super::chat::create_spinner;
use crate::client::{TrainingRequest, VoiceChatClient, VoiceSample};
use crate::config::Config;

pub async fn handle_train_command(args: TrainCliArgs, config: Config) -> Result<()> {
    validate_name(&args.name)?;

    let mut samples = Vec::with_capacity(args.files.len());
    for path in &args.files {
        samples.push(read_sample(path).await?);
    }

    let client = VoiceChatClient::new(&config.server)?;
    let sample_count = samples.len();

    let spinner = create_spinner("Uploading voice samples...");
    let result = client
        .train_voice(TrainingRequest {
            model_name: args.name.clone(),
            samples,
        })
        .await;
    spinner.finish_and_clear();

    result.map_err(|e| anyhow!("Training {:?} failed: {e}", args.name))?;
    println!(
        "Voice {:?} trained from {} sample(s). Use it with --voice-id {}",
        args.name, sample_count, args.name
    );
    Ok(())
}

/// The server stores samples in a directory named after the model.
fn validate_name(name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Voice name must not be empty");
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("Voice name {:?} cannot contain path separators", name);
    }
    Ok(())
}

async fn read_sample(path: &Path) -> Result<VoiceSample> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(VoiceSample { filename, bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_names() {
        assert!(validate_name("grandpa").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("..").is_err());
    }

    #[tokio::test]
    async fn test_read_sample_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take1.mp3");
        std::fs::write(&path, b"ID3").unwrap();

        let sample = read_sample(&path).await.unwrap();
        assert_eq!(sample.filename, "take1.mp3");
        assert_eq!(sample.bytes, b"ID3");
    }

    #[tokio::test]
    async fn test_read_missing_sample() {
        let err = read_sample(Path::new("/nonexistent/take1.wav"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
