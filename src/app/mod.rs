use crate::api::{error::ApiError, ApiCommand, ApiServer, RecordingAction};
use crate::audio::{MicCaptureDevice, SpeakerOutput};
use crate::client::{FieldsHandle, VoiceChatClient};
use crate::config::Config;
use crate::global;
use crate::session::{ChatMachine, ConversationArchive, StatusHandle, ToggleOutcome};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting voxchat service");

    if !config.api.enabled {
        bail!("The control API is disabled in the config; use `voxchat chat` instead");
    }

    let fields = FieldsHandle::new(config.voice.to_fields());
    let status = StatusHandle::default();
    let machine = build_machine(&config, fields.clone(), status.clone())?;

    let (tx, mut rx) = mpsc::channel::<ApiCommand>(10);
    let api_server = ApiServer::new(tx, status, fields, config.api.port);
    let server = tokio::spawn(api_server.start());

    info!("voxchat is ready!");
    info!(
        "Toggle recording with: curl -X POST http://127.0.0.1:{}/toggle",
        config.api.port
    );

    let commands = async {
        while let Some(command) = rx.recv().await {
            let result = run_command(&machine, command.action).await;
            if let Err(e) = &result {
                error!("Failed to {} recording: {}", command.action.as_str(), e.message());
            }
            let _ = command.reply.send(result);
        }
    };

    tokio::select! {
        result = server => {
            result.context("API server task panicked")?.context("API server failed")?;
        }
        _ = commands => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

async fn run_command(machine: &ChatMachine, action: RecordingAction) -> Result<(), ApiError> {
    match action {
        RecordingAction::Start => machine.start().await?,
        RecordingAction::Stop => {
            // The upload-and-playback flow keeps running in the background.
            if machine.stop().await?.is_none() {
                info!("Nothing was recording");
            }
        }
        RecordingAction::Toggle => match machine.toggle().await? {
            ToggleOutcome::Started => info!("Recording started"),
            ToggleOutcome::Stopped(_) => info!("Recording stopped, sending audio"),
        },
    }
    Ok(())
}

/// Wire the real microphone, server client and speakers into a machine.
pub fn build_machine(
    config: &Config,
    fields: FieldsHandle,
    status: StatusHandle,
) -> Result<ChatMachine> {
    let device = Arc::new(MicCaptureDevice::new(config.audio.input_device.clone()));
    let client = Arc::new(VoiceChatClient::new(&config.server)?);
    let output = Arc::new(SpeakerOutput::new());

    let archive = if config.behavior.keep_audio {
        let dir = global::conversations_dir()?;
        info!("Archiving conversations in {:?}", dir);
        Some(ConversationArchive::new(dir))
    } else {
        None
    };

    Ok(ChatMachine::new(device, client, output, fields, status).with_archive(archive))
}
