//! Terminal front end: Enter starts a recording, Enter again sends it.

use anyhow::{bail, Result};
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::args::ChatCliArgs;
use crate::app;
use crate::client::{FieldsHandle, PromptTemplate, VoiceFields};
use crate::config::Config;
use crate::session::{ChatMachine, FlowOutcome, SessionError, StatusHandle, STATUS_SENDING};

pub async fn handle_chat_command(args: ChatCliArgs, config: Config) -> Result<()> {
    let mut fields = args.fields.apply(config.voice.to_fields());
    if args.choose {
        fields = choose_fields(fields)?;
    }

    let status = StatusHandle::default();
    let machine = app::build_machine(&config, FieldsHandle::new(fields.clone()), status.clone())?;

    println!(
        "Voice: {}  Emotion: {}  Template: {}",
        fields.voice_id, fields.emotion, fields.prompt_template
    );
    println!("Press Enter to start recording, Enter again to send. Type q to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        if machine.is_recording().await {
            send_recording(&machine, &status).await?;
        } else {
            begin_recording(&machine, &status).await;
        }
    }

    if machine.is_recording().await {
        println!("Discarding unsent recording");
    }

    Ok(())
}

async fn begin_recording(machine: &ChatMachine, status: &StatusHandle) {
    match machine.start().await {
        Ok(()) => println!("{}  (Enter to send)", status.get().await.text),
        Err(SessionError::Capture(e)) => {
            let alert = status.get().await.last_alert.unwrap_or_default();
            eprintln!("{alert}");
            eprintln!("  ({e})");
        }
        Err(e) => eprintln!("{e}"),
    }
}

async fn send_recording(machine: &ChatMachine, status: &StatusHandle) -> Result<()> {
    let flow = match machine.stop().await {
        Ok(Some(flow)) => flow,
        Ok(None) => return Ok(()),
        Err(e) => {
            eprintln!("{}", status.get().await.text);
            eprintln!("  ({e})");
            return Ok(());
        }
    };

    let spinner = create_spinner(STATUS_SENDING);
    let outcome = flow.await?;
    spinner.finish_and_clear();

    let current = status.get().await;
    match outcome {
        FlowOutcome::Playing { handle, .. } => {
            println!("{}  ({})", current.text, handle.filename);
        }
        FlowOutcome::Failed(detail) => {
            eprintln!("{}", current.text);
            eprintln!("  ({detail})");
        }
    }
    Ok(())
}

pub(crate) fn create_spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn choose_fields(current: VoiceFields) -> Result<VoiceFields> {
    if !io::stdin().is_terminal() {
        bail!("--choose needs an interactive terminal");
    }

    let theme = ColorfulTheme::default();

    let voice_id: String = Input::with_theme(&theme)
        .with_prompt("Voice")
        .with_initial_text(current.voice_id.clone())
        .interact_text()?;

    let emotion: String = Input::with_theme(&theme)
        .with_prompt("Emotion")
        .with_initial_text(current.emotion.clone())
        .interact_text()?;

    let items: Vec<String> = PromptTemplate::ALL
        .iter()
        .map(|t| format!("{:<10} {}", t.as_str(), t.description()))
        .collect();
    let default_index = PromptTemplate::ALL
        .iter()
        .position(|t| t.as_str() == current.prompt_template)
        .unwrap_or(0);

    let selection = Select::with_theme(&theme)
        .with_prompt("Prompt template")
        .items(&items)
        .default(default_index)
        .interact()?;

    Ok(VoiceFields {
        emotion,
        voice_id,
        prompt_template: PromptTemplate::ALL[selection].as_str().to_string(),
    })
}
