use crate::client::{PromptTemplate, VoiceFields};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "voxchat")]
#[command(about = "Talk to a voice chat server: record, send, hear the reply", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Record from the terminal: Enter starts and stops, q quits
    Chat(ChatCliArgs),
    /// Send an existing WAV recording and play the reply
    Send(SendCliArgs),
    /// Train a new voice model from audio samples
    Train(TrainCliArgs),
    /// Show or initialise the configuration file
    Config(ConfigCliArgs),
    /// Print version information
    Version,
}

/// Overrides for the values configured under `[voice]`.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct FieldArgs {
    /// Emotion tag prepended to the reply
    #[arg(long)]
    pub emotion: Option<String>,
    /// Name of the trained voice model to answer with
    #[arg(long)]
    pub voice_id: Option<String>,
    /// Prompt template for the reply
    #[arg(long, value_enum)]
    pub template: Option<PromptTemplate>,
}

impl FieldArgs {
    pub fn apply(&self, mut fields: VoiceFields) -> VoiceFields {
        if let Some(emotion) = &self.emotion {
            fields.emotion = emotion.clone();
        }
        if let Some(voice_id) = &self.voice_id {
            fields.voice_id = voice_id.clone();
        }
        if let Some(template) = self.template {
            fields.prompt_template = template.as_str().to_string();
        }
        fields
    }
}

#[derive(ClapArgs, Debug)]
pub struct ChatCliArgs {
    #[command(flatten)]
    pub fields: FieldArgs,
    /// Pick voice, emotion and template interactively before recording
    #[arg(long)]
    pub choose: bool,
}

#[derive(ClapArgs, Debug)]
pub struct SendCliArgs {
    /// WAV file to send
    pub file: PathBuf,
    #[command(flatten)]
    pub fields: FieldArgs,
    /// Save the reply audio to this path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Do not play the reply
    #[arg(long)]
    pub no_play: bool,
}

#[derive(ClapArgs, Debug)]
pub struct TrainCliArgs {
    /// Name of the new voice; use it later as --voice-id
    pub name: String,
    /// Audio samples of the voice (wav, mp3, m4a, ...)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct ConfigCliArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> VoiceFields {
        VoiceFields {
            emotion: "neutral".to_string(),
            voice_id: "default".to_string(),
            prompt_template: "assistant".to_string(),
        }
    }

    #[test]
    fn test_parse_chat_overrides() {
        let cli = Cli::try_parse_from([
            "voxchat",
            "chat",
            "--voice-id",
            "grandpa",
            "--template",
            "tutor",
        ])
        .unwrap();

        let Some(CliCommand::Chat(args)) = cli.command else {
            panic!("expected chat command");
        };
        let fields = args.fields.apply(defaults());
        assert_eq!(fields.voice_id, "grandpa");
        assert_eq!(fields.prompt_template, "tutor");
        assert_eq!(fields.emotion, "neutral");
        assert!(!args.choose);
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "voxchat", "-v", "send", "question.wav", "--emotion", "happy", "-o", "reply.wav",
        ])
        .unwrap();
        assert!(cli.verbose);

        let Some(CliCommand::Send(args)) = cli.command else {
            panic!("expected send command");
        };
        assert_eq!(args.file, PathBuf::from("question.wav"));
        assert_eq!(args.output, Some(PathBuf::from("reply.wav")));
        assert_eq!(args.fields.apply(defaults()).emotion, "happy");
    }

    #[test]
    fn test_parse_train() {
        let cli =
            Cli::try_parse_from(["voxchat", "train", "grandpa", "a.wav", "b.mp3"]).unwrap();
        let Some(CliCommand::Train(args)) = cli.command else {
            panic!("expected train command");
        };
        assert_eq!(args.name, "grandpa");
        assert_eq!(
            args.files,
            vec![PathBuf::from("a.wav"), PathBuf::from("b.mp3")]
        );
    }

    #[test]
    fn test_train_requires_samples() {
        assert!(Cli::try_parse_from(["voxchat", "train", "grandpa"]).is_err());
    }

    #[test]
    fn test_unknown_template_rejected() {
        assert!(Cli::try_parse_from(["voxchat", "chat", "--template", "pirate"]).is_err());
    }

    #[test]
    fn test_no_subcommand_runs_service() {
        let cli = Cli::try_parse_from(["voxchat"]).unwrap();
        assert!(cli.command.is_none());
    }
}
