use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxchat::{
    app,
    cli::{
        handle_chat_command, handle_config_command, handle_send_command, handle_train_command,
        Cli, CliCommand,
    },
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("voxchat {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Config(args)) => handle_config_command(args),
        Some(CliCommand::Chat(args)) => handle_chat_command(args, Config::load()?).await,
        Some(CliCommand::Send(args)) => handle_send_command(args, Config::load()?).await,
        Some(CliCommand::Train(args)) => handle_train_command(args, Config::load()?).await,
        None => app::run_service(Config::load()?).await,
    }
}
