use anyhow::{bail, Context, Result};

use super::args::{ConfigCliArgs, ConfigCommand};
use crate::config::Config;

pub fn handle_config_command(args: ConfigCliArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::load()?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{rendered}");
        }
        ConfigCommand::Path => {
            println!("{}", Config::config_path()?.display());
        }
        ConfigCommand::Init { force } => {
            let path = Config::config_path()?;
            if path.exists() && !force {
                bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save_to(&path)?;
            println!("Wrote default config to {}", path.display());
        }
    }

    Ok(())
}
