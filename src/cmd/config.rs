//! Configuration view and validation commands: `codeowners-rotator config`.

use anyhow::{Context, Result, bail};

use codeowners_rotator::config::RotatorConfig;
use codeowners_rotator::ui::icons::{CHECK, CROSS, WARNING};

use super::super::ConfigCommands;

const REDACTED: &str = "********";

pub fn cmd_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { config } => {
            let loaded = RotatorConfig::load(&config)?;
            println!("# Effective configuration (with env overrides)");
            println!("# Source: {}", config.display());
            let yaml = serde_yaml::to_string(&redacted(loaded))
                .context("Failed to serialize configuration")?;
            print!("{}", yaml);
        }
        ConfigCommands::Validate { config } => {
            println!("Validating {}...", config.display());
            let loaded = RotatorConfig::load(&config)?;
            if let Err(e) = loaded.validate() {
                println!("{}{}", CROSS, console::style(&e).red());
                bail!("Invalid configuration: {}", e);
            }

            let warnings = loaded.warnings();
            if warnings.is_empty() {
                println!("{}Configuration is valid.", CHECK);
            } else {
                println!("{}Configuration is valid, with warnings:", CHECK);
                for warning in warnings {
                    println!("  {}{}", WARNING, warning);
                }
            }
        }
    }
    Ok(())
}

fn redacted(mut config: RotatorConfig) -> RotatorConfig {
    if !config.gitlab.token.is_empty() {
        config.gitlab.token = REDACTED.to_string();
    }
    for secret in [
        &mut config.storage.token,
        &mut config.notification.slack_token,
    ] {
        if secret.is_some() {
            *secret = Some(REDACTED.to_string());
        }
    }
    config
}
