//! Rotation state inspection: `codeowners-rotator state`.

use anyhow::{Context, Result, bail};

use codeowners_rotator::config::{RotatorConfig, is_valid_repository};
use codeowners_rotator::state::StateStore;
use codeowners_rotator::ui;

use super::super::StateCommands;

pub async fn cmd_state(command: StateCommands) -> Result<()> {
    match command {
        StateCommands::Show { config, repo } => {
            let loaded = RotatorConfig::load(&config)?;
            if let Some(repo) = &repo
                && !is_valid_repository(repo)
            {
                bail!("Invalid repository name '{}': expected namespace/name", repo);
            }
            let store = StateStore::from_config(&loaded.storage)?;
            println!("State backend: {}", store.describe());
            println!();

            let repositories = match repo {
                Some(repo) => vec![repo],
                None => loaded.repositories.clone(),
            };
            for repository in &repositories {
                let state = store
                    .get_state(repository)
                    .await
                    .with_context(|| format!("Failed to read state for {}", repository))?;
                match state {
                    Some(state) => ui::print_state(&state),
                    None => println!(
                        "{} {}",
                        console::style(repository).bold(),
                        console::style("(never rotated)").dim()
                    ),
                }
            }

            if let Some(summary) = store
                .get_run_summary()
                .await
                .context("Failed to read run summary")?
            {
                println!();
                print!("{}", ui::report::format_run_summary(&summary));
            }
        }
    }
    Ok(())
}
