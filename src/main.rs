use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "codeowners-rotator")]
#[command(
    version,
    about = "Rotate CODEOWNERS reviewers across GitLab repositories and notify them on merge requests"
)]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Advance the reviewer rotation and update each repository's CODEOWNERS file
    Rotate {
        /// Path to the YAML configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Show what would change without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Advance even if this rotation interval already rotated
        #[arg(long)]
        force: bool,

        /// Only rotate these repositories (repeatable; defaults to all configured)
        #[arg(long = "repo")]
        repos: Vec<String>,
    },
    /// Notify the current code owners about a merge request
    Notify {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Repository path (namespace/name)
        #[arg(short, long)]
        repo: String,

        #[arg(short = 'm', long)]
        mr_id: String,

        #[arg(short = 't', long)]
        mr_title: String,

        #[arg(short = 'u', long)]
        mr_url: String,

        #[arg(short = 'a', long)]
        mr_author: String,

        /// Read owners from this branch first
        #[arg(short = 'b', long)]
        mr_source_branch: Option<String>,

        /// Post to the fallback channel even when no owners are found
        #[arg(short, long)]
        force_notify: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Inspect stored rotation state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration with secrets redacted
    Show {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },
    /// Validate configuration and show any warnings
    Validate {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },
}

#[derive(Subcommand, Clone)]
pub enum StateCommands {
    /// Show rotation state for configured repositories
    Show {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Only show this repository
        #[arg(long)]
        repo: Option<String>,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_level.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // A missing .env is fine; variables may come from the CI environment.
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose, cli.log_json);

    match &cli.command {
        Commands::Rotate {
            config,
            dry_run,
            force,
            repos,
        } => cmd::cmd_rotate(config, *dry_run, *force, repos).await?,
        Commands::Notify {
            config,
            repo,
            mr_id,
            mr_title,
            mr_url,
            mr_author,
            mr_source_branch,
            force_notify,
        } => {
            let mr = codeowners_rotator::notify::MergeRequestContext {
                repository: repo.clone(),
                id: mr_id.clone(),
                title: mr_title.clone(),
                url: mr_url.clone(),
                author: mr_author.clone(),
                source_branch: mr_source_branch.clone(),
            };
            cmd::cmd_notify(config, mr, *force_notify).await?
        }
        Commands::Config { command } => cmd::cmd_config(command.clone())?,
        Commands::State { command } => cmd::cmd_state(command.clone()).await?,
    }

    Ok(())
}
