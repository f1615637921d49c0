use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lumberjack")]
#[command(about = "Ships finished W3C log files to Elasticsearch", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every *.log file in the source directory once
    Run {
        /// Directory to scan, overrides source_directory from the config
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = lumberjack::config::resolve_config_path(cli.config.as_deref());

    // File logging only applies to runs; config commands stay on the console
    let log_directory = match cli.command {
        None | Some(Commands::Run { .. }) => {
            lumberjack::cli::run::configured_log_directory(config_path.as_deref())
        }
        Some(Commands::Config { .. }) => None,
    };
    let _log_guard = lumberjack::logging::init(log_directory.as_deref())?;

    match cli.command {
        Some(Commands::Run { dir }) => {
            lumberjack::cli::run::run(config_path, dir).await?;
        }
        None => {
            lumberjack::cli::run::run(config_path, None).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                lumberjack::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                lumberjack::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
