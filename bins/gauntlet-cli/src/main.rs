mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gauntlet_common::config::Settings;
use gauntlet_common::types::Ecosystem;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gauntlet")]
#[command(about = "Gauntlet - Run learner submissions against exercise test suites in containers", long_about = None)]
struct Cli {
    /// Directory submissions are staged into [env: GAUNTLET_SCRATCH_DIR]
    #[arg(long, global = true)]
    scratch_dir: Option<PathBuf>,

    /// Ecosystem profiles file [env: GAUNTLET_ECOSYSTEMS_CONFIG]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Container runtime binary [env: GAUNTLET_CONTAINER_RUNTIME]
    #[arg(long, global = true)]
    runtime: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one submission against one exercise
    Run {
        /// Ecosystem (solidity, cairo, zig)
        #[arg(short, long)]
        ecosystem: Ecosystem,

        /// Exercise number
        #[arg(short = 'x', long)]
        exercise: String,

        /// Source file to submit (reads stdin when omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// List configured ecosystems and their limits
    Ecosystems,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("GAUNTLET_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so stdout stays the result
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(dir) = cli.scratch_dir {
        settings.scratch_dir = dir;
    }
    if let Some(config) = cli.config {
        settings.ecosystems_config = config;
    }
    if let Some(runtime) = cli.runtime {
        settings.container_runtime = runtime;
    }

    match cli.command {
        Commands::Run {
            ecosystem,
            exercise,
            file,
            json,
        } => {
            let successful =
                commands::run_submission(&settings, ecosystem, &exercise, file.as_deref(), json)
                    .await?;
            if !successful {
                std::process::exit(1);
            }
        }
        Commands::Ecosystems => {
            commands::list_ecosystems(&settings)?;
        }
    }

    Ok(())
}
