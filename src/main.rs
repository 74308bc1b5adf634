//! Main entry point for the xcloc-translator CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xcloc_translator::cli::commands::{self, Commands};
use xcloc_translator::TranslatorConfig;

/// xcloc-translator - translate Xcode localization bundles
#[derive(Parser, Debug)]
#[command(name = "xcloc-translator", version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ./xcloc-translator.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}={}", env!("CARGO_CRATE_NAME"), log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TranslatorConfig::load(args.config.as_deref())?;

    match args.command {
        Some(Commands::Translate(translate)) => commands::handle_translate(translate, config).await,
        Some(Commands::Languages) => {
            commands::handle_languages(&config);
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Serve { workspace, host, port }) => {
            commands::handle_serve(workspace, host, port, config).await?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
            Ok(ExitCode::SUCCESS)
        }
    }
}
