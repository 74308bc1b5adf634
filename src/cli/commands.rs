//! CLI command definitions and handlers

use clap::{Args, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use crate::core::client::GoogleTranslator;
use crate::core::config::TranslatorConfig;
use crate::core::languages::LanguageCatalog;
use crate::core::models::FailurePolicy;
use crate::processors::batch::{BatchEvent, BatchOptions, BatchReport, BatchRunner, CancellationToken};

/// Errors printed after a batch
const ERRORS_SHOWN: usize = 10;

/// Exit code of a batch interrupted with Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

/// Commands for xcloc-translator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate every .xcloc bundle of a workspace
    Translate(TranslateArgs),

    /// List supported locales
    Languages,

    /// Start the HTTP control panel
    Serve {
        /// Folder holding the `<locale>.xcloc` bundles
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Listen port
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    Strict,
    Relaxed,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Strict => FailurePolicy::Strict,
            PolicyArg::Relaxed => FailurePolicy::Relaxed,
        }
    }
}

/// Options of the `translate` subcommand
#[derive(Args, Debug, Clone)]
pub struct TranslateArgs {
    /// Folder holding the `<locale>.xcloc` bundles
    #[arg(short, long, default_value = ".")]
    pub workspace: PathBuf,

    /// Translate and count without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// Only fill missing targets and targets that still equal the source
    #[arg(long)]
    pub only_missing: bool,

    /// Locales to leave alone (default: from configuration)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Process only these locales
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// What to do with translations that lost placeholders
    #[arg(long, value_enum, default_value_t = PolicyArg::Relaxed)]
    pub policy: PolicyArg,

    /// Use the strict policy and exit with status 1 if any unit failed
    #[arg(long)]
    pub fail_on_placeholder_mismatch: bool,

    /// Write a JSON report of the batch
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl TranslateArgs {
    /// Batch options with configuration defaults filled in
    pub fn batch_options(&self, config: &TranslatorConfig) -> BatchOptions {
        let failure_policy = if self.fail_on_placeholder_mismatch {
            FailurePolicy::Strict
        } else {
            self.policy.into()
        };

        BatchOptions {
            dry_run: self.dry_run,
            only_missing: self.only_missing,
            failure_policy,
            skip: if self.skip.is_empty() {
                config.default_skip.clone()
            } else {
                self.skip.clone()
            },
            only: if self.only.is_empty() {
                None
            } else {
                Some(self.only.clone())
            },
        }
    }
}

fn build_runner(workspace: &Path, config: TranslatorConfig) -> anyhow::Result<BatchRunner> {
    let translator = Arc::new(GoogleTranslator::new(config.clone())?);
    Ok(BatchRunner::new(workspace, config, translator))
}

/// Handle the translate command
pub async fn handle_translate(args: TranslateArgs, config: TranslatorConfig) -> anyhow::Result<ExitCode> {
    let start_time = Instant::now();
    let opts = args.batch_options(&config);

    let runner = build_runner(&args.workspace, config)?;
    let locales = runner.check_workspace()?;

    info!("Workspace: {}", args.workspace.display());
    info!("Found languages: {}", locales.join(", "));
    if opts.dry_run {
        println!("🔍 Dry run: no files will be modified");
    }

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after the current file");
                cancel.cancel();
            }
        })
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let runner = runner.with_events(tx);
    let batch = async move {
        let report = runner.process_all(&opts, &cancel).await;
        drop(runner);
        report
    };

    let (report, _) = tokio::join!(batch, render_progress(rx));
    interrupt.abort();
    let report = report?;

    print_summary(&report);

    if let Some(path) = &args.report {
        report.write_json(path)?;
        println!("\n📝 Report saved to: {}", path.display());
    }

    println!("   Time: {:?}", start_time.elapsed());

    if report.cancelled {
        println!("\n⚠️  Batch interrupted");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }

    if args.fail_on_placeholder_mismatch && report.has_errors() {
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

/// One progress bar per language, driven by batch events
async fn render_progress(mut events: UnboundedReceiver<BatchEvent>) {
    let style = ProgressStyle::with_template("{prefix:>8} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match &event {
            BatchEvent::LanguageStarted { locale, name, files } => {
                let pb = ProgressBar::new(*files as u64);
                pb.set_style(style.clone());
                pb.set_prefix(locale.clone());
                pb.set_message(name.clone());
                bar = Some(pb);
            }
            BatchEvent::FileFinished { file, .. } => {
                if let Some(pb) = &bar {
                    pb.set_message(file.clone());
                    pb.inc(1);
                }
            }
            BatchEvent::LanguageFinished { .. } => {
                if let Some(pb) = bar.take() {
                    pb.finish_with_message(event.to_string());
                }
            }
            BatchEvent::LanguageSkipped { .. } => println!("⚠️  {}", event),
        }
    }
}

fn print_summary(report: &BatchReport) {
    println!("\n✅ Translation completed!");
    println!("\n{:<12} {:<28} {:>10} {:>8}", "Locale", "Language", "Translated", "Errors");
    for language in &report.languages {
        let totals = language.totals();
        println!(
            "{:<12} {:<28} {:>10} {:>8}",
            language.locale, language.name, totals.translated, totals.errors
        );
    }
    for skipped in &report.skipped {
        println!("{:<12} {:<28} {:>10} {:>8}", skipped.locale, skipped.reason, "-", "-");
    }
    println!(
        "{:<12} {:<28} {:>10} {:>8}",
        "Total", "", report.totals.translated, report.totals.errors
    );

    if report.has_errors() {
        println!("\n❌ {} errors:", report.errors.len());
        for record in report.errors.iter().take(ERRORS_SHOWN) {
            println!("   [{}] {:?}: {}", record.file, record.text, record.message);
        }
        if report.errors.len() > ERRORS_SHOWN {
            println!("   ... and {} more", report.errors.len() - ERRORS_SHOWN);
        }
    }
}

/// Handle the languages command
pub fn handle_languages(config: &TranslatorConfig) {
    let catalog = LanguageCatalog::with_overrides(&config.languages);

    println!("{:<12} {:<10} {}", "Locale", "Service", "Language");
    for entry in catalog.entries() {
        println!("{:<12} {:<10} {}", entry.locale, entry.service_code, entry.name);
    }
    println!("\n{} locales", catalog.len());
}

/// Handle the serve command
pub async fn handle_serve(
    workspace: PathBuf,
    host: String,
    port: u16,
    config: TranslatorConfig,
) -> anyhow::Result<()> {
    use crate::server::api::run_server;

    let runner = build_runner(&workspace, config)?;
    let locales = runner.check_workspace()?;

    info!("Serving {} ({} bundles)", workspace.display(), locales.len());
    println!("🚀 Control panel on http://{}:{}", host, port);

    run_server(runner, host, port).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> TranslateArgs {
        TranslateArgs {
            workspace: PathBuf::from("."),
            dry_run: false,
            only_missing: false,
            skip: vec![],
            only: vec![],
            policy: PolicyArg::Relaxed,
            fail_on_placeholder_mismatch: false,
            report: None,
        }
    }

    #[test]
    fn test_batch_options_use_configured_skip_list() {
        let opts = args().batch_options(&TranslatorConfig::default());
        assert_eq!(opts.skip, vec!["en"]);
        assert_eq!(opts.only, None);
        assert_eq!(opts.failure_policy, FailurePolicy::Relaxed);
    }

    #[test]
    fn test_fail_on_mismatch_implies_strict() {
        let args = TranslateArgs {
            fail_on_placeholder_mismatch: true,
            only: vec!["fr".to_string()],
            skip: vec!["de".to_string()],
            ..args()
        };
        let opts = args.batch_options(&TranslatorConfig::default());

        assert_eq!(opts.failure_policy, FailurePolicy::Strict);
        assert_eq!(opts.only, Some(vec!["fr".to_string()]));
        assert_eq!(opts.skip, vec!["de"]);
    }

    #[tokio::test]
    async fn test_missing_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = TranslateArgs {
            workspace: dir.path().join("missing"),
            ..args()
        };
        let config = TranslatorConfig::default().without_pauses();

        assert!(handle_translate(args, config).await.is_err());
    }
}
