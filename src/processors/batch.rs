//! Workspace-wide batches: every document of every language bundle

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::languages::LanguageCatalog;
use crate::core::models::{ErrorRecord, FailurePolicy, FileResult};
use crate::core::service::TranslationService;
use crate::core::unit::UnitProcessor;
use crate::processors::document::{DocumentProcessor, ProcessOptions};
use crate::processors::store::write_atomic;

/// Cooperative stop flag, honoured between files and between languages
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; every clone observes it
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Append-only error log shared by the worker and whoever watches it
#[derive(Debug, Clone, Default)]
pub struct ErrorLog(Arc<Mutex<Vec<ErrorRecord>>>);

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: ErrorRecord) {
        self.0.lock().push(record);
    }

    pub fn extend(&self, records: impl IntoIterator<Item = ErrorRecord>) {
        self.0.lock().extend(records);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Copy of every record so far
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        self.0.lock().clone()
    }
}

/// Switches for a whole batch
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub dry_run: bool,
    pub only_missing: bool,
    pub failure_policy: FailurePolicy,
    /// Locales never processed unless named in `only`
    pub skip: Vec<String>,
    /// Process exactly these locales instead of the discovered ones
    pub only: Option<Vec<String>>,
}

impl BatchOptions {
    fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            dry_run: self.dry_run,
            only_missing: self.only_missing,
            failure_policy: self.failure_policy,
        }
    }
}

/// Progress notifications emitted while a batch runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    LanguageStarted {
        locale: String,
        name: String,
        files: usize,
    },
    LanguageSkipped {
        locale: String,
        reason: String,
    },
    FileFinished {
        locale: String,
        file: String,
        result: FileResult,
    },
    LanguageFinished {
        locale: String,
        result: FileResult,
    },
}

impl fmt::Display for BatchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchEvent::LanguageStarted { locale, name, files } => {
                write!(f, "Processing {} ({}): {} files", name, locale, files)
            }
            BatchEvent::LanguageSkipped { locale, reason } => write!(f, "Skipping {}: {}", locale, reason),
            BatchEvent::FileFinished { file, result, .. } => write!(
                f,
                "  {}: {} translated, {} errors",
                file, result.translated, result.errors
            ),
            BatchEvent::LanguageFinished { locale, result } => write!(
                f,
                "{} complete: {} translated, {} errors",
                locale, result.translated, result.errors
            ),
        }
    }
}

/// Per-file results of one language, keyed by path relative to the bundle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LanguageReport {
    pub locale: String,
    pub name: String,
    pub files: BTreeMap<String, FileResult>,
}

impl LanguageReport {
    /// Sum over every file of the language
    pub fn totals(&self) -> FileResult {
        let mut totals = FileResult::default();
        for result in self.files.values() {
            totals += *result;
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedLanguage {
    pub locale: String,
    pub reason: String,
}

/// Result of [`BatchRunner::process_language`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageRun {
    Finished(LanguageReport),
    Skipped(SkippedLanguage),
}

/// Everything a batch did
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub dry_run: bool,
    pub languages: Vec<LanguageReport>,
    pub skipped: Vec<SkippedLanguage>,
    pub totals: FileResult,
    pub errors: Vec<ErrorRecord>,
    pub cancelled: bool,
}

impl BatchReport {
    /// Whether any unit or file failed
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    fn add(&mut self, run: LanguageRun) {
        match run {
            LanguageRun::Finished(report) => {
                self.totals += report.totals();
                self.languages.push(report);
            }
            LanguageRun::Skipped(skipped) => self.skipped.push(skipped),
        }
    }
}

/// Runs translations over a workspace of `<locale>.<bundle_extension>` folders
#[derive(Clone)]
pub struct BatchRunner {
    workspace: PathBuf,
    config: Arc<TranslatorConfig>,
    catalog: Arc<LanguageCatalog>,
    processor: DocumentProcessor,
    events: Option<UnboundedSender<BatchEvent>>,
    errors: ErrorLog,
}

impl BatchRunner {
    /// Runner over the bundles in `workspace`, translating through `service`
    pub fn new(
        workspace: impl Into<PathBuf>,
        config: TranslatorConfig,
        service: Arc<dyn TranslationService>,
    ) -> Self {
        let catalog = LanguageCatalog::with_overrides(&config.languages);
        let processor = DocumentProcessor::new(UnitProcessor::new(service), &config);
        Self {
            workspace: workspace.into(),
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            processor,
            events: None,
            errors: ErrorLog::new(),
        }
    }

    /// Emit progress events on `sender`
    pub fn with_events(mut self, sender: UnboundedSender<BatchEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Record errors into an existing log
    pub fn with_error_log(mut self, errors: ErrorLog) -> Self {
        self.errors = errors;
        self
    }

    /// Replace the document processor built from the configuration
    pub fn with_processor(mut self, processor: DocumentProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    /// Errors recorded by every batch of this runner
    pub fn error_log(&self) -> &ErrorLog {
        &self.errors
    }

    /// Sorted locale codes of the bundles in the workspace
    pub fn discover_languages(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.workspace).map_err(|e| TranslationError::FileError {
            path: self.workspace.display().to_string(),
            message: e.to_string(),
        })?;

        let mut locales = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_dir() || !has_extension(&path, &self.config.bundle_extension) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                locales.push(stem.to_string_lossy().into_owned());
            }
        }

        locales.sort();
        Ok(locales)
    }

    /// Discovered languages of a workspace that must hold at least one bundle
    pub fn check_workspace(&self) -> Result<Vec<String>> {
        if !self.workspace.is_dir() {
            return Err(TranslationError::FileError {
                path: self.workspace.display().to_string(),
                message: "workspace does not exist or is not a directory".to_string(),
            });
        }

        let locales = self.discover_languages()?;
        if locales.is_empty() {
            return Err(TranslationError::FileError {
                path: self.workspace.display().to_string(),
                message: format!("no .{} bundles found", self.config.bundle_extension),
            });
        }
        Ok(locales)
    }

    /// Translate every document of one language bundle
    pub async fn process_language(
        &self,
        locale: &str,
        opts: &BatchOptions,
        cancel: &CancellationToken,
    ) -> LanguageRun {
        let Some(service_code) = self.catalog.lookup(locale) else {
            let unsupported = TranslationError::UnsupportedLocale {
                locale: locale.to_string(),
            };
            return self.skip(locale, &unsupported.to_string());
        };

        let bundle = self
            .workspace
            .join(format!("{}.{}", locale, self.config.bundle_extension));
        if !bundle.is_dir() {
            return self.skip(locale, "bundle not found");
        }

        let name = self.catalog.display_name(locale);
        let documents = self.find_documents(&bundle);
        let mut report = LanguageReport {
            locale: locale.to_string(),
            name: name.clone(),
            files: BTreeMap::new(),
        };

        info!("Translating {} ({}): {} documents", name, locale, documents.len());
        self.emit(BatchEvent::LanguageStarted {
            locale: locale.to_string(),
            name,
            files: documents.len(),
        });

        let process_opts = opts.process_options();
        for path in documents {
            if cancel.is_cancelled() {
                info!("Cancelled before {}", path.display());
                break;
            }

            let relative = relative_path(&bundle, &path);
            let result = match self.processor.process_file(&path, service_code, &process_opts).await {
                Ok(outcome) => {
                    let result = outcome.file_result();
                    self.errors.extend(outcome.records);
                    result
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    self.errors.push(ErrorRecord::new(&relative, "", e.to_string()));
                    FileResult::new(0, 1)
                }
            };

            self.emit(BatchEvent::FileFinished {
                locale: locale.to_string(),
                file: relative.clone(),
                result,
            });
            report.files.insert(relative, result);
        }

        self.emit(BatchEvent::LanguageFinished {
            locale: locale.to_string(),
            result: report.totals(),
        });

        LanguageRun::Finished(report)
    }

    /// Translate the selected languages one after another
    pub async fn process_all(&self, opts: &BatchOptions, cancel: &CancellationToken) -> Result<BatchReport> {
        let locales = match &opts.only {
            Some(only) => {
                let mut selected: Vec<String> = Vec::new();
                for locale in only {
                    if !selected.contains(locale) {
                        selected.push(locale.clone());
                    }
                }
                selected
            }
            None => self
                .discover_languages()?
                .into_iter()
                .filter(|locale| !opts.skip.contains(locale))
                .collect(),
        };

        info!(
            "Batch of {} languages via {} (dry run: {}, policy: {})",
            locales.len(),
            self.processor.unit_processor().service().name(),
            opts.dry_run,
            opts.failure_policy
        );

        let mut report = BatchReport {
            dry_run: opts.dry_run,
            ..Default::default()
        };
        let pause = self.config.language_pause();

        for (index, locale) in locales.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            if index > 0 && !pause.is_zero() {
                debug!("Pausing {:?} before {}", pause, locale);
                tokio::time::sleep(pause).await;
            }
            report.add(self.process_language(locale, opts, cancel).await);
        }

        report.cancelled = cancel.is_cancelled();
        report.errors = self.errors.snapshot();

        info!(
            "Batch finished: {} translated, {} errors across {} languages{}",
            report.totals.translated,
            report.totals.errors,
            report.languages.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        );

        Ok(report)
    }

    fn find_documents(&self, bundle: &Path) -> Vec<PathBuf> {
        let mut documents: Vec<PathBuf> = walkdir::WalkDir::new(bundle)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && has_extension(e.path(), &self.config.document_extension))
            .map(|e| e.into_path())
            .collect();
        documents.sort();
        documents
    }

    fn skip(&self, locale: &str, reason: &str) -> LanguageRun {
        warn!("Skipping {}: {}", locale, reason);
        self.emit(BatchEvent::LanguageSkipped {
            locale: locale.to_string(),
            reason: reason.to_string(),
        });
        LanguageRun::Skipped(SkippedLanguage {
            locale: locale.to_string(),
            reason: reason.to_string(),
        })
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(events) = &self.events {
            // a dropped receiver only means nobody is watching
            let _ = events.send(event);
        }
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

fn relative_path(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
