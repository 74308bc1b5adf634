//! Per-document translation: select units, translate them, persist the result

use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::models::{ErrorRecord, FailurePolicy, FileResult, TranslationUnit, UnitState};
use crate::core::unit::UnitProcessor;
use crate::processors::store::DocumentStore;
use crate::processors::xliff::Document;

/// Switches for one pass over a document
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Translate and count, but change neither the units nor the file
    pub dry_run: bool,
    /// Also retranslate targets that are a verbatim copy of the source,
    /// and leave every other translated target alone
    pub only_missing: bool,
    pub failure_policy: FailurePolicy,
}

/// What happened to one document
#[derive(Debug, Default)]
pub struct DocumentOutcome {
    /// Units that needed translation, failures included
    pub translated: usize,
    pub errors: usize,
    pub records: Vec<ErrorRecord>,
    /// Set when the write was rolled back
    pub persistence: Option<TranslationError>,
}

impl DocumentOutcome {
    /// Counters as reported per file; a rolled back file counts every unit as failed
    pub fn file_result(&self) -> FileResult {
        match self.persistence {
            Some(_) => FileResult::new(0, self.translated),
            None => FileResult::new(self.translated, self.errors),
        }
    }
}

/// Translates the units of a document that need it
#[derive(Clone)]
pub struct DocumentProcessor {
    units: UnitProcessor,
    store: DocumentStore,
    source_lang: String,
    units_per_pause: usize,
    unit_pause: Duration,
}

impl DocumentProcessor {
    /// Processor pacing itself with the pause settings of `config`
    pub fn new(units: UnitProcessor, config: &TranslatorConfig) -> Self {
        Self {
            units,
            store: DocumentStore::new(),
            source_lang: config.source_lang.clone(),
            units_per_pause: config.units_per_pause.max(1),
            unit_pause: config.unit_pause(),
        }
    }

    /// Persist through a custom store (e.g. one with another verifier)
    pub fn with_store(mut self, store: DocumentStore) -> Self {
        self.store = store;
        self
    }

    pub fn unit_processor(&self) -> &UnitProcessor {
        &self.units
    }

    /// Load `path` and process it; load and parse failures are returned as errors
    pub async fn process_file(
        &self,
        path: &Path,
        target_lang: &str,
        opts: &ProcessOptions,
    ) -> Result<DocumentOutcome> {
        let mut doc = Document::load(path)?;
        Ok(self.process_document(&mut doc, target_lang, opts).await)
    }

    /// Translate every unit of `doc` that needs it, then write the file back.
    ///
    /// On a failed write the file keeps its original bytes and the outcome
    /// carries the `PersistenceError`.
    pub async fn process_document(
        &self,
        doc: &mut Document,
        target_lang: &str,
        opts: &ProcessOptions,
    ) -> DocumentOutcome {
        let file_name = doc.file_name();
        let mut outcome = DocumentOutcome::default();

        debug!("Processing {} ({} units) for {}", file_name, doc.units().len(), target_lang);

        for index in 0..doc.units().len() {
            let unit = &doc.units()[index];
            if unit.source_text.trim().is_empty() || !needs_translation(unit, opts.only_missing) {
                continue;
            }

            let result = self
                .units
                .translate_unit(unit, &self.source_lang, target_lang, opts.failure_policy)
                .await;

            if let Some(error) = &result.error {
                outcome.errors += 1;
                outcome
                    .records
                    .push(ErrorRecord::new(&file_name, &unit.source_text, error.to_string()));
            }

            if !opts.dry_run {
                let state = if result.is_ok() {
                    UnitState::Translated
                } else {
                    UnitState::NeedsReview
                };
                doc.units_mut()[index].set_target(result.text, state);
            }

            outcome.translated += 1;

            if outcome.translated % self.units_per_pause == 0 {
                debug!("Translated {} entries of {}", outcome.translated, file_name);
                if !self.unit_pause.is_zero() {
                    tokio::time::sleep(self.unit_pause).await;
                }
            }
        }

        if !opts.dry_run && doc.is_modified() {
            if let Err(e) = self.store.commit(doc) {
                warn!("Discarded changes to {}: {}", file_name, e);
                outcome
                    .records
                    .push(ErrorRecord::new(&file_name, "", e.to_string()));
                outcome.persistence = Some(e);
                return outcome;
            }
        }

        info!(
            "{}: {} translated, {} errors{}",
            file_name,
            outcome.translated,
            outcome.errors,
            if opts.dry_run { " (dry run)" } else { "" }
        );

        outcome
    }
}

/// Whether a unit's target must be (re)produced
pub fn needs_translation(unit: &TranslationUnit, only_missing: bool) -> bool {
    match unit.state {
        UnitState::Missing | UnitState::Empty | UnitState::NeedsReview => true,
        UnitState::Translated | UnitState::UpToDate => only_missing && unit.target_matches_source(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::service::testing::MockTranslator;
    use crate::processors::xliff::tests::SAMPLE;
    use std::sync::Arc;

    const COPIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xliff xmlns="urn:oasis:names:tc:xliff:document:1.2" version="1.2">
  <file original="App/Main.strings" source-language="en" target-language="de" datatype="plaintext">
    <body>
      <trans-unit id="copied">
        <source>Cancel</source>
        <target state="translated">Cancel</target>
      </trans-unit>
      <trans-unit id="localized">
        <source>Close</source>
        <target state="translated">Schließen</target>
      </trans-unit>
      <trans-unit id="blank">
        <source>   </source>
      </trans-unit>
    </body>
  </file>
</xliff>
"#;

    fn processor(mock: MockTranslator) -> (DocumentProcessor, Arc<MockTranslator>) {
        let mock = Arc::new(mock);
        let config = TranslatorConfig::default().without_pauses();
        (DocumentProcessor::new(UnitProcessor::new(mock.clone()), &config), mock)
    }

    fn on_disk(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_translates_missing_empty_and_review_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(dir.path(), "fr.xliff", SAMPLE);
        let (processor, mock) = processor(MockTranslator::tagging());

        let outcome = processor
            .process_file(&path, "fr", &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.file_result(), FileResult::new(3, 0));
        assert_eq!(mock.calls(), 3);

        let doc = Document::load(&path).unwrap();
        let units = doc.units();
        assert_eq!(units[0].target_text.as_deref(), Some("[fr] You drank %lld ml today"));
        assert_eq!(units[0].state, UnitState::Translated);
        assert_eq!(units[1].target_text.as_deref(), Some("[fr] Settings"));
        assert_eq!(units[2].target_text.as_deref(), Some("Terminé"));
        assert_eq!(units[3].target_text.as_deref(), Some("[fr] Save & exit"));
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_touching_anything() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(dir.path(), "fr.xliff", SAMPLE);
        let (processor, _) = processor(MockTranslator::tagging());

        let mut doc = Document::load(&path).unwrap();
        let before = doc.units().to_vec();
        let opts = ProcessOptions {
            dry_run: true,
            ..Default::default()
        };

        let outcome = processor.process_document(&mut doc, "fr", &opts).await;

        assert_eq!(outcome.translated, 3);
        assert_eq!(doc.units(), before.as_slice());
        assert_eq!(std::fs::read(&path).unwrap(), SAMPLE.as_bytes());
    }

    #[tokio::test]
    async fn test_only_missing_retranslates_source_copies_only() {
        let mut doc = Document::from_bytes("de.xliff", COPIES.as_bytes().to_vec()).unwrap();
        let (processor, mock) = processor(MockTranslator::tagging());
        let opts = ProcessOptions {
            dry_run: true,
            only_missing: true,
            ..Default::default()
        };

        let outcome = processor.process_document(&mut doc, "de", &opts).await;

        assert_eq!(outcome.translated, 1);
        let requests = mock.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].text, "Cancel");
    }

    #[tokio::test]
    async fn test_existing_targets_are_kept_without_only_missing() {
        let mut doc = Document::from_bytes("de.xliff", COPIES.as_bytes().to_vec()).unwrap();
        let (processor, mock) = processor(MockTranslator::tagging());
        let opts = ProcessOptions {
            dry_run: true,
            ..Default::default()
        };

        let outcome = processor.process_document(&mut doc, "de", &opts).await;

        assert_eq!(outcome.translated, 0);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_service_failure_marks_unit_for_review() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(dir.path(), "fr.xliff", SAMPLE);
        let (processor, _) = processor(MockTranslator::failing("quota exceeded"));

        let outcome = processor
            .process_file(&path, "fr", &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.file_result(), FileResult::new(3, 3));
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.records[0].file, "fr.xliff");
        assert_eq!(outcome.records[0].text, "You drank %lld ml today");
        assert!(outcome.records[0].message.contains("quota exceeded"));

        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.units()[1].target_text.as_deref(), Some("Settings"));
        assert_eq!(doc.units()[1].state, UnitState::NeedsReview);
    }

    #[tokio::test]
    async fn test_failed_verification_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(dir.path(), "fr.xliff", SAMPLE);
        let (processor, _) = processor(MockTranslator::tagging());
        let processor = processor.with_store(DocumentStore::with_verifier(|_, _| {
            Err(TranslationError::InvalidFormat {
                message: "declaration missing".to_string(),
            })
        }));

        let outcome = processor
            .process_file(&path, "fr", &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), SAMPLE.as_bytes());
        assert!(matches!(
            outcome.persistence,
            Some(TranslationError::PersistenceError { .. })
        ));
        assert_eq!(outcome.file_result(), FileResult::new(0, 3));
        assert!(outcome.records.last().unwrap().message.contains("declaration missing"));
    }

    #[tokio::test]
    async fn test_unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(dir.path(), "broken.xliff", "<xliff><trans-unit id=\"a\"><source>x</trans-unit>");
        let (processor, _) = processor(MockTranslator::tagging());

        let result = processor
            .process_file(&path, "fr", &ProcessOptions::default())
            .await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<xliff><trans-unit id=\"a\"><source>x</trans-unit>");
    }

    #[tokio::test]
    async fn test_reprocessing_rewrites_inserted_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(dir.path(), "fr.xliff", SAMPLE);
        let mut doc = Document::load(&path).unwrap();

        let (failing, _) = processor(MockTranslator::failing("quota exceeded"));
        let first = failing.process_document(&mut doc, "fr", &ProcessOptions::default()).await;
        assert!(first.persistence.is_none());
        assert_eq!(first.errors, 3);

        let (tagging, mock) = processor(MockTranslator::tagging());
        let second = tagging.process_document(&mut doc, "fr", &ProcessOptions::default()).await;
        assert!(second.persistence.is_none());
        assert_eq!(second.file_result(), FileResult::new(3, 0));
        assert_eq!(mock.calls(), 3);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.matches("[fr] You drank %lld ml today").count(), 1);
        assert_eq!(written.matches("<target").count(), 4);

        let reloaded = Document::load(&path).unwrap();
        assert_eq!(
            reloaded.units()[0].target_text.as_deref(),
            Some("[fr] You drank %lld ml today")
        );
        assert_eq!(reloaded.units()[0].state, UnitState::Translated);
    }

    fn many_units(count: usize) -> String {
        let units: String = (0..count)
            .map(|i| format!("<trans-unit id=\"u{i}\"><source>Line {i}</source></trans-unit>"))
            .collect();
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><xliff version="1.2"><file><body>{units}</body></file></xliff>"#)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pauses_after_every_batch_of_units() {
        let mock = Arc::new(MockTranslator::tagging());
        let config = TranslatorConfig {
            units_per_pause: 10,
            unit_pause_ms: 500,
            ..TranslatorConfig::default()
        };
        let processor = DocumentProcessor::new(UnitProcessor::new(mock.clone()), &config);
        let mut doc = Document::from_bytes("fr.xliff", many_units(25).into_bytes()).unwrap();
        let opts = ProcessOptions {
            dry_run: true,
            ..Default::default()
        };

        let started = tokio::time::Instant::now();
        let outcome = processor.process_document(&mut doc, "fr", &opts).await;

        assert_eq!(outcome.translated, 25);
        assert_eq!(mock.calls(), 25);
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[test]
    fn test_needs_translation_rules() {
        let missing = TranslationUnit::new("a", "Hi");
        assert!(needs_translation(&missing, false));

        let review = TranslationUnit::new("a", "Hi").with_target("Hi", Some("needs-review-l10n"));
        assert!(needs_translation(&review, false));

        let copy = TranslationUnit::new("a", "Hi").with_target("Hi", Some("final"));
        assert!(!needs_translation(&copy, false));
        assert!(needs_translation(&copy, true));

        let done = TranslationUnit::new("a", "Hi").with_target("Salut", Some("translated"));
        assert!(!needs_translation(&done, true));
    }
}
