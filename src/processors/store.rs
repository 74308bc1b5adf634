//! Atomic document persistence with verification and rollback

use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use crate::core::errors::{Result, TranslationError};
use crate::processors::xliff::{verify_document, Document};

/// Checks freshly written bytes; receives the expected unit count
pub type Verifier = fn(&[u8], usize) -> Result<()>;

/// Writes documents back to disk.
///
/// A write is either committed and verified, or the pre-mutation bytes are
/// put back. Files are replaced by rename, so readers see the old or the new
/// content, never a partial write.
#[derive(Debug, Clone, Copy)]
pub struct DocumentStore {
    verifier: Verifier,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// Store that verifies writes with [`verify_document`]
    pub fn new() -> Self {
        Self {
            verifier: verify_document,
        }
    }

    /// Use a custom post-write check
    pub fn with_verifier(verifier: Verifier) -> Self {
        Self { verifier }
    }

    /// Serialize, write, re-read and verify `doc`; roll back on any failure
    pub fn commit(&self, doc: &mut Document) -> Result<()> {
        let path = doc.path().to_path_buf();
        let expected_units = doc.units().len();

        let bytes = match doc.render() {
            Ok(bytes) => bytes,
            Err(e) => return Err(persistence_error(&path, format!("serialization failed: {}", e))),
        };

        let written = write_atomic(&path, &bytes).and_then(|_| {
            let on_disk = std::fs::read(&path)?;
            (self.verifier)(&on_disk, expected_units)
        });

        match written {
            Ok(()) => {
                debug!("Committed {} ({} bytes)", path.display(), bytes.len());
                doc.commit(bytes);
                Ok(())
            }
            Err(e) => {
                warn!("Write of {} failed, restoring original: {}", path.display(), e);
                let message = match write_atomic(&path, doc.backup()) {
                    Ok(()) => format!("{}; original content restored", e),
                    Err(restore) => format!("{}; restoring original content failed: {}", e, restore),
                };
                Err(persistence_error(&path, message))
            }
        }
    }
}

fn persistence_error(path: &Path, message: String) -> TranslationError {
    TranslationError::PersistenceError {
        path: path.display().to_string(),
        message,
    }
}

/// Replace `path` with `bytes` through a temp file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::UnitState;
    use crate::processors::xliff::tests::SAMPLE;

    fn write_sample(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("fr.xliff");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn test_commit_writes_and_resets_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());
        let mut doc = Document::load(&path).unwrap();
        doc.units_mut()[1].set_target("Réglages", UnitState::Translated);

        DocumentStore::new().commit(&mut doc).unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("<target state=\"translated\">Réglages</target>"));
        assert!(!doc.is_modified());
        assert_eq!(doc.backup(), on_disk.as_bytes());
    }

    #[test]
    fn test_failed_verification_restores_original_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());
        let before = std::fs::read(&path).unwrap();

        let mut doc = Document::load(&path).unwrap();
        doc.units_mut()[0].set_target("Vous avez bu %lld ml", UnitState::Translated);

        let store = DocumentStore::with_verifier(|_, _| {
            Err(TranslationError::InvalidFormat {
                message: "corrupted".to_string(),
            })
        });
        let err = store.commit(&mut doc).unwrap_err();

        assert!(matches!(err, TranslationError::PersistenceError { .. }));
        assert!(err.to_string().contains("original content restored"));
        assert_eq!(std::fs::read(&path).unwrap(), before);
        // nothing was committed, the unit is still pending
        assert!(doc.is_modified());
    }

    #[test]
    fn test_write_atomic_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xliff");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_into_missing_directory_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("fr.xliff");
        assert!(write_atomic(&path, b"data").is_err());
    }
}
