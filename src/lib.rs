//! xcloc-translator - machine translation for Xcode localization bundles
//!
//! Walks a workspace of `<locale>.xcloc` bundles, translates the XLIFF units
//! that still need a target and writes the documents back atomically, keeping
//! format placeholders intact.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod processors;
pub mod server;

// Re-export key types for convenience
pub use core::{
    client::GoogleTranslator,
    config::TranslatorConfig,
    errors::TranslationError,
    languages::LanguageCatalog,
    models::{FailurePolicy, FileResult, TranslationRequest, TranslationUnit},
    service::TranslationService,
    unit::UnitProcessor,
};

pub use processors::{
    batch::{BatchOptions, BatchReport, BatchRunner, CancellationToken},
    document::{DocumentProcessor, ProcessOptions},
    xliff::Document,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
