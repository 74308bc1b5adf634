//! XLIFF documents, persistence and workspace batches

pub mod batch;
pub mod document;
pub mod store;
pub mod xliff;
