use thiserror::Error;

/// Failure taxonomy of an indexing run.
///
/// Only `StorageFailure` and `WorkerCrash` abort a run; the others are
/// recorded as warnings and degrade the affected file, field or pass.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("parse failed for {path}: {message}")]
    ParseFailure { path: String, message: String },

    #[error("extractor {extractor} failed: {message}")]
    ExtractorFailure { extractor: String, message: String },

    #[error("linking pass {pass} failed: {message}")]
    LinkingPassFailure { pass: String, message: String },

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("worker {worker} crashed: {message}")]
    WorkerCrash { worker: usize, message: String },
}
