//! Error types for the edgequake-docmerge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConsolidateError`] — **Fatal**: no usable document can be produced
//!   (the file list is malformed, every file was rejected, or the output
//!   cannot be persisted). Returned as `Err(ConsolidateError)` from the
//!   top-level `consolidate*` functions.
//!
//! * [`SkipReason`] — **Non-fatal**: a single input file was rejected
//!   (missing payload, unknown extension, corrupt image or PDF) but the rest
//!   of the batch is fine. Stored inside [`crate::output::FileOutcome`] so
//!   callers can see exactly which files were left out of the merged PDF.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docmerge library.
///
/// Per-file failures use [`SkipReason`] and are stored in
/// [`crate::output::FileReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConsolidateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The top-level file list is missing, not a list, or empty.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// Every file was skipped; a document with no pages is not a deliverable.
    #[error("No pages could be produced from {total_files} input file(s).\nFirst problem: {first_reason}")]
    EmptyResult {
        total_files: usize,
        first_reason: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The assembled document could not be serialised to PDF bytes.
    #[error("Failed to serialise merged PDF: {detail}")]
    SerializeFailed { detail: String },

    /// Could not create the output directory or write the merged PDF.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single input file contributed no pages.
///
/// The batch keeps going after any of these; they are reported back in
/// [`crate::output::FileOutcome::Skipped`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Entry is missing a file name or a string payload.
    #[error("invalid entry: {detail}")]
    Invalid { detail: String },

    /// Extension is not one of png, jpg, jpeg or pdf.
    #[error("unsupported format '{extension}'")]
    UnsupportedFormat { extension: String },

    /// The payload is not valid base64.
    #[error("payload is not valid base64: {detail}")]
    TransportDecode { detail: String },

    /// Image or PDF bytes could not be parsed.
    #[error("failed to decode {format}: {detail}")]
    Decode { format: String, detail: String },

    /// The worker decoding this file panicked or could not be joined.
    #[error("internal error: {detail}")]
    Internal { detail: String },
}

impl SkipReason {
    pub(crate) fn decode(format: impl Into<String>, detail: impl ToString) -> Self {
        SkipReason::Decode {
            format: format.into(),
            detail: detail.to_string(),
        }
    }
}
