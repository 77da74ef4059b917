//! # edgequake-docmerge
//!
//! Merge a batch of uploaded documents (PNG, JPEG and PDF files) into one
//! multi-page PDF, ready for archiving and OCR.
//!
//! ## Why this crate?
//!
//! OCR services price and rate-limit per request, and most of them read a PDF
//! far more reliably than a loose pile of phone photos. Users, however, upload
//! whatever they have: a scan here, a screenshot there, a three-page PDF from
//! their bank. This crate turns such a batch into a single document without
//! ever re-rendering a PDF page: images become pages of exactly their own
//! size, and PDF pages are lifted object-for-object.
//!
//! ## Pipeline Overview
//!
//! ```text
//! [{fileName, fileData(base64)}, …]
//!  │
//!  ├─ 1. Input     validate the list, reverse the base64 transport
//!  ├─ 2. Format    classify each file by extension
//!  ├─ 3. Embed     PNG/JPEG → one page sized to the image (spawn_blocking)
//!  │    Import     PDF → every page, in order (spawn_blocking)
//!  ├─ 4. Assemble  append pages, one file at a time, in input order
//!  └─ 5. Write     temp file + rename, parent directories created
//! ```
//!
//! A file that cannot be decoded is skipped and reported; it never aborts the
//! batch. Only a batch that yields no page at all is an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docmerge::{consolidate, ConsolidationConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let raw = json!([
//!         {"fileName": "front.jpg", "fileData": "/9j/4AAQSkZJRg..."},
//!         {"fileName": "statement.pdf", "fileData": "JVBERi0xLjcK..."}
//!     ]);
//!     let output = consolidate(&raw, "out/merged.pdf", &ConsolidationConfig::default()).await?;
//!     for skipped in output.skipped() {
//!         eprintln!("skipped {}: {:?}", skipped.file_name, skipped.outcome);
//!     }
//!     println!("{} pages", output.stats.total_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docmerge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docmerge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod consolidate;
pub mod error;
pub mod handoff;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConsolidationConfig, ConsolidationConfigBuilder};
pub use consolidate::{consolidate, consolidate_files, consolidate_sync, consolidate_to_bytes};
pub use error::{ConsolidateError, SkipReason};
pub use handoff::{
    process_batch, ArtifactStore, BatchReport, BatchRequest, Collaborators, HandoffError,
    LocalDirStore, OcrService,
};
pub use output::{
    ConsolidatedPdf, ConsolidationOutput, ConsolidationStats, FileOutcome, FileReport, PageInfo,
    PageOrigin,
};
pub use pipeline::format::FileFormat;
pub use pipeline::input::InputFile;
pub use progress::{ConsolidationProgressCallback, NoopProgressCallback, ProgressCallback};
