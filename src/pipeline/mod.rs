//! Pipeline stages for document consolidation.
//!
//! Each submodule implements exactly one step. The page-construction
//! strategies ([`embed`], [`import`]) are pure functions from bytes to a
//! [`assemble::PageBatch`], which keeps them testable without a live output
//! document and lets the orchestrator run them on a blocking thread.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ format ──▶ embed | import ──▶ assemble ──▶ write
//! (JSON)    (ext)      (image | PDF)      (pages)      (atomic)
//! ```
//!
//! 1. [`input`]    — validate the raw file list, reverse the base64 transport
//! 2. [`format`]   — classify each file by extension
//! 3. [`embed`]    — one raster image → one page sized to the image
//! 4. [`import`]   — lift every page of a source PDF, in order
//! 5. [`assemble`] — the append-only output document
//! 6. [`write`]    — create directories, write to a temp file, rename

pub mod assemble;
pub mod embed;
pub mod format;
pub mod import;
pub mod input;
pub mod write;
