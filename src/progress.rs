//! Progress-callback trait for per-file consolidation events.
//!
//! Inject an [`Arc<dyn ConsolidationProgressCallback>`] via
//! [`crate::config::ConsolidationConfigBuilder::progress_callback`] to receive
//! events as the assembler works through the file list.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docmerge::{ConsolidationProgressCallback, ConsolidationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     pages: Arc<AtomicUsize>,
//! }
//!
//! impl ConsolidationProgressCallback for PageCounter {
//!     fn on_file_complete(&self, file_num: usize, total_files: usize, _name: &str, pages: usize) {
//!         let so_far = self.pages.fetch_add(pages, Ordering::SeqCst) + pages;
//!         eprintln!("file {}/{} done, {} pages so far", file_num, total_files, so_far);
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter {
//!     pages: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConsolidationConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConsolidationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the assembler as it processes each file.
///
/// Files are processed one at a time, so calls never overlap within one
/// consolidation run. Implementations must still be `Send + Sync`: the same
/// callback may be shared by several concurrent runs. All methods have
/// default no-op implementations.
pub trait ConsolidationProgressCallback: Send + Sync {
    /// Called once, after validation, before any file is decoded.
    ///
    /// # Arguments
    /// * `total_files` — entries in the submitted list, including invalid ones
    fn on_consolidation_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called before a file is decoded.
    ///
    /// # Arguments
    /// * `file_num`    — 1-indexed position in the submitted list
    /// * `total_files` — entries in the submitted list
    /// * `file_name`   — submitted file name
    fn on_file_start(&self, file_num: usize, total_files: usize, file_name: &str) {
        let _ = (file_num, total_files, file_name);
    }

    /// Called when a file's pages were appended to the output.
    fn on_file_complete(&self, file_num: usize, total_files: usize, file_name: &str, pages: usize) {
        let _ = (file_num, total_files, file_name, pages);
    }

    /// Called when a file is skipped, including entries rejected by validation.
    fn on_file_skipped(&self, file_num: usize, total_files: usize, file_name: &str, reason: &str) {
        let _ = (file_num, total_files, file_name, reason);
    }

    /// Called once after every file has been attempted, before the output
    /// is written.
    ///
    /// # Arguments
    /// * `total_files` — entries in the submitted list
    /// * `added_files` — files that contributed at least one page
    /// * `total_pages` — pages in the merged document
    fn on_consolidation_complete(&self, total_files: usize, added_files: usize, total_pages: usize) {
        let _ = (total_files, added_files, total_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConsolidationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConsolidationConfig`].
pub type ProgressCallback = Arc<dyn ConsolidationProgressCallback>;
