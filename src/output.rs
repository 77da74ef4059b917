//! Result types returned by the consolidation entry points.

use crate::error::SkipReason;
use crate::pipeline::format::FileFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a page of the merged PDF came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageOrigin {
    /// A new page whose sole content is one raster image.
    Embedded { format: FileFormat },
    /// A page lifted from a source PDF (1-indexed page in that source).
    Imported { source_page: usize },
}

/// One page of the merged PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-indexed position in the merged PDF.
    pub page_num: usize,
    /// 0-indexed position of the source file in the submitted list.
    pub source_index: usize,
    pub source_name: String,
    /// Page width in PDF points.
    pub width: f64,
    /// Page height in PDF points.
    pub height: f64,
    pub origin: PageOrigin,
}

/// What happened to one submitted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The file contributed `pages` consecutive pages starting at `first_page`.
    Added { first_page: usize, pages: usize },
    /// The file contributed nothing.
    Skipped { reason: SkipReason },
}

impl FileOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, FileOutcome::Added { .. })
    }
}

/// Per-file report, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// 0-indexed position in the submitted list.
    pub index: usize,
    /// Empty when the entry had no usable name.
    pub file_name: String,
    pub outcome: FileOutcome,
}

/// Aggregate statistics for one consolidation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationStats {
    /// Entries in the submitted list.
    pub total_files: usize,
    /// Files that contributed at least one page.
    pub added_files: usize,
    /// Files rejected by validation, dispatch or decoding.
    pub skipped_files: usize,
    /// Pages in the merged PDF.
    pub total_pages: usize,
    /// Size of the serialised PDF.
    pub output_bytes: u64,
    pub total_duration_ms: u64,
}

/// Result of [`crate::consolidate::consolidate`]: a merged PDF on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationOutput {
    /// Final location of the merged PDF.
    pub path: PathBuf,
    pub pages: Vec<PageInfo>,
    pub files: Vec<FileReport>,
    pub stats: ConsolidationStats,
}

/// Result of [`crate::consolidate::consolidate_to_bytes`]: a merged PDF in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedPdf {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub pages: Vec<PageInfo>,
    pub files: Vec<FileReport>,
    pub stats: ConsolidationStats,
}

impl ConsolidatedPdf {
    /// Reports for files that contributed no pages.
    pub fn skipped(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.outcome.is_added())
    }
}

impl ConsolidationOutput {
    /// Reports for files that contributed no pages.
    pub fn skipped(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| !f.outcome.is_added())
    }
}
