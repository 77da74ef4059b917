//! Consolidation entry points.
//!
//! Every entry point runs the same loop: validate the list, then for each
//! surviving file, in input order, decode it on a blocking thread, await the
//! resulting [`PageBatch`](crate::pipeline::assemble::PageBatch) and append it
//! to the output document before the next file is looked at. Anything a
//! single file can get wrong becomes a [`FileOutcome::Skipped`] entry; only
//! an empty result or a failed write aborts the run.

use crate::config::ConsolidationConfig;
use crate::error::{ConsolidateError, SkipReason};
use crate::output::{
    ConsolidatedPdf, ConsolidationOutput, ConsolidationStats, FileOutcome, FileReport,
};
use crate::pipeline::assemble::OutputDocument;
use crate::pipeline::embed::embed_image;
use crate::pipeline::format::{extension_of, FileFormat};
use crate::pipeline::import::import_pdf;
use crate::pipeline::input::{self, InputFile, ValidatedBatch, ValidatedFile};
use crate::pipeline::write::write_atomic;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Merge the files described by a raw JSON list into one PDF at `output_path`.
///
/// This is the primary entry point for the library. `raw` is the file list
/// exactly as the task layer received it: an array of
/// `{"fileName": ..., "fileData": <base64>}` objects.
///
/// # Returns
/// `Ok(ConsolidationOutput)` when at least one page was produced, even if
/// some files were skipped (check `output.files` or `output.skipped()`).
///
/// # Errors
/// - [`ConsolidateError::InvalidInput`] — `raw` is not a non-empty list
/// - [`ConsolidateError::EmptyResult`] — no file yielded a page; nothing is written
/// - [`ConsolidateError::WriteFailed`] — the output could not be persisted
///
/// # Example
/// ```rust,no_run
/// use edgequake_docmerge::{consolidate, ConsolidationConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let raw = serde_json::from_str(&std::fs::read_to_string("task.json")?)?;
/// let output = consolidate(&raw, "out/merged.pdf", &ConsolidationConfig::default()).await?;
/// println!("{} pages → {}", output.stats.total_pages, output.path.display());
/// # Ok(())
/// # }
/// ```
pub async fn consolidate(
    raw: &Value,
    output_path: impl AsRef<Path>,
    config: &ConsolidationConfig,
) -> Result<ConsolidationOutput, ConsolidateError> {
    let batch = input::validate_files(raw)?;
    persist(assemble(batch, config).await?, output_path.as_ref()).await
}

/// Same as [`consolidate`] for callers that already hold typed entries.
pub async fn consolidate_files(
    files: Vec<InputFile>,
    output_path: impl AsRef<Path>,
    config: &ConsolidationConfig,
) -> Result<ConsolidationOutput, ConsolidateError> {
    let batch = input::validate_entries(files)?;
    persist(assemble(batch, config).await?, output_path.as_ref()).await
}

/// Merge into memory instead of a file.
///
/// Useful when the merged PDF goes straight to an upload or OCR request and
/// a local copy is not needed.
pub async fn consolidate_to_bytes(
    raw: &Value,
    config: &ConsolidationConfig,
) -> Result<ConsolidatedPdf, ConsolidateError> {
    let batch = input::validate_files(raw)?;
    assemble(batch, config).await
}

/// Synchronous wrapper around [`consolidate`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn consolidate_sync(
    raw: &Value,
    output_path: impl AsRef<Path>,
    config: &ConsolidationConfig,
) -> Result<ConsolidationOutput, ConsolidateError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConsolidateError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(consolidate(raw, output_path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn persist(
    merged: ConsolidatedPdf,
    output_path: &Path,
) -> Result<ConsolidationOutput, ConsolidateError> {
    let path = write_atomic(output_path, merged.bytes).await?;
    Ok(ConsolidationOutput {
        path,
        pages: merged.pages,
        files: merged.files,
        stats: merged.stats,
    })
}

/// Run the per-file loop and serialise the result.
async fn assemble(
    batch: ValidatedBatch,
    config: &ConsolidationConfig,
) -> Result<ConsolidatedPdf, ConsolidateError> {
    let start = Instant::now();
    let ValidatedBatch {
        total,
        files,
        rejected,
    } = batch;
    info!(
        "Starting consolidation: {} file(s), {} valid",
        total,
        files.len()
    );

    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_consolidation_start(total);
    }

    let mut reports: Vec<FileReport> = Vec::with_capacity(total);
    let mut rejected = rejected.into_iter().peekable();
    let mut doc = OutputDocument::new(&config.pdf_version);

    for file in &files {
        // Report validation rejects in input order, interleaved with real files.
        while let Some(r) = rejected.next_if(|r| r.index < file.index) {
            notify_rejected(config, total, &r);
            reports.push(r);
        }

        let file_num = file.index + 1;
        let name = file.file.file_name.as_str();
        if let Some(cb) = cb {
            cb.on_file_start(file_num, total, name);
        }

        let first_page = doc.page_count() + 1;
        let outcome = match add_file(&mut doc, file, config).await {
            Ok(pages) => {
                debug!("'{}' → {} page(s)", name, pages);
                if let Some(cb) = cb {
                    cb.on_file_complete(file_num, total, name, pages);
                }
                FileOutcome::Added { first_page, pages }
            }
            Err(reason) => {
                warn!("Skipping '{}': {}", name, reason);
                if let Some(cb) = cb {
                    cb.on_file_skipped(file_num, total, name, &reason.to_string());
                }
                FileOutcome::Skipped { reason }
            }
        };

        reports.push(FileReport {
            index: file.index,
            file_name: name.to_string(),
            outcome,
        });
    }
    for r in rejected {
        notify_rejected(config, total, &r);
        reports.push(r);
    }

    let added_files = reports.iter().filter(|r| r.outcome.is_added()).count();
    let total_pages = doc.page_count();
    if let Some(cb) = cb {
        cb.on_consolidation_complete(total, added_files, total_pages);
    }

    if total_pages == 0 {
        let first_reason = reports
            .iter()
            .find_map(|r| match &r.outcome {
                FileOutcome::Skipped { reason } => Some(format!("{}: {}", display_name(r), reason)),
                FileOutcome::Added { .. } => None,
            })
            .unwrap_or_else(|| "no files".to_string());
        return Err(ConsolidateError::EmptyResult {
            total_files: total,
            first_reason,
        });
    }

    let finish = config.finish_options();
    let (bytes, pages) = tokio::task::spawn_blocking(move || doc.finish(&finish))
        .await
        .map_err(|e| ConsolidateError::Internal(format!("Serialise task panicked: {}", e)))??;

    let stats = ConsolidationStats {
        total_files: total,
        added_files,
        skipped_files: total - added_files,
        total_pages,
        output_bytes: bytes.len() as u64,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Consolidation complete: {} page(s) from {}/{} file(s), {} bytes, {}ms",
        stats.total_pages, stats.added_files, stats.total_files, stats.output_bytes, stats.total_duration_ms
    );

    Ok(ConsolidatedPdf {
        bytes,
        pages,
        files: reports,
        stats,
    })
}

/// Decode one file and append its pages. Returns the number of pages added.
///
/// The output document is only touched by the final `append`, so an error
/// at any earlier step leaves it exactly as it was.
async fn add_file(
    doc: &mut OutputDocument,
    file: &ValidatedFile,
    config: &ConsolidationConfig,
) -> Result<usize, SkipReason> {
    let format = file.file.format();
    if format == FileFormat::Unsupported {
        return Err(SkipReason::UnsupportedFormat {
            extension: extension_of(&file.file.file_name).unwrap_or_else(|| "(none)".into()),
        });
    }

    let bytes = file.file.decode_payload()?;
    let first_id = doc.next_object_number();
    let options = config.embed_options();

    let batch = tokio::task::spawn_blocking(move || match format {
        FileFormat::Pdf => import_pdf(&bytes, first_id),
        _ => embed_image(&bytes, format, first_id, &options),
    })
    .await
    .map_err(|e| SkipReason::Internal {
        detail: format!("decode task failed: {e}"),
    })??;

    if batch.pages.is_empty() {
        return Err(SkipReason::decode(format.to_string(), "produced no pages"));
    }

    Ok(doc.append(batch, file.index, &file.file.file_name))
}

fn notify_rejected(config: &ConsolidationConfig, total: usize, report: &FileReport) {
    if let (Some(cb), FileOutcome::Skipped { reason }) = (&config.progress_callback, &report.outcome) {
        cb.on_file_skipped(report.index + 1, total, &report.file_name, &reason.to_string());
    }
}

fn display_name(report: &FileReport) -> String {
    if report.file_name.is_empty() {
        format!("entry #{}", report.index + 1)
    } else {
        report.file_name.clone()
    }
}
