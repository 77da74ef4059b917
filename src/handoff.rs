//! Hand-off of a consolidated PDF to the services downstream of the merge.
//!
//! The engine itself only produces a file. In production the task layer then
//! archives that file in an object store and sends it to an OCR service for
//! text extraction. Both collaborators sit behind traits so they can be
//! swapped for fakes in tests and for real clients in the deployment crate;
//! they are constructed once at start-up and passed in as [`Collaborators`].

use crate::config::ConsolidationConfig;
use crate::consolidate::consolidate;
use crate::error::ConsolidateError;
use crate::output::ConsolidationOutput;
use crate::pipeline::write::write_atomic;
use crate::prompts;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from [`process_batch`] and the collaborator traits.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error(transparent)]
    Consolidate(#[from] ConsolidateError),

    #[error("Artifact store rejected '{key}': {detail}")]
    Store { key: String, detail: String },

    #[error("OCR request failed: {detail}")]
    Ocr { detail: String },
}

/// Durable storage for consolidated documents.
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `key` and return the location the caller should
    /// record (a URL, an absolute path, an object id).
    fn put(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, HandoffError>>;
}

/// Text extraction over a whole PDF.
pub trait OcrService: Send + Sync {
    fn extract_text(&self, pdf: Vec<u8>, prompt: String) -> BoxFuture<'_, Result<String, HandoffError>>;
}

/// Downstream services, built once by the entry point.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ArtifactStore>,
    /// `None` archives only.
    pub ocr: Option<Arc<dyn OcrService>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("store", &"<dyn ArtifactStore>")
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn OcrService>"))
            .finish()
    }
}

/// What to do with one batch beyond merging it.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    /// Human-readable batch name. Also used to derive the archive key.
    pub title: Option<String>,
    /// Key prefix in the artifact store, e.g. `"claims/4711"`.
    pub key_prefix: String,
    /// Overrides [`prompts::DEFAULT_OCR_PROMPT`].
    pub prompt: Option<String>,
}

/// Result of [`process_batch`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Key the merged PDF was stored under.
    pub archive_key: String,
    /// Location returned by the store.
    pub location: String,
    /// Extracted text, when an OCR service was configured.
    pub text: Option<String>,
    pub consolidation: ConsolidationOutput,
}

/// Merge a batch, archive it, and optionally run OCR over it.
///
/// The merged file is built in a private temporary directory which is removed
/// when this function returns; the store receives the same bytes that were
/// written there.
///
/// # Errors
/// Any [`ConsolidateError`] from the merge, then the first store or OCR
/// failure. The store is not called when the merge fails, and OCR is not
/// called when archiving fails.
pub async fn process_batch(
    raw: &Value,
    collaborators: &Collaborators,
    request: &BatchRequest,
    config: &ConsolidationConfig,
) -> Result<BatchReport, HandoffError> {
    let stem = request
        .title
        .as_deref()
        .map(slug)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "consolidated".to_string());

    let scratch = tempfile::tempdir().map_err(|e| ConsolidateError::WriteFailed {
        path: std::env::temp_dir(),
        source: e,
    })?;
    let local = scratch.path().join(format!("{stem}.pdf"));

    let mut config = config.clone();
    if config.title.is_none() {
        config.title = request.title.clone();
    }
    let consolidation = consolidate(raw, &local, &config).await?;
    let bytes = tokio::fs::read(&consolidation.path)
        .await
        .map_err(|e| ConsolidateError::WriteFailed {
            path: consolidation.path.clone(),
            source: e,
        })?;

    let archive_key = join_key(&request.key_prefix, &format!("{stem}.pdf"));
    let location = collaborators.store.put(archive_key.clone(), bytes.clone()).await?;
    info!("Archived {} page(s) as '{}' → {}", consolidation.stats.total_pages, archive_key, location);

    let text = match &collaborators.ocr {
        Some(ocr) => {
            let prompt = match &request.prompt {
                Some(p) => p.clone(),
                None => prompts::ocr_prompt(request.title.as_deref(), consolidation.stats.total_pages),
            };
            let text = ocr.extract_text(bytes, prompt).await?;
            debug!("OCR returned {} chars for '{}'", text.len(), archive_key);
            Some(text)
        }
        None => None,
    };

    Ok(BatchReport {
        archive_key,
        location,
        text,
        consolidation,
    })
}

// ── LocalDirStore ────────────────────────────────────────────────────────

/// [`ArtifactStore`] over a local directory.
///
/// Keys map to relative paths below `root`; keys that would escape it are
/// rejected.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, HandoffError> {
        let rel = Path::new(key);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(HandoffError::Store {
                key: key.to_string(),
                detail: "key must be a relative path without '..'".into(),
            });
        }
        Ok(self.root.join(rel))
    }
}

impl ArtifactStore for LocalDirStore {
    fn put(&self, key: String, bytes: Vec<u8>) -> BoxFuture<'_, Result<String, HandoffError>> {
        Box::pin(async move {
            let path = self.resolve(&key)?;
            let written = write_atomic(&path, bytes).await.map_err(|e| HandoffError::Store {
                key: key.clone(),
                detail: e.to_string(),
            })?;
            Ok(written.display().to_string())
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else → `-`.
fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
