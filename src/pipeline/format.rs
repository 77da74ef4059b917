//! Format dispatch: classify an input file by its declared extension.
//!
//! Classification is purely extension-based. The submitting client already
//! declared the document type in the file name, and sniffing magic bytes would
//! let a mislabelled upload silently take a different code path than the one
//! its owner expects. A mislabelled file fails in the matching decoder instead
//! and is reported as a decode error for that file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// The page-construction strategy an input file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    /// `.png` — embedded as one image page.
    Png,
    /// `.jpg` / `.jpeg` — embedded as one image page.
    Jpeg,
    /// `.pdf` — every page lifted into the output.
    Pdf,
    /// Anything else; the file is skipped with a warning.
    Unsupported,
}

impl FileFormat {
    /// Derive the format from a file name, case-insensitively.
    pub fn from_name(name: &str) -> Self {
        match extension_of(name).as_deref() {
            Some("png") => FileFormat::Png,
            Some("jpg") | Some("jpeg") => FileFormat::Jpeg,
            Some("pdf") => FileFormat::Pdf,
            _ => FileFormat::Unsupported,
        }
    }

    /// `true` for formats handled by the page embedder.
    pub fn is_raster(self) -> bool {
        matches!(self, FileFormat::Png | FileFormat::Jpeg)
    }

    /// Matching `image` crate format for raster inputs.
    pub(crate) fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            FileFormat::Png => Some(image::ImageFormat::Png),
            FileFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileFormat::Png => "png",
            FileFormat::Jpeg => "jpeg",
            FileFormat::Pdf => "pdf",
            FileFormat::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Lower-cased extension of `name`, or `None` when there is none.
///
/// Dot-files such as `.pdf` have no extension, matching `Path::extension`.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}
