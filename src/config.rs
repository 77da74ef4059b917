//! Configuration types for document consolidation.
//!
//! All consolidation behaviour is controlled through [`ConsolidationConfig`],
//! built via its [`ConsolidationConfigBuilder`]. A config is `Clone` and may
//! be shared between concurrent runs.

use crate::error::ConsolidateError;
use crate::pipeline::assemble::FinishOptions;
use crate::pipeline::embed::EmbedOptions;
use crate::progress::ProgressCallback;
use std::fmt;

/// PDF header versions lopdf can write and viewers accept.
const SUPPORTED_VERSIONS: [&str; 8] = ["1.0", "1.1", "1.2", "1.3", "1.4", "1.5", "1.6", "1.7"];

/// Configuration for a consolidation run.
///
/// Built via [`ConsolidationConfig::builder()`] or using
/// [`ConsolidationConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docmerge::ConsolidationConfig;
///
/// let config = ConsolidationConfig::builder()
///     .title("Claim 4711 — supporting documents")
///     .compress(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConsolidationConfig {
    /// PDF header version of the merged document. Default: `"1.7"`.
    ///
    /// Lifted pages keep whatever features their source used, so the output
    /// header should be at least as new as the newest input. 1.7 is accepted
    /// by every OCR service and viewer we have seen.
    pub pdf_version: String,

    /// Compress uncompressed streams (content streams, lifted objects) when
    /// serialising. Default: true.
    ///
    /// Image data is already compressed by the embedder and is never
    /// compressed twice.
    pub compress: bool,

    /// Store JPEG uploads verbatim instead of re-encoding their pixels.
    /// Default: true.
    ///
    /// Passthrough keeps the archive byte-faithful to what the user sent and
    /// avoids a decode/re-compress cycle that would grow phone photos three
    /// to five times. CMYK JPEGs are always re-encoded regardless.
    pub jpeg_passthrough: bool,

    /// Largest image, in pixels (width × height), the embedder will decode.
    /// Default: 100 000 000.
    ///
    /// A forged PNG header can declare a 60 000 × 60 000 image in a few
    /// hundred bytes. Files above the cap are skipped like any other
    /// undecodable input instead of exhausting memory.
    pub max_image_pixels: u64,

    /// `/Title` entry of the document information dictionary.
    pub title: Option<String>,

    /// `/Producer` entry. Default: `edgequake-docmerge <version>`.
    pub producer: Option<String>,

    /// Optional per-file progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            pdf_version: "1.7".to_string(),
            compress: true,
            jpeg_passthrough: true,
            max_image_pixels: 100_000_000,
            title: None,
            producer: Some(format!("edgequake-docmerge {}", env!("CARGO_PKG_VERSION"))),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConsolidationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsolidationConfig")
            .field("pdf_version", &self.pdf_version)
            .field("compress", &self.compress)
            .field("jpeg_passthrough", &self.jpeg_passthrough)
            .field("max_image_pixels", &self.max_image_pixels)
            .field("title", &self.title)
            .field("producer", &self.producer)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConsolidationProgressCallback>"),
            )
            .finish()
    }
}

impl ConsolidationConfig {
    /// Create a new builder for `ConsolidationConfig`.
    pub fn builder() -> ConsolidationConfigBuilder {
        ConsolidationConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn embed_options(&self) -> EmbedOptions {
        EmbedOptions {
            jpeg_passthrough: self.jpeg_passthrough,
            max_image_pixels: self.max_image_pixels,
        }
    }

    pub(crate) fn finish_options(&self) -> FinishOptions {
        FinishOptions {
            compress: self.compress,
            title: self.title.clone(),
            producer: self.producer.clone(),
        }
    }
}

/// Builder for [`ConsolidationConfig`].
#[derive(Debug)]
pub struct ConsolidationConfigBuilder {
    config: ConsolidationConfig,
}

impl ConsolidationConfigBuilder {
    pub fn pdf_version(mut self, version: impl Into<String>) -> Self {
        self.config.pdf_version = version.into();
        self
    }

    pub fn compress(mut self, v: bool) -> Self {
        self.config.compress = v;
        self
    }

    pub fn jpeg_passthrough(mut self, v: bool) -> Self {
        self.config.jpeg_passthrough = v;
        self
    }

    pub fn max_image_pixels(mut self, px: u64) -> Self {
        self.config.max_image_pixels = px;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn producer(mut self, producer: impl Into<String>) -> Self {
        self.config.producer = Some(producer.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConsolidationConfig, ConsolidateError> {
        let c = &self.config;
        if !SUPPORTED_VERSIONS.contains(&c.pdf_version.as_str()) {
            return Err(ConsolidateError::InvalidConfig(format!(
                "PDF version must be 1.0–1.7, got '{}'",
                c.pdf_version
            )));
        }
        if c.max_image_pixels == 0 {
            return Err(ConsolidateError::InvalidConfig(
                "max_image_pixels must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
