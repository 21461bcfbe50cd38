//! Error types for the edgequake-img2glb library.
//!
//! Two places report failures, and they behave differently:
//!
//! * [`Img2GlbError`]: **Fatal** for a conversion run. Every pipeline stage
//!   returns it; the driver in [`crate::convert`] wraps the first failure in
//!   [`Img2GlbError::StageFailed`] so callers see exactly one current stage
//!   plus a message, and no partially built asset is ever handed out.
//!
//! * Viewer errors: the interactive renderer never aborts its frame loop.
//!   Asset load failures are reported through
//!   [`crate::viewer::ViewerCallback::on_error`] as an
//!   [`Img2GlbError::AssetLoad`] and the last good scene keeps rendering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-img2glb library.
#[derive(Debug, Error)]
pub enum Img2GlbError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read but are not a PNG or JPEG image.
    #[error("Input is not a supported image (PNG/JPEG): '{source_name}'\nFirst bytes: {magic:?}")]
    NotAnImage { source_name: String, magic: [u8; 4] },

    /// The image container was recognised but could not be decoded.
    #[error("Failed to decode image: {detail}")]
    ImageDecode { detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The OCR engine or an image surface could not be set up. Aborts the run.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The OCR collaborator failed; no partial asset is produced.
    #[error("Text recognition failed: {0}")]
    Recognition(String),

    /// A font file could not be read or parsed.
    #[error("Failed to load font '{path}': {detail}")]
    FontLoad { path: PathBuf, detail: String },

    /// The exporter was called with zero meshes.
    #[error("No meshes to export")]
    EmptyInput,

    /// A banned term was found in the serialized payload; the asset was discarded.
    #[error("Banned strings detected in payload: {}", .terms.join(", "))]
    PrivacyViolation { terms: Vec<String> },

    /// The viewer could not fetch or parse an asset.
    #[error("Failed to load asset: {0}")]
    AssetLoad(String),

    /// A pipeline stage failed. Carries the stage that was running.
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: Box<Img2GlbError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output asset file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
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

impl Img2GlbError {
    /// Attach the running stage to an error, unless it already carries one.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            e @ Img2GlbError::StageFailed { .. } => e,
            other => Img2GlbError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with any stage wrapper removed.
    pub fn root(&self) -> &Img2GlbError {
        match self {
            Img2GlbError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage this error was reported from, if the driver recorded one.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Img2GlbError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// The stages of one conversion run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Resolving and decoding the input image, orientation correction.
    Loading,
    /// Waiting on the OCR collaborator.
    Recognition,
    /// Sampling colors and building line meshes.
    Building,
    /// Serializing and scanning the asset.
    Export,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Loading => "loading",
            PipelineStage::Recognition => "recognition",
            PipelineStage::Building => "building",
            PipelineStage::Export => "export",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_violation_lists_terms() {
        let e = Img2GlbError::PrivacyViolation {
            terms: vec!["resume".into(), "vitae".into()],
        };
        let msg = e.to_string();
        assert!(msg.contains("resume, vitae"), "got: {msg}");
    }

    #[test]
    fn stage_wrapper_reports_stage_and_message() {
        let e = Img2GlbError::Recognition("engine crashed".into()).at_stage(PipelineStage::Recognition);
        assert_eq!(e.stage(), Some(PipelineStage::Recognition));
        let msg = e.to_string();
        assert!(msg.starts_with("recognition stage failed"), "got: {msg}");
        assert!(msg.contains("engine crashed"));
    }

    #[test]
    fn stage_is_not_wrapped_twice() {
        let e = Img2GlbError::EmptyInput
            .at_stage(PipelineStage::Export)
            .at_stage(PipelineStage::Building);
        assert_eq!(e.stage(), Some(PipelineStage::Export));
        assert!(matches!(e.root(), Img2GlbError::EmptyInput));
    }

    #[test]
    fn download_timeout_display() {
        let e = Img2GlbError::DownloadTimeout {
            url: "https://example.com/scan.png".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }
}
