//! Progress-callback trait for conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages.
//!
//! OCR is the only long-running stage, so it is also the only one that
//! reports fractional progress ([`ConversionProgressCallback::on_ocr_progress`]).
//! Building and export run synchronously once recognition resolves and report
//! per-line and per-stage events instead.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2glb::{ConversionProgressCallback, ConversionConfig, PipelineStage};
//! use std::sync::{Arc, Mutex};
//!
//! struct StageLog(Mutex<Vec<PipelineStage>>);
//!
//! impl ConversionProgressCallback for StageLog {
//!     fn on_stage_start(&self, stage: PipelineStage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Arc::new(StageLog(Mutex::new(Vec::new())));
//! let config = ConversionConfig::builder()
//!     .progress_callback(log as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::PipelineStage;
use std::sync::Arc;

/// Called by the conversion pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` because OCR
/// engines may report progress from a different task.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: PipelineStage) {
        let _ = stage;
    }

    /// Called with OCR progress in `0.0..=1.0`.
    fn on_ocr_progress(&self, fraction: f32) {
        let _ = fraction;
    }

    /// Called once recognition resolved, with the number of usable lines.
    fn on_lines_recognized(&self, line_count: usize) {
        let _ = line_count;
    }

    /// Called after each line mesh is built.
    ///
    /// # Arguments
    /// * `index`: 1-indexed line number
    /// * `total`: total lines being built
    fn on_line_built(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a stage fails; the run is aborted right after.
    fn on_stage_error(&self, stage: PipelineStage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once the asset passed the privacy scan.
    ///
    /// # Arguments
    /// * `line_count` : number of text segments in the asset
    /// * `asset_bytes`: size of the exported payload
    fn on_conversion_complete(&self, line_count: usize, asset_bytes: usize) {
        let _ = (line_count, asset_bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
