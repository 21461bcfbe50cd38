//! Result types returned by the conversion entry points.

use crate::pipeline::export::ExportedAsset;
use crate::pipeline::ocr::RecognizedLine;
use serde::Serialize;

/// Everything a successful conversion produced.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The privacy-checked asset.
    pub asset: ExportedAsset,
    /// Recognised lines in the order they were exported (`Segment_i` ↔ `lines[i]`).
    pub lines: Vec<RecognizedLine>,
    pub stats: ConversionStats,
}

/// Per-run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionStats {
    /// Upright image size in pixels.
    pub image_width: u32,
    pub image_height: u32,
    /// EXIF orientation code that was applied (1 = none).
    pub orientation: u32,
    /// Lines the OCR engine reported, blank ones included.
    pub raw_line_count: usize,
    /// Lines turned into segments.
    pub line_count: usize,
    pub low_confidence_lines: usize,
    pub triangle_count: usize,
    pub asset_bytes: usize,
    pub media_type: String,
    pub load_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub build_duration_ms: u64,
    pub export_duration_ms: u64,
    pub total_duration_ms: u64,
}
