//! Conversion entry points: image in, privacy-checked asset out.
//!
//! ## Stages
//!
//! A run moves through four [`PipelineStage`]s. Only recognition awaits an
//! external collaborator; building and export are synchronous CPU work once
//! the OCR engine has answered.
//!
//! Every failure is caught at its stage boundary, reported once through
//! [`ConversionProgressCallback::on_stage_error`] and returned as
//! [`Img2GlbError::StageFailed`]. Nothing built before the failure escapes:
//! meshes and partial buffers are dropped with the stack frame, and
//! [`convert_into_registry`] revokes any handle it issued earlier.

use crate::config::ConversionConfig;
use crate::error::{Img2GlbError, PipelineStage};
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::color::{average_color, SampleRect};
use crate::pipeline::export::{export_meshes, ExportEntry, ExportOptions};
use crate::pipeline::font::{BoxFont, GlyphSource, TtfFont};
use crate::pipeline::mesh::{build_line_meshes, create_backdrop};
use crate::pipeline::ocr::{normalize_lines, OcrEngine};
use crate::pipeline::orientation::{correct_orientation, read_orientation, OrientedImage};
use crate::pipeline::input;
use crate::progress::ConversionProgressCallback;
use crate::registry::{AssetHandle, AssetRegistry};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Convert an image file or URL into a 3D asset.
///
/// # Arguments
/// * `input_str`: Local file path or HTTP/HTTPS URL to a PNG or JPEG
/// * `config`: Conversion configuration
/// * `engine`: OCR collaborator
///
/// # Errors
/// Returns [`Img2GlbError::StageFailed`] wrapping the first failure. Use
/// [`Img2GlbError::root`] to match on the underlying error.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    engine: &dyn OcrEngine,
) -> Result<ConversionOutput, Img2GlbError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    stage_start(config, PipelineStage::Loading);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs)
        .await
        .map_err(|e| fail(config, PipelineStage::Loading, e))?;

    load_and_run(&resolved.bytes, config, engine).await
}

/// Convert image bytes already in memory.
///
/// # Example
/// ```rust,no_run
/// use edgequake_img2glb::{convert_from_bytes, ConversionConfig, StaticOcrEngine};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("scan.jpg")?;
/// let engine = StaticOcrEngine::from_json(&std::fs::read_to_string("lines.json")?)?;
/// let output = convert_from_bytes(&bytes, &ConversionConfig::default(), &engine).await?;
/// std::fs::write("scan.glb", &output.asset.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
    engine: &dyn OcrEngine,
) -> Result<ConversionOutput, Img2GlbError> {
    stage_start(config, PipelineStage::Loading);
    load_and_run(bytes, config, engine).await
}

/// Convert and write the asset to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    engine: &dyn OcrEngine,
) -> Result<ConversionStats, Img2GlbError> {
    let output = convert(input_str, config, engine).await?;
    write_atomic(output_path.as_ref(), &output.asset.bytes).await?;
    Ok(output.stats)
}

/// Convert and hand the asset over through `registry`.
///
/// Any handle issued earlier is revoked before the run starts, so a failed
/// run leaves no live handle behind.
pub async fn convert_into_registry(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    engine: &dyn OcrEngine,
    registry: &mut AssetRegistry,
) -> Result<(AssetHandle, ConversionOutput), Img2GlbError> {
    registry.revoke_all();
    let output = convert(input_str, config, engine).await?;
    let handle = registry.issue(output.asset.clone());
    Ok((handle, output))
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    engine: &dyn OcrEngine,
) -> Result<ConversionOutput, Img2GlbError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2GlbError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config, engine))
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Img2GlbError> {
    let write_err = |e| Img2GlbError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn load_and_run(
    bytes: &[u8],
    config: &ConversionConfig,
    engine: &dyn OcrEngine,
) -> Result<ConversionOutput, Img2GlbError> {
    let total_start = Instant::now();
    let mut stats = ConversionStats::default();

    // ── Step 2: Orientation + decode ─────────────────────────────────────
    let load_start = Instant::now();
    let orientation = read_orientation(bytes);
    let image = correct_orientation(bytes, Some(orientation))
        .map_err(|e| fail(config, PipelineStage::Loading, e))?;
    stats.orientation = orientation.exif_code();
    stats.image_width = image.width;
    stats.image_height = image.height;

    // ── Step 3: Font ─────────────────────────────────────────────────────
    let font = load_font(config)
        .await
        .map_err(|e| fail(config, PipelineStage::Loading, e))?;
    stats.load_duration_ms = load_start.elapsed().as_millis() as u64;
    info!(
        "Loaded {}x{} image (orientation {}), font: {}",
        image.width,
        image.height,
        stats.orientation,
        font.name()
    );

    run_stages(image, font.as_ref(), config, engine, stats, total_start).await
}

async fn run_stages(
    image: OrientedImage,
    font: &dyn GlyphSource,
    config: &ConversionConfig,
    engine: &dyn OcrEngine,
    mut stats: ConversionStats,
    total_start: Instant,
) -> Result<ConversionOutput, Img2GlbError> {
    // ── Step 4: Recognition ──────────────────────────────────────────────
    stage_start(config, PipelineStage::Recognition);
    let ocr_start = Instant::now();
    let progress = |fraction: f32| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_ocr_progress(fraction.clamp(0.0, 1.0));
        }
    };
    let raw = engine
        .recognize(&image.pixels, &config.ocr_language, &progress)
        .await
        .map_err(|e| match e {
            e @ (Img2GlbError::Recognition(_) | Img2GlbError::Initialization(_)) => e,
            other => Img2GlbError::Recognition(other.to_string()),
        })
        .map_err(|e| fail(config, PipelineStage::Recognition, e))?;
    stats.raw_line_count = raw.len();
    let lines = normalize_lines(raw);
    stats.ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    info!(
        "Recognised {} lines ({} discarded) in {}ms",
        lines.len(),
        stats.raw_line_count - lines.len(),
        stats.ocr_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_lines_recognized(lines.len());
    }

    // ── Step 5: Build meshes ─────────────────────────────────────────────
    stage_start(config, PipelineStage::Building);
    let build_start = Instant::now();
    let meshes = build_line_meshes(&lines, &image.pixels, font, config, |i, n| {
        if let Some(ref cb) = config.progress_callback {
            cb.on_line_built(i, n);
        }
    });
    let backdrop = if config.include_backdrop {
        Some(create_backdrop(&image.pixels, config).map_err(|e| fail(config, PipelineStage::Building, e))?)
    } else {
        None
    };
    stats.line_count = meshes.len();
    stats.low_confidence_lines = meshes.iter().filter(|m| m.low_confidence).count();
    stats.triangle_count = meshes.iter().map(|m| m.geometry.triangle_count()).sum();
    stats.build_duration_ms = build_start.elapsed().as_millis() as u64;

    // ── Step 6: Export + privacy scan ────────────────────────────────────
    stage_start(config, PipelineStage::Export);
    let export_start = Instant::now();
    let mut entries = Vec::with_capacity(meshes.len() + 1);
    if let Some(ref b) = backdrop {
        entries.push(ExportEntry::Backdrop(b));
    }
    entries.extend(meshes.iter().map(ExportEntry::Line));

    let background_color = config.include_background_color.then(|| {
        average_color(
            &image.pixels,
            SampleRect {
                x: 0.0,
                y: 0.0,
                width: image.width as f32,
                height: image.height as f32,
            },
        )
    });
    let options = ExportOptions {
        format: config.output_format,
        background_color,
        extra_banned_terms: config.banned_terms.clone(),
    };
    let asset = export_meshes(&entries, &options).map_err(|e| fail(config, PipelineStage::Export, e))?;

    stats.asset_bytes = asset.bytes.len();
    stats.media_type = asset.media_type().to_string();
    stats.export_duration_ms = export_start.elapsed().as_millis() as u64;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Conversion complete: {} segments, {} bytes, {}ms total",
        asset.segment_count, stats.asset_bytes, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(asset.segment_count, stats.asset_bytes);
    }

    Ok(ConversionOutput { asset, lines, stats })
}

async fn load_font(config: &ConversionConfig) -> Result<Box<dyn GlyphSource>, Img2GlbError> {
    match &config.font_path {
        Some(path) => Ok(Box::new(TtfFont::from_path(path).await?)),
        None => Ok(Box::new(BoxFont::default())),
    }
}

fn stage_start(config: &ConversionConfig, stage: PipelineStage) {
    debug!("Stage: {}", stage);
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(stage);
    }
}

/// Report `e` once and tag it with `stage`.
fn fail(config: &ConversionConfig, stage: PipelineStage, e: Img2GlbError) -> Img2GlbError {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_error(stage, &e.to_string());
    }
    e.at_stage(stage)
}
