//! # edgequake-img2glb
//!
//! Turn a photographed or scanned document into extruded 3D text and orbit it
//! interactively.
//!
//! ## Why this crate?
//!
//! A flat OCR dump loses everything that made the page readable: where each
//! line sat, what color it was printed in, which lines the recogniser was
//! unsure about. This crate keeps all of that. Every recognised line becomes
//! its own extruded mesh, placed over the pixels it came from, tinted with
//! the ink color sampled from the image, and laid on a paper plane textured
//! with the page itself. The result is a standard glTF 2.0 asset any viewer
//! can open, plus a small built-in orbit viewer.
//!
//! Exported assets never contain the recognised text: geometry parameters
//! are scrubbed and the payload is scanned for banned terms before it leaves
//! the pipeline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (path / URL / bytes)
//!  │
//!  ├─ 1. Loading      resolve input, read EXIF orientation, rotate upright
//!  ├─ 2. Recognition  OCR engine → lines with boxes and 0–100 confidence
//!  ├─ 3. Building     per-line color, glyph extrusion, placement, backdrop
//!  └─ 4. Export       glTF scene → GLB / glTF JSON → banned-term scan
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2glb::{convert, ConversionConfig, TesseractEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let engine = TesseractEngine::default();
//!     let output = convert("scan.jpg", &config, &engine).await?;
//!     std::fs::write("scan.glb", &output.asset.bytes)?;
//!     eprintln!("{} lines, {} triangles",
//!         output.stats.line_count,
//!         output.stats.triangle_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Viewing
//!
//! ```rust,no_run
//! use edgequake_img2glb::viewer::{InputEvent, SceneRenderer, SoftwareSurface};
//! use edgequake_img2glb::ViewerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut renderer = SceneRenderer::new(ViewerConfig::default(), Box::new(SoftwareSurface::new(800, 600)));
//! renderer.load_asset(&std::fs::read("scan.glb")?)?;
//! renderer.handle_input(InputEvent::Wheel { delta_y: -40.0 });
//! for _ in 0..60 {
//!     renderer.tick(1.0 / 60.0);
//! }
//! if let Some(frame) = renderer.snapshot() {
//!     frame.save("preview.png")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2glb` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-img2glb = { version = "0.1", default-features = false }
//! ```
//!
//! ## OCR Engines
//!
//! | Engine | Needs | Best for |
//! |--------|-------|----------|
//! | [`TesseractEngine`] | `tesseract` on `PATH` | Real documents |
//! | [`StaticOcrEngine`] | a JSON file of lines | Tests, replaying a previous run |
//!
//! Anything else plugs in through the [`OcrEngine`] trait.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod asset;
pub mod config;
pub mod convert;
pub mod error;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod viewer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ControlsConfig, ConversionConfig, ConversionConfigBuilder, LowConfidenceStyle, OutputFormat,
    PaperConfig, ViewerConfig,
};
pub use convert::{convert, convert_from_bytes, convert_into_registry, convert_sync, convert_to_file};
pub use error::{Img2GlbError, PipelineStage};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::export::ExportedAsset;
pub use pipeline::ocr::{OcrEngine, RecognizedLine, StaticOcrEngine, TesseractEngine};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{AssetHandle, AssetRegistry};
pub use viewer::{SceneRenderer, ViewerCallback, ViewerHandle};
