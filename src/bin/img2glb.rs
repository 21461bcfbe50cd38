//! CLI binary for edgequake-img2glb.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, picks an OCR engine, writes the asset and optionally
//! renders a preview.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2glb::viewer::{InputEvent, SceneRenderer, SoftwareSurface};
use edgequake_img2glb::{
    convert, ConversionConfig, ConversionProgressCallback, OcrEngine, OutputFormat,
    PipelineStage, ProgressCallback, StaticOcrEngine, TesseractEngine, ViewerConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar reused across stages: spinner while loading and exporting,
/// percentage during OCR, per-line counter while building.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Loading");
        bar.set_message("Reading image…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn counter(&self, prefix: &'static str, len: u64, unit: &str) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  ⏱ {{elapsed_precise}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_length(len);
        self.bar.set_position(0);
        self.bar.set_prefix(prefix);
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: PipelineStage) {
        match stage {
            PipelineStage::Loading => {}
            PipelineStage::Recognition => self.counter("Recognising", 100, "%"),
            PipelineStage::Building => self.counter("Building", 0, "lines"),
            PipelineStage::Export => {
                self.bar.set_style(spinner_style());
                self.bar.set_prefix("Exporting");
                self.bar.set_message("Writing scene and checking payload…");
            }
        }
    }

    fn on_ocr_progress(&self, fraction: f32) {
        self.bar.set_position((fraction * 100.0).round() as u64);
    }

    fn on_lines_recognized(&self, line_count: usize) {
        self.bar.println(format!(
            "  {} {} lines recognised",
            green("✓"),
            bold(&line_count.to_string())
        ));
    }

    fn on_line_built(&self, index: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(index as u64);
    }

    fn on_stage_error(&self, stage: PipelineStage, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!("  {} {} failed: {}", red("✗"), stage, red(&msg)));
        self.bar.finish_and_clear();
    }

    fn on_conversion_complete(&self, line_count: usize, asset_bytes: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} segments  {}",
            green("✔"),
            bold(&line_count.to_string()),
            dim(&format!("{asset_bytes} bytes"))
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Photo → GLB next to the input (scan.glb)
  img2glb scan.jpg

  # Choose output path and OCR language
  img2glb --lang deu brief.png -o brief.glb

  # Text glTF with a custom font
  img2glb --text-format --font fonts/Inter-Bold.ttf scan.jpg -o scan.gltf

  # Replay recognised lines instead of running tesseract
  img2glb --lines lines.json scan.jpg

  # Render a PNG preview from the built-in viewer
  img2glb scan.jpg --preview scan.png

  # Refuse assets containing a client name
  img2glb scan.jpg --ban "acme corp" --ban "project x"

LINES FILE FORMAT (--lines):
  [{"text": "Invoice", "bbox": {"x0": 120, "y0": 140, "x1": 900, "y1": 210}, "confidence": 91.5}]

ENVIRONMENT VARIABLES:
  IMG2GLB_OUTPUT        Default output path
  IMG2GLB_LANG          OCR language (tesseract code, default eng)
  IMG2GLB_FONT          TrueType/OpenType font for glyph outlines
  IMG2GLB_TESSERACT     tesseract binary (default: tesseract on PATH)
  RUST_LOG              Overrides the log filter

SETUP:
  Install tesseract (apt install tesseract-ocr, brew install tesseract)
  or pass --lines. Without --font a built-in block font is used.
"#;

/// Turn document images into extruded 3D text (GLB / glTF).
#[derive(Parser, Debug)]
#[command(
    name = "img2glb",
    version,
    about = "Turn document images into extruded 3D text (GLB / glTF)",
    long_about = "Recognise the text lines of a photographed or scanned document and export \
them as colored, extruded 3D meshes laid over a paper plane. The recognised text itself is \
never written into the asset.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path or HTTP/HTTPS URL (PNG or JPEG).
    input: String,

    /// Write the asset here. Default: input name with .glb / .gltf.
    #[arg(short, long, env = "IMG2GLB_OUTPUT")]
    output: Option<PathBuf>,

    /// JSON file of pre-recognised lines; skips tesseract.
    #[arg(long)]
    lines: Option<PathBuf>,

    /// OCR language hint.
    #[arg(long, env = "IMG2GLB_LANG", default_value = "eng")]
    lang: String,

    /// tesseract binary.
    #[arg(long, env = "IMG2GLB_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// tesseract page segmentation mode (0–13).
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(0..=13))]
    psm: u32,

    /// TrueType/OpenType font for glyph outlines.
    #[arg(long, env = "IMG2GLB_FONT")]
    font: Option<PathBuf>,

    /// Paper width in world units.
    #[arg(long, default_value_t = 22.0)]
    plane_width: f32,

    /// Subdivisions per glyph curve (1–32).
    #[arg(long, default_value_t = 6)]
    curve_segments: u32,

    /// Write textual glTF JSON instead of binary GLB.
    #[arg(long)]
    text_format: bool,

    /// Leave out the paper backdrop.
    #[arg(long)]
    no_backdrop: bool,

    /// Flat-tinted backdrop instead of the embedded source image.
    #[arg(long)]
    no_backdrop_texture: bool,

    /// Additional term that must not appear in the asset (repeatable).
    #[arg(long = "ban", value_name = "TERM")]
    banned: Vec<String>,

    /// Render a PNG preview of the asset with the built-in viewer.
    #[arg(long, value_name = "PNG")]
    preview: Option<PathBuf>,

    /// Preview size as WIDTHxHEIGHT.
    #[arg(long, default_value = "960x720")]
    preview_size: String,

    /// Print run statistics as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2GLB_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2GLB_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2GLB_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and engine ──────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let engine = build_engine(&cli).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.input, &config, engine.as_ref())
        .await
        .context("Conversion failed")?;

    let output_path = match cli.output {
        Some(ref p) => p.clone(),
        None => default_output(&cli.input, config.output_format),
    };
    edgequake_img2glb::convert::write_atomic(&output_path, &output.asset.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    // ── Preview ──────────────────────────────────────────────────────────
    if let Some(ref png) = cli.preview {
        let (w, h) = parse_size(&cli.preview_size)?;
        render_preview(&output.asset.bytes, w, h, png)?;
        if !cli.quiet && !cli.json {
            eprintln!("{} preview  →  {}", cyan("◆"), bold(&png.display().to_string()));
        }
    }

    // ── Report ───────────────────────────────────────────────────────────
    if cli.json {
        // boxes and confidences only; the recognised text stays out of logs
        let lines: Vec<_> = output
            .lines
            .iter()
            .map(|l| serde_json::json!({ "bbox": l.bbox, "confidence": l.confidence }))
            .collect();
        let report = serde_json::json!({
            "output": output_path,
            "stats": output.stats,
            "lines": lines,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {} lines  {} triangles  {}ms  →  {}",
            if s.low_confidence_lines == 0 { green("✔") } else { cyan("⚠") },
            s.line_count,
            s.triangle_count,
            s.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if s.low_confidence_lines > 0 {
            eprintln!(
                "   {}",
                dim(&format!("{} low-confidence lines highlighted", s.low_confidence_lines))
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .plane_width(cli.plane_width)
        .curve_segments(cli.curve_segments)
        .ocr_language(cli.lang.clone())
        .output_format(if cli.text_format {
            OutputFormat::Text
        } else {
            OutputFormat::Binary
        })
        .include_backdrop(!cli.no_backdrop)
        .embed_backdrop_texture(!cli.no_backdrop_texture)
        .download_timeout_secs(cli.download_timeout);

    for term in &cli.banned {
        builder = builder.ban_term(term.clone());
    }
    if let Some(ref font) = cli.font {
        builder = builder.font_path(font.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn build_engine(cli: &Cli) -> Result<Box<dyn OcrEngine>> {
    match cli.lines {
        Some(ref path) => {
            let engine = StaticOcrEngine::from_file(path)
                .await
                .with_context(|| format!("Failed to read lines from {}", path.display()))?;
            Ok(Box::new(engine))
        }
        None => Ok(Box::new(
            TesseractEngine::default()
                .with_binary(cli.tesseract.clone())
                .with_psm(cli.psm),
        )),
    }
}

/// `scan.jpg` → `scan.glb`; URLs use their last path segment.
fn default_output(input: &str, format: OutputFormat) -> PathBuf {
    let name = input
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    PathBuf::from(format!("{stem}.{}", format.extension()))
}

fn parse_size(s: &str) -> Result<(u32, u32)> {
    let (w, h) = s
        .split_once(|c| c == 'x' || c == 'X')
        .with_context(|| format!("Invalid size '{s}', expected WIDTHxHEIGHT"))?;
    let w: u32 = w.trim().parse().context("Invalid preview width")?;
    let h: u32 = h.trim().parse().context("Invalid preview height")?;
    if w == 0 || h == 0 || w > 8192 || h > 8192 {
        anyhow::bail!("Preview size must be within 1–8192 pixels (got {w}x{h})");
    }
    Ok((w, h))
}

/// Load the asset into a software-rendered viewer, let the camera settle and
/// save the frame.
fn render_preview(asset: &[u8], width: u32, height: u32, path: &Path) -> Result<()> {
    let mut renderer = SceneRenderer::new(
        ViewerConfig::default(),
        Box::new(SoftwareSurface::new(width, height)),
    );
    renderer
        .load_asset(asset)
        .context("Failed to load asset into the viewer")?;
    // a short drag to the left, then two simulated seconds at 60 Hz
    renderer.handle_input(InputEvent::PointerDown { id: 0, x: 0.0, y: 0.0 });
    for step in 1..=12 {
        renderer.handle_input(InputEvent::PointerMove { id: 0, x: step as f32 * -10.0, y: 0.0 });
        renderer.tick(1.0 / 60.0);
    }
    renderer.handle_input(InputEvent::PointerUp { id: 0 });
    for _ in 0..120 {
        renderer.tick(1.0 / 60.0);
    }
    let frame = renderer
        .snapshot()
        .context("Viewer surface produced no frame")?;
    frame
        .save(path)
        .with_context(|| format!("Failed to save preview {}", path.display()))?;
    renderer.dispose();
    Ok(())
}
