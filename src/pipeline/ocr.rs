//! The OCR collaborator contract and two engines that satisfy it.
//!
//! Text recognition itself is a black box. The pipeline only consumes
//! [`RecognizedLine`]s: text, a pixel-space bounding box and an integer
//! confidence. Everything an engine reports is funnelled through
//! [`normalize_lines`], which is the single place where
//!
//! * blank lines are discarded, and
//! * the engine's confidence (a float, usually 0–100 but unrounded) becomes
//!   the canonical integer percentage via [`normalize_confidence`].
//!
//! Engines:
//! * [`TesseractEngine`]: runs the `tesseract` CLI in TSV mode.
//! * [`StaticOcrEngine`]: serves pre-recognised lines (fixtures, `--lines`).

use crate::error::Img2GlbError;
use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Pixel-space bounding box, `left < right`, `top < bottom` (y grows down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl LineBounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn union(&self, o: &LineBounds) -> LineBounds {
        LineBounds {
            left: self.left.min(o.left),
            top: self.top.min(o.top),
            right: self.right.max(o.right),
            bottom: self.bottom.max(o.bottom),
        }
    }
}

/// One recognised text line. Consumed once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
    pub bbox: LineBounds,
    /// Integer percentage, 0–100.
    pub confidence: u8,
}

/// A line as an engine reports it, before normalisation.
///
/// The field names follow the common `{x0, y0, x1, y1}` engine convention so
/// fixture files can be written by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    pub text: String,
    pub bbox: RawBbox,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBbox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

/// Incremental progress sink, `0.0..=1.0`.
pub type OcrProgress<'a> = &'a (dyn Fn(f32) + Send + Sync);

/// Anything that turns an upright image into text lines.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognise lines in `image` using the `language` hint.
    ///
    /// Implementations report progress through `progress` and return raw
    /// lines; callers normalise them with [`normalize_lines`].
    async fn recognize(
        &self,
        image: &RgbaImage,
        language: &str,
        progress: OcrProgress<'_>,
    ) -> Result<Vec<RawLine>, Img2GlbError>;
}

/// Round and clamp an engine confidence to the canonical `0..=100`.
///
/// Engines that report a fraction (`0.0..=1.0`) are not special-cased: a
/// value of `0.9` becomes `1`, not `90`. Engines must report percentages.
pub fn normalize_confidence(raw: f32) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Drop blank lines, fix inverted boxes and canonicalise confidence.
pub fn normalize_lines(raw: Vec<RawLine>) -> Vec<RecognizedLine> {
    let total = raw.len();
    let lines: Vec<RecognizedLine> = raw
        .into_iter()
        .filter(|l| !l.text.trim().is_empty())
        .map(|l| RecognizedLine {
            text: l.text.trim_end_matches(['\n', '\r']).to_string(),
            bbox: LineBounds {
                left: l.bbox.x0.min(l.bbox.x1),
                top: l.bbox.y0.min(l.bbox.y1),
                right: l.bbox.x0.max(l.bbox.x1),
                bottom: l.bbox.y0.max(l.bbox.y1),
            },
            confidence: normalize_confidence(l.confidence),
        })
        .collect();
    if lines.len() < total {
        debug!("Discarded {} blank OCR lines", total - lines.len());
    }
    lines
}

// ── StaticOcrEngine ──────────────────────────────────────────────────────

/// Serves a fixed list of lines regardless of the image.
#[derive(Debug, Clone, Default)]
pub struct StaticOcrEngine {
    lines: Vec<RawLine>,
}

impl StaticOcrEngine {
    pub fn new(lines: Vec<RawLine>) -> Self {
        Self { lines }
    }

    /// Parse a JSON array of `{text, bbox: {x0, y0, x1, y1}, confidence}`.
    pub fn from_json(json: &str) -> Result<Self, Img2GlbError> {
        let lines: Vec<RawLine> = serde_json::from_str(json)
            .map_err(|e| Img2GlbError::InvalidInput {
                input: format!("OCR lines JSON: {e}"),
            })?;
        Ok(Self { lines })
    }

    pub async fn from_file(path: &Path) -> Result<Self, Img2GlbError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|_| Img2GlbError::FileNotFound {
                path: path.to_path_buf(),
            })?;
        Self::from_json(&json)
    }
}

#[async_trait]
impl OcrEngine for StaticOcrEngine {
    async fn recognize(
        &self,
        _image: &RgbaImage,
        _language: &str,
        progress: OcrProgress<'_>,
    ) -> Result<Vec<RawLine>, Img2GlbError> {
        progress(1.0);
        Ok(self.lines.clone())
    }
}

// ── TesseractEngine ──────────────────────────────────────────────────────

/// Runs the `tesseract` binary and groups its TSV word rows into lines.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: String,
    /// Page segmentation mode. Default: 3 (fully automatic).
    psm: u32,
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            psm: 3,
        }
    }
}

impl TesseractEngine {
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(
        &self,
        image: &RgbaImage,
        language: &str,
        progress: OcrProgress<'_>,
    ) -> Result<Vec<RawLine>, Img2GlbError> {
        progress(0.0);
        let tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|e| Img2GlbError::Recognition(format!("temp file: {e}")))?;
        image
            .save_with_format(tmp.path(), image::ImageFormat::Png)
            .map_err(|e| Img2GlbError::Recognition(format!("temp image: {e}")))?;
        progress(0.1);

        info!("Running {} (lang={}, psm={})", self.binary, language, self.psm);
        let output = tokio::process::Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .await
            .map_err(|e| {
                Img2GlbError::Initialization(format!("failed to run {} (is it installed?): {e}", self.binary))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Img2GlbError::Recognition(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }
        progress(0.9);

        let tsv = String::from_utf8_lossy(&output.stdout);
        let lines = parse_tsv_lines(&tsv);
        progress(1.0);
        Ok(lines)
    }
}

struct Word {
    text: String,
    bbox: LineBounds,
    conf: f32,
}

/// Group TSV word rows (level 5) by `(page, block, paragraph, line)`.
///
/// Line confidence is the word confidences averaged by character count.
pub fn parse_tsv_lines(tsv: &str) -> Vec<RawLine> {
    let mut groups: BTreeMap<(i32, i32, i32, i32), Vec<Word>> = BTreeMap::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        if cols[0].parse::<i32>().unwrap_or(0) != 5 {
            continue;
        }
        let int = |i: usize| cols[i].trim().parse::<i32>().unwrap_or(0);
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let (left, top, width, height) = (int(6), int(7), int(8), int(9));
        groups
            .entry((int(1), int(2), int(3), int(4)))
            .or_default()
            .push(Word {
                text: text.to_string(),
                bbox: LineBounds {
                    left: left as f32,
                    top: top as f32,
                    right: (left + width) as f32,
                    bottom: (top + height) as f32,
                },
                conf,
            });
    }

    let mut lines = Vec::with_capacity(groups.len());
    for (_, mut words) in groups {
        words.sort_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left));
        let Some(first) = words.first() else { continue };
        let mut bbox = first.bbox;
        let mut weighted = 0.0f32;
        let mut chars = 0usize;
        for w in &words {
            bbox = bbox.union(&w.bbox);
            let n = w.text.chars().count().max(1);
            weighted += w.conf * n as f32;
            chars += n;
        }
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(RawLine {
            text,
            bbox: RawBbox {
                x0: bbox.left,
                y0: bbox.top,
                x1: bbox.right,
                y1: bbox.bottom,
            },
            confidence: weighted / chars.max(1) as f32,
        });
    }

    if lines.is_empty() {
        warn!("tesseract returned no words");
    }
    lines
}
