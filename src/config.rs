//! Configuration types for image-to-GLB conversion and for the viewer.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The viewer has its own plain-data
//! [`ViewerConfig`]; it never needs a builder because every field is
//! independent and has a sensible default.
//!
//! # World units
//! Everything downstream of OCR is expressed in world units derived from one
//! factor, `pixel_to_world = plane_width / image_width`. The backdrop plane
//! and every line placement use the same factor so extruded text lines sit on
//! top of the pixels they were recognised from.

use crate::error::Img2GlbError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for one image-to-GLB conversion.
///
/// # Example
/// ```rust
/// use edgequake_img2glb::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .plane_width(30.0)
///     .output_format(OutputFormat::Text)
///     .ban_term("acme corp")
///     .build()
///     .unwrap();
/// assert_eq!(config.plane_width, 30.0);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Width of the generated paper plane in world units. Default: 22.
    pub plane_width: f32,

    /// Padding applied to the backdrop plane so text stays inside the paper
    /// edges. Default: 1.08.
    pub plane_padding_ratio: f32,

    /// Glyph size, in source-image pixels, used when building text geometry.
    /// Default: 28.
    pub font_size: f32,

    /// Extrusion depth of each text line, in source-image pixels. Default: 2.4.
    pub extrude_depth: f32,

    /// Subdivisions per glyph curve. Range 1–32. Default: 6.
    pub curve_segments: u32,

    /// Extra multiplier on the Z scale of every line mesh. Default: 3.2.
    ///
    /// Thin extrusions vanish when the camera orbits to a grazing angle; this
    /// thickens text without inflating its footprint on the page.
    pub depth_scale_multiplier: f32,

    /// Z offset keeping text above the backdrop plane. Default: 0.4.
    pub line_lift: f32,

    /// Styling applied to lines the OCR engine was unsure about.
    pub low_confidence: LowConfidenceStyle,

    /// Language hint forwarded to the OCR engine. Default: "eng".
    pub ocr_language: String,

    /// Binary GLB (default) or textual glTF JSON.
    pub output_format: OutputFormat,

    /// Add the paper backdrop to the exported scene. Default: true.
    pub include_backdrop: bool,

    /// Embed the source image as the backdrop texture. Default: true.
    ///
    /// When off, the backdrop is a flat plane tinted with the average image
    /// color.
    pub embed_backdrop_texture: bool,

    /// Record the average image color as the scene background. Default: true.
    pub include_background_color: bool,

    /// Terms banned from the payload in addition to
    /// [`crate::pipeline::export::DEFAULT_BANNED_TERMS`].
    pub banned_terms: Vec<String>,

    /// TrueType/OpenType font used for glyph outlines. If None, the built-in
    /// box font is used.
    pub font_path: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives stage and OCR progress events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            plane_width: 22.0,
            plane_padding_ratio: 1.08,
            font_size: 28.0,
            extrude_depth: 2.4,
            curve_segments: 6,
            depth_scale_multiplier: 3.2,
            line_lift: 0.4,
            low_confidence: LowConfidenceStyle::default(),
            ocr_language: "eng".to_string(),
            output_format: OutputFormat::default(),
            include_backdrop: true,
            embed_backdrop_texture: true,
            include_background_color: true,
            banned_terms: Vec::new(),
            font_path: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("plane_width", &self.plane_width)
            .field("plane_padding_ratio", &self.plane_padding_ratio)
            .field("font_size", &self.font_size)
            .field("extrude_depth", &self.extrude_depth)
            .field("curve_segments", &self.curve_segments)
            .field("depth_scale_multiplier", &self.depth_scale_multiplier)
            .field("line_lift", &self.line_lift)
            .field("low_confidence", &self.low_confidence)
            .field("ocr_language", &self.ocr_language)
            .field("output_format", &self.output_format)
            .field("include_backdrop", &self.include_backdrop)
            .field("embed_backdrop_texture", &self.embed_backdrop_texture)
            .field("banned_terms", &self.banned_terms.len())
            .field("font_path", &self.font_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// World units per source-image pixel for an image of the given width.
    pub fn pixel_to_world(&self, image_width: u32) -> f32 {
        self.plane_width / image_width.max(1) as f32
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn plane_width(mut self, w: f32) -> Self {
        self.config.plane_width = w;
        self
    }

    pub fn plane_padding_ratio(mut self, r: f32) -> Self {
        self.config.plane_padding_ratio = r.max(1.0);
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.config.font_size = size;
        self
    }

    pub fn extrude_depth(mut self, depth: f32) -> Self {
        self.config.extrude_depth = depth;
        self
    }

    pub fn curve_segments(mut self, n: u32) -> Self {
        self.config.curve_segments = n.clamp(1, 32);
        self
    }

    pub fn depth_scale_multiplier(mut self, m: f32) -> Self {
        self.config.depth_scale_multiplier = m;
        self
    }

    pub fn line_lift(mut self, z: f32) -> Self {
        self.config.line_lift = z;
        self
    }

    pub fn low_confidence(mut self, style: LowConfidenceStyle) -> Self {
        self.config.low_confidence = style;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    pub fn include_backdrop(mut self, v: bool) -> Self {
        self.config.include_backdrop = v;
        self
    }

    pub fn embed_backdrop_texture(mut self, v: bool) -> Self {
        self.config.embed_backdrop_texture = v;
        self
    }

    pub fn include_background_color(mut self, v: bool) -> Self {
        self.config.include_background_color = v;
        self
    }

    /// Ban an additional term from the exported payload (case-insensitive).
    pub fn ban_term(mut self, term: impl Into<String>) -> Self {
        self.config.banned_terms.push(term.into());
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Img2GlbError> {
        let c = &self.config;
        if !(c.plane_width.is_finite() && c.plane_width > 0.0) {
            return Err(Img2GlbError::InvalidConfig(format!(
                "plane width must be > 0, got {}",
                c.plane_width
            )));
        }
        if !(c.font_size.is_finite() && c.font_size > 0.0) {
            return Err(Img2GlbError::InvalidConfig(format!(
                "font size must be > 0, got {}",
                c.font_size
            )));
        }
        if !(c.extrude_depth.is_finite() && c.extrude_depth > 0.0) {
            return Err(Img2GlbError::InvalidConfig(format!(
                "extrude depth must be > 0, got {}",
                c.extrude_depth
            )));
        }
        if !(0.0..=1.0).contains(&c.low_confidence.color_blend) {
            return Err(Img2GlbError::InvalidConfig(format!(
                "low-confidence color blend must be 0–1, got {}",
                c.low_confidence.color_blend
            )));
        }
        if c.banned_terms.iter().any(|t| t.trim().is_empty()) {
            return Err(Img2GlbError::InvalidConfig(
                "banned terms must not be blank".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums & nested settings ──────────────────────────────────────────────

/// Container format of the exported asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// GLB: JSON chunk + binary chunk in one file (default).
    #[default]
    Binary,
    /// glTF JSON with buffers and images embedded as base64 data URIs.
    Text,
}

impl OutputFormat {
    /// IANA media type of the asset.
    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Binary => "model/gltf-binary",
            OutputFormat::Text => "model/gltf+json",
        }
    }

    /// Conventional file extension (without dot).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Binary => "glb",
            OutputFormat::Text => "gltf",
        }
    }
}

/// How lines below the confidence threshold are styled.
///
/// Low-confidence lines are tinted toward a neutral color and extruded deeper
/// so a reviewer spots them in the viewer at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowConfidenceStyle {
    /// Lines with `confidence < threshold` (0–100) are restyled. Default: 60.
    pub threshold: u8,
    /// Target color, packed 0xRRGGBB. Default: 0x9aa0a6.
    pub fallback_color: u32,
    /// Blend factor toward `fallback_color`, 0–1. Default: 0.45.
    pub color_blend: f32,
    /// Extra Z-scale multiplier. Default: 1.5.
    pub depth_boost: f32,
}

impl Default for LowConfidenceStyle {
    fn default() -> Self {
        Self {
            threshold: 60,
            fallback_color: 0x9aa0a6,
            color_blend: 0.45,
            depth_boost: 1.5,
        }
    }
}

// ── Viewer ───────────────────────────────────────────────────────────────

/// Settings for [`crate::viewer::SceneRenderer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Surface clear color, packed 0xRRGGBB.
    pub clear_color: u32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    /// Initial camera spherical state `(radius, polar, azimuth)`.
    pub initial_spherical: (f32, f32, f32),
    /// Target frame interval of the viewer loop in milliseconds. Default: 16.
    pub frame_interval_ms: u64,
    pub controls: ControlsConfig,
    pub paper: PaperConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            clear_color: 0xf5f4f0,
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            initial_spherical: (140.0, std::f32::consts::FRAC_PI_3, std::f32::consts::FRAC_PI_4),
            frame_interval_ms: 16,
            controls: ControlsConfig::default(),
            paper: PaperConfig::default(),
        }
    }
}

/// Orbit-control tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlsConfig {
    /// Radians per dragged pixel, horizontal and vertical.
    pub rotation_sensitivity: (f32, f32),
    /// Dragging right turns the camera left when true.
    pub invert_horizontal_drag: bool,
    /// Fraction of the remaining distance covered per 60 Hz frame.
    pub orbit_damping: f32,
    /// Wheel delta → exponential zoom factor.
    pub zoom_delta_multiplier: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Interior polar range; keeps the camera from flipping over the poles.
    pub polar_min: f32,
    pub polar_max: f32,
    /// Loaded scenes are framed at `diagonal * frame_padding`.
    pub frame_padding: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            rotation_sensitivity: (0.005, 0.005),
            invert_horizontal_drag: true,
            orbit_damping: 0.08,
            zoom_delta_multiplier: 0.012,
            min_radius: 18.0,
            max_radius: 360.0,
            polar_min: 0.3,
            polar_max: std::f32::consts::PI - 0.2,
            frame_padding: 1.2,
        }
    }
}

/// Fallback backdrop synthesised when an asset carries none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Flat paper color, packed 0xRRGGBB.
    pub color: u32,
    /// Plane size relative to the measured content extent.
    pub scale_padding: f32,
    /// Distance behind the content as a fraction of its depth.
    pub depth_offset_ratio: f32,
    /// Lower bound for that distance.
    pub min_depth_offset: f32,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            color: 0xf8f6f0,
            scale_padding: 1.1,
            depth_offset_ratio: 0.2,
            min_depth_offset: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let c = ConversionConfig::builder().build().unwrap();
        assert_eq!(c.curve_segments, 6);
        assert_eq!(c.output_format, OutputFormat::Binary);
        assert!(c.include_backdrop);
    }

    #[test]
    fn curve_segments_are_clamped() {
        let c = ConversionConfig::builder().curve_segments(0).build().unwrap();
        assert_eq!(c.curve_segments, 1);
        let c = ConversionConfig::builder().curve_segments(500).build().unwrap();
        assert_eq!(c.curve_segments, 32);
    }

    #[test]
    fn rejects_non_positive_plane_width() {
        let err = ConversionConfig::builder().plane_width(0.0).build().unwrap_err();
        assert!(matches!(err, Img2GlbError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_blank_banned_term() {
        let err = ConversionConfig::builder().ban_term("  ").build().unwrap_err();
        assert!(err.to_string().contains("blank"));
    }

    #[test]
    fn pixel_to_world_uses_plane_width() {
        let c = ConversionConfig::default();
        assert!((c.pixel_to_world(1100) - 0.02).abs() < 1e-6);
        // Degenerate width never divides by zero.
        assert!(c.pixel_to_world(0).is_finite());
    }

    #[test]
    fn media_types() {
        assert_eq!(OutputFormat::Binary.media_type(), "model/gltf-binary");
        assert_eq!(OutputFormat::Text.extension(), "gltf");
    }
}
