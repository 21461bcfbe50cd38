//! Line mesh assembly: geometry + placement + color + confidence styling.
//!
//! ## Scaling
//!
//! Geometry is built in source-image pixels at the configured font size, so
//! its footprint rarely matches the OCR box exactly. Each line gets a uniform
//! XY scale that fits the geometry into its box (`pixel_to_world` × fit) and
//! a separate Z scale (`pixel_to_world × depth_scale_multiplier`), so thin
//! extrusions stay visible without widening the text.
//!
//! Low-confidence lines are blended toward a neutral color and pushed deeper;
//! the [`LineMesh::low_confidence`] flag records the decision so callers and
//! tests can inspect it without reverse-engineering colors.

use super::color::{average_color, blend, unpack_color, Rgb, SampleRect};
use super::encode::encode_png;
use super::font::GlyphSource;
use super::geometry::{build_line_geometry, place_mesh, Geometry, Placement, TextGeometryOptions};
use super::ocr::RecognizedLine;
use crate::config::ConversionConfig;
use crate::error::Img2GlbError;
use crate::math::Transform;
use glam::Vec3;
use image::RgbaImage;
use tracing::debug;

/// One renderable text line.
#[derive(Debug, Clone)]
pub struct LineMesh {
    pub geometry: Geometry,
    pub transform: Transform,
    /// Final shading color (after low-confidence blending).
    pub color: Rgb,
    /// Color sampled from the image before any styling.
    pub sampled_color: Rgb,
    pub low_confidence: bool,
    pub confidence: u8,
}

/// The paper plane behind the text.
#[derive(Debug, Clone)]
pub struct Backdrop {
    pub geometry: Geometry,
    pub transform: Transform,
    /// PNG-encoded source image, when texture embedding is enabled.
    pub texture_png: Option<Vec<u8>>,
    /// Average image color; the flat fallback when there is no texture.
    pub color: Rgb,
}

/// Build and place the mesh for one recognised line.
pub fn build_line_mesh(
    line: &RecognizedLine,
    image: &RgbaImage,
    font: &dyn GlyphSource,
    config: &ConversionConfig,
) -> LineMesh {
    let bbox = &line.bbox;
    let sampled_color = average_color(
        image,
        SampleRect {
            x: bbox.left,
            y: bbox.top,
            width: bbox.width(),
            height: bbox.height(),
        },
    );

    let geometry = build_line_geometry(
        &line.text,
        font,
        &TextGeometryOptions {
            font_size: config.font_size,
            extrude_depth: config.extrude_depth,
            curve_segments: config.curve_segments,
        },
    );

    let pixel_to_world = config.pixel_to_world(image.width());
    let xy = pixel_to_world * fit_factor(&geometry, bbox.width(), bbox.height());
    let mut z = pixel_to_world * config.depth_scale_multiplier;
    let mut color = sampled_color;

    let style = &config.low_confidence;
    let low_confidence = line.confidence < style.threshold;
    if low_confidence {
        color = blend(sampled_color, unpack_color(style.fallback_color), style.color_blend);
        z *= style.depth_boost;
    }

    let mut transform = Transform {
        translation: Vec3::ZERO,
        scale: Vec3::new(xy, xy, z),
    };
    place_mesh(
        &mut transform,
        bbox,
        &Placement {
            image_width: image.width(),
            image_height: image.height(),
            scale: pixel_to_world,
            z_offset: config.line_lift,
        },
    );

    LineMesh {
        geometry,
        transform,
        color,
        sampled_color,
        low_confidence,
        confidence: line.confidence,
    }
}

/// Build every line mesh in order, reporting `(index, total)` after each one.
pub fn build_line_meshes(
    lines: &[RecognizedLine],
    image: &RgbaImage,
    font: &dyn GlyphSource,
    config: &ConversionConfig,
    mut on_built: impl FnMut(usize, usize),
) -> Vec<LineMesh> {
    let total = lines.len();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let mesh = build_line_mesh(line, image, font, config);
            debug!(
                "Line {}/{}: color {} conf {}{}",
                i + 1,
                total,
                mesh.color.key(),
                mesh.confidence,
                if mesh.low_confidence { " (low)" } else { "" }
            );
            on_built(i + 1, total);
            mesh
        })
        .collect()
}

/// Scale that fits geometry into a `width × height` pixel box.
fn fit_factor(geometry: &Geometry, width: f32, height: f32) -> f32 {
    let size = geometry.bounds.size();
    let fx = if size.x > f32::EPSILON { width / size.x } else { f32::INFINITY };
    let fy = if size.y > f32::EPSILON { height / size.y } else { f32::INFINITY };
    let fit = fx.min(fy);
    if fit.is_finite() && fit > 0.0 {
        fit
    } else {
        1.0
    }
}

/// Paper plane sized to the page (plus padding) at `z = 0`.
pub fn create_backdrop(image: &RgbaImage, config: &ConversionConfig) -> Result<Backdrop, Img2GlbError> {
    let pixel_to_world = config.pixel_to_world(image.width());
    let width = config.plane_width * config.plane_padding_ratio;
    let height = image.height() as f32 * pixel_to_world * config.plane_padding_ratio;

    let color = average_color(
        image,
        SampleRect {
            x: 0.0,
            y: 0.0,
            width: image.width() as f32,
            height: image.height() as f32,
        },
    );

    let texture_png = if config.embed_backdrop_texture {
        Some(encode_png(image).map_err(|e| Img2GlbError::Internal(format!("backdrop texture: {e}")))?)
    } else {
        None
    };

    debug!("Backdrop {:.2}x{:.2} world units, color {}", width, height, color.key());
    Ok(Backdrop {
        geometry: Geometry::plane(width, height),
        transform: Transform::default(),
        texture_png,
        color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LowConfidenceStyle;
    use crate::pipeline::color::pack_color;
    use crate::pipeline::font::BoxFont;
    use crate::pipeline::ocr::LineBounds;
    use image::Rgba;

    fn page() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(1024, 1536, Rgba([250, 250, 250, 255]));
        for y in 140..210 {
            for x in 120..900 {
                img.put_pixel(x, y, Rgba([0x33, 0x66, 0x99, 255]));
            }
        }
        img
    }

    fn line(conf: u8) -> RecognizedLine {
        RecognizedLine {
            text: "Staff Engineer".into(),
            bbox: LineBounds { left: 120.0, top: 140.0, right: 900.0, bottom: 210.0 },
            confidence: conf,
        }
    }

    #[test]
    fn confident_line_keeps_sampled_color() {
        let config = ConversionConfig::default();
        let mesh = build_line_mesh(&line(90), &page(), &BoxFont::default(), &config);
        assert_eq!(mesh.color, Rgb([0x33, 0x66, 0x99]));
        assert!(!mesh.low_confidence);
        let ptw = 22.0 / 1024.0;
        assert!((mesh.transform.scale.z - ptw * 3.2).abs() < 1e-6);
        assert_eq!(mesh.transform.scale.x, mesh.transform.scale.y);
        assert_eq!(mesh.transform.translation.z, 0.4);
    }

    #[test]
    fn low_confidence_line_is_restyled() {
        let config = ConversionConfig::default();
        let mesh = build_line_mesh(&line(40), &page(), &BoxFont::default(), &config);
        assert!(mesh.low_confidence);
        let style = LowConfidenceStyle::default();
        let expected = blend(Rgb([0x33, 0x66, 0x99]), unpack_color(style.fallback_color), style.color_blend);
        assert_eq!(mesh.color, expected);
        assert_ne!(pack_color(mesh.color), pack_color(mesh.sampled_color));
        let ptw = 22.0 / 1024.0;
        assert!((mesh.transform.scale.z - ptw * 3.2 * 1.5).abs() < 1e-6);
    }

    #[test]
    fn threshold_is_exclusive() {
        let config = ConversionConfig::default();
        let mesh = build_line_mesh(&line(60), &page(), &BoxFont::default(), &config);
        assert!(!mesh.low_confidence);
    }

    #[test]
    fn placed_footprint_fits_the_box() {
        let config = ConversionConfig::default();
        let mesh = build_line_mesh(&line(90), &page(), &BoxFont::default(), &config);
        let world = mesh
            .geometry
            .bounds
            .transformed(mesh.transform.translation, mesh.transform.scale);
        let ptw = 22.0 / 1024.0;
        assert!(world.size().x <= 780.0 * ptw + 1e-3);
        assert!(world.size().y <= 70.0 * ptw + 1e-3);
        let fits_width = (world.size().x - 780.0 * ptw).abs() < 1e-3;
        let fits_height = (world.size().y - 70.0 * ptw).abs() < 1e-3;
        assert!(fits_width || fits_height);
    }

    #[test]
    fn progress_reports_every_line() {
        let config = ConversionConfig::default();
        let mut seen = Vec::new();
        let meshes = build_line_meshes(&[line(90), line(85)], &page(), &BoxFont::default(), &config, |i, n| {
            seen.push((i, n))
        });
        assert_eq!(meshes.len(), 2);
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn backdrop_matches_page_scale() {
        let config = ConversionConfig::default();
        let b = create_backdrop(&page(), &config).unwrap();
        let size = b.geometry.bounds.size();
        assert!((size.x - 22.0 * 1.08).abs() < 1e-4);
        assert!((size.y - 33.0 * 1.08).abs() < 1e-3);
        assert!(b.texture_png.is_some());

        let flat = ConversionConfig::builder().embed_backdrop_texture(false).build().unwrap();
        assert!(create_backdrop(&page(), &flat).unwrap().texture_png.is_none());
    }
}
