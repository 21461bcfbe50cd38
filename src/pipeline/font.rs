//! Glyph outline sources for the text geometry builder.
//!
//! A [`GlyphSource`] turns a string into closed 2D contours in pixel units
//! (y up, baseline at `y = 0`, pen starting at `x = 0`). Curves are already
//! flattened, so downstream code only ever deals with polygons.
//!
//! Two sources ship with the crate:
//! * [`TtfFont`] reads TrueType/OpenType outlines with `ttf-parser`.
//! * [`BoxFont`] draws every visible character as a hollow box. It needs no
//!   font file, which makes it the default for headless runs and tests.

use crate::error::Img2GlbError;
use std::path::Path;
use tracing::debug;
use ttf_parser::{Face, GlyphId, OutlineBuilder};

/// A closed polygon. The closing edge from last to first point is implicit.
pub type Contour = Vec<[f32; 2]>;

/// Flattened outline of one glyph plus its horizontal advance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlyphOutline {
    pub contours: Vec<Contour>,
    pub advance: f32,
}

pub trait GlyphSource: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Outline of `ch` at `size` pixels per em, curves split into
    /// `curve_segments` pieces.
    fn glyph(&self, ch: char, size: f32, curve_segments: u32) -> GlyphOutline;

    /// Lay out `text` on a single baseline and return every contour.
    fn layout(&self, text: &str, size: f32, curve_segments: u32) -> Vec<Contour> {
        let mut pen = 0.0f32;
        let mut out = Vec::new();
        for ch in text.chars() {
            let glyph = self.glyph(ch, size, curve_segments);
            for contour in glyph.contours {
                out.push(contour.into_iter().map(|[x, y]| [x + pen, y]).collect());
            }
            pen += glyph.advance;
        }
        out
    }
}

// ── BoxFont ──────────────────────────────────────────────────────────────

/// Built-in placeholder font: a hollow rectangle per visible character.
#[derive(Debug, Clone, Copy)]
pub struct BoxFont {
    /// Advance as a fraction of the font size.
    pub advance_ratio: f32,
    /// Box height as a fraction of the font size.
    pub cap_ratio: f32,
    /// Stroke width as a fraction of the font size.
    pub stroke_ratio: f32,
}

impl Default for BoxFont {
    fn default() -> Self {
        Self {
            advance_ratio: 0.6,
            cap_ratio: 0.7,
            stroke_ratio: 0.1,
        }
    }
}

impl GlyphSource for BoxFont {
    fn name(&self) -> &str {
        "box"
    }

    fn glyph(&self, ch: char, size: f32, _curve_segments: u32) -> GlyphOutline {
        let advance = self.advance_ratio * size;
        if ch.is_whitespace() || ch.is_control() {
            return GlyphOutline {
                contours: Vec::new(),
                advance,
            };
        }
        let margin = advance * 0.08;
        let (x0, x1) = (margin, advance - margin);
        let (y0, y1) = (0.0, self.cap_ratio * size);
        let s = self.stroke_ratio * size;

        // Outer counter-clockwise, hole clockwise.
        let outer = vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]];
        let hole = vec![[x0 + s, y0 + s], [x0 + s, y1 - s], [x1 - s, y1 - s], [x1 - s, y0 + s]];
        GlyphOutline {
            contours: vec![outer, hole],
            advance,
        }
    }
}

// ── TtfFont ──────────────────────────────────────────────────────────────

/// TrueType/OpenType font loaded from disk or memory.
pub struct TtfFont {
    name: String,
    data: Vec<u8>,
    face_index: u32,
    units_per_em: u16,
}

impl std::fmt::Debug for TtfFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtfFont")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl TtfFont {
    /// Parse the first face in `data` (collections are supported).
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self, Img2GlbError> {
        let name = name.into();
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        for index in 0..count {
            if let Ok(face) = Face::parse(&data, index) {
                let units_per_em = face.units_per_em().max(1);
                debug!("Loaded font {} (face {}, {} upem)", name, index, units_per_em);
                return Ok(Self {
                    name,
                    data,
                    face_index: index,
                    units_per_em,
                });
            }
        }
        Err(Img2GlbError::FontLoad {
            path: name.into(),
            detail: "no parsable font face".to_string(),
        })
    }

    pub async fn from_path(path: &Path) -> Result<Self, Img2GlbError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| Img2GlbError::FontLoad {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        Self::from_bytes(path.display().to_string(), data)
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, self.face_index).ok()
    }
}

impl GlyphSource for TtfFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn glyph(&self, ch: char, size: f32, curve_segments: u32) -> GlyphOutline {
        let Some(face) = self.face() else {
            return GlyphOutline::default();
        };
        let scale = size / self.units_per_em as f32;
        let id = face.glyph_index(ch).unwrap_or(GlyphId(0));
        let advance = face
            .glyph_hor_advance(id)
            .map(|a| a as f32 * scale)
            .unwrap_or(size * 0.5);

        let mut builder = FlatteningBuilder::new(scale, curve_segments.max(1));
        if face.outline_glyph(id, &mut builder).is_none() {
            return GlyphOutline {
                contours: Vec::new(),
                advance,
            };
        }
        GlyphOutline {
            contours: builder.finish(),
            advance,
        }
    }
}

/// Collects outline commands into flattened contours.
struct FlatteningBuilder {
    scale: f32,
    segments: u32,
    current: Contour,
    contours: Vec<Contour>,
}

impl FlatteningBuilder {
    fn new(scale: f32, segments: u32) -> Self {
        Self {
            scale,
            segments,
            current: Vec::new(),
            contours: Vec::new(),
        }
    }

    fn last(&self) -> [f32; 2] {
        self.current.last().copied().unwrap_or([0.0, 0.0])
    }

    fn push(&mut self, p: [f32; 2]) {
        if self.current.last() != Some(&p) {
            self.current.push(p);
        }
    }

    fn flush(&mut self) {
        let mut c = std::mem::take(&mut self.current);
        if c.len() > 1 && c.first() == c.last() {
            c.pop();
        }
        if c.len() >= 3 {
            self.contours.push(c);
        }
    }

    fn finish(mut self) -> Vec<Contour> {
        self.flush();
        self.contours
    }
}

impl OutlineBuilder for FlatteningBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.flush();
        self.current.push([x * self.scale, y * self.scale]);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.push([x * self.scale, y * self.scale]);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let p0 = self.last();
        let p1 = [x1 * self.scale, y1 * self.scale];
        let p2 = [x * self.scale, y * self.scale];
        for i in 1..=self.segments {
            let t = i as f32 / self.segments as f32;
            let u = 1.0 - t;
            self.push([
                u * u * p0[0] + 2.0 * u * t * p1[0] + t * t * p2[0],
                u * u * p0[1] + 2.0 * u * t * p1[1] + t * t * p2[1],
            ]);
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let p0 = self.last();
        let p1 = [x1 * self.scale, y1 * self.scale];
        let p2 = [x2 * self.scale, y2 * self.scale];
        let p3 = [x * self.scale, y * self.scale];
        for i in 1..=self.segments {
            let t = i as f32 / self.segments as f32;
            let u = 1.0 - t;
            let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
            self.push([
                a * p0[0] + b * p1[0] + c * p2[0] + d * p3[0],
                a * p0[1] + b * p1[1] + c * p2[1] + d * p3[1],
            ]);
        }
    }

    fn close(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_font_skips_whitespace_but_advances() {
        let font = BoxFont::default();
        let contours = font.layout("a b", 10.0, 6);
        // two visible glyphs, outer + hole each
        assert_eq!(contours.len(), 4);
        let third_glyph_x = contours[2][0][0];
        assert!((third_glyph_x - (12.0 + 0.48)).abs() < 1e-4);
    }

    #[test]
    fn box_font_glyph_fits_in_advance() {
        let g = BoxFont::default().glyph('W', 28.0, 6);
        for c in &g.contours {
            for [x, y] in c {
                assert!(*x > 0.0 && *x < g.advance);
                assert!(*y >= 0.0 && *y <= 28.0 * 0.7 + 1e-4);
            }
        }
    }

    #[test]
    fn quadratic_curves_are_flattened() {
        let mut b = FlatteningBuilder::new(1.0, 4);
        b.move_to(0.0, 0.0);
        b.quad_to(5.0, 10.0, 10.0, 0.0);
        b.close();
        let contours = b.finish();
        assert_eq!(contours.len(), 1);
        // start + 4 segments
        assert_eq!(contours[0].len(), 5);
        // midpoint of the quadratic is at y = 5
        assert!((contours[0][2][1] - 5.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_contours_are_dropped() {
        let mut b = FlatteningBuilder::new(1.0, 2);
        b.move_to(0.0, 0.0);
        b.line_to(1.0, 0.0);
        b.close();
        assert!(b.finish().is_empty());
    }

    #[test]
    fn garbage_font_bytes_fail() {
        let err = TtfFont::from_bytes("junk", vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Img2GlbError::FontLoad { .. }));
    }
}
