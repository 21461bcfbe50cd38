//! Extruded text geometry and its placement in world space.
//!
//! [`build_line_geometry`] produces a mesh centered on its own local origin.
//! Centering happens before placement so [`place_mesh`] can position a line
//! by its OCR box center alone, regardless of glyph ascenders, descenders or
//! side bearings.
//!
//! The construction parameters are kept on the geometry (the exporter writes
//! them to mesh extras for the viewer), but the source text is erased before
//! the geometry leaves this module. The privacy scan would catch a banned
//! word anyway; erasing the text means ordinary document content never lands
//! in the asset in the first place.

use super::font::GlyphSource;
use super::ocr::LineBounds;
use super::tessellate::{group_contours, triangulate, Shape};
use crate::math::{Aabb, Transform};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Construction parameters persisted alongside a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGeometryParams {
    /// Always `""` once [`build_line_geometry`] returns.
    pub text: String,
    pub size: f32,
    pub depth: f32,
    pub curve_segments: u32,
    pub bevel_enabled: bool,
}

/// Options for [`build_line_geometry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextGeometryOptions {
    pub font_size: f32,
    pub extrude_depth: f32,
    pub curve_segments: u32,
}

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Only planes carry texture coordinates.
    pub uvs: Option<Vec<[f32; 2]>>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
    pub params: Option<TextGeometryParams>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn compute_bounds(&mut self) {
        self.bounds = Aabb::from_points(self.positions.iter().copied().map(Vec3::from_array));
    }

    /// Move every vertex so the bounding box center lands on the origin.
    pub fn center(&mut self) {
        if self.bounds.is_empty() {
            return;
        }
        let c = self.bounds.center();
        for p in &mut self.positions {
            *p = (Vec3::from_array(*p) - c).to_array();
        }
        self.bounds = Aabb {
            min: self.bounds.min - c,
            max: self.bounds.max - c,
        };
    }

    /// Area-weighted vertex normals from the triangle faces.
    pub fn compute_normals(&mut self) {
        let mut acc = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let pa = Vec3::from_array(self.positions[a]);
            let pb = Vec3::from_array(self.positions[b]);
            let pc = Vec3::from_array(self.positions[c]);
            let n = (pb - pa).cross(pc - pa);
            acc[a] += n;
            acc[b] += n;
            acc[c] += n;
        }
        // unreferenced vertices (dropped bridge duplicates) still need a unit normal
        self.normals = acc
            .into_iter()
            .map(|n| {
                n.try_normalize().unwrap_or(Vec3::Z).to_array()
            })
            .collect();
    }

    /// Unit plane in the XY plane facing +Z, `width × height`, centered.
    pub fn plane(width: f32, height: f32) -> Geometry {
        let (hw, hh) = (width / 2.0, height / 2.0);
        let mut g = Geometry {
            positions: vec![[-hw, -hh, 0.0], [hw, -hh, 0.0], [hw, hh, 0.0], [-hw, hh, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            // image rows run top-down
            uvs: Some(vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]]),
            indices: vec![0, 1, 2, 0, 2, 3],
            bounds: Aabb::EMPTY,
            params: None,
        };
        g.compute_bounds();
        g
    }

    fn push_vertex(&mut self, p: [f32; 3]) -> u32 {
        self.positions.push(p);
        (self.positions.len() - 1) as u32
    }

    fn extrude_shape(&mut self, shape: &Shape, depth: f32) {
        let cap = triangulate(shape);

        // front cap, z = depth, counter-clockwise seen from +Z
        let base = self.positions.len() as u32;
        for [x, y] in &cap.vertices {
            self.push_vertex([*x, *y, depth]);
        }
        for [a, b, c] in &cap.triangles {
            self.indices.extend([base + a, base + b, base + c]);
        }

        // back cap, z = 0, reversed winding
        let base = self.positions.len() as u32;
        for [x, y] in &cap.vertices {
            self.push_vertex([*x, *y, 0.0]);
        }
        for [a, b, c] in &cap.triangles {
            self.indices.extend([base + a, base + c, base + b]);
        }

        // side walls, four vertices per edge for hard edges
        for ring in std::iter::once(&shape.outer).chain(shape.holes.iter()) {
            let n = ring.len();
            for i in 0..n {
                let [ax, ay] = ring[i];
                let [bx, by] = ring[(i + 1) % n];
                let a0 = self.push_vertex([ax, ay, 0.0]);
                let b0 = self.push_vertex([bx, by, 0.0]);
                let b1 = self.push_vertex([bx, by, depth]);
                let a1 = self.push_vertex([ax, ay, depth]);
                self.indices.extend([a0, b0, b1, a0, b1, a1]);
            }
        }
    }
}

/// Build extruded, origin-centered geometry for one line of text.
///
/// Bevels are never generated. The returned geometry's
/// [`TextGeometryParams::text`] is empty.
pub fn build_line_geometry(
    text: &str,
    font: &dyn GlyphSource,
    opts: &TextGeometryOptions,
) -> Geometry {
    let mut geometry = Geometry {
        params: Some(TextGeometryParams {
            text: text.to_string(),
            size: opts.font_size,
            depth: opts.extrude_depth,
            curve_segments: opts.curve_segments,
            bevel_enabled: false,
        }),
        ..Geometry::default()
    };

    let contours = font.layout(text, opts.font_size, opts.curve_segments);
    for shape in group_contours(&contours) {
        geometry.extrude_shape(&shape, opts.extrude_depth);
    }

    geometry.compute_bounds();
    geometry.center();
    geometry.compute_normals();
    erase_text(&mut geometry);

    debug!(
        "Line geometry: {} glyph contours → {} triangles ({} font)",
        contours.len(),
        geometry.triangle_count(),
        font.name()
    );
    geometry
}

fn erase_text(geometry: &mut Geometry) {
    if let Some(params) = geometry.params.as_mut() {
        params.text.clear();
    }
}

/// Where a line sits on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub image_width: u32,
    pub image_height: u32,
    /// World units per pixel.
    pub scale: f32,
    pub z_offset: f32,
}

/// Move `transform` to the world position of the box center.
///
/// Image rows run top-down while world Y runs up, so Y is flipped.
pub fn place_mesh(transform: &mut Transform, bbox: &LineBounds, placement: &Placement) {
    let (cx, cy) = bbox.center();
    transform.translation = Vec3::new(
        (cx - placement.image_width as f32 / 2.0) * placement.scale,
        (placement.image_height as f32 / 2.0 - cy) * placement.scale,
        placement.z_offset,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::font::BoxFont;

    fn opts() -> TextGeometryOptions {
        TextGeometryOptions {
            font_size: 28.0,
            extrude_depth: 2.4,
            curve_segments: 6,
        }
    }

    #[test]
    fn text_param_is_erased() {
        let g = build_line_geometry("Secret", &BoxFont::default(), &opts());
        let params = g.params.as_ref().unwrap();
        assert_eq!(params.text, "");
        assert_ne!(params.text, "Secret");
        assert_eq!(params.size, 28.0);
        assert!(!params.bevel_enabled);
    }

    #[test]
    fn geometry_is_centered_on_origin() {
        let g = build_line_geometry("Hello world", &BoxFont::default(), &opts());
        assert!(!g.is_empty());
        let c = g.bounds.center();
        assert!(c.length() < 1e-4, "center {c:?}");
        assert!((g.bounds.size().z - 2.4).abs() < 1e-4);
        let recomputed = Aabb::from_points(g.positions.iter().copied().map(Vec3::from_array));
        assert_eq!(recomputed, g.bounds);
    }

    #[test]
    fn normals_are_unit_length() {
        let g = build_line_geometry("ab", &BoxFont::default(), &opts());
        assert_eq!(g.normals.len(), g.positions.len());
        for n in &g.normals {
            assert!((Vec3::from_array(*n).length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn front_cap_faces_forward() {
        let g = build_line_geometry("a", &BoxFont::default(), &opts());
        let front = g
            .positions
            .iter()
            .zip(&g.normals)
            .filter(|(p, _)| (p[2] - 1.2).abs() < 1e-4)
            .filter(|(_, n)| n[2].abs() > 0.99)
            .count();
        assert!(front > 0);
        assert!(g
            .positions
            .iter()
            .zip(&g.normals)
            .filter(|(p, n)| (p[2] - 1.2).abs() < 1e-4 && n[2].abs() > 0.99)
            .all(|(_, n)| n[2] > 0.0));
    }

    #[test]
    fn whitespace_only_text_is_empty_geometry() {
        let g = build_line_geometry("   ", &BoxFont::default(), &opts());
        assert!(g.is_empty());
        assert!(g.bounds.is_empty());
    }

    #[test]
    fn placement_flips_y() {
        let mut t = Transform::default();
        let bbox = LineBounds { left: 120.0, top: 140.0, right: 900.0, bottom: 210.0 };
        let placement = Placement {
            image_width: 1024,
            image_height: 1536,
            scale: 22.0 / 1024.0,
            z_offset: 0.4,
        };
        place_mesh(&mut t, &bbox, &placement);
        let s = 22.0 / 1024.0;
        assert!((t.translation.x - (510.0 - 512.0) * s).abs() < 1e-5);
        assert!((t.translation.y - (768.0 - 175.0) * s).abs() < 1e-5);
        assert_eq!(t.translation.z, 0.4);

        // a box lower on the page ends up lower in the world
        let mut below = Transform::default();
        let lower = LineBounds { left: 120.0, top: 260.0, right: 940.0, bottom: 320.0 };
        place_mesh(&mut below, &lower, &placement);
        assert!(below.translation.y < t.translation.y);
    }

    #[test]
    fn plane_has_uvs_and_faces_forward() {
        let p = Geometry::plane(4.0, 2.0);
        assert_eq!(p.uvs.as_ref().map(Vec::len), Some(4));
        assert_eq!(p.bounds.size(), Vec3::new(4.0, 2.0, 0.0));
        assert_eq!(p.triangle_count(), 2);
    }
}
