//! Render surfaces.
//!
//! [`RenderSurface`] is the seam between the renderer state machine and
//! whatever shows pixels. [`SoftwareSurface`] is a z-buffered CPU rasterizer
//! into an [`RgbaImage`]; it backs the CLI preview and the tests.

use super::camera::CameraFrame;
use crate::math::Transform;
use crate::pipeline::color::Rgb;
use crate::pipeline::geometry::Geometry;
use glam::Vec3;
use image::{Rgba, RgbaImage};

/// How one draw call is shaded.
#[derive(Debug, Clone, Copy)]
pub enum Shading<'a> {
    /// View-space normal lookup into `matcap`, multiplied by `color`.
    Matcap { color: Rgb, matcap: &'a RgbaImage },
    /// Texture sampled at the mesh UVs.
    Texture(&'a RgbaImage),
    Flat(Rgb),
}

/// One mesh to draw this frame.
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    pub geometry: &'a Geometry,
    pub transform: &'a Transform,
    pub shading: Shading<'a>,
}

/// Something the renderer can draw into.
pub trait RenderSurface: Send {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Clear color and depth.
    fn begin_frame(&mut self, clear: Rgb);

    /// Draw one mesh. Returns the number of triangles that reached the
    /// rasterizer.
    fn draw(&mut self, camera: &CameraFrame, call: &DrawCall<'_>) -> usize;

    fn end_frame(&mut self) {}

    /// Copy of the last finished frame, if the surface keeps one.
    fn snapshot(&self) -> Option<RgbaImage> {
        None
    }
}

/// CPU rasterizer with a float depth buffer.
#[derive(Debug, Clone)]
pub struct SoftwareSurface {
    color: RgbaImage,
    depth: Vec<f32>,
}

impl SoftwareSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1), height.max(1));
        Self {
            color: RgbaImage::new(w, h),
            depth: vec![f32::INFINITY; (w * h) as usize],
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.color
    }

    pub fn into_image(self) -> RgbaImage {
        self.color
    }
}

/// A vertex after projection.
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    /// View depth, positive in front of the camera.
    depth: f32,
    normal: Vec3,
    uv: [f32; 2],
}

impl RenderSurface for SoftwareSurface {
    fn size(&self) -> (u32, u32) {
        self.color.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        if (width.max(1), height.max(1)) != self.size() {
            *self = SoftwareSurface::new(width, height);
        }
    }

    fn begin_frame(&mut self, clear: Rgb) {
        let px = Rgba([clear.r(), clear.g(), clear.b(), 255]);
        for p in self.color.pixels_mut() {
            *p = px;
        }
        self.depth.fill(f32::INFINITY);
    }

    fn draw(&mut self, camera: &CameraFrame, call: &DrawCall<'_>) -> usize {
        let (w, h) = self.size();
        let (wf, hf) = (w as f32, h as f32);
        let g = call.geometry;
        let t = call.transform;
        let model = t.to_mat4();
        let normal_matrix = t.normal_matrix();

        let projected: Vec<Option<ScreenVertex>> = g
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let world = model.transform_point3(Vec3::from_array(*p));
                let (nx, ny, depth) = camera.project(camera.to_view(world))?;
                if depth > camera.far {
                    return None;
                }
                let n = g.normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]);
                let normal = camera
                    .dir_to_view(normal_matrix.transform_vector3(Vec3::from_array(n)))
                    .normalize_or_zero();
                let uv = g.uvs.as_ref().and_then(|u| u.get(i)).copied().unwrap_or([0.0, 0.0]);
                Some(ScreenVertex {
                    x: (nx * 0.5 + 0.5) * wf,
                    y: (0.5 - ny * 0.5) * hf,
                    depth,
                    normal,
                    uv,
                })
            })
            .collect();

        let mut drawn = 0;
        for tri in g.indices.chunks_exact(3) {
            let verts = [
                projected.get(tri[0] as usize).copied().flatten(),
                projected.get(tri[1] as usize).copied().flatten(),
                projected.get(tri[2] as usize).copied().flatten(),
            ];
            // triangles crossing the near plane are dropped, not clipped
            if let [Some(a), Some(b), Some(c)] = verts {
                if self.raster_triangle(a, b, c, &call.shading) {
                    drawn += 1;
                }
            }
        }
        drawn
    }

    fn snapshot(&self) -> Option<RgbaImage> {
        Some(self.color.clone())
    }
}

impl SoftwareSurface {
    fn raster_triangle(&mut self, a: ScreenVertex, b: ScreenVertex, c: ScreenVertex, shading: &Shading<'_>) -> bool {
        let area = edge(a.x, a.y, b.x, b.y, c.x, c.y);
        if area.abs() < 1e-8 {
            return false;
        }
        let (w, h) = self.size();
        let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
        let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i64).clamp(0, w as i64) as u32;
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i64).clamp(0, h as i64) as u32;

        // perspective-correct weights use 1/depth
        let (ia, ib, ic) = (1.0 / a.depth, 1.0 / b.depth, 1.0 / c.depth);

        for py in min_y..max_y {
            for px in min_x..max_x {
                let (sx, sy) = (px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(b.x, b.y, c.x, c.y, sx, sy) / area;
                let w1 = edge(c.x, c.y, a.x, a.y, sx, sy) / area;
                let w2 = edge(a.x, a.y, b.x, b.y, sx, sy) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let inv = w0 * ia + w1 * ib + w2 * ic;
                let depth = 1.0 / inv;
                let slot = (py * w + px) as usize;
                if depth >= self.depth[slot] {
                    continue;
                }
                self.depth[slot] = depth;

                let (p0, p1, p2) = (w0 * ia * depth, w1 * ib * depth, w2 * ic * depth);
                let rgb = match *shading {
                    Shading::Flat(c) => c.to_unit(),
                    Shading::Texture(tex) => {
                        let u = a.uv[0] * p0 + b.uv[0] * p1 + c.uv[0] * p2;
                        let v = a.uv[1] * p0 + b.uv[1] * p1 + c.uv[1] * p2;
                        sample_texture(tex, u, v)
                    }
                    Shading::Matcap { color, matcap } => {
                        let n = (a.normal * p0 + b.normal * p1 + c.normal * p2).normalize_or_zero();
                        let m = super::material::sample_matcap(matcap, n.x, n.y);
                        let k = color.to_unit();
                        [m[0] * k[0], m[1] * k[1], m[2] * k[2]]
                    }
                };
                let to8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                self.color
                    .put_pixel(px, py, Rgba([to8(rgb[0]), to8(rgb[1]), to8(rgb[2]), 255]));
            }
        }
        true
    }
}

fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

/// Nearest-neighbour sample; UV origin at the top-left like the image rows.
fn sample_texture(tex: &RgbaImage, u: f32, v: f32) -> [f32; 3] {
    let (w, h) = tex.dimensions();
    let x = ((u.clamp(0.0, 1.0) * w as f32) as u32).min(w.saturating_sub(1));
    let y = ((v.clamp(0.0, 1.0) * h as f32) as u32).min(h.saturating_sub(1));
    let p = tex.get_pixel(x, y);
    [p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0]
}
