//! Viewer materials and the per-color matcap cache.

use crate::pipeline::color::Rgb;
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use tracing::debug;

/// Side of the generated matcap texture in pixels.
pub const MATCAP_SIZE: u32 = 64;

/// Index into [`MaterialCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub usize);

/// Matcap-shaded material: the matcap sample tinted by `color`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcapMaterial {
    pub name: String,
    pub color: Rgb,
}

/// Get-or-create cache of matcap materials keyed by `"r-g-b"`.
///
/// Each distinct line color gets exactly one material, no matter how many
/// segments use it. Slot 0 is the shared white material for meshes without
/// a line color.
#[derive(Debug, Default)]
pub struct MaterialCache {
    by_key: HashMap<String, MaterialId>,
    materials: Vec<MatcapMaterial>,
    default: Option<MaterialId>,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The material for `color`, created on first use.
    pub fn get_or_create(&mut self, color: Rgb) -> MaterialId {
        let key = color.key();
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }
        let id = MaterialId(self.materials.len());
        self.materials.push(MatcapMaterial {
            name: format!("Matcap_{}", id.0),
            color,
        });
        debug!("Created matcap material {} for {}", id.0, key);
        self.by_key.insert(key, id);
        id
    }

    /// Shared white matcap for meshes that carry no line color.
    pub fn default_material(&mut self) -> MaterialId {
        if let Some(id) = self.default {
            return id;
        }
        let id = MaterialId(self.materials.len());
        self.materials.push(MatcapMaterial {
            name: "Matcap_default".to_string(),
            color: Rgb::WHITE,
        });
        self.default = Some(id);
        id
    }

    pub fn get(&self, id: MaterialId) -> Option<&MatcapMaterial> {
        self.materials.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Drop every material. Returns how many were released.
    pub fn clear(&mut self) -> usize {
        let released = self.materials.len();
        self.by_key.clear();
        self.materials.clear();
        self.default = None;
        released
    }
}

/// Generate the matcap texture: a radial gradient lit from the upper left.
///
/// Stops run `#f6f6f6` at the highlight, `#b5bcc6` at 55 %, `#3a3f49` at the
/// rim.
pub fn generate_matcap(size: u32) -> RgbaImage {
    const STOPS: [(f32, [f32; 3]); 3] = [
        (0.0, [246.0, 246.0, 246.0]),
        (0.55, [181.0, 188.0, 198.0]),
        (1.0, [58.0, 63.0, 73.0]),
    ];
    let size = size.max(2);
    let s = size as f32;
    let (hx, hy) = (s * 0.35, s * 0.35);
    let (inner, outer) = (s * 0.1, s * 0.5);

    RgbaImage::from_fn(size, size, |x, y| {
        let d = ((x as f32 + 0.5 - hx).powi(2) + (y as f32 + 0.5 - hy).powi(2)).sqrt();
        let t = ((d - inner) / (outer - inner)).clamp(0.0, 1.0);
        let (mut lo, mut hi) = (STOPS[0], STOPS[2]);
        for pair in STOPS.windows(2) {
            if t >= pair[0].0 && t <= pair[1].0 {
                lo = pair[0];
                hi = pair[1];
                break;
            }
        }
        let k = if hi.0 > lo.0 { (t - lo.0) / (hi.0 - lo.0) } else { 0.0 };
        let c = |i: usize| (lo.1[i] + (hi.1[i] - lo.1[i]) * k).round() as u8;
        Rgba([c(0), c(1), c(2), 255])
    })
}

/// Sample the matcap with a view-space unit normal.
pub fn sample_matcap(matcap: &RgbaImage, nx: f32, ny: f32) -> [f32; 3] {
    let u = (nx * 0.5 + 0.5).clamp(0.0, 1.0);
    let v = (ny * 0.5 + 0.5).clamp(0.0, 1.0);
    let x = ((u * matcap.width() as f32) as u32).min(matcap.width() - 1);
    let y = (((1.0 - v) * matcap.height() as f32) as u32).min(matcap.height() - 1);
    let p = matcap.get_pixel(x, y);
    [p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0]
}
