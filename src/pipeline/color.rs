//! Color sampling and conversion helpers.
//!
//! Line colors are sampled from the corrected image so the extruded text
//! keeps the ink color of the original document (headings in brand blue stay
//! blue). Colors travel through the rest of the system either as an [`Rgb`]
//! triple or packed as `0xRRGGBB`.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// An 8-bit RGB color. Components are always in `0..=255` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    pub fn r(self) -> u8 {
        self.0[0]
    }

    pub fn g(self) -> u8 {
        self.0[1]
    }

    pub fn b(self) -> u8 {
        self.0[2]
    }

    /// Components as linear-ish `0.0..=1.0` floats.
    pub fn to_unit(self) -> [f32; 3] {
        [
            self.0[0] as f32 / 255.0,
            self.0[1] as f32 / 255.0,
            self.0[2] as f32 / 255.0,
        ]
    }

    /// Canonical cache key, `"r-g-b"`.
    pub fn key(self) -> String {
        format!("{}-{}-{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Pixel-space rectangle to sample. May be fractional or exceed the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Average color of `rect` in `image`.
///
/// The rectangle origin is floored and its width/height floored then clamped
/// to at least one pixel. Pixels outside the image are ignored; if nothing
/// remains the result is black.
pub fn average_color(image: &RgbaImage, rect: SampleRect) -> Rgb {
    let x0 = rect.x.floor().max(0.0) as i64;
    let y0 = rect.y.floor().max(0.0) as i64;
    let w = (rect.width.floor() as i64).max(1);
    let h = (rect.height.floor() as i64).max(1);
    let x1 = (rect.x.floor() as i64 + w).min(image.width() as i64);
    let y1 = (rect.y.floor() as i64 + h).min(image.height() as i64);

    if x0 >= x1 || y0 >= y1 {
        return Rgb::BLACK;
    }

    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);
    for y in y0..y1 {
        for x in x0..x1 {
            let p = image.get_pixel(x as u32, y as u32).0;
            r += p[0] as u64;
            g += p[1] as u64;
            b += p[2] as u64;
        }
    }
    let pixels = ((x1 - x0) * (y1 - y0)) as f64;
    Rgb([
        (r as f64 / pixels).round() as u8,
        (g as f64 / pixels).round() as u8,
        (b as f64 / pixels).round() as u8,
    ])
}

/// Pack as `0xRRGGBB`.
pub fn pack_color(c: Rgb) -> u32 {
    ((c.0[0] as u32) << 16) | ((c.0[1] as u32) << 8) | c.0[2] as u32
}

/// Inverse of [`pack_color`]. Bits above 24 are ignored.
pub fn unpack_color(packed: u32) -> Rgb {
    Rgb([
        ((packed >> 16) & 0xff) as u8,
        ((packed >> 8) & 0xff) as u8,
        (packed & 0xff) as u8,
    ])
}

/// Per-channel linear interpolation from `base` to `target`, `t` clamped to `[0, 1]`.
pub fn blend(base: Rgb, target: Rgb, t: f32) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let mix = |a: u8, b: u8| (a as f32 * (1.0 - t) + b as f32 * t).round() as u8;
    Rgb([
        mix(base.0[0], target.0[0]),
        mix(base.0[1], target.0[1]),
        mix(base.0[2], target.0[2]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32, c: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([c[0], c[1], c[2], 255]))
    }

    #[test]
    fn uniform_patch_averages_to_itself() {
        let img = solid(40, 30, [0x33, 0x66, 0x99]);
        for rect in [
            SampleRect { x: 0.0, y: 0.0, width: 40.0, height: 30.0 },
            SampleRect { x: 5.5, y: 7.2, width: 3.9, height: 1.0 },
            SampleRect { x: 39.0, y: 29.0, width: 1.0, height: 1.0 },
        ] {
            assert_eq!(average_color(&img, rect), Rgb([0x33, 0x66, 0x99]));
        }
    }

    #[test]
    fn averages_and_rounds_mixed_pixels() {
        let mut img = solid(2, 1, [0, 0, 0]);
        img.put_pixel(1, 0, Rgba([255, 10, 3, 255]));
        let c = average_color(&img, SampleRect { x: 0.0, y: 0.0, width: 2.0, height: 1.0 });
        // 127.5 → 128, 5 → 5, 1.5 → 2
        assert_eq!(c, Rgb([128, 5, 2]));
    }

    #[test]
    fn zero_sized_rect_samples_one_pixel() {
        let mut img = solid(4, 4, [0, 0, 0]);
        img.put_pixel(2, 1, Rgba([200, 100, 50, 255]));
        let c = average_color(&img, SampleRect { x: 2.0, y: 1.0, width: 0.0, height: 0.0 });
        assert_eq!(c, Rgb([200, 100, 50]));
    }

    #[test]
    fn rect_outside_image_is_black() {
        let img = solid(4, 4, [255, 255, 255]);
        let c = average_color(&img, SampleRect { x: 10.0, y: 10.0, width: 5.0, height: 5.0 });
        assert_eq!(c, Rgb::BLACK);
    }

    #[test]
    fn pack_unpack_are_inverses() {
        assert_eq!(pack_color(Rgb([0x33, 0x66, 0x99])), 0x336699);
        assert_eq!(unpack_color(0x336699), Rgb([0x33, 0x66, 0x99]));
        for packed in (0..=0xff_ffffu32).step_by(4093).chain([0, 0xff_ffff]) {
            assert_eq!(pack_color(unpack_color(packed)), packed);
        }
        for c in [Rgb::BLACK, Rgb::WHITE, Rgb([1, 2, 3]), Rgb([255, 0, 128])] {
            assert_eq!(unpack_color(pack_color(c)), c);
        }
    }

    #[test]
    fn blend_endpoints_and_midpoint() {
        let a = Rgb([0x33, 0x66, 0x99]);
        let b = Rgb::WHITE;
        assert_eq!(blend(a, b, 0.0), a);
        assert_eq!(blend(a, b, 1.0), b);
        assert_eq!(blend(a, b, 0.5), Rgb([0x99, 0xb3, 0xcc]));
    }

    #[test]
    fn blend_clamps_factor() {
        let a = Rgb([10, 20, 30]);
        let b = Rgb([200, 100, 0]);
        assert_eq!(blend(a, b, -3.0), a);
        assert_eq!(blend(a, b, 7.0), b);
    }

    #[test]
    fn key_is_dash_separated() {
        assert_eq!(Rgb([64, 96, 160]).key(), "64-96-160");
    }
}
