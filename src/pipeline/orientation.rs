//! Orientation correction: EXIF orientation tag → upright RGBA buffer.
//!
//! Phone cameras store pixels in sensor order and record the intended
//! rotation in EXIF tag 0x0112. OCR engines and the color sampler both
//! assume an upright page, so every run starts by baking that rotation into
//! a fresh pixel buffer. After this stage nobody looks at EXIF again.

use crate::error::Img2GlbError;
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// EXIF orientation codes 1–8.
///
/// Variant names describe the transform needed to make the image upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    /// 1: already upright.
    #[default]
    Identity,
    /// 2: mirrored horizontally.
    FlipHorizontal,
    /// 3: upside down.
    Rotate180,
    /// 4: mirrored vertically.
    FlipVertical,
    /// 5: mirrored along the main diagonal.
    Transpose,
    /// 6: needs a 90° clockwise turn.
    Rotate90,
    /// 7: mirrored along the anti-diagonal.
    Transverse,
    /// 8: needs a 90° counter-clockwise turn.
    Rotate270,
}

impl Orientation {
    /// Map an EXIF code; anything outside 1–8 is treated as upright.
    pub fn from_exif(code: u32) -> Self {
        match code {
            2 => Orientation::FlipHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::FlipVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Identity,
        }
    }

    pub fn exif_code(self) -> u32 {
        match self {
            Orientation::Identity => 1,
            Orientation::FlipHorizontal => 2,
            Orientation::Rotate180 => 3,
            Orientation::FlipVertical => 4,
            Orientation::Transpose => 5,
            Orientation::Rotate90 => 6,
            Orientation::Transverse => 7,
            Orientation::Rotate270 => 8,
        }
    }

    /// Codes 5–8 swap width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90
                | Orientation::Transverse
                | Orientation::Rotate270
        )
    }

    /// Apply the upright transform.
    pub fn apply(self, img: DynamicImage) -> DynamicImage {
        match self {
            Orientation::Identity => img,
            Orientation::FlipHorizontal => img.fliph(),
            Orientation::Rotate180 => img.rotate180(),
            Orientation::FlipVertical => img.flipv(),
            Orientation::Transpose => img.rotate90().fliph(),
            Orientation::Rotate90 => img.rotate90(),
            Orientation::Transverse => img.rotate270().fliph(),
            Orientation::Rotate270 => img.rotate270(),
        }
    }
}

/// An upright RGBA pixel buffer and its dimensions.
#[derive(Debug, Clone)]
pub struct OrientedImage {
    pub pixels: RgbaImage,
    pub width: u32,
    pub height: u32,
}

/// Read EXIF orientation from raw image bytes.
///
/// Returns [`Orientation::Identity`] if there is no EXIF block or no tag.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(e) => {
            debug!("No EXIF orientation: {}", e);
            return Orientation::Identity;
        }
    };

    let code = reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1);
    Orientation::from_exif(code)
}

/// Decode `bytes` and bake `orientation` into a fresh upright buffer.
///
/// Pass `None` to read the orientation from the image's own EXIF block.
pub fn correct_orientation(
    bytes: &[u8],
    orientation: Option<Orientation>,
) -> Result<OrientedImage, Img2GlbError> {
    let orientation = orientation.unwrap_or_else(|| read_orientation(bytes));
    let decoded = image::load_from_memory(bytes).map_err(|e| Img2GlbError::ImageDecode {
        detail: e.to_string(),
    })?;
    correct_decoded(decoded, orientation)
}

/// Same as [`correct_orientation`] for an already decoded image.
pub fn correct_decoded(
    img: DynamicImage,
    orientation: Orientation,
) -> Result<OrientedImage, Img2GlbError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(Img2GlbError::Initialization(format!(
            "cannot allocate a {}x{} drawing surface",
            img.width(),
            img.height()
        )));
    }

    let upright = orientation.apply(img);
    let pixels = upright.to_rgba8();
    let (width, height) = pixels.dimensions();
    debug!(
        "Orientation {} → upright {}x{} px",
        orientation.exif_code(),
        width,
        height
    );

    Ok(OrientedImage {
        pixels,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    /// 3×2 image with a red pixel in the top-left corner.
    fn marked() -> DynamicImage {
        let mut img = RgbaImage::from_pixel(3, 2, WHITE);
        img.put_pixel(0, 0, RED);
        DynamicImage::ImageRgba8(img)
    }

    fn red_at(o: &OrientedImage) -> (u32, u32) {
        let (x, y, _) = o
            .pixels
            .enumerate_pixels()
            .find(|(_, _, p)| **p == RED)
            .expect("marker pixel survives");
        (x, y)
    }

    #[test]
    fn exif_codes_round_trip() {
        for code in 1..=8 {
            assert_eq!(Orientation::from_exif(code).exif_code(), code);
        }
        assert_eq!(Orientation::from_exif(0), Orientation::Identity);
        assert_eq!(Orientation::from_exif(42), Orientation::Identity);
    }

    #[test]
    fn codes_five_to_eight_swap_dimensions() {
        for code in 1..=8 {
            let o = correct_decoded(marked(), Orientation::from_exif(code)).unwrap();
            if code >= 5 {
                assert_eq!((o.width, o.height), (2, 3), "code {code}");
            } else {
                assert_eq!((o.width, o.height), (3, 2), "code {code}");
            }
            assert_eq!(o.pixels.dimensions(), (o.width, o.height));
        }
    }

    #[test]
    fn marker_lands_where_each_transform_puts_it() {
        let expected = [
            (1, (0, 0)),
            (2, (2, 0)),
            (3, (2, 1)),
            (4, (0, 1)),
            (5, (0, 0)),
            (6, (1, 0)),
            (7, (1, 2)),
            (8, (0, 2)),
        ];
        for (code, pos) in expected {
            let o = correct_decoded(marked(), Orientation::from_exif(code)).unwrap();
            assert_eq!(red_at(&o), pos, "code {code}");
        }
    }

    #[test]
    fn empty_image_is_an_initialization_error() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        let err = correct_decoded(img, Orientation::Identity).unwrap_err();
        assert!(matches!(err, Img2GlbError::Initialization(_)));
    }

    #[test]
    fn png_without_exif_reads_identity() {
        let mut buf = Vec::new();
        marked()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(read_orientation(&buf), Orientation::Identity);
        let o = correct_orientation(&buf, None).unwrap();
        assert_eq!((o.width, o.height), (3, 2));
    }

    /// 12×8 JPEG with an APP1 Exif block holding a single orientation tag.
    fn jpeg_with_orientation(code: u16, big_endian: bool) -> Vec<u8> {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(12, 8, image::Rgb([200, 200, 200])))
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .unwrap();

        let (u16b, u32b): (fn(u16) -> [u8; 2], fn(u32) -> [u8; 4]) = if big_endian {
            (u16::to_be_bytes, u32::to_be_bytes)
        } else {
            (u16::to_le_bytes, u32::to_le_bytes)
        };
        let mut tiff = Vec::new();
        tiff.extend_from_slice(if big_endian { b"MM" } else { b"II" });
        tiff.extend_from_slice(&u16b(42));
        tiff.extend_from_slice(&u32b(8)); // IFD0 right after the header
        tiff.extend_from_slice(&u16b(1)); // one entry
        tiff.extend_from_slice(&u16b(0x0112));
        tiff.extend_from_slice(&u16b(3)); // SHORT
        tiff.extend_from_slice(&u32b(1));
        tiff.extend_from_slice(&u16b(code));
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&u32b(0)); // no IFD1

        let mut app1 = vec![0xFF, 0xE1];
        app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        app1.extend_from_slice(b"Exif\0\0");
        app1.extend_from_slice(&tiff);

        // right after SOI
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn jpeg_exif_orientation_is_read_and_applied() {
        let rotated = jpeg_with_orientation(6, true);
        assert_eq!(read_orientation(&rotated), Orientation::Rotate90);
        let o = correct_orientation(&rotated, None).unwrap();
        assert_eq!((o.width, o.height), (8, 12));

        let ccw = jpeg_with_orientation(8, false);
        assert_eq!(read_orientation(&ccw), Orientation::Rotate270);
        assert_eq!(correct_orientation(&ccw, None).unwrap().pixels.dimensions(), (8, 12));

        // an explicit orientation overrides the tag
        let o = correct_orientation(&rotated, Some(Orientation::Identity)).unwrap();
        assert_eq!((o.width, o.height), (12, 8));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = correct_orientation(b"definitely not an image", None).unwrap_err();
        assert!(matches!(err, Img2GlbError::ImageDecode { .. }));
    }
}
