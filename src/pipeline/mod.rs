//! Pipeline stages for image-to-GLB conversion.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; [`crate::convert`] strings them together and reports stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ orientation ──▶ ocr ──▶ mesh ──────────────▶ export
//! (bytes)   (EXIF upright)  (lines) (color + geometry)   (GLB/glTF + scan)
//! ```
//!
//! 1. [`input`]       read a path or download a URL; reject non-images early
//! 2. [`orientation`] apply the EXIF orientation so boxes match the pixels
//! 3. [`ocr`]         the OCR contract, its engines, confidence normalisation
//! 4. [`mesh`]        per-line assembly using [`color`] sampling and
//!    [`geometry`] extrusion ([`font`] outlines, [`tessellate`] caps), plus
//!    the paper backdrop
//! 5. [`export`]      build the glTF scene, serialise, scan for banned terms
//!
//! [`encode`] holds PNG and data-URI helpers shared by export and the asset
//! reader.

pub mod color;
pub mod encode;
pub mod export;
pub mod font;
pub mod geometry;
pub mod input;
pub mod mesh;
pub mod ocr;
pub mod orientation;
pub mod tessellate;
