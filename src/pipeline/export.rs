//! Scene serialization with a fail-closed privacy scan.
//!
//! ## Output layout
//!
//! ```text
//! scene (extras.backgroundColor?)
//!  ├─ PaperBackdrop   material PaperMaterial, extras.paperBackdrop = true
//!  ├─ Segment_0       material SharedLineMat, extras.lineColor = [r, g, b]
//!  ├─ Segment_1       …
//!  └─ …
//! ```
//!
//! Every line shares one material, so the draw-call count does not grow with
//! the colors on the page; the viewer recovers per-line colors from
//! `extras.lineColor`. The backdrop keeps its own textured material.
//!
//! ## Privacy scan
//!
//! After serialization the *complete* payload (both GLB and textual glTF) is
//! lower-cased and searched for every banned term. A hit discards the payload
//! and returns [`Img2GlbError::PrivacyViolation`]; a leaking asset is never
//! handed to the caller.

use super::color::Rgb;
use super::encode::data_uri;
use super::geometry::Geometry;
use super::mesh::{Backdrop, LineMesh};
use crate::asset::document::*;
use crate::asset::glb::write_glb;
use crate::config::OutputFormat;
use crate::error::Img2GlbError;
use crate::math::Transform;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Terms that must never appear in an exported payload.
pub const DEFAULT_BANNED_TERMS: [&str; 3] = ["resume", "curriculum", "vitae"];

pub const SHARED_LINE_MATERIAL: &str = "SharedLineMat";
pub const PAPER_MATERIAL: &str = "PaperMaterial";
pub const BACKDROP_NODE: &str = "PaperBackdrop";
pub const SEGMENT_PREFIX: &str = "Segment_";
pub const GENERATOR: &str = concat!("edgequake-img2glb ", env!("CARGO_PKG_VERSION"));

/// One item to export.
#[derive(Debug, Clone, Copy)]
pub enum ExportEntry<'a> {
    Line(&'a LineMesh),
    /// Keeps its own material. At most one per export.
    Backdrop(&'a Backdrop),
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub format: OutputFormat,
    /// Stored in scene extras for the viewer.
    pub background_color: Option<Rgb>,
    /// Banned in addition to [`DEFAULT_BANNED_TERMS`].
    pub extra_banned_terms: Vec<String>,
}

/// A serialized asset that passed the privacy scan.
#[derive(Debug, Clone)]
pub struct ExportedAsset {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub segment_count: usize,
    pub has_backdrop: bool,
}

impl ExportedAsset {
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Serialize `entries` and verify no banned term survived.
pub fn export_meshes(
    entries: &[ExportEntry<'_>],
    options: &ExportOptions,
) -> Result<ExportedAsset, Img2GlbError> {
    if entries.is_empty() {
        return Err(Img2GlbError::EmptyInput);
    }
    let backdrops = entries
        .iter()
        .filter(|e| matches!(e, ExportEntry::Backdrop(_)))
        .count();
    if backdrops > 1 {
        return Err(Img2GlbError::InvalidInput {
            input: format!("{backdrops} backdrop meshes; at most one is allowed"),
        });
    }

    let mut scene = SceneBuilder::default();
    for entry in entries {
        match entry {
            ExportEntry::Line(line) => scene.add_line(line),
            ExportEntry::Backdrop(backdrop) => scene.add_backdrop(backdrop),
        }
    }
    let segment_count = scene.segments;
    let bytes = scene.finish(options)?;

    let terms = banned_terms(&options.extra_banned_terms);
    ensure_no_banned_terms(&bytes, &terms)?;

    info!(
        "Exported {} segments{} → {} bytes ({})",
        segment_count,
        if backdrops == 1 { " + backdrop" } else { "" },
        bytes.len(),
        options.format.media_type()
    );
    Ok(ExportedAsset {
        bytes,
        format: options.format,
        segment_count,
        has_backdrop: backdrops == 1,
    })
}

/// Default terms plus `extra`, lower-cased and de-duplicated.
pub fn banned_terms(extra: &[String]) -> Vec<String> {
    let mut terms: Vec<String> = DEFAULT_BANNED_TERMS
        .iter()
        .map(|t| t.to_string())
        .chain(extra.iter().map(|t| t.trim().to_lowercase()))
        .filter(|t| !t.is_empty())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Every term from `terms` found in `payload`, case-insensitively.
///
/// Non-UTF-8 bytes (GLB binary chunk, PNG data) are replaced before the
/// search, so only readable text can match.
pub fn scan_for_banned_terms(payload: &[u8], terms: &[String]) -> Vec<String> {
    let haystack = String::from_utf8_lossy(payload).to_lowercase();
    terms
        .iter()
        .filter(|t| haystack.contains(&t.to_lowercase()))
        .cloned()
        .collect()
}

/// Fail with [`Img2GlbError::PrivacyViolation`] if any term is present.
pub fn ensure_no_banned_terms(payload: &[u8], terms: &[String]) -> Result<(), Img2GlbError> {
    let found = scan_for_banned_terms(payload, terms);
    if found.is_empty() {
        Ok(())
    } else {
        warn!("Privacy scan rejected payload ({} terms)", found.len());
        Err(Img2GlbError::PrivacyViolation { terms: found })
    }
}

// ── Scene assembly ───────────────────────────────────────────────────────

/// Accumulates the glTF document and the single binary buffer.
///
/// Image bytes are staged apart from `bin` until [`SceneBuilder::finish`]
/// knows the format: GLB stores them in the binary chunk, textual glTF gives
/// each image its own data URI and keeps them out of the buffer.
#[derive(Default)]
struct SceneBuilder {
    doc: Document,
    bin: Vec<u8>,
    /// Encoded bytes for `doc.images`, same order.
    image_data: Vec<Vec<u8>>,
    segments: usize,
    line_material: Option<u32>,
}

impl SceneBuilder {
    fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> u32 {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let offset = self.bin.len() as u32;
        self.bin.extend_from_slice(bytes);
        self.doc.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: offset,
            byte_length: bytes.len() as u32,
            byte_stride: None,
            target,
        });
        (self.doc.buffer_views.len() - 1) as u32
    }

    fn push_floats<const N: usize>(&mut self, data: &[[f32; N]], kind: &str, bounds: bool) -> u32 {
        let bytes: Vec<u8> = data
            .iter()
            .flat_map(|v| v.iter().flat_map(|f| f.to_le_bytes()))
            .collect();
        let view = self.push_view(&bytes, Some(TARGET_ARRAY_BUFFER));
        let (min, max) = if bounds {
            let mut min = [f32::INFINITY; N];
            let mut max = [f32::NEG_INFINITY; N];
            for v in data {
                for c in 0..N {
                    min[c] = min[c].min(v[c]);
                    max[c] = max[c].max(v[c]);
                }
            }
            (Some(min.to_vec()), Some(max.to_vec()))
        } else {
            (None, None)
        };
        self.doc.accessors.push(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type: COMPONENT_F32,
            count: data.len() as u32,
            kind: kind.to_string(),
            min,
            max,
        });
        (self.doc.accessors.len() - 1) as u32
    }

    fn push_indices(&mut self, indices: &[u32]) -> u32 {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(TARGET_ELEMENT_ARRAY_BUFFER));
        self.doc.accessors.push(Accessor {
            buffer_view: Some(view),
            byte_offset: 0,
            component_type: COMPONENT_U32,
            count: indices.len() as u32,
            kind: "SCALAR".to_string(),
            min: None,
            max: None,
        });
        (self.doc.accessors.len() - 1) as u32
    }

    /// Add a mesh for `geometry`, or `None` if it has no triangles.
    fn push_mesh(&mut self, geometry: &Geometry, material: u32) -> Option<u32> {
        if geometry.is_empty() {
            return None;
        }
        let mut attributes = BTreeMap::new();
        attributes.insert("POSITION".to_string(), self.push_floats(&geometry.positions, "VEC3", true));
        attributes.insert("NORMAL".to_string(), self.push_floats(&geometry.normals, "VEC3", false));
        if let Some(uvs) = &geometry.uvs {
            attributes.insert("TEXCOORD_0".to_string(), self.push_floats(uvs, "VEC2", false));
        }
        let indices = self.push_indices(&geometry.indices);
        let extras = geometry
            .params
            .as_ref()
            .and_then(|p| serde_json::to_value(p).ok())
            .map(|params| json!({ "textGeometry": params }));

        self.doc.meshes.push(Mesh {
            name: None,
            primitives: vec![Primitive {
                attributes,
                indices: Some(indices),
                material: Some(material),
            }],
            extras,
        });
        Some((self.doc.meshes.len() - 1) as u32)
    }

    fn push_node(&mut self, name: String, mesh: Option<u32>, transform: &Transform, extras: Value) {
        let node = Node {
            name: Some(name),
            mesh,
            children: Vec::new(),
            translation: Some(transform.translation.to_array()),
            scale: Some(transform.scale.to_array()),
            extras: Some(extras),
        };
        self.doc.nodes.push(node);
    }

    fn line_material(&mut self) -> u32 {
        if let Some(idx) = self.line_material {
            return idx;
        }
        self.doc.materials.push(Material {
            name: Some(SHARED_LINE_MATERIAL.to_string()),
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_factor: [1.0, 1.0, 1.0, 1.0],
                base_color_texture: None,
                metallic_factor: 0.2,
                roughness_factor: 0.7,
            }),
            double_sided: false,
        });
        let idx = (self.doc.materials.len() - 1) as u32;
        self.line_material = Some(idx);
        idx
    }

    fn add_line(&mut self, line: &LineMesh) {
        let material = self.line_material();
        let mesh = self.push_mesh(&line.geometry, material);
        let name = format!("{SEGMENT_PREFIX}{}", self.segments);
        let extras = json!({
            "lineColor": line.color.0,
            "lowConfidence": line.low_confidence,
            "confidence": line.confidence,
        });
        self.push_node(name, mesh, &line.transform, extras);
        self.segments += 1;
    }

    fn add_backdrop(&mut self, backdrop: &Backdrop) {
        let texture = backdrop.texture_png.as_ref().map(|png| {
            self.doc.images.push(Image {
                uri: None,
                mime_type: Some("image/png".to_string()),
                buffer_view: None,
            });
            self.image_data.push(png.clone());
            self.doc.samplers.push(Sampler {
                mag_filter: Some(9729),
                min_filter: Some(9987),
            });
            self.doc.textures.push(Texture {
                source: Some((self.doc.images.len() - 1) as u32),
                sampler: Some((self.doc.samplers.len() - 1) as u32),
            });
            TextureInfo {
                index: (self.doc.textures.len() - 1) as u32,
            }
        });
        let [r, g, b] = backdrop.color.to_unit();
        let base_color_factor = if texture.is_some() { [1.0; 4] } else { [r, g, b, 1.0] };
        self.doc.materials.push(Material {
            name: Some(PAPER_MATERIAL.to_string()),
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_factor,
                base_color_texture: texture,
                metallic_factor: 0.0,
                roughness_factor: 1.0,
            }),
            double_sided: true,
        });
        let material = (self.doc.materials.len() - 1) as u32;
        let mesh = self.push_mesh(&backdrop.geometry, material);
        let extras = json!({
            "paperBackdrop": true,
            "paperColor": backdrop.color.0,
        });
        self.push_node(BACKDROP_NODE.to_string(), mesh, &backdrop.transform, extras);
    }

    /// Move staged image bytes into the binary chunk or into data URIs.
    fn place_images(&mut self, format: OutputFormat) {
        let staged = std::mem::take(&mut self.image_data);
        for (idx, bytes) in staged.iter().enumerate() {
            match format {
                OutputFormat::Binary => {
                    let view = self.push_view(bytes, None);
                    self.doc.images[idx].buffer_view = Some(view);
                }
                OutputFormat::Text => {
                    let image = &mut self.doc.images[idx];
                    let mime = image.mime_type.take().unwrap_or_else(|| "image/png".to_string());
                    image.uri = Some(data_uri(&mime, bytes));
                }
            }
        }
    }

    fn finish(mut self, options: &ExportOptions) -> Result<Vec<u8>, Img2GlbError> {
        self.doc.asset = AssetInfo {
            version: "2.0".to_string(),
            generator: Some(GENERATOR.to_string()),
        };
        self.doc.scene = Some(0);
        self.doc.scenes.push(Scene {
            name: None,
            nodes: (0..self.doc.nodes.len() as u32).collect(),
            extras: options
                .background_color
                .map(|c| json!({ "backgroundColor": c.0 })),
        });
        self.place_images(options.format);
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }

        let to_json = |doc: &Document| {
            serde_json::to_vec(doc).map_err(|e| Img2GlbError::Internal(format!("glTF serialization: {e}")))
        };

        let bytes = match options.format {
            OutputFormat::Binary => {
                if !self.bin.is_empty() {
                    self.doc.buffers.push(Buffer {
                        byte_length: self.bin.len() as u32,
                        uri: None,
                    });
                }
                write_glb(&to_json(&self.doc)?, &self.bin)
            }
            OutputFormat::Text => {
                if !self.bin.is_empty() {
                    self.doc.buffers.push(Buffer {
                        byte_length: self.bin.len() as u32,
                        uri: Some(data_uri("application/octet-stream", &self.bin)),
                    });
                }
                to_json(&self.doc)?
            }
        };
        debug!(
            "Serialized {} nodes, {} meshes, {} bytes of buffer data",
            self.doc.nodes.len(),
            self.doc.meshes.len(),
            self.bin.len()
        );
        Ok(bytes)
    }
}
