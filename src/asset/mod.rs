//! Minimal glTF 2.0 / GLB plumbing shared by the exporter and the viewer.
//!
//! [`document`] holds the serde model, [`glb`] the binary container.
//! [`ParsedAsset`] resolves buffers (GLB chunk or base64 data URI) and reads
//! accessors back into plain vectors for the viewer.

pub mod document;
pub mod glb;

use crate::error::Img2GlbError;
use crate::pipeline::encode::decode_data_uri;
use document::{Accessor, Document, COMPONENT_F32, COMPONENT_U16, COMPONENT_U32, COMPONENT_U8};
use tracing::debug;

/// Most elements an accessor without a bufferView may declare. Such
/// accessors are zero-filled, so nothing in the payload bounds them.
pub const MAX_UNBACKED_COUNT: usize = 1 << 20;

/// A parsed asset with every buffer resolved to bytes.
#[derive(Debug, Clone)]
pub struct ParsedAsset {
    pub document: Document,
    pub buffers: Vec<Vec<u8>>,
}

impl ParsedAsset {
    /// Parse GLB or glTF JSON bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, Img2GlbError> {
        let (json, bin) = if glb::is_glb(bytes) {
            let chunks = glb::read_glb(bytes)?;
            (chunks.json, chunks.bin)
        } else {
            (bytes, None)
        };

        let document: Document = serde_json::from_slice(json)
            .map_err(|e| Img2GlbError::AssetLoad(format!("invalid glTF JSON: {e}")))?;
        if !document.asset.version.starts_with('2') {
            return Err(Img2GlbError::AssetLoad(format!(
                "unsupported glTF version {}",
                document.asset.version
            )));
        }

        let mut buffers = Vec::with_capacity(document.buffers.len());
        for (i, buffer) in document.buffers.iter().enumerate() {
            let data = match (&buffer.uri, bin) {
                (Some(uri), _) => decode_data_uri(uri).ok_or_else(|| {
                    Img2GlbError::AssetLoad(format!("buffer {i}: only embedded data URIs are supported"))
                })?,
                (None, Some(bin)) if i == 0 => bin.to_vec(),
                (None, _) => {
                    return Err(Img2GlbError::AssetLoad(format!("buffer {i} has no data")));
                }
            };
            if data.len() < buffer.byte_length as usize {
                return Err(Img2GlbError::AssetLoad(format!(
                    "buffer {i} is {} bytes, expected {}",
                    data.len(),
                    buffer.byte_length
                )));
            }
            buffers.push(data);
        }

        debug!(
            "Parsed asset: {} nodes, {} meshes, {} buffers",
            document.nodes.len(),
            document.meshes.len(),
            buffers.len()
        );
        Ok(Self { document, buffers })
    }

    fn view_bytes(&self, view_idx: u32) -> Result<&[u8], Img2GlbError> {
        let view = self
            .document
            .buffer_views
            .get(view_idx as usize)
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("missing bufferView {view_idx}")))?;
        let buffer = self
            .buffers
            .get(view.buffer as usize)
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("missing buffer {}", view.buffer)))?;
        let start = view.byte_offset as usize;
        start
            .checked_add(view.byte_length as usize)
            .and_then(|end| buffer.get(start..end))
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("bufferView {view_idx} out of range")))
    }

    fn accessor(&self, idx: u32) -> Result<&Accessor, Img2GlbError> {
        self.document
            .accessors
            .get(idx as usize)
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("missing accessor {idx}")))
    }

    /// Read a float accessor as `count` arrays of `N` components.
    pub fn read_floats<const N: usize>(&self, idx: u32) -> Result<Vec<[f32; N]>, Img2GlbError> {
        let acc = self.accessor(idx)?;
        if acc.component_type != COMPONENT_F32 || acc.components() != N {
            return Err(Img2GlbError::AssetLoad(format!(
                "accessor {idx}: expected {N} float components"
            )));
        }
        let count = acc.count as usize;
        let Some(view) = acc.buffer_view else {
            if count > MAX_UNBACKED_COUNT {
                return Err(Img2GlbError::AssetLoad(format!(
                    "accessor {idx}: {count} elements without a bufferView"
                )));
            }
            return Ok(vec![[0.0; N]; count]);
        };
        let bytes = self.view_bytes(view)?;
        let stride = self.document.buffer_views[view as usize]
            .byte_stride
            .map(|s| s as usize)
            .unwrap_or(4 * N);
        // overlapping elements would let `count` outgrow the bytes behind it
        if stride < 4 * N {
            return Err(Img2GlbError::AssetLoad(format!(
                "accessor {idx}: stride {stride} is shorter than one element"
            )));
        }
        let needed = span_end(acc.byte_offset as usize, count, stride, 4 * N);
        if needed.is_none_or(|end| end > bytes.len()) {
            return Err(Img2GlbError::AssetLoad(format!(
                "accessor {idx}: {count} elements do not fit bufferView {view} ({} bytes)",
                bytes.len()
            )));
        }

        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let base = acc.byte_offset as usize + i * stride;
            let mut item = [0.0f32; N];
            for (c, slot) in item.iter_mut().enumerate() {
                let at = base + c * 4;
                let raw = bytes
                    .get(at..at + 4)
                    .ok_or_else(|| Img2GlbError::AssetLoad(format!("accessor {idx} out of range")))?;
                *slot = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            }
            out.push(item);
        }
        Ok(out)
    }

    /// Read an index accessor (u8, u16 or u32) widened to u32.
    pub fn read_indices(&self, idx: u32) -> Result<Vec<u32>, Img2GlbError> {
        let acc = self.accessor(idx)?;
        let size = match acc.component_type {
            COMPONENT_U8 => 1,
            COMPONENT_U16 => 2,
            COMPONENT_U32 => 4,
            other => {
                return Err(Img2GlbError::AssetLoad(format!(
                    "accessor {idx}: unsupported index type {other}"
                )))
            }
        };
        let view = acc
            .buffer_view
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("accessor {idx} has no data")))?;
        let bytes = self.view_bytes(view)?;
        let start = acc.byte_offset as usize;
        let raw = (acc.count as usize)
            .checked_mul(size)
            .and_then(|len| start.checked_add(len))
            .and_then(|end| bytes.get(start..end))
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("accessor {idx} out of range")))?;
        Ok(raw
            .chunks_exact(size)
            .map(|c| match size {
                1 => c[0] as u32,
                2 => u16::from_le_bytes([c[0], c[1]]) as u32,
                _ => u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            })
            .collect())
    }

    /// Encoded bytes of an image (from a bufferView or a data URI).
    pub fn image_bytes(&self, idx: u32) -> Result<Vec<u8>, Img2GlbError> {
        let image = self
            .document
            .images
            .get(idx as usize)
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("missing image {idx}")))?;
        match (image.buffer_view, &image.uri) {
            (Some(view), _) => Ok(self.view_bytes(view)?.to_vec()),
            (None, Some(uri)) => decode_data_uri(uri)
                .ok_or_else(|| Img2GlbError::AssetLoad(format!("image {idx}: unsupported uri"))),
            (None, None) => Err(Img2GlbError::AssetLoad(format!("image {idx} has no data"))),
        }
    }
}

/// One past the last byte touched by `count` elements of `elem` bytes laid
/// out `stride` apart from `offset`.
fn span_end(offset: usize, count: usize, stride: usize, elem: usize) -> Option<usize> {
    if count == 0 {
        return Some(offset);
    }
    (count - 1)
        .checked_mul(stride)?
        .checked_add(elem)?
        .checked_add(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::data_uri;
    use document::{AssetInfo, Buffer, BufferView};

    fn doc_with(buffer_uri: Option<String>, len: u32) -> Document {
        Document {
            asset: AssetInfo::default(),
            accessors: vec![
                Accessor {
                    buffer_view: Some(0),
                    component_type: COMPONENT_F32,
                    count: 1,
                    kind: "VEC3".into(),
                    ..Accessor::default()
                },
                Accessor {
                    buffer_view: Some(1),
                    component_type: COMPONENT_U16,
                    count: 3,
                    kind: "SCALAR".into(),
                    ..Accessor::default()
                },
            ],
            buffer_views: vec![
                BufferView { buffer: 0, byte_offset: 0, byte_length: 12, ..BufferView::default() },
                BufferView { buffer: 0, byte_offset: 12, byte_length: 6, ..BufferView::default() },
            ],
            buffers: vec![Buffer { byte_length: len, uri: buffer_uri }],
            ..Document::default()
        }
    }

    fn payload() -> Vec<u8> {
        let mut bin = Vec::new();
        for v in [1.0f32, -2.0, 3.5] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        bin
    }

    #[test]
    fn reads_accessors_from_glb() {
        let bin = payload();
        let json = serde_json::to_vec(&doc_with(None, bin.len() as u32)).unwrap();
        let asset = ParsedAsset::parse(&glb::write_glb(&json, &bin)).unwrap();
        assert_eq!(asset.read_floats::<3>(0).unwrap(), vec![[1.0, -2.0, 3.5]]);
        assert_eq!(asset.read_indices(1).unwrap(), vec![0, 1, 2]);
        assert!(asset.read_floats::<2>(0).is_err());
    }

    #[test]
    fn reads_accessors_from_data_uri() {
        let bin = payload();
        let doc = doc_with(Some(data_uri("application/octet-stream", &bin)), bin.len() as u32);
        let json = serde_json::to_vec(&doc).unwrap();
        let asset = ParsedAsset::parse(&json).unwrap();
        assert_eq!(asset.read_floats::<3>(0).unwrap(), vec![[1.0, -2.0, 3.5]]);
    }

    #[test]
    fn oversized_count_is_rejected_before_allocating() {
        let bin = payload();
        let mut doc = doc_with(None, bin.len() as u32);
        doc.accessors[0].count = 4_000_000_000;
        let json = serde_json::to_vec(&doc).unwrap();
        let asset = ParsedAsset::parse(&glb::write_glb(&json, &bin)).unwrap();
        assert!(matches!(asset.read_floats::<3>(0), Err(Img2GlbError::AssetLoad(_))));

        doc.accessors[1].count = u32::MAX;
        let json = serde_json::to_vec(&doc).unwrap();
        let asset = ParsedAsset::parse(&glb::write_glb(&json, &bin)).unwrap();
        assert!(matches!(asset.read_indices(1), Err(Img2GlbError::AssetLoad(_))));
    }

    #[test]
    fn zero_stride_and_unbacked_counts_are_bounded() {
        let bin = payload();
        let mut doc = doc_with(None, bin.len() as u32);
        doc.buffer_views[0].byte_stride = Some(0);
        doc.accessors[0].count = 1_000_000;
        let json = serde_json::to_vec(&doc).unwrap();
        let asset = ParsedAsset::parse(&glb::write_glb(&json, &bin)).unwrap();
        assert!(matches!(asset.read_floats::<3>(0), Err(Img2GlbError::AssetLoad(_))));

        let mut doc = doc_with(None, bin.len() as u32);
        doc.accessors[0].buffer_view = None;
        doc.accessors[0].count = 4;
        let json = serde_json::to_vec(&doc).unwrap();
        let asset = ParsedAsset::parse(&glb::write_glb(&json, &bin)).unwrap();
        assert_eq!(asset.read_floats::<3>(0).unwrap(), vec![[0.0; 3]; 4]);

        let mut doc = doc_with(None, bin.len() as u32);
        doc.accessors[0].buffer_view = None;
        doc.accessors[0].count = u32::MAX;
        let json = serde_json::to_vec(&doc).unwrap();
        let asset = ParsedAsset::parse(&glb::write_glb(&json, &bin)).unwrap();
        assert!(matches!(asset.read_floats::<3>(0), Err(Img2GlbError::AssetLoad(_))));
    }

    #[test]
    fn rejects_missing_buffers_and_garbage() {
        let json = serde_json::to_vec(&doc_with(None, 18)).unwrap();
        assert!(matches!(ParsedAsset::parse(&json), Err(Img2GlbError::AssetLoad(_))));
        assert!(ParsedAsset::parse(b"\x00\x01garbage").is_err());
    }
}
