//! GLB container: 12-byte header, a JSON chunk and an optional BIN chunk.
//!
//! ```text
//! magic "glTF" | version 2 | total length      (u32 LE each)
//! chunk length | "JSON"    | JSON, space padded to 4 bytes
//! chunk length | "BIN\0"   | payload, zero padded to 4 bytes
//! ```

use crate::error::Img2GlbError;

pub const MAGIC: &[u8; 4] = b"glTF";
const VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// True if `bytes` start with the GLB magic.
pub fn is_glb(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && &bytes[..4] == MAGIC
}

fn padded_len(n: usize) -> usize {
    (n + 3) & !3
}

/// Assemble a GLB file.
pub fn write_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let json_len = padded_len(json.len());
    let bin_len = padded_len(bin.len());
    let mut total = 12 + 8 + json_len;
    if !bin.is_empty() {
        total += 8 + bin_len;
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_len as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(json);
    out.resize(out.len() + json_len - json.len(), b' ');

    if !bin.is_empty() {
        out.extend_from_slice(&(bin_len as u32).to_le_bytes());
        out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        out.extend_from_slice(bin);
        out.resize(out.len() + bin_len - bin.len(), 0);
    }
    out
}

/// The chunks of a GLB file, borrowed from the input.
#[derive(Debug)]
pub struct GlbChunks<'a> {
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, Img2GlbError> {
    bytes
        .get(at..at + 4)
        .and_then(|s| s.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| Img2GlbError::AssetLoad(format!("truncated GLB at byte {at}")))
}

/// Split a GLB file into its chunks.
pub fn read_glb(bytes: &[u8]) -> Result<GlbChunks<'_>, Img2GlbError> {
    if !is_glb(bytes) {
        return Err(Img2GlbError::AssetLoad("missing glTF magic".into()));
    }
    let version = read_u32(bytes, 4)?;
    if version != VERSION {
        return Err(Img2GlbError::AssetLoad(format!("unsupported GLB version {version}")));
    }
    let total = (read_u32(bytes, 8)? as usize).min(bytes.len());

    let mut json = None;
    let mut bin = None;
    let mut at = 12;
    while at + 8 <= total {
        let len = read_u32(bytes, at)? as usize;
        let kind = read_u32(bytes, at + 4)?;
        let body = bytes
            .get(at + 8..at + 8 + len)
            .ok_or_else(|| Img2GlbError::AssetLoad("GLB chunk exceeds file length".into()))?;
        match kind {
            CHUNK_JSON if json.is_none() => json = Some(body),
            CHUNK_BIN if bin.is_none() => bin = Some(body),
            _ => {}
        }
        at += 8 + len;
    }

    let json = json.ok_or_else(|| Img2GlbError::AssetLoad("GLB has no JSON chunk".into()))?;
    Ok(GlbChunks { json, bin })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_padded_and_readable() {
        let glb = write_glb(br#"{"a":1}"#, &[1, 2, 3, 4, 5]);
        assert_eq!(glb.len() % 4, 0);
        assert_eq!(read_u32(&glb, 8).unwrap() as usize, glb.len());
        let chunks = read_glb(&glb).unwrap();
        assert_eq!(chunks.json, br#"{"a":1} "#);
        assert_eq!(chunks.bin.unwrap(), &[1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn bin_chunk_is_optional() {
        let glb = write_glb(b"{}  ", &[]);
        let chunks = read_glb(&glb).unwrap();
        assert!(chunks.bin.is_none());
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(read_glb(b"nope").is_err());
        let mut glb = write_glb(b"{}", &[]);
        glb[4] = 1;
        assert!(read_glb(&glb).is_err());
        let glb = write_glb(b"{}", &[9; 16]);
        assert!(read_glb(&glb[..glb.len() - 4]).is_err());
    }
}
