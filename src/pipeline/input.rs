//! Input resolution: read a user-supplied path or URL into image bytes.
//!
//! The rest of the pipeline works on bytes (EXIF has to be read from the raw
//! container before decoding), so unlike a path-based resolver this stage
//! returns the bytes themselves. We check the container format up front so
//! callers get a meaningful error rather than a decoder message about
//! "unexpected end of file".

use crate::error::Img2GlbError;
use futures::StreamExt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Downloads larger than this are refused.
pub const MAX_DOWNLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Image bytes plus a human-readable name for logs and errors.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to image bytes.
///
/// If the input is a URL, download it. If it is a local file, validate that
/// it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Img2GlbError> {
    if input.trim().is_empty() {
        return Err(Img2GlbError::InvalidInput {
            input: input.to_string(),
        });
    }
    let resolved = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    ensure_image(&resolved.name, &resolved.bytes)?;
    Ok(resolved)
}

/// Validate PNG/JPEG magic bytes.
pub fn ensure_image(name: &str, bytes: &[u8]) -> Result<(), Img2GlbError> {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) | Ok(image::ImageFormat::Jpeg) => Ok(()),
        _ => {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            Err(Img2GlbError::NotAnImage {
                source_name: name.to_string(),
                magic,
            })
        }
    }
}

async fn read_local(path_str: &str) -> Result<ResolvedInput, Img2GlbError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Img2GlbError::PermissionDenied { path });
        }
        Err(_) => return Err(Img2GlbError::FileNotFound { path }),
    };

    debug!("Read local image: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput {
        name: path.display().to_string(),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Img2GlbError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Img2GlbError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Img2GlbError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2GlbError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Img2GlbError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length() {
        if len > MAX_DOWNLOAD_BYTES as u64 {
            return Err(too_large(url));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Img2GlbError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if bytes.len() + chunk.len() > MAX_DOWNLOAD_BYTES {
            return Err(too_large(url));
        }
        bytes.extend_from_slice(&chunk);
    }

    info!("Downloaded {} bytes", bytes.len());
    Ok(ResolvedInput {
        name: url.to_string(),
        bytes,
    })
}

fn too_large(url: &str) -> Img2GlbError {
    Img2GlbError::DownloadFailed {
        url: url.to_string(),
        reason: format!("image larger than {} MiB", MAX_DOWNLOAD_BYTES / (1024 * 1024)),
    }
}
