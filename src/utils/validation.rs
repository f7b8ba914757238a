use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncReadExt;

/// Bytes read from the head of a file for magic byte detection
pub const SNIFF_LEN: u64 = 8192;

/// Why an upload was refused. The Display text is what the client sees.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("file not provided")]
    FileNotProvided,

    #[error("type undetermined")]
    TypeUndetermined,

    #[error("unsupported format")]
    UnsupportedFormat,

    #[error("file too small")]
    FileTooSmall,

    #[error("file too large")]
    FileTooLarge,

    #[error("invalid image structure")]
    InvalidImageStructure,
}

/// Content type derived from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffedType {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Detects the real file type from its leading bytes.
/// Filenames and client supplied headers play no part here.
pub fn sniff_content_type(header: &[u8]) -> Option<SniffedType> {
    infer::get(header).map(|kind| SniffedType {
        mime_type: kind.mime_type(),
        extension: kind.extension(),
    })
}

/// Reads up to `SNIFF_LEN` bytes from the start of the file
pub async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut header = Vec::with_capacity(SNIFF_LEN as usize);
    file.take(SNIFF_LEN).read_to_end(&mut header).await?;
    Ok(header)
}

/// Formats the `image` crate is built to decode; see Cargo.toml features
pub const DECODABLE_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

pub fn normalize_mime(mime: &str) -> String {
    let normalized = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match normalized.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => normalized,
    }
}

/// Checks a sniffed MIME type against the configured allow-list
pub fn is_allowed_mime(mime: &str, allowed: &[String]) -> bool {
    let mime = normalize_mime(mime);
    allowed.iter().any(|a| normalize_mime(a) == mime)
}

/// True when the structure probe can actually decode this type
pub fn is_decodable_mime(mime: &str) -> bool {
    let mime = normalize_mime(mime);
    DECODABLE_IMAGE_TYPES.contains(&mime.as_str())
}

/// Inclusive size bounds check
pub fn check_size_bounds(size: u64, min: u64, max: u64) -> Result<(), RejectReason> {
    if size < min {
        return Err(RejectReason::FileTooSmall);
    }
    if size > max {
        return Err(RejectReason::FileTooLarge);
    }
    Ok(())
}

/// Decodes just enough of the image to learn its dimensions.
/// Returns `Ok(None)` when the payload is not a well formed image.
pub async fn probe_image_dimensions(path: PathBuf) -> anyhow::Result<Option<(u32, u32)>> {
    let probe = tokio::task::spawn_blocking(move || {
        image::io::Reader::open(&path)?
            .with_guessed_format()?
            .into_dimensions()
    })
    .await?;

    match probe {
        Ok(dimensions) => Ok(Some(dimensions)),
        Err(e) => {
            tracing::debug!("Image structure probe failed: {}", e);
            Ok(None)
        }
    }
}
