//! Decides whether a received upload is kept or thrown away.
//!
//! Checks run in a fixed order and stop at the first failure:
//! presence, content sniffing against the allow-list, size bounds, and
//! finally an image header decode. A rejected file never outlives the call.

use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::services::file_receiver::ReceivedFile;
use crate::utils::validation::{
    RejectReason, SniffedType, check_size_bounds, is_allowed_mime, probe_image_dimensions,
    read_header, sniff_content_type,
};
use tracing::{info, warn};
use uuid::Uuid;

/// One request's upload, possibly without a file
#[derive(Debug, Default)]
pub struct UploadAttempt {
    pub file: Option<ReceivedFile>,
}

impl UploadAttempt {
    pub fn missing() -> Self {
        Self { file: None }
    }
}

impl From<ReceivedFile> for UploadAttempt {
    fn from(file: ReceivedFile) -> Self {
        Self { file: Some(file) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Accepted {
        public_path: String,
        original_name: String,
    },
    Rejected(RejectReason),
}

struct Verified {
    sniffed: SniffedType,
    width: u32,
    height: u32,
}

pub struct UploadValidator {
    config: UploadConfig,
}

impl UploadValidator {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Runs the validation pipeline. `Err` means an unexpected I/O failure;
    /// every validation failure comes back as `Ok(Rejected(..))`.
    pub async fn validate(&self, attempt: UploadAttempt) -> Result<ValidationResult, AppError> {
        let Some(file) = attempt.file else {
            return Ok(ValidationResult::Rejected(RejectReason::FileNotProvided));
        };

        match self.inspect(&file).await {
            Ok(Ok(verified)) => self.accept(file, verified).await,
            Ok(Err(reason)) => {
                warn!(
                    "🚫 Upload '{}' rejected: {} (declared: {}, {} bytes)",
                    file.original_name(),
                    reason,
                    file.declared_mime().unwrap_or("none"),
                    file.size()
                );
                file.discard();
                Ok(ValidationResult::Rejected(reason))
            }
            Err(e) => {
                file.discard();
                Err(e)
            }
        }
    }

    async fn inspect(
        &self,
        file: &ReceivedFile,
    ) -> Result<Result<Verified, RejectReason>, AppError> {
        let header = read_header(file.path()).await?;

        let Some(sniffed) = sniff_content_type(&header) else {
            return Ok(Err(RejectReason::TypeUndetermined));
        };

        if !is_allowed_mime(sniffed.mime_type, &self.config.allowed_mime_types) {
            return Ok(Err(RejectReason::UnsupportedFormat));
        }

        if file.is_truncated() {
            return Ok(Err(RejectReason::FileTooLarge));
        }
        if let Err(reason) = check_size_bounds(
            file.size(),
            self.config.min_file_size,
            self.config.max_file_size,
        ) {
            return Ok(Err(reason));
        }

        match probe_image_dimensions(file.path().to_path_buf()).await? {
            Some((width, height)) => Ok(Ok(Verified {
                sniffed,
                width,
                height,
            })),
            None => Ok(Err(RejectReason::InvalidImageStructure)),
        }
    }

    async fn accept(
        &self,
        file: ReceivedFile,
        verified: Verified,
    ) -> Result<ValidationResult, AppError> {
        let file_name = format!("{}.{}", Uuid::new_v4(), verified.sniffed.extension);
        let original_name = file.original_name().to_string();
        let size = file.size();

        let target = file_name.clone();
        tokio::task::spawn_blocking(move || file.persist_as(&target))
            .await
            .map_err(|e| AppError::Internal(format!("persist task failed: {}", e)))??;

        info!(
            "✅ Upload '{}' stored as {} ({}, {}x{}, {} bytes)",
            original_name,
            file_name,
            verified.sniffed.mime_type,
            verified.width,
            verified.height,
            size
        );

        Ok(ValidationResult::Accepted {
            public_path: self.public_path(&file_name),
            original_name,
        })
    }

    /// Joins the configured public upload root with an on-disk file name
    pub fn public_path(&self, file_name: &str) -> String {
        let root = self.config.upload_path.trim_matches('/');
        if root.is_empty() {
            format!("/{}", file_name)
        } else {
            format!("/{}/{}", root, file_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::file_receiver::FileReceiver;
    use image::{DynamicImage, ImageOutputFormat, RgbImage};
    use std::io::Cursor;
    use std::path::Path;

    fn encode(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 5) as u8, 128])
        });
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn padded(mut bytes: Vec<u8>, len: usize) -> Vec<u8> {
        assert!(bytes.len() <= len, "encoded image already exceeds {} bytes", len);
        bytes.resize(len, 0);
        bytes
    }

    fn png(len: usize) -> Vec<u8> {
        padded(encode(8, 8, ImageOutputFormat::Png), len)
    }

    fn jpeg(len: usize) -> Vec<u8> {
        padded(encode(64, 48, ImageOutputFormat::Jpeg(90)), len)
    }

    fn validator(dir: &Path) -> UploadValidator {
        UploadValidator::new(UploadConfig {
            upload_dir: dir.to_path_buf(),
            ..UploadConfig::default()
        })
    }

    fn received(dir: &Path, name: &str, mime: &str, bytes: &[u8]) -> ReceivedFile {
        ReceivedFile::from_bytes(dir, name, Some(mime), bytes).unwrap()
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = validator(dir.path())
            .validate(UploadAttempt::missing())
            .await
            .unwrap();
        assert_eq!(result, ValidationResult::Rejected(RejectReason::FileNotProvided));
    }

    #[tokio::test]
    async fn test_valid_jpeg_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let file = received(dir.path(), "holiday.jpg", "image/jpeg", &jpeg(50 * 1024));
        let temp_path = file.path().to_path_buf();

        let result = validator(dir.path()).validate(file.into()).await.unwrap();

        let ValidationResult::Accepted {
            public_path,
            original_name,
        } = result
        else {
            panic!("expected acceptance");
        };
        assert!(public_path.starts_with("/images/"));
        assert!(public_path.ends_with(".jpg"));
        assert_eq!(original_name, "holiday.jpg");
        assert!(!temp_path.exists());

        let stored = public_path.rsplit('/').next().unwrap();
        assert!(dir.path().join(stored).exists());
        assert_eq!(entries(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_executable_renamed_as_jpeg_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut elf = vec![0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x00];
        elf.resize(50 * 1024, 0x90);
        let file = received(dir.path(), "cat.jpg", "image/jpeg", &elf);
        let temp_path = file.path().to_path_buf();

        let result = validator(dir.path()).validate(file.into()).await.unwrap();

        assert_eq!(result, ValidationResult::Rejected(RejectReason::UnsupportedFormat));
        assert!(!temp_path.exists());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_windows_executable_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut pe = b"MZ".to_vec();
        pe.resize(8 * 1024, 0);
        let file = received(dir.path(), "avatar.png", "image/png", &pe);

        let result = validator(dir.path()).validate(file.into()).await.unwrap();
        assert_eq!(result, ValidationResult::Rejected(RejectReason::UnsupportedFormat));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_sniffed_type_outside_allow_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut gif = b"GIF89a".to_vec();
        gif.resize(4096, 0);
        let file = received(dir.path(), "anim.png", "image/png", &gif);

        let validator = UploadValidator::new(UploadConfig {
            upload_dir: dir.path().to_path_buf(),
            allowed_mime_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
            ..UploadConfig::default()
        });

        let result = validator.validate(file.into()).await.unwrap();
        assert_eq!(result, ValidationResult::Rejected(RejectReason::UnsupportedFormat));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_unknown_content_is_undetermined() {
        let dir = tempfile::tempdir().unwrap();
        let text = "definitely not an image. ".repeat(200);
        let file = received(dir.path(), "photo.png", "image/png", text.as_bytes());

        let result = validator(dir.path()).validate(file.into()).await.unwrap();
        assert_eq!(result, ValidationResult::Rejected(RejectReason::TypeUndetermined));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_declared_png_with_broken_body_fails_structure_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(4096, 0xAB);
        let file = received(dir.path(), "logo.png", "image/png", &bytes);
        let temp_path = file.path().to_path_buf();

        let result = validator(dir.path()).validate(file.into()).await.unwrap();
        assert_eq!(
            result,
            ValidationResult::Rejected(RejectReason::InvalidImageStructure)
        );
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn test_size_bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let validator = validator(dir.path());

        let cases = [
            (2047, Some(RejectReason::FileTooSmall)),
            (2048, None),
            (10_485_760, None),
            (10_485_761, Some(RejectReason::FileTooLarge)),
        ];

        for (len, expected) in cases {
            let file = received(dir.path(), "edge.png", "image/png", &png(len));
            let temp_path = file.path().to_path_buf();
            let result = validator.validate(file.into()).await.unwrap();

            match expected {
                Some(reason) => {
                    assert_eq!(result, ValidationResult::Rejected(reason), "size {}", len);
                    assert!(!temp_path.exists(), "temp file left behind for size {}", len);
                }
                None => assert!(
                    matches!(result, ValidationResult::Accepted { .. }),
                    "size {} should pass, got {:?}",
                    len,
                    result
                ),
            }
        }
    }

    #[tokio::test]
    async fn test_truncated_upload_is_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let mut receiver = FileReceiver::create(dir.path(), "huge.jpg", Some("image/jpeg")).unwrap();
        receiver.write_chunk(&jpeg(50 * 1024)).await.unwrap();
        let file = receiver.finish_truncated().await.unwrap();

        let result = validator(dir.path()).validate(file.into()).await.unwrap();
        assert_eq!(result, ValidationResult::Rejected(RejectReason::FileTooLarge));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_truncated_executable_fails_on_format_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut elf = vec![0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x00];
        elf.resize(8 * 1024, 0x90);
        let mut receiver = FileReceiver::create(dir.path(), "huge.jpg", Some("image/jpeg")).unwrap();
        receiver.write_chunk(&elf).await.unwrap();
        let file = receiver.finish_truncated().await.unwrap();

        let result = validator(dir.path()).validate(file.into()).await.unwrap();
        assert_eq!(result, ValidationResult::Rejected(RejectReason::UnsupportedFormat));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_declared_metadata_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = received(dir.path(), "report.exe", "application/octet-stream", &png(4096));

        let result = validator(dir.path()).validate(file.into()).await.unwrap();
        let ValidationResult::Accepted {
            public_path,
            original_name,
        } = result
        else {
            panic!("expected acceptance");
        };
        assert!(public_path.ends_with(".png"));
        assert_eq!(original_name, "report.exe");
    }

    #[test]
    fn test_public_path() {
        let mut config = UploadConfig::default();
        config.upload_path = "/static/img/".to_string();
        assert_eq!(
            UploadValidator::new(config.clone()).public_path("a.png"),
            "/static/img/a.png"
        );

        config.upload_path = String::new();
        assert_eq!(UploadValidator::new(config).public_path("a.png"), "/a.png");
    }
}
