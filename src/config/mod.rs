use crate::utils::validation::is_decodable_mime;
use std::env;
use std::path::PathBuf;
use tracing::warn;

/// Smallest accepted upload in bytes
pub const MIN_FILE_SIZE: u64 = 2048;

/// Largest accepted upload in bytes (10 MB)
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const DEFAULT_ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Settings handed to the upload validator at construction time
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory where received files are written and accepted files are kept
    pub upload_dir: PathBuf,

    /// Public URL prefix for accepted files, e.g. "images" -> "/images/<name>"
    pub upload_path: String,

    /// MIME types accepted after content sniffing
    pub allowed_mime_types: Vec<String>,

    /// Inclusive lower size bound in bytes (default: 2048)
    pub min_file_size: u64,

    /// Inclusive upper size bound in bytes (default: 10 MB)
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("public/images"),
            upload_path: "images".to_string(),
            allowed_mime_types: DEFAULT_ALLOWED_IMAGE_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            min_file_size: MIN_FILE_SIZE,
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

/// Parses a comma separated MIME list, keeping only types the structure
/// check can decode. Anything else could never be accepted.
fn decodable_only(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .filter(|mime| {
            let keep = is_decodable_mime(mime);
            if !keep {
                warn!("⚠️  Ignoring ALLOWED_IMAGE_TYPES entry '{}': not a decodable image type", mime);
            }
            keep
        })
        .collect()
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            upload_path: env::var("UPLOAD_PATH")
                .map(|v| v.trim_matches('/').to_string())
                .unwrap_or(default.upload_path),

            allowed_mime_types: env::var("ALLOWED_IMAGE_TYPES")
                .ok()
                .map(|v| decodable_only(&v))
                .filter(|types| !types.is_empty())
                .unwrap_or(default.allowed_mime_types),

            min_file_size: env::var("MIN_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.min_file_size),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),
        }
    }

    /// Body limit for the upload route: the file plus multipart framing
    pub fn request_body_limit(&self) -> usize {
        self.max_file_size as usize + 1024 * 1024
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// Access token lifetime in hours (default: 24)
    pub token_ttl_hours: i64,

    /// Allowed CORS origins (comma separated in ALLOWED_ORIGINS)
    pub allowed_origins: Vec<String>,

    /// Requests allowed per client IP inside one window (default: 30)
    pub rate_limit_max_requests: u32,

    /// Rate limit window length in seconds (default: 60)
    pub rate_limit_window_secs: u64,

    pub upload: UploadConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "secret".to_string(),
            token_ttl_hours: 24,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
            rate_limit_max_requests: 30,
            rate_limit_window_secs: 60,
            upload: UploadConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.token_ttl_hours),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),

            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_max_requests),

            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rate_limit_window_secs),

            upload: UploadConfig::from_env(),
        }
    }

    /// Config for local development and tests: relaxed rate limit
    pub fn development() -> Self {
        Self {
            rate_limit_max_requests: 10_000,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.rate_limit_max_requests, 30);
        assert_eq!(config.rate_limit_window_secs, 60);
        assert_eq!(config.upload.min_file_size, 2048);
        assert_eq!(config.upload.max_file_size, 10_485_760);
        assert_eq!(config.upload.upload_path, "images");
        assert!(
            config
                .upload
                .allowed_mime_types
                .contains(&"image/jpeg".to_string())
        );
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.rate_limit_max_requests, 10_000);
        assert_eq!(config.upload.max_file_size, MAX_FILE_SIZE);
    }

    #[test]
    fn test_body_limit_covers_max_file() {
        let config = UploadConfig::default();
        assert!(config.request_body_limit() > config.max_file_size as usize);
    }

    #[test]
    fn test_undecodable_types_are_dropped() {
        assert_eq!(
            decodable_only("image/bmp, image/PNG, image/tiff, image/jpg"),
            vec!["image/png", "image/jpg"]
        );
        assert!(decodable_only("image/bmp,image/tiff").is_empty());
    }

    #[test]
    fn test_upload_env_parsing() {
        unsafe {
            env::set_var("UPLOAD_PATH", "/static/uploads/");
            env::set_var("ALLOWED_IMAGE_TYPES", "image/PNG, image/bmp, image/jpeg,");
        }
        let config = UploadConfig::from_env();
        unsafe {
            env::remove_var("UPLOAD_PATH");
            env::remove_var("ALLOWED_IMAGE_TYPES");
        }
        assert_eq!(config.upload_path, "static/uploads");
        assert_eq!(config.allowed_mime_types, vec!["image/png", "image/jpeg"]);
    }
}
