pub mod file_receiver;
pub mod rate_limiter;
pub mod upload_validator;
