use crate::api::error::AppError;
use crate::services::file_receiver::FileReceiver;
use crate::services::upload_validator::{UploadAttempt, ValidationResult};
use crate::utils::auth::CurrentUser;
use crate::utils::validation::RejectReason;
use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use serde::Serialize;
use utoipa::ToSchema;

/// Multipart field that carries the image
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Public path of the stored image, e.g. `/images/<uuid>.jpg`
    pub file_name: String,
    pub original_name: String,
}

fn hit_body_limit(e: &MultipartError) -> bool {
    e.status() == StatusCode::PAYLOAD_TOO_LARGE
}

fn multipart_error(e: MultipartError) -> AppError {
    if hit_body_limit(&e) {
        AppError::BadRequest(RejectReason::FileTooLarge.to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Streams the first `file` field to disk; other fields are skipped.
/// A file cut off by the body limit is still handed over, marked truncated,
/// so the usual check order decides the outcome.
async fn receive(
    state: &crate::AppState,
    multipart: &mut Multipart,
) -> Result<UploadAttempt, AppError> {
    let dir = &state.upload_validator.config().upload_dir;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let declared_mime = field.content_type().map(|s| s.to_string());

        // A receiver dropped on error takes its partial file with it
        let mut receiver = FileReceiver::create(dir, &original_name, declared_mime.as_deref())?;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => receiver.write_chunk(&chunk).await?,
                Ok(None) => return Ok(receiver.finish().await?.into()),
                Err(e) if hit_body_limit(&e) => {
                    return Ok(receiver.finish_truncated().await?.into());
                }
                Err(e) => return Err(multipart_error(e)),
            }
        }
    }

    Ok(UploadAttempt::missing())
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = Multipart, description = "Image in the `file` field"),
    responses(
        (status = 201, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Upload rejected"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "upload"
)]
pub async fn upload_image(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let attempt = receive(&state, &mut multipart).await?;

    match state.upload_validator.validate(attempt).await? {
        ValidationResult::Accepted {
            public_path,
            original_name,
        } => {
            tracing::info!("📤 User {} uploaded {}", user.id, public_path);
            Ok((
                StatusCode::CREATED,
                Json(UploadResponse {
                    file_name: public_path,
                    original_name,
                }),
            ))
        }
        ValidationResult::Rejected(reason) => Err(AppError::BadRequest(reason.to_string())),
    }
}
