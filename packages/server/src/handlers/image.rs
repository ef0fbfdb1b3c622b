use std::path::PathBuf;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::ObjectId;
use common::image::{MAX_IMAGE_SIZE, image_url, validate_content_type};
use common::storage::{BlobUpload, BoxReader, StorageError};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::models::image::UploadImageResponse;
use crate::models::shared::{SuccessResponse, require_present};
use crate::state::AppState;

/// Room for the multipart envelope and the text fields around the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn image_upload_body_limit() -> DefaultBodyLimit {
    let max = usize::try_from(MAX_IMAGE_SIZE).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD))
}

/// A file field that has been spooled to disk.
struct SpooledFile {
    path: PathBuf,
    content_type: String,
    original_name: String,
}

#[utoipa::path(
    post,
    path = "/images",
    tag = "Images",
    operation_id = "uploadImage",
    summary = "Upload an entry image",
    description = "Multipart form with a `file` field (JPEG, PNG or WebP, at most 5 MiB), a \
        required `userId` and an optional `entryId`. Images uploaded before their entry exists \
        are recorded with entry id `temp`. The returned `imageUrl` is what the entry should store.",
    request_body(content_type = "multipart/form-data", description = "Image file with owner fields"),
    responses(
        (status = 201, description = "Image stored", body = UploadImageResponse),
        (status = 400, description = "Missing field, wrong type or too large (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut spooled: Option<SpooledFile> = None;
    let mut user_id: Option<String> = None;
    let mut entry_id: Option<String> = None;

    let collected = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
        {
            match field.name() {
                Some("file") if spooled.is_some() => {
                    return Err(AppError::Validation("Only one file may be uploaded".into()));
                }
                Some("file") => spooled = Some(spool_field(field).await?),
                Some("userId") => user_id = Some(field_text(field).await?),
                Some("entryId") => entry_id = Some(field_text(field).await?),
                _ => {}
            }
        }
        Ok::<_, AppError>(())
    }
    .await;

    let result = match (collected, &spooled) {
        (Err(e), _) => Err(e),
        (Ok(()), None) => Err(AppError::Validation("No file uploaded".into())),
        (Ok(()), Some(file)) => store_spooled(&state, file, user_id, entry_id).await,
    };

    if let Some(file) = &spooled {
        // Best effort.
        let _ = tokio::fs::remove_file(&file.path).await;
    }

    let id = result?;
    Ok((
        StatusCode::CREATED,
        Json(UploadImageResponse {
            image_id: id.to_hex(),
            image_url: image_url(&id),
        }),
    ))
}

async fn store_spooled(
    state: &AppState,
    file: &SpooledFile,
    user_id: Option<String>,
    entry_id: Option<String>,
) -> Result<ObjectId, AppError> {
    let user_id = require_present(user_id.as_deref(), "User ID required")?.to_string();

    let reader: BoxReader = Box::new(
        tokio::fs::File::open(&file.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?,
    );
    let upload = BlobUpload {
        content_type: file.content_type.clone(),
        user_id,
        entry_id: entry_id.filter(|id| !id.trim().is_empty()),
        original_name: file.original_name.clone(),
    };
    Ok(state.images.put_stream(reader, upload).await?)
}

async fn field_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))
}

/// Stream a file field into a temp file, rejecting it early on type or size.
async fn spool_field(mut field: Field<'_>) -> Result<SpooledFile, AppError> {
    let original_name = field.file_name().unwrap_or("image").to_string();
    let content_type = field
        .content_type()
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .or_else(|| {
            mime_guess::from_path(&original_name)
                .first()
                .map(|m| m.to_string())
        })
        .unwrap_or_default();
    validate_content_type(&content_type)?;

    let path = std::env::temp_dir().join(format!("repairdesk-upload-{}", Uuid::new_v4()));
    let spooled = SpooledFile {
        path,
        content_type,
        original_name,
    };

    let written = async {
        let mut temp_file = tokio::fs::File::create(&spooled.path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut total_size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
        {
            total_size += chunk.len() as u64;
            if total_size > MAX_IMAGE_SIZE {
                return Err(AppError::from(StorageError::SizeLimitExceeded {
                    actual: total_size,
                    limit: MAX_IMAGE_SIZE,
                }));
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }
        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))
    }
    .await;

    match written {
        Ok(()) => Ok(spooled),
        Err(e) => {
            let _ = tokio::fs::remove_file(&spooled.path).await;
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/images/{id}",
    tag = "Images",
    operation_id = "getImage",
    summary = "Fetch an image",
    description = "Streams the stored bytes with the content type recorded at upload. Images \
        never change, so responses are cacheable forever and `If-None-Match` is honoured.",
    params(("id" = String, Path, description = "Image ID (24 hex characters)")),
    responses(
        (status = 200, description = "Image content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 404, description = "Image not found or malformed id (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers))]
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id = ObjectId::from_hex(&id).map_err(|_| AppError::NotFound("Image not found".into()))?;

    let etag_value = format!("\"{id}\"");
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
        && state.images.exists(&id).await?
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let (reader, metadata) = state.images.get_stream(&id).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, metadata.content_type)
        .header(header::CONTENT_LENGTH, metadata.size.to_string())
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[utoipa::path(
    delete,
    path = "/images/{id}",
    tag = "Images",
    operation_id = "deleteImage",
    summary = "Delete an image",
    description = "Idempotent. Deleting an unknown or malformed id also succeeds. Entries that \
        still refer to the image are left alone; the maintenance sweep clears them.",
    params(("id" = String, Path, description = "Image ID (24 hex characters)")),
    responses(
        (status = 200, description = "Image deleted or already absent", body = SuccessResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Ok(id) = ObjectId::from_hex(&id) else {
        return Ok(Json(SuccessResponse::ok()));
    };

    match state.images.delete(&id).await {
        Ok(_) | Err(StorageError::NotFound(_)) => {}
        Err(e) => {
            warn!(image_id = %id, error = %e, "Image delete failed");
            return Err(e.into());
        }
    }
    Ok(Json(SuccessResponse::ok()))
}
