use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Extension, Multipart, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Json as RespJson, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::backup::{BackupError, BackupService, CsvUpload, MAX_UPLOAD_BYTES};
use crate::error::{ApiError, ApiResult};
use crate::model::backup::{BackupCreatedResponse, BackupListResponse, RestoreResponse};

// Room for multipart boundaries and part headers around the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn backup_router() -> Router {
    Router::new()
        .route("/create", post(create_backup))
        .route(
            "/restore/upload",
            post(restore_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/restore/:filename", post(restore_backup))
        .route("/list", get(list_backups))
        .route("/download/:filename", get(download_backup))
}

async fn create_backup(
    Extension(backups): Extension<Arc<BackupService>>,
) -> ApiResult<(StatusCode, RespJson<BackupCreatedResponse>)> {
    let filename = backups.create_backup().await?;
    Ok((
        StatusCode::CREATED,
        RespJson(BackupCreatedResponse {
            message: "Backup created successfully".to_string(),
            filename,
            timestamp: Utc::now(),
        }),
    ))
}

async fn restore_backup(
    Extension(backups): Extension<Arc<BackupService>>,
    Path(filename): Path<String>,
) -> ApiResult<RespJson<RestoreResponse>> {
    let restored = backups.restore_from_file(&filename).await?;
    Ok(RespJson(restored_response(restored, filename)))
}

async fn restore_upload(
    Extension(backups): Extension<Arc<BackupService>>,
    mut multipart: Multipart,
) -> ApiResult<RespJson<RestoreResponse>> {
    let mut upload = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to parse multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let mut file = CsvUpload {
            filename: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            data: Vec::new(),
        };
        // Reject by type before reading the payload
        file.validate()?;

        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?
        {
            if file.data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(BackupError::InvalidFormat(format!(
                    "upload exceeds the {} byte limit",
                    MAX_UPLOAD_BYTES
                ))
                .into());
            }
            file.data.extend_from_slice(&chunk);
        }

        upload = Some(file);
        break;
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("Missing file".to_string()))?;
    let restored = backups.restore_from_upload(&upload).await?;
    let filename = upload.filename.unwrap_or_default();
    Ok(RespJson(restored_response(restored, filename)))
}

async fn list_backups(
    Extension(backups): Extension<Arc<BackupService>>,
) -> RespJson<BackupListResponse> {
    RespJson(BackupListResponse::new(backups.list_backups().await))
}

async fn download_backup(
    Extension(backups): Extension<Arc<BackupService>>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let file = backups.open_backup(&filename).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, body).into_response())
}

fn restored_response(restored: usize, filename: String) -> RestoreResponse {
    RestoreResponse {
        message: "Data restored successfully".to_string(),
        users_restored: restored,
        filename,
        timestamp: Utc::now(),
    }
}
