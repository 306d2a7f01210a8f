//! Same-origin attachment proxy at `/api/upload`.
//!
//! The browser never sees the CDN API key; every CDN call goes through here.

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{DeleteResponse, FilenameQuery, UploadResponse};
use crate::services::{AttachmentFile, AttachmentManager, Visibility};
use crate::startup::AppState;

fn required_filename(query: FilenameQuery) -> Result<String, AppError> {
    query
        .filename
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Filename is required")))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge(anyhow::anyhow!("File too large"));
    }
    AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
}

/// Stream a stored file back to the browser.
pub async fn view_file(
    State(state): State<AppState>,
    Query(query): Query<FilenameQuery>,
) -> Result<Response, AppError> {
    let reference = required_filename(query)?;
    let opened = state.attachments.open(&reference).await?;

    let disposition = format!("inline; filename=\"{}\"", opened.filename.replace('"', ""));
    let mut response = Response::new(Body::from_stream(opened.response.bytes_stream()));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&opened.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=3600"),
    );
    if let Some(length) = opened.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok(response)
}

/// Forward one or more `file` fields to the CDN. A single file answers with
/// one object, several with an array.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut files = Vec::new();
    let mut visibility = Visibility::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or("upload")
                    .to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                files.push(AttachmentFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            Some("visibility") => {
                let value = field.text().await.map_err(multipart_error)?;
                visibility = Visibility::from_string(&value);
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("No file provided")));
    }

    let mut uploaded: Vec<UploadResponse> = state
        .attachments
        .upload_all(files, visibility)
        .await?
        .into_iter()
        .map(|a| UploadResponse {
            view_url: AttachmentManager::view_url(&a.filename),
            url: a.url,
            filename: a.filename,
            visibility: a.visibility,
            message: "File uploaded successfully".to_string(),
        })
        .collect();

    if uploaded.len() == 1 {
        let single = uploaded.remove(0);
        return Ok((StatusCode::OK, Json(single)).into_response());
    }
    Ok((StatusCode::OK, Json(uploaded)).into_response())
}

pub async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<FilenameQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let reference = required_filename(query)?;
    let filename = state.attachments.delete(&reference).await?;

    Ok(Json(DeleteResponse {
        message: "File deleted successfully".to_string(),
        filename,
    }))
}
