//! HTTP client for the attachment CDN.
//!
//! The CDN exposes `POST /upload` (multipart `file` + `visibility`) and
//! `GET`/`DELETE /files/{filename}`, authenticated with an `X-API-Key` header.

use axum::body::Bytes;
use reqwest::{multipart, Client, Response, StatusCode, Url};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::error::AppError;
use service_core::observability::TracedRequestExt;

use super::attachments::{extract_filename, Visibility};
use crate::config::CdnSettings;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// File as received from the browser, ready to forward.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl AttachmentFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Deserialize)]
struct CdnUploadBody {
    url: Option<String>,
    filename: Option<String>,
}

/// Where the CDN stored an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub url: String,
    pub filename: String,
}

pub struct CdnClient {
    client: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl CdnClient {
    pub fn new(settings: &CdnSettings) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        }
    }

    fn api_key(&self) -> Result<&str, AppError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret().as_str())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::ConfigError(anyhow::anyhow!("CDN_API_KEY is not configured")))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid CDN base URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("CDN base URL cannot be a base"))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Public URL of a stored file. Escaped separators left in the filename
    /// by `extract_filename` are escaped exactly once on the wire.
    pub fn file_url(&self, filename: &str) -> Result<Url, AppError> {
        let name = unescape_separators(filename);
        self.endpoint(&["files", &name])
    }

    pub async fn upload(
        &self,
        file: AttachmentFile,
        visibility: Visibility,
    ) -> Result<StoredFile, AppError> {
        let api_key = self.api_key()?;
        let url = self.endpoint(&["upload"])?;
        let original_name = file.file_name.clone();
        let size = file.size() as u64;

        let part = multipart::Part::stream_with_length(file.data, size)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid content type: {}", e)))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("visibility", visibility.as_str());

        let response = self
            .client
            .post(url)
            .with_trace_context()
            .header(API_KEY_HEADER, api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("upload", e))?;
        let response = check_status("upload", response).await?;

        let body: CdnUploadBody = response.json().await.map_err(|e| {
            AppError::Upstream(anyhow::anyhow!("Unreadable CDN upload response: {}", e))
        })?;

        let filename = body
            .filename
            .filter(|f| !f.is_empty())
            .or_else(|| body.url.as_deref().map(extract_filename))
            .unwrap_or(original_name);
        let url = match body.url.filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => self.file_url(&filename)?.to_string(),
        };

        Ok(StoredFile { url, filename })
    }

    /// Open a stored file. The caller streams the body.
    pub async fn fetch(&self, filename: &str) -> Result<Response, AppError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .get(self.file_url(filename)?)
            .with_trace_context()
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| transport_error("fetch", e))?;
        check_status("fetch", response).await
    }

    pub async fn delete(&self, filename: &str) -> Result<(), AppError> {
        let api_key = self.api_key()?;
        let response = self
            .client
            .delete(self.file_url(filename)?)
            .with_trace_context()
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(|e| transport_error("delete", e))?;
        check_status("delete", response).await?;
        Ok(())
    }
}

fn transport_error(operation: &'static str, err: reqwest::Error) -> AppError {
    metrics::counter!("cdn_requests_total", "operation" => operation, "status" => "error")
        .increment(1);
    tracing::error!(operation, error = %err, "CDN request failed");
    AppError::Upstream(anyhow::anyhow!("CDN request failed: {}", err))
}

/// Count the call and turn CDN failures into caller-facing errors.
/// 401, 404 and 413 keep their meaning; everything else is a 500.
async fn check_status(operation: &'static str, response: Response) -> Result<Response, AppError> {
    let status = response.status();
    metrics::counter!(
        "cdn_requests_total",
        "operation" => operation,
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(operation, status = %status, body = %body, "CDN rejected request");

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AppError::Unauthorized(anyhow::anyhow!("CDN rejected the API key"))
        }
        StatusCode::NOT_FOUND => AppError::NotFound(anyhow::anyhow!("File not found")),
        StatusCode::PAYLOAD_TOO_LARGE => {
            AppError::PayloadTooLarge(anyhow::anyhow!("File too large"))
        }
        other => AppError::Upstream(anyhow::anyhow!("CDN returned {}: {}", other, body)),
    })
}

fn unescape_separators(filename: &str) -> String {
    let mut out = String::with_capacity(filename.len());
    let mut rest = filename;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let escape = rest.get(pos..pos + 3).unwrap_or("");
        match escape.to_ascii_uppercase().as_str() {
            "%2F" => out.push('/'),
            "%3F" => out.push('?'),
            "%23" => out.push('#'),
            _ => {
                out.push('%');
                rest = &rest[pos + 1..];
                continue;
            }
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    out
}
