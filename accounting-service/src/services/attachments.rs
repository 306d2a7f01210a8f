//! Attachment lifecycle: size gate, upload, open, delete.
//!
//! Records only keep attachment URLs. Deleting a file is never implied by
//! deleting a record; callers that want both use [`AttachmentManager::delete_all`]
//! and keep what it returns as orphans.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use super::cdn_client::{AttachmentFile, CdnClient};
use crate::config::CdnSettings;

pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Path of the same-origin proxy that serves attachments.
pub const PROXY_PATH: &str = "/api/upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "public" => Visibility::Public,
            _ => Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedAttachment {
    pub url: String,
    pub filename: String,
    pub visibility: Visibility,
}

/// An opened attachment, body not yet read.
pub struct OpenedAttachment {
    pub filename: String,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub response: reqwest::Response,
}

/// Reduce a stored reference (bare filename or full CDN URL) to the filename.
///
/// Idempotent: a bare filename maps to itself. Escaped `/`, `?` and `#` stay
/// escaped, so the result is always a single path segment.
pub fn extract_filename(reference: &str) -> String {
    let reference = reference.trim();

    if let Ok(url) = Url::parse(reference) {
        if let Some(last) = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        {
            return percent_decode(last);
        }
    }

    let without_query = reference.split(['?', '#']).next().unwrap_or(reference);
    without_query
        .split('/')
        .filter(|s| !s.is_empty())
        .last()
        .unwrap_or(without_query)
        .to_string()
}

fn percent_decode(segment: &str) -> String {
    // Path segments keep a literal '+', form decoding would turn it into a space.
    let encoded = format!("f={}", segment.replace('+', "%2B"));
    serde_urlencoded::from_str::<Vec<(String, String)>>(&encoded)
        .ok()
        .and_then(|pairs| pairs.into_iter().next())
        .map(|(_, value)| value)
        .filter(|value| !value.contains(['/', '?', '#']))
        .unwrap_or_else(|| segment.to_string())
}

pub struct AttachmentManager {
    cdn: CdnClient,
    max_file_size: usize,
}

impl AttachmentManager {
    pub fn new(settings: &CdnSettings) -> Self {
        Self {
            cdn: CdnClient::new(settings),
            max_file_size: settings.max_file_size,
        }
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Size gate, applied before any CDN call. Exactly the limit is allowed.
    pub fn check_size(&self, size: usize) -> Result<(), AppError> {
        if size > self.max_file_size {
            return Err(AppError::PayloadTooLarge(anyhow::anyhow!(
                "File too large. Maximum size is {} bytes",
                self.max_file_size
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, file), fields(file_name = %file.file_name, size = file.size()))]
    pub async fn upload(
        &self,
        file: AttachmentFile,
        visibility: Visibility,
    ) -> Result<UploadedAttachment, AppError> {
        self.check_size(file.size())?;

        let stored = self.cdn.upload(file, visibility).await?;

        tracing::info!(filename = %stored.filename, "Attachment uploaded");

        Ok(UploadedAttachment {
            url: stored.url,
            filename: stored.filename,
            visibility,
        })
    }

    /// Upload one file at a time; the first failure stops the batch.
    pub async fn upload_all(
        &self,
        files: Vec<AttachmentFile>,
        visibility: Visibility,
    ) -> Result<Vec<UploadedAttachment>, AppError> {
        for file in &files {
            self.check_size(file.size())?;
        }

        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            uploaded.push(self.upload(file, visibility).await?);
        }
        Ok(uploaded)
    }

    pub async fn open(&self, reference: &str) -> Result<OpenedAttachment, AppError> {
        let filename = extract_filename(reference);
        let response = self.cdn.fetch(&filename).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let content_length = response.content_length();

        Ok(OpenedAttachment {
            filename,
            content_type,
            content_length,
            response,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, reference: &str) -> Result<String, AppError> {
        let filename = extract_filename(reference);
        self.cdn.delete(&filename).await?;
        tracing::info!(filename = %filename, "Attachment deleted");
        Ok(filename)
    }

    /// Delete every reference, returning the ones that could not be removed.
    /// A file the CDN no longer has counts as removed.
    pub async fn delete_all(&self, references: &[String]) -> Vec<String> {
        let mut orphans = Vec::new();
        for reference in references {
            match self.delete(reference).await {
                Ok(_) | Err(AppError::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(reference = %reference, error = %e, "Attachment left orphaned on CDN");
                    orphans.push(reference.clone());
                }
            }
        }
        orphans
    }

    /// Same-origin URL the browser uses to view an attachment.
    pub fn view_url(reference: &str) -> String {
        let query = serde_urlencoded::to_string([("filename", extract_filename(reference))])
            .unwrap_or_default();
        format!("{}?{}", PROXY_PATH, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max_file_size: usize) -> AttachmentManager {
        AttachmentManager::new(&CdnSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            max_file_size,
        })
    }

    #[test]
    fn extracts_trailing_segment_from_urls() {
        assert_eq!(
            extract_filename("https://cdn.tripbooking.ai/files/abc-123.pdf"),
            "abc-123.pdf"
        );
        assert_eq!(
            extract_filename("https://cdn.tripbooking.ai/files/my%20scan.png?v=2"),
            "my scan.png"
        );
        assert_eq!(extract_filename("abc-123.pdf"), "abc-123.pdf");
        assert_eq!(
            extract_filename("https://cdn.tripbooking.ai/files/a+b.pdf"),
            "a+b.pdf"
        );
        assert_eq!(extract_filename("/files/abc.pdf"), "abc.pdf");
        assert_eq!(extract_filename("files/abc.pdf/"), "abc.pdf");
    }

    #[test]
    fn extract_filename_is_idempotent() {
        for reference in [
            "https://cdn.tripbooking.ai/files/abc.pdf",
            "http://[bad/files/x.png",
            "plain.jpg",
            "a/b/c.txt",
            "https://cdn.tripbooking.ai/files/a%2Fb.pdf",
            "https://cdn.tripbooking.ai/files/what%3Fnow.pdf",
            "https://cdn.tripbooking.ai/files/no%23tag.pdf",
            "https://cdn.tripbooking.ai/files/receipt%201.pdf",
        ] {
            let once = extract_filename(reference);
            assert_eq!(extract_filename(&once), once);
        }
    }

    #[test]
    fn escaped_separators_stay_in_one_segment() {
        assert_eq!(
            extract_filename("https://cdn.tripbooking.ai/files/a%2Fb.pdf"),
            "a%2Fb.pdf"
        );
        assert_eq!(
            extract_filename("https://cdn.tripbooking.ai/files/what%3Fnow.pdf"),
            "what%3Fnow.pdf"
        );
        assert_eq!(
            extract_filename("https://cdn.tripbooking.ai/files/receipt%201.pdf"),
            "receipt 1.pdf"
        );
    }

    #[test]
    fn malformed_url_falls_back_to_splitting() {
        assert_eq!(extract_filename("http://[bad/files/x.png"), "x.png");
    }

    #[test]
    fn size_limit_is_inclusive() {
        let manager = manager(1024);
        assert!(manager.check_size(1024).is_ok());
        assert!(matches!(
            manager.check_size(1025),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn oversized_upload_never_reaches_the_cdn() {
        // No API key is configured: reaching the CDN client would be a
        // configuration error instead of 413.
        let err = manager(4)
            .upload(
                AttachmentFile {
                    file_name: "big.bin".to_string(),
                    content_type: "application/octet-stream".to_string(),
                    data: axum::body::Bytes::from_static(b"12345"),
                },
                Visibility::Private,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[test]
    fn view_url_points_at_the_proxy() {
        assert_eq!(
            AttachmentManager::view_url("https://cdn.tripbooking.ai/files/a b.pdf"),
            "/api/upload?filename=a+b.pdf"
        );
    }

    #[test]
    fn visibility_defaults_to_private() {
        assert_eq!(Visibility::default(), Visibility::Private);
        assert_eq!(Visibility::from_string("PUBLIC"), Visibility::Public);
        assert_eq!(Visibility::from_string("other"), Visibility::Private);
    }
}
