use serde::{Deserialize, Serialize};

use crate::services::attachments::Visibility;

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    /// Same-origin proxy link for viewing the file.
    pub view_url: String,
    pub visibility: Visibility,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub filename: String,
}
