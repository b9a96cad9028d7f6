//! Request and response types for Drive uploads.

use chrono::NaiveDate;
use cm_studio_core::ImageAsset;
use cm_studio_core::media::extension_for_mime;
use serde::{Deserialize, Serialize};

/// Prefix for generated file names.
pub const FILE_NAME_PREFIX: &str = "CM_Studio_";

/// `CM_Studio_<YYYYMMDD>.<ext>` for an image of the given MIME type.
#[must_use]
pub fn default_file_name(date: NaiveDate, mime_type: &str) -> String {
    format!(
        "{FILE_NAME_PREFIX}{}.{}",
        date.format("%Y%m%d"),
        extension_for_mime(mime_type)
    )
}

/// An image queued for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// File name shown in Drive.
    pub name: String,
    /// Image payload.
    pub image: ImageAsset,
}

/// Metadata part of a multipart upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata<'a> {
    pub name: &'a str,
    pub mime_type: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<&'a str>,
}

/// Stored file as returned with `fields=id,webViewLink,name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    /// Drive file id.
    pub id: String,
    /// Shareable link; absent if the caller lacks link permissions.
    #[serde(default)]
    pub web_view_link: Option<String>,
    /// Stored file name.
    #[serde(default)]
    pub name: String,
}
