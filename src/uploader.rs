use reqwest::blocking::{RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::AuthenticatedTransport;
use crate::classifier::extension_of;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no usable access token: {0}")]
    Auth(String),

    #[error("rejected by service ({status}): {message}")]
    Rejected { status: String, message: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    pub media_item_id: Option<String>,
}

/// Adds a local file to the remote photo library.
///
/// Implementations own their retry policy; the caller treats any error as
/// final for the run.
pub trait MediaUploader {
    fn upload_to_library(&mut self, path: &Path) -> Result<UploadReceipt, UploadError>;

    /// True when nothing actually leaves the machine.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Logs what would be uploaded and reports success.
#[derive(Debug, Default)]
pub struct DryRunUploader {
    attempted: Vec<PathBuf>,
}

impl DryRunUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempted(&self) -> &[PathBuf] {
        &self.attempted
    }
}

impl MediaUploader for DryRunUploader {
    fn upload_to_library(&mut self, path: &Path) -> Result<UploadReceipt, UploadError> {
        info!("[dry-run] would upload {}", path.display());
        self.attempted.push(path.to_path_buf());
        Ok(UploadReceipt::default())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Uploads through the Google Photos Library API: raw bytes first, then a
/// `mediaItems:batchCreate` call that turns the upload token into a library item.
pub struct GooglePhotosUploader {
    transport: AuthenticatedTransport,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateRequest<'a> {
    new_media_items: Vec<NewMediaItem<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItem<'a> {
    description: &'a str,
    simple_media_item: SimpleMediaItem<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimpleMediaItem<'a> {
    upload_token: &'a str,
    file_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchCreateResponse {
    #[serde(default)]
    new_media_item_results: Vec<NewMediaItemResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMediaItemResult {
    #[serde(default)]
    status: ItemStatus,
    media_item: Option<MediaItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    id: String,
}

impl GooglePhotosUploader {
    pub fn new(transport: AuthenticatedTransport, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn authorized_post(&mut self, endpoint: &str) -> Result<RequestBuilder, UploadError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        self.transport.post(url).map_err(|err| match err {
            crate::Error::Auth(message) => UploadError::Auth(message),
            other => UploadError::Auth(other.to_string()),
        })
    }

    fn upload_bytes(&mut self, path: &Path) -> Result<String, UploadError> {
        let bytes = fs::read(path)?;
        let mime = mime_type_for(&path.to_string_lossy());
        debug!("Uploading {} bytes of {} as {}", bytes.len(), path.display(), mime);

        let response = self
            .authorized_post("v1/uploads")?
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("X-Goog-Upload-Content-Type", mime)
            .header("X-Goog-Upload-Protocol", "raw")
            .body(bytes)
            .send()?;

        let token = check_status(response)?.text()?;
        if token.trim().is_empty() {
            return Err(UploadError::Other("empty upload token".into()));
        }
        Ok(token)
    }

    fn create_media_item(
        &mut self,
        upload_token: &str,
        file_name: &str,
    ) -> Result<UploadReceipt, UploadError> {
        let request = BatchCreateRequest {
            new_media_items: vec![NewMediaItem {
                description: "",
                simple_media_item: SimpleMediaItem {
                    upload_token,
                    file_name,
                },
            }],
        };

        let response = self
            .authorized_post("v1/mediaItems:batchCreate")?
            .json(&request)
            .send()?;

        let body: BatchCreateResponse = check_status(response)?.json()?;
        receipt_from(body)
    }
}

impl MediaUploader for GooglePhotosUploader {
    fn upload_to_library(&mut self, path: &Path) -> Result<UploadReceipt, UploadError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::Other(format!("no file name in {}", path.display())))?;

        let upload_token = self.upload_bytes(path)?;
        self.create_media_item(&upload_token, &file_name)
    }
}

fn check_status(response: Response) -> Result<Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    Err(UploadError::Rejected {
        status: status.to_string(),
        message,
    })
}

fn receipt_from(body: BatchCreateResponse) -> Result<UploadReceipt, UploadError> {
    let result = body
        .new_media_item_results
        .into_iter()
        .next()
        .ok_or_else(|| UploadError::Other("batchCreate returned no results".into()))?;

    if result.status.code != 0 {
        return Err(UploadError::Rejected {
            status: format!("code {}", result.status.code),
            message: result.status.message,
        });
    }

    Ok(UploadReceipt {
        media_item_id: result.media_item.map(|item| item.id),
    })
}

fn mime_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).to_ascii_lowercase().as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".gif" => "image/gif",
        ".webp" => "image/webp",
        ".heic" => "image/heic",
        ".bmp" => "image/bmp",
        ".tif" | ".tiff" => "image/tiff",
        ".mp4" => "video/mp4",
        ".mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
