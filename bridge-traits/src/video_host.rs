//! Remote Video Hosting Abstraction
//!
//! The operations the sync core needs from a video-hosting service: remote
//! objects, containers (projects/folders) and resumable tus upload sessions.
//!
//! Failures are never raised. Every call resolves to a tagged value
//! ([`ApiResponse`], [`OffsetProbe`], [`UploadReceipt`] or `Option`) so the
//! caller can persist the message as the asset's last error.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::error::BridgeError;

/// Visibility requested for new remote objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyView {
    /// Leave the account default in place (no privacy field is sent)
    #[default]
    Default,
    Unlisted,
    Public,
    Private,
}

impl PrivacyView {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyView::Default => "default",
            PrivacyView::Unlisted => "unlisted",
            PrivacyView::Public => "public",
            PrivacyView::Private => "private",
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, PrivacyView::Default)
    }
}

impl FromStr for PrivacyView {
    type Err = BridgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "default" => Ok(PrivacyView::Default),
            "unlisted" => Ok(PrivacyView::Unlisted),
            "public" | "anybody" => Ok(PrivacyView::Public),
            "private" | "nobody" => Ok(PrivacyView::Private),
            other => Err(BridgeError::OperationFailed(format!(
                "Unknown privacy setting: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PrivacyView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform result of a remote API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// `true` for any 2xx status
    pub success: bool,
    /// HTTP status, or `0` when no response arrived
    pub status_code: u16,
    /// Decoded JSON body, `Value::Null` when absent or not JSON
    pub body: Value,
    /// Empty on success; the transport message or raw response body otherwise
    pub error: String,
}

impl ApiResponse {
    pub fn from_status(status_code: u16, body: Value, raw_body: String) -> Self {
        let success = (200..300).contains(&status_code);
        Self {
            success,
            status_code,
            body,
            error: if success { String::new() } else { raw_body },
        }
    }

    /// A call that never produced a response.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: 0,
            body: Value::Null,
            error: message.into(),
        }
    }

    /// Decode the body into a typed model.
    pub fn parse<T: DeserializeOwned>(&self) -> Option<T> {
        T::deserialize(&self.body).ok()
    }

    /// Read a string at a JSON pointer such as `/upload/upload_link`.
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.body
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Whether the service rejected the request because of `field`.
    ///
    /// Matches 400/422 responses whose error text names the field, which is
    /// how the service reports invalid parameters.
    pub fn is_validation_error_for(&self, field: &str) -> bool {
        !self.success
            && matches!(self.status_code, 400 | 422)
            && self.error.to_lowercase().contains(&field.to_lowercase())
    }

    /// A short message for persisting as the asset's last error.
    pub fn error_message(&self) -> String {
        if let Some(message) = self
            .str_at("/developer_message")
            .or_else(|| self.str_at("/error"))
        {
            return format!("HTTP {}: {}", self.status_code, message);
        }
        match self.status_code {
            0 => self.error.clone(),
            status if self.error.is_empty() => format!("HTTP {}", status),
            status => format!("HTTP {}: {}", status, self.error),
        }
    }
}

/// A container (project/folder) that groups remote objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContainer {
    pub uri: String,
    #[serde(default)]
    pub name: String,
}

/// One delivered rendition of a remote object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeliveredFile {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub rendition: Option<String>,
    #[serde(default, rename = "type")]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TranscodeInfo {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrivacyInfo {
    #[serde(default)]
    pub view: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadInfo {
    #[serde(default)]
    pub upload_link: Option<String>,
    #[serde(default)]
    pub approach: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Remote object metadata as returned by the object endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteVideo {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transcode: Option<TranscodeInfo>,
    #[serde(default)]
    pub privacy: Option<PrivacyInfo>,
    #[serde(default)]
    pub upload: Option<UploadInfo>,
    #[serde(default)]
    pub files: Vec<DeliveredFile>,
}

impl RemoteVideo {
    pub fn transcode_status(&self) -> Option<&str> {
        self.transcode.as_ref().and_then(|t| t.status.as_deref())
    }

    pub fn privacy_view(&self) -> Option<&str> {
        self.privacy.as_ref().and_then(|p| p.view.as_deref())
    }

    pub fn upload_link(&self) -> Option<&str> {
        self.upload
            .as_ref()
            .and_then(|u| u.upload_link.as_deref())
            .filter(|link| !link.is_empty())
    }
}

/// Parameters for a new resumable upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSessionRequest {
    /// Exact byte size of the file to be uploaded
    pub size: u64,
    pub title: String,
    pub description: String,
    pub privacy: PrivacyView,
}

/// Result of reading the server-side offset of an upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetProbe {
    pub success: bool,
    pub offset: u64,
    /// HTTP status of a rejected probe, `0` otherwise
    pub status_code: u16,
    pub error: String,
}

impl OffsetProbe {
    /// The server no longer knows the session; resuming it cannot succeed.
    pub fn session_gone(&self) -> bool {
        !self.success && matches!(self.status_code, 404 | 410)
    }
}

/// Result of submitting one chunk to an upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub success: bool,
    /// Offset reported by the server after the chunk
    pub offset: u64,
    pub error: String,
}

/// Video hosting service trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::video_host::VideoHost;
///
/// async fn remote_status(host: &dyn VideoHost, uri: &str) -> Option<String> {
///     let response = host.get_object(uri).await;
///     response.parse::<RemoteVideo>().and_then(|video| video.status)
/// }
/// ```
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Find a container by case-insensitive exact name, creating it when absent.
    async fn find_or_create_container(&self, name: &str) -> Option<RemoteContainer>;

    /// Fetch a container by URI; `None` when it no longer exists.
    async fn get_container(&self, uri: &str) -> Option<RemoteContainer>;

    /// Create a remote object the service ingests from a public URL.
    async fn create_remote_object_from_url(
        &self,
        url: &str,
        title: &str,
        description: &str,
    ) -> ApiResponse;

    /// Create a remote object backed by a resumable upload session.
    async fn create_resumable_session(&self, request: &UploadSessionRequest) -> ApiResponse;

    async fn add_to_container(&self, container_uri: &str, object_uri: &str) -> ApiResponse;

    async fn get_object(&self, uri: &str) -> ApiResponse;

    async fn delete_object(&self, uri: &str) -> ApiResponse;

    /// Read the server-side byte offset of a session.
    async fn get_upload_offset(&self, session_url: &str) -> OffsetProbe;

    /// Submit `chunk` at `offset`; the receipt carries the new server offset.
    async fn patch_upload_chunk(&self, session_url: &str, chunk: Bytes, offset: u64)
        -> UploadReceipt;
}
