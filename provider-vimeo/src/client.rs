//! Vimeo API client implementation
//!
//! Implements the `VideoHost` trait for the Vimeo REST API v3.4 and the tus
//! 1.0.0 upload endpoints it hands out.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::CredentialSource;
use bridge_traits::video_host::{
    ApiResponse, OffsetProbe, RemoteContainer, UploadReceipt, UploadSessionRequest, VideoHost,
};
use bytes::Bytes;
use core_runtime::config::{MediaSyncConfig, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use core_runtime::logging::redact_if_sensitive;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, VimeoError};
use crate::types::{CreateProjectRequest, CreateVideoRequest, PrivacySpec, ProjectPage, UploadSpec};

/// Media type pinning the API version
const VIMEO_ACCEPT: &str = "application/vnd.vimeo.*+json;version=3.4";

const TUS_VERSION: &str = "1.0.0";
const TUS_CONTENT_TYPE: &str = "application/offset+octet-stream";
const UPLOAD_OFFSET_HEADER: &str = "Upload-Offset";

/// Safety bound on project search pagination
const MAX_PROJECT_PAGES: usize = 20;

/// Vimeo API client
///
/// Every call is a single attempt. The token is read from the credential
/// source per request, so a token set after startup takes effect without a
/// restart.
///
/// # Example
///
/// ```ignore
/// use provider_vimeo::VimeoClient;
/// use bridge_traits::video_host::VideoHost;
///
/// let client = VimeoClient::new(http_client, credentials);
/// let project = client.find_or_create_container("Media Sync").await;
/// ```
pub struct VimeoClient {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialSource>,
    base_url: String,
    timeout: Duration,
}

impl VimeoClient {
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            http_client,
            credentials,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create a client using the base URL and timeout from `config`.
    pub fn from_config(
        http_client: Arc<dyn HttpClient>,
        credentials: Arc<dyn CredentialSource>,
        config: &MediaSyncConfig,
    ) -> Self {
        Self {
            http_client,
            credentials,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Absolute URLs (upload sessions) pass through; API paths get the base.
    fn resolve(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn authorized(&self, method: HttpMethod, path: &str) -> Result<HttpRequest> {
        let token = self
            .credentials
            .access_token()
            .ok_or(VimeoError::MissingToken)?;

        Ok(HttpRequest::new(method, self.resolve(path))
            .bearer_token(token)
            .header("Accept", VIMEO_ACCEPT)
            .timeout(self.timeout))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.http_client
            .execute(request)
            .await
            .map_err(|e| VimeoError::Transport(e.to_string()))
    }

    async fn api_request(&self, method: HttpMethod, path: &str) -> ApiResponse {
        self.dispatch(method, path, self.authorized(method, path))
            .await
    }

    async fn api_request_json<T: Serialize>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &T,
    ) -> ApiResponse {
        let request = self
            .authorized(method, path)
            .and_then(|request| request.json(body).map_err(VimeoError::from));
        self.dispatch(method, path, request).await
    }

    async fn dispatch(
        &self,
        method: HttpMethod,
        path: &str,
        request: Result<HttpRequest>,
    ) -> ApiResponse {
        debug!(method = method.as_str(), path = %path, "Vimeo request");

        let response = match request {
            Ok(request) => self.send(request).await,
            Err(e) => Err(e),
        };

        match response {
            Ok(response) => {
                debug!(status = response.status, "Vimeo response");
                let body = serde_json::from_slice(&response.body).unwrap_or(Value::Null);
                ApiResponse::from_status(response.status, body, response.text())
            }
            Err(e) => {
                warn!(method = method.as_str(), path = %path, error = %e, "Vimeo request failed");
                ApiResponse::transport_failure(e.to_string())
            }
        }
    }

    async fn create_video(&self, request: CreateVideoRequest) -> ApiResponse {
        let response = self
            .api_request_json(HttpMethod::Post, "/me/videos", &request)
            .await;

        if response.success {
            info!(
                uri = response.str_at("/uri").unwrap_or_default(),
                approach = %request.upload.approach,
                "Created Vimeo video"
            );
        }
        response
    }

    async fn probe_offset(&self, session_url: &str) -> Result<u64> {
        let request = self
            .authorized(HttpMethod::Head, session_url)?
            .header("Tus-Resumable", TUS_VERSION);

        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(VimeoError::Api {
                status_code: response.status,
                message: response.text(),
            });
        }

        Ok(parse_upload_offset(&response)?.unwrap_or(0))
    }

    async fn patch_chunk(&self, session_url: &str, chunk: Bytes, offset: u64) -> Result<u64> {
        let request = self
            .authorized(HttpMethod::Patch, session_url)?
            .header("Tus-Resumable", TUS_VERSION)
            .header(UPLOAD_OFFSET_HEADER, offset.to_string())
            .body(TUS_CONTENT_TYPE, chunk);

        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(VimeoError::Api {
                status_code: response.status,
                message: response.text(),
            });
        }

        let new_offset = parse_upload_offset(&response)?.unwrap_or(0);
        if new_offset <= offset {
            return Err(VimeoError::Protocol(format!(
                "server offset {} did not advance past {}",
                new_offset, offset
            )));
        }
        Ok(new_offset)
    }
}

/// Read the `Upload-Offset` header; `None` when absent.
fn parse_upload_offset(response: &HttpResponse) -> Result<Option<u64>> {
    match response.header(UPLOAD_OFFSET_HEADER) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            VimeoError::Protocol(format!("invalid {} header: {}", UPLOAD_OFFSET_HEADER, raw))
        }),
    }
}

fn failure_message(error: &VimeoError) -> String {
    match error {
        VimeoError::Api {
            status_code,
            message,
        } => format!("HTTP {}: {}", status_code, message),
        other => other.to_string(),
    }
}

#[async_trait]
impl VideoHost for VimeoClient {
    #[instrument(skip(self))]
    async fn find_or_create_container(&self, name: &str) -> Option<RemoteContainer> {
        let wanted = name.to_lowercase();
        let mut next = Some(format!("/me/projects?query={}", urlencoding::encode(name)));
        let mut pages = 0;

        while let Some(path) = next.take() {
            if pages >= MAX_PROJECT_PAGES {
                warn!(pages, "Stopped project search at page limit");
                break;
            }
            pages += 1;

            let response = self.api_request(HttpMethod::Get, &path).await;
            if !response.success {
                debug!(error = %response.error_message(), "Project search failed");
                break;
            }
            let Some(page) = response.parse::<ProjectPage>() else {
                break;
            };

            if let Some(found) = page
                .data
                .iter()
                .find(|project| !project.uri.is_empty() && project.name.to_lowercase() == wanted)
            {
                debug!(uri = %found.uri, "Found existing project");
                return Some(found.clone());
            }
            next = page.next_page().map(str::to_string);
        }

        info!("Creating Vimeo project");
        let response = self
            .api_request_json(
                HttpMethod::Post,
                "/me/projects",
                &CreateProjectRequest {
                    name: name.to_string(),
                },
            )
            .await;

        if !response.success {
            warn!(error = %response.error_message(), "Failed to create project");
            return None;
        }
        response
            .parse::<RemoteContainer>()
            .filter(|project| !project.uri.is_empty())
    }

    #[instrument(skip(self))]
    async fn get_container(&self, uri: &str) -> Option<RemoteContainer> {
        let response = self.api_request(HttpMethod::Get, uri).await;
        if !response.success {
            debug!(status = response.status_code, "Project lookup failed");
            return None;
        }
        response
            .parse::<RemoteContainer>()
            .filter(|project| !project.uri.is_empty())
    }

    #[instrument(skip(self, description))]
    async fn create_remote_object_from_url(
        &self,
        url: &str,
        title: &str,
        description: &str,
    ) -> ApiResponse {
        self.create_video(CreateVideoRequest {
            name: title.to_string(),
            description: description.to_string(),
            upload: UploadSpec::pull(url),
            privacy: None,
        })
        .await
    }

    #[instrument(skip(self, request), fields(size = request.size, privacy = %request.privacy))]
    async fn create_resumable_session(&self, request: &UploadSessionRequest) -> ApiResponse {
        let response = self
            .create_video(CreateVideoRequest {
                name: request.title.clone(),
                description: request.description.clone(),
                upload: UploadSpec::tus(request.size),
                privacy: PrivacySpec::from_view(request.privacy),
            })
            .await;

        if let Some(link) = response.str_at("/upload/upload_link") {
            debug!(
                upload_link = %redact_if_sensitive("upload_link", link),
                "Opened tus session"
            );
        }
        response
    }

    #[instrument(skip(self))]
    async fn add_to_container(&self, container_uri: &str, object_uri: &str) -> ApiResponse {
        let path = format!("{}{}", container_uri.trim_end_matches('/'), object_uri);
        self.api_request(HttpMethod::Put, &path).await
    }

    #[instrument(skip(self))]
    async fn get_object(&self, uri: &str) -> ApiResponse {
        self.api_request(HttpMethod::Get, uri).await
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, uri: &str) -> ApiResponse {
        let response = self.api_request(HttpMethod::Delete, uri).await;
        if response.success {
            info!("Deleted Vimeo video");
        }
        response
    }

    #[instrument(skip(self, session_url))]
    async fn get_upload_offset(&self, session_url: &str) -> OffsetProbe {
        match self.probe_offset(session_url).await {
            Ok(offset) => {
                debug!(offset, "Probed tus offset");
                OffsetProbe {
                    success: true,
                    offset,
                    status_code: 0,
                    error: String::new(),
                }
            }
            Err(e) => {
                warn!(error = %e, "tus offset probe failed");
                OffsetProbe {
                    success: false,
                    offset: 0,
                    status_code: match &e {
                        VimeoError::Api { status_code, .. } => *status_code,
                        _ => 0,
                    },
                    error: failure_message(&e),
                }
            }
        }
    }

    #[instrument(skip(self, session_url, chunk), fields(len = chunk.len()))]
    async fn patch_upload_chunk(
        &self,
        session_url: &str,
        chunk: Bytes,
        offset: u64,
    ) -> UploadReceipt {
        match self.patch_chunk(session_url, chunk, offset).await {
            Ok(new_offset) => UploadReceipt {
                success: true,
                offset: new_offset,
                error: String::new(),
            },
            Err(e) => {
                warn!(error = %e, "tus chunk rejected");
                UploadReceipt {
                    success: false,
                    offset,
                    error: failure_message(&e),
                }
            }
        }
    }
}
