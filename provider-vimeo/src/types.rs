//! Vimeo API wire types
//!
//! Request bodies and the list envelope used by the project search. Response
//! objects the sync core reads (`RemoteVideo`, `RemoteContainer`) live in
//! `bridge_traits::video_host`.

use bridge_traits::{PrivacyView, RemoteContainer};
use serde::{Deserialize, Serialize};

/// `POST /me/videos` body
///
/// See: https://developer.vimeo.com/api/reference/videos#upload_video
#[derive(Debug, Clone, Serialize)]
pub struct CreateVideoRequest {
    pub name: String,
    pub description: String,
    pub upload: UploadSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy: Option<PrivacySpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSpec {
    /// `pull` or `tus`
    pub approach: String,
    /// Source URL for pull ingestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Exact byte size for tus sessions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl UploadSpec {
    pub fn pull(link: impl Into<String>) -> Self {
        Self {
            approach: "pull".to_string(),
            link: Some(link.into()),
            size: None,
        }
    }

    pub fn tus(size: u64) -> Self {
        Self {
            approach: "tus".to_string(),
            link: None,
            size: Some(size),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PrivacySpec {
    pub view: String,
}

impl PrivacySpec {
    /// `None` for [`PrivacyView::Default`], which must leave the field out.
    pub fn from_view(view: PrivacyView) -> Option<Self> {
        privacy_wire_value(view).map(|view| Self {
            view: view.to_string(),
        })
    }
}

/// Map a privacy setting to the value of Vimeo's `privacy.view` field.
pub fn privacy_wire_value(view: PrivacyView) -> Option<&'static str> {
    match view {
        PrivacyView::Default => None,
        PrivacyView::Unlisted => Some("unlisted"),
        PrivacyView::Public => Some("anybody"),
        PrivacyView::Private => Some("nobody"),
    }
}

/// `POST /me/projects` body
#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// One page of `GET /me/projects`
#[derive(Debug, Deserialize)]
pub struct ProjectPage {
    #[serde(default)]
    pub data: Vec<RemoteContainer>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    /// Path of the next page, `null` on the last one
    #[serde(default)]
    pub next: Option<String>,
}

impl ProjectPage {
    pub fn next_page(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|next| !next.is_empty())
    }
}
