//! Front-end helpers for synced videos: player embeds, HLS links and
//! human-readable sync status.

use bridge_traits::video_host::DeliveredFile;

const PLAYER_BASE_URL: &str = "https://player.vimeo.com/video";

/// Player flags appended to the embed URL. Unset flags are left to the
/// player's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedOptions {
    pub autoplay: Option<bool>,
    pub loop_playback: Option<bool>,
    pub muted: Option<bool>,
    pub title: Option<bool>,
    pub byline: Option<bool>,
    pub portrait: Option<bool>,
}

impl EmbedOptions {
    fn query_pairs(&self) -> Vec<(&'static str, u8)> {
        [
            ("autoplay", self.autoplay),
            ("loop", self.loop_playback),
            ("muted", self.muted),
            ("title", self.title),
            ("byline", self.byline),
            ("portrait", self.portrait),
        ]
        .into_iter()
        .filter_map(|(key, flag)| flag.map(|on| (key, u8::from(on))))
        .collect()
    }
}

/// Player URL for a numeric video id, `None` when the id is empty.
pub fn embed_url(video_id: &str, options: &EmbedOptions) -> Option<String> {
    let video_id = video_id.trim();
    if video_id.is_empty() {
        return None;
    }

    let query = options
        .query_pairs()
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        Some(format!("{}/{}", PLAYER_BASE_URL, video_id))
    } else {
        Some(format!("{}/{}?{}", PLAYER_BASE_URL, video_id, query))
    }
}

/// `<iframe>` markup for the player.
pub fn embed_html(
    video_id: &str,
    options: &EmbedOptions,
    width: u32,
    height: u32,
) -> Option<String> {
    let src = embed_url(video_id, options)?.replace('&', "&amp;");
    Some(format!(
        r#"<iframe src="{}" width="{}" height="{}" frameborder="0" allow="autoplay; fullscreen; picture-in-picture" allowfullscreen></iframe>"#,
        src, width, height
    ))
}

/// First delivered file with `quality == "hls"` and a link.
pub fn hls_link(files: &[DeliveredFile]) -> Option<&str> {
    files
        .iter()
        .filter(|file| file.quality.as_deref() == Some("hls"))
        .find_map(|file| file.link.as_deref().filter(|link| !link.is_empty()))
}

pub fn status_label(status: &str) -> String {
    match status {
        "queued" => "Queued".to_string(),
        "uploading" => "Uploading".to_string(),
        "processing" => "Processing".to_string(),
        "ready" => "Ready".to_string(),
        "error" => "Error".to_string(),
        "" => "Unknown".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_url_without_options() {
        assert_eq!(
            embed_url("555", &EmbedOptions::default()).as_deref(),
            Some("https://player.vimeo.com/video/555")
        );
        assert_eq!(embed_url("  ", &EmbedOptions::default()), None);
    }

    #[test]
    fn test_embed_url_only_includes_set_flags() {
        let options = EmbedOptions {
            autoplay: Some(true),
            loop_playback: Some(false),
            portrait: Some(true),
            ..Default::default()
        };

        assert_eq!(
            embed_url("555", &options).as_deref(),
            Some("https://player.vimeo.com/video/555?autoplay=1&loop=0&portrait=1")
        );
    }

    #[test]
    fn test_embed_html_escapes_query() {
        let options = EmbedOptions {
            autoplay: Some(true),
            muted: Some(true),
            ..Default::default()
        };
        let html = embed_html("555", &options, 640, 360).unwrap();

        assert!(html.contains("autoplay=1&amp;muted=1"));
        assert!(html.contains(r#"width="640""#));
        assert!(embed_html("", &options, 640, 360).is_none());
    }

    #[test]
    fn test_hls_link() {
        let files = vec![
            DeliveredFile {
                quality: Some("hd".to_string()),
                link: Some("https://cdn.example.com/hd.mp4".to_string()),
                ..Default::default()
            },
            DeliveredFile {
                quality: Some("hls".to_string()),
                link: Some(String::new()),
                ..Default::default()
            },
            DeliveredFile {
                quality: Some("hls".to_string()),
                link: Some("https://cdn.example.com/master.m3u8".to_string()),
                ..Default::default()
            },
        ];

        assert_eq!(hls_link(&files), Some("https://cdn.example.com/master.m3u8"));
        assert_eq!(hls_link(&files[..1]), None);
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label("ready"), "Ready");
        assert_eq!(status_label("processing"), "Processing");
        assert_eq!(status_label("missing_token"), "Missing_token");
        assert_eq!(status_label(""), "Unknown");
    }
}
