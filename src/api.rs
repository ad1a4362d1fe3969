use crate::error::PreviewError;
use crate::validate::Platform;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

pub const PREVIEW_PATH: &str = "/api/preview";
pub const DOWNLOAD_PATH: &str = "/api/download";
pub const FFMPEG_HELP_PATH: &str = "/ffmpeg-help";

const USER_AGENT: &str = concat!("vidgrab-desktop/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct PreviewRequest<'a> {
    url: &'a str,
    platform: Platform,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<PreviewData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PreviewData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub embed_url: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub is_shorts: Option<bool>,
    #[serde(default)]
    pub available_resolutions: Option<Vec<u32>>,
    /// Keyed by vertical resolution; JSON object keys are the decimal strings.
    #[serde(default)]
    pub format_detail: Option<BTreeMap<u32, FormatDetail>>,
    #[serde(default)]
    pub ffmpeg_installed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FormatDetail {
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
}

impl PreviewData {
    pub fn format_for(&self, resolution: u32) -> Option<&FormatDetail> {
        self.format_detail.as_ref()?.get(&resolution)
    }

    /// Resolutions in server order. Falls back to the `format_detail` keys,
    /// highest first, when the server sent no explicit list.
    pub fn resolutions(&self) -> Vec<u32> {
        match &self.available_resolutions {
            Some(list) if !list.is_empty() => list.clone(),
            _ => self
                .format_detail
                .as_ref()
                .map(|m| m.keys().rev().copied().collect())
                .unwrap_or_default(),
        }
    }
}

impl PreviewResponse {
    /// Turn the envelope into the data to show, or the reason there is none.
    /// A reply without a resolution list is still a preview.
    pub fn into_result(self) -> Result<PreviewData, PreviewError> {
        if let Some(err) = self.error.filter(|e| !e.trim().is_empty()) {
            return Err(PreviewError::ServerReported(err));
        }
        self.data.ok_or(PreviewError::EmptyResult)
    }
}

/// Talks to the preview endpoint of the downloader service.
#[derive(Debug, Clone)]
pub struct PreviewClient {
    http: Client,
    base: String,
}

impl PreviewClient {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, PreviewError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub async fn preview(&self, url: &str, platform: Platform) -> Result<PreviewData, PreviewError> {
        let endpoint = format!("{}{}", self.base, PREVIEW_PATH);
        debug!(%endpoint, %platform, "requesting preview");
        // The service answers errors with 4xx/5xx and an `{error}` body, so the
        // status code alone is not checked.
        let resp = self
            .http
            .post(&endpoint)
            .json(&PreviewRequest { url, platform })
            .send()
            .await?;
        let status = resp.status();
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false);
        let body = resp.text().await?;
        if is_html || looks_like_html(&body) {
            let title = page_title(&body).unwrap_or_else(|| status.to_string());
            warn!(%status, %title, "preview endpoint answered with an HTML page");
            return Err(PreviewError::UnexpectedPage(title));
        }
        let parsed: PreviewResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(%status, error = %e, "could not decode preview response");
            e
        })?;
        parsed.into_result()
    }
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start();
    head.starts_with('<')
}

/// Title of an HTML page, e.g. the login page a session-less request is
/// redirected to.
fn page_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse("title").ok()?;
    let title = doc
        .select(&sel)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreviewErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PreviewClient {
        PreviewClient::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn format_detail_keys_parse_as_resolutions() {
        let resp: PreviewResponse = serde_json::from_value(json!({
            "data": {
                "title": "T",
                "available_resolutions": [1080],
                "format_detail": {"1080": {"format_id": "137", "ext": "mp4", "fps": 30}}
            }
        }))
        .unwrap();
        let data = resp.into_result().unwrap();
        let f = data.format_for(1080).unwrap();
        assert_eq!(f.format_id.as_deref(), Some("137"));
        assert_eq!(f.fps, Some(30.0));
    }

    #[test]
    fn resolutions_fall_back_to_format_detail_keys() {
        let data: PreviewData = serde_json::from_value(json!({
            "format_detail": {"360": {}, "1080": {}, "720": {}}
        }))
        .unwrap();
        assert_eq!(data.resolutions(), vec![1080, 720, 360]);
    }

    #[test]
    fn only_missing_data_is_empty_result() {
        let resp = PreviewResponse::default();
        assert!(matches!(resp.into_result(), Err(PreviewError::EmptyResult)));
    }

    #[test]
    fn data_without_resolutions_is_still_a_preview() {
        let resp: PreviewResponse = serde_json::from_value(json!({
            "data": {
                "title": "TikTok Video",
                "thumbnail": "https://example.com/t.jpg",
                "qualities": [{"format_id": "h264_540p", "ext": "mp4"}]
            }
        }))
        .unwrap();
        let data = resp.into_result().unwrap();
        assert_eq!(data.title.as_deref(), Some("TikTok Video"));
        assert!(data.resolutions().is_empty());

        let resp: PreviewResponse =
            serde_json::from_value(json!({"data": {"available_resolutions": []}})).unwrap();
        assert!(resp.into_result().is_ok());
    }

    #[test]
    fn blank_error_string_is_not_an_error() {
        let resp: PreviewResponse = serde_json::from_value(
            json!({"error": "", "data": {"available_resolutions": [720]}}),
        )
        .unwrap();
        assert!(resp.into_result().is_ok());
    }

    #[tokio::test]
    async fn posts_json_and_returns_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/preview"))
            .and(body_json(json!({
                "url": "https://example.com/watch?v=abc123",
                "platform": "youtube"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"title": "T", "available_resolutions": [1080]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let data = client(&server)
            .preview("https://example.com/watch?v=abc123", Platform::YouTube)
            .await
            .unwrap();
        assert_eq!(data.title.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn server_error_is_reported_verbatim_even_on_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/preview"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "X"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .preview("https://example.com/watch?v=abc123", Platform::Auto)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), PreviewErrorKind::ServerReported);
        assert_eq!(err.to_string(), "X");
    }

    #[tokio::test]
    async fn garbage_body_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .preview("https://example.com/watch?v=abc123", Platform::Auto)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), PreviewErrorKind::Transport);
    }

    #[tokio::test]
    async fn html_page_names_its_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><head><title>Login</title></head></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .preview("https://example.com/watch?v=abc123", Platform::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewError::UnexpectedPage(ref t) if t == "Login"));
        assert_eq!(err.kind(), PreviewErrorKind::Transport);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_failure() {
        // Nothing listens on port 9 on a test box.
        let c = PreviewClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = c
            .preview("https://example.com/watch?v=abc123", Platform::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewError::Transport(_)));
    }
}
