use crate::api::DOWNLOAD_PATH;
use crate::error::DownloadError;
use crate::validate::{is_submittable, Platform};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs as tokiofs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Everything the download endpoint needs to start serving a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub platform: Platform,
    pub quality: String,
    pub format_id: Option<String>,
}

impl DownloadRequest {
    /// `None` unless both the URL and the quality are filled in.
    pub fn new(
        url: &str,
        platform: Platform,
        quality: Option<&str>,
        format_id: Option<&str>,
    ) -> Option<Self> {
        if !is_submittable(url, quality) {
            return None;
        }
        Some(Self {
            url: url.trim().to_string(),
            platform,
            quality: quality?.trim().to_string(),
            format_id: format_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        })
    }

    /// Form fields in submission order; `format_id` only when known.
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("url", self.url.as_str()),
            ("platform", self.platform.as_str()),
            ("quality", self.quality.as_str()),
        ];
        if let Some(id) = &self.format_id {
            fields.push(("format_id", id.as_str()));
        }
        fields
    }
}

/// `(total, done)` byte counters shared with the window.
pub type Progress = (Arc<AtomicUsize>, Arc<AtomicUsize>);

#[derive(Debug, Deserialize)]
struct JsonReply {
    error: Option<String>,
    message: Option<String>,
    path: Option<String>,
}

/// What came back from a submitted download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The served file, written locally.
    Saved(PathBuf),
    /// The server kept the file on its side and only acknowledged the request.
    Acknowledged(String),
}

#[derive(Debug, Clone)]
pub struct DownloadClient {
    http: Client,
    base: String,
}

impl DownloadClient {
    pub fn new(base: &str) -> Result<Self, DownloadError> {
        let http = Client::builder()
            .user_agent(concat!("vidgrab-desktop/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// Submit the form and save whatever the server serves into `out_dir`.
    pub async fn submit(
        &self,
        req: &DownloadRequest,
        out_dir: &Path,
        progress: Option<Progress>,
    ) -> Result<DownloadOutcome, DownloadError> {
        let endpoint = format!("{}{}", self.base, DOWNLOAD_PATH);
        info!(%endpoint, quality = %req.quality, format_id = ?req.format_id, "submitting download");
        let mut resp = self
            .http
            .post(&endpoint)
            .form(&req.form_fields())
            .send()
            .await?;

        let status = resp.status();
        if is_json(resp.headers()) {
            let body = resp.text().await?;
            let reply = serde_json::from_str::<JsonReply>(&body).ok();
            return match reply {
                Some(JsonReply {
                    error: Some(err), ..
                }) => Err(DownloadError::ServerReported(err)),
                Some(reply) if status.is_success() => {
                    let msg = match (reply.message, reply.path) {
                        (Some(m), Some(p)) => format!("{m} ({p})"),
                        (Some(m), None) => m,
                        (None, Some(p)) => p,
                        (None, None) => "Download accepted".to_string(),
                    };
                    Ok(DownloadOutcome::Acknowledged(msg))
                }
                _ => Err(DownloadError::ServerReported(format!(
                    "server answered {status} without a file"
                ))),
            };
        }
        resp.error_for_status_ref()?;

        let name = attachment_filename(resp.headers()).unwrap_or_else(|| fallback_name(req));
        tokiofs::create_dir_all(out_dir).await?;
        let out_file = free_path(out_dir, &name).await;
        let part_file = part_path(&out_file);
        debug!(path = %part_file.display(), "writing download");

        if let Some((total, done)) = &progress {
            let len = resp
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            total.store(len, Ordering::Relaxed);
            done.store(0, Ordering::Relaxed);
        }

        if let Err(err) = stream_to(&mut resp, &part_file, progress.as_ref()).await {
            warn!(path = %part_file.display(), error = %err, "download interrupted");
            if let Err(e) = tokiofs::remove_file(&part_file).await {
                debug!(path = %part_file.display(), error = %e, "could not remove partial file");
            }
            return Err(err);
        }
        tokiofs::rename(&part_file, &out_file).await?;
        info!(path = %out_file.display(), "download saved");
        Ok(DownloadOutcome::Saved(out_file))
    }
}

async fn stream_to(
    resp: &mut reqwest::Response,
    path: &Path,
    progress: Option<&Progress>,
) -> Result<(), DownloadError> {
    let mut file = tokiofs::File::create(path).await?;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        if let Some((total, done)) = progress {
            let now = done.fetch_add(chunk.len(), Ordering::Relaxed) + chunk.len();
            if now > total.load(Ordering::Relaxed) {
                total.store(now, Ordering::Relaxed);
            }
        }
    }
    file.flush().await?;
    Ok(())
}

/// `dir/name`, or `dir/stem (n).ext` for the first `n` not already taken.
async fn free_path(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(name);
    if !tokiofs::try_exists(&first).await.unwrap_or(false) {
        return first;
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if !tokiofs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        n += 1;
    }
}

fn part_path(out_file: &Path) -> PathBuf {
    let mut name = out_file.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

/// File name from `Content-Disposition`, preferring the RFC 5987 `filename*`
/// form. Always sanitised.
fn attachment_filename(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_DISPOSITION)?.to_str().ok()?;
    let mut plain = None;
    let mut extended = None;
    for part in value.split(';').map(str::trim) {
        if let Some(v) = part.strip_prefix("filename*=") {
            let encoded = v.splitn(3, '\'').nth(2).unwrap_or(v);
            extended = urlencoding::decode(encoded).ok().map(|s| s.into_owned());
        } else if let Some(v) = part.strip_prefix("filename=") {
            plain = Some(v.trim_matches('"').to_string());
        }
    }
    let name = sanitize_filename::sanitize(extended.or(plain)?);
    (!name.is_empty()).then_some(name)
}

fn fallback_name(req: &DownloadRequest) -> String {
    let ext = if req.quality == crate::options::AUDIO {
        "mp3"
    } else {
        "mp4"
    };
    sanitize_filename::sanitize(format!("{}_{}.{}", req.platform, req.quality, ext))
}
