use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// URLs shorter than this never trigger a preview.
pub const MIN_URL_LENGTH: usize = 10;

fn scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://").expect("valid scheme regex"))
}

/// Cheap client-side gate run before any preview or download request.
/// The server does its own, stricter validation.
pub fn is_valid_url(url: &str) -> bool {
    !url.is_empty() && url.len() >= MIN_URL_LENGTH && scheme_re().is_match(url)
}

/// A download can only be submitted with both a URL and a chosen quality.
pub fn is_submittable(url: &str, quality: Option<&str>) -> bool {
    !url.trim().is_empty() && quality.map(|q| !q.trim().is_empty()).unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Auto,
    YouTube,
    Facebook,
    TikTok,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Auto,
        Platform::YouTube,
        Platform::Facebook,
        Platform::TikTok,
    ];

    /// Name sent over the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Auto => "auto",
            Platform::YouTube => "youtube",
            Platform::Facebook => "facebook",
            Platform::TikTok => "tiktok",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Platform::Auto => "Auto detect",
            Platform::YouTube => "YouTube",
            Platform::Facebook => "Facebook",
            Platform::TikTok => "TikTok",
        }
    }

    fn domains(self) -> &'static [&'static str] {
        match self {
            Platform::Auto => &[],
            Platform::YouTube => &["youtube.com", "youtu.be", "m.youtube.com"],
            Platform::Facebook => &["facebook.com", "fb.com", "fb.watch", "m.facebook.com"],
            Platform::TikTok => &["tiktok.com", "vm.tiktok.com", "m.tiktok.com"],
        }
    }

    /// Guess the platform from the URL's host. Returns `None` for hosts the
    /// service is not known to support.
    pub fn detect(url: &str) -> Option<Platform> {
        let rest = url
            .trim()
            .strip_prefix("https://")
            .or_else(|| url.trim().strip_prefix("http://"))?;
        let host = rest
            .split(|c: char| c == '/' || c == '?' || c == '#')
            .next()?
            .split(':')
            .next()?
            .to_ascii_lowercase();
        Platform::ALL.into_iter().find(|p| {
            p.domains()
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
