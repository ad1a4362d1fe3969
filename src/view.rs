//! Pure mapping from a server preview to what the window shows.

use crate::api::{PreviewData, FFMPEG_HELP_PATH};
use crate::options::{build_quality_options, needs_transcoder_notice, QualityGroups};

const DEFAULT_TITLE: &str = "Video";

#[derive(Debug, Clone, PartialEq)]
pub enum Media {
    /// Embeddable player page. Preferred when the server has one.
    Embed(String),
    Thumbnail { src: String, alt: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detail {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderNotice {
    pub text: &'static str,
    pub help_path: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewView {
    pub title: String,
    pub is_shorts: bool,
    pub media: Option<Media>,
    pub details: Vec<Detail>,
    pub qualities: QualityGroups,
    /// Value of the option selected when the preview appears.
    pub selected: String,
    pub notice: Option<TranscoderNotice>,
}

impl PreviewView {
    /// `local_transcoder` is consulted only when the server did not say whether
    /// it has FFmpeg.
    pub fn build(data: &PreviewData, local_transcoder: bool) -> Self {
        let qualities = build_quality_options(data);
        let selected = qualities
            .first()
            .map(|o| o.value.clone())
            .unwrap_or_default();

        let title = data
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_string();

        let media = match (non_empty(&data.embed_url), non_empty(&data.thumbnail)) {
            (Some(embed), _) => Some(Media::Embed(embed.to_string())),
            (None, Some(src)) => Some(Media::Thumbnail {
                src: src.to_string(),
                alt: title.clone(),
            }),
            (None, None) => None,
        };

        let mut details = Vec::new();
        if let Some(uploader) = non_empty(&data.uploader) {
            details.push(Detail {
                label: "Uploader",
                value: uploader.to_string(),
            });
        }
        if let Some(secs) = data.duration.filter(|d| *d > 0.0) {
            details.push(Detail {
                label: "Duration",
                value: format_duration(secs as u64),
            });
        }
        if let Some(views) = data.view_count.filter(|v| *v > 0) {
            details.push(Detail {
                label: "Views",
                value: format_count(views),
            });
        }

        let transcoder = data.ffmpeg_installed.unwrap_or(local_transcoder);
        let notice = needs_transcoder_notice(&qualities, transcoder).then_some(TranscoderNotice {
            text: "To download the best quality, install FFmpeg",
            help_path: FFMPEG_HELP_PATH,
        });

        Self {
            title,
            is_shorts: data.is_shorts.unwrap_or(false),
            media,
            details,
            qualities,
            selected,
            notice,
        }
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// `h:mm:ss` when at least an hour long, `m:ss` otherwise.
pub fn format_duration(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Group digits by thousands: `1234567` -> `1,234,567`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn counts() {
        assert_eq!(format_count(7), "7");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn embed_wins_over_thumbnail() {
        let data = PreviewData {
            title: Some("T".into()),
            embed_url: Some("https://www.youtube.com/embed/abc".into()),
            thumbnail: Some("https://i.ytimg.com/vi/abc/hq.jpg".into()),
            available_resolutions: Some(vec![720]),
            ..Default::default()
        };
        let v = PreviewView::build(&data, true);
        assert_eq!(v.media, Some(Media::Embed("https://www.youtube.com/embed/abc".into())));

        let data = PreviewData {
            embed_url: Some(" ".into()),
            ..data
        };
        let v = PreviewView::build(&data, true);
        assert!(matches!(v.media, Some(Media::Thumbnail { ref alt, .. }) if alt == "T"));
    }

    #[test]
    fn details_skip_missing_fields() {
        let data = PreviewData {
            uploader: Some("Chan".into()),
            duration: Some(125.0),
            view_count: Some(0),
            available_resolutions: Some(vec![360]),
            ..Default::default()
        };
        let v = PreviewView::build(&data, true);
        assert_eq!(v.title, "Video");
        assert_eq!(
            v.details,
            vec![
                Detail {
                    label: "Uploader",
                    value: "Chan".into()
                },
                Detail {
                    label: "Duration",
                    value: "2:05".into()
                },
            ]
        );
    }

    #[test]
    fn first_option_is_selected() {
        let data = PreviewData {
            available_resolutions: Some(vec![1080, 720, 480]),
            ..Default::default()
        };
        let v = PreviewView::build(&data, true);
        assert_eq!(v.selected, "1080");
    }

    #[test]
    fn server_capability_overrides_local_lookup() {
        let mut data = PreviewData {
            available_resolutions: Some(vec![1080]),
            ..Default::default()
        };
        assert!(PreviewView::build(&data, false).notice.is_some());
        assert!(PreviewView::build(&data, true).notice.is_none());

        data.ffmpeg_installed = Some(true);
        assert!(PreviewView::build(&data, false).notice.is_none());
        data.ffmpeg_installed = Some(false);
        let notice = PreviewView::build(&data, true).notice.unwrap();
        assert_eq!(notice.help_path, "/ffmpeg-help");
    }

    #[test]
    fn preview_without_resolutions_still_shows() {
        let data = PreviewData {
            title: Some("TikTok Video".into()),
            thumbnail: Some("https://example.com/t.jpg".into()),
            ..Default::default()
        };
        let v = PreviewView::build(&data, true);
        assert_eq!(v.title, "TikTok Video");
        assert_eq!(v.selected, "best");
        assert!(matches!(v.media, Some(Media::Thumbnail { .. })));
    }
}
