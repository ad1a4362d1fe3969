use crate::api::PreviewData;

/// Resolutions at or above this go into the high-quality group.
pub const HIGH_MIN: u32 = 720;
/// Lowest resolution offered in the standard group.
pub const STANDARD_MIN: u32 = 360;

pub const BEST: &str = "best";
pub const ORIGINAL: &str = "original";
pub const AUDIO: &str = "audio";
const STANDARD_PLACEHOLDER: u32 = 480;
const DEFAULT_EXT: &str = "mp4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityGroup {
    High,
    Standard,
    Special,
}

impl QualityGroup {
    pub fn heading(self) -> &'static str {
        match self {
            QualityGroup::High => "High quality",
            QualityGroup::Standard => "Standard quality",
            QualityGroup::Special => "Other options",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOption {
    /// Sent as `quality`: a resolution, `best`, `original` or `audio`.
    pub value: String,
    pub label: String,
    pub format_id: Option<String>,
}

impl QualityOption {
    fn plain(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            format_id: None,
        }
    }

    pub fn needs_transcoder(&self) -> bool {
        self.value != BEST
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QualityGroups {
    pub high: Vec<QualityOption>,
    pub standard: Vec<QualityOption>,
    pub special: Vec<QualityOption>,
}

impl QualityGroups {
    pub fn groups(&self) -> [(QualityGroup, &[QualityOption]); 3] {
        [
            (QualityGroup::High, self.high.as_slice()),
            (QualityGroup::Standard, self.standard.as_slice()),
            (QualityGroup::Special, self.special.as_slice()),
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = &QualityOption> {
        self.high
            .iter()
            .chain(self.standard.iter())
            .chain(self.special.iter())
    }

    pub fn first(&self) -> Option<&QualityOption> {
        self.iter().next()
    }

    pub fn find(&self, value: &str) -> Option<&QualityOption> {
        self.iter().find(|o| o.value == value)
    }
}

fn fps_label(fps: f64) -> String {
    if fps.fract() == 0.0 {
        format!("{}fps", fps as u64)
    } else {
        format!("{fps}fps")
    }
}

fn resolution_option(data: &PreviewData, res: u32, with_fps: bool) -> QualityOption {
    let detail = data.format_for(res);
    let ext = detail
        .and_then(|d| d.ext.as_deref())
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EXT);
    let fps = detail
        .and_then(|d| d.fps)
        .filter(|f| with_fps && *f > 0.0)
        .map(fps_label);
    let label = match fps {
        Some(fps) => format!("{res}p {fps} ({ext})"),
        None => format!("{res}p ({ext})"),
    };
    QualityOption {
        value: res.to_string(),
        label,
        format_id: detail
            .and_then(|d| d.format_id.clone())
            .filter(|id| !id.is_empty()),
    }
}

/// Build the grouped options offered for a preview.
///
/// With a resolution list the two resolution groups hold exactly what the
/// server listed, possibly nothing. Without one (TikTok and Facebook send
/// none) each gets a single placeholder: `best` and `480`.
pub fn build_quality_options(data: &PreviewData) -> QualityGroups {
    let resolutions = data.resolutions();
    let (high, standard) = if resolutions.is_empty() {
        (
            vec![QualityOption::plain(BEST, "Highest quality")],
            vec![QualityOption::plain(
                STANDARD_PLACEHOLDER.to_string(),
                format!("{STANDARD_PLACEHOLDER}p"),
            )],
        )
    } else {
        (
            resolutions
                .iter()
                .filter(|r| **r >= HIGH_MIN)
                .map(|r| resolution_option(data, *r, true))
                .collect(),
            resolutions
                .iter()
                .filter(|r| (STANDARD_MIN..HIGH_MIN).contains(*r))
                .map(|r| resolution_option(data, *r, false))
                .collect(),
        )
    };

    let special = vec![
        QualityOption::plain(ORIGINAL, "Original format"),
        QualityOption::plain(AUDIO, "MP3 (audio only)"),
    ];

    QualityGroups {
        high,
        standard,
        special,
    }
}

/// Whether the "install FFmpeg" advisory should be shown next to the selector.
pub fn needs_transcoder_notice(groups: &QualityGroups, transcoder_available: bool) -> bool {
    !transcoder_available && groups.iter().any(QualityOption::needs_transcoder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FormatDetail;
    use std::collections::BTreeMap;

    fn data(resolutions: &[u32]) -> PreviewData {
        PreviewData {
            available_resolutions: Some(resolutions.to_vec()),
            ..Default::default()
        }
    }

    fn values(opts: &[QualityOption]) -> Vec<&str> {
        opts.iter().map(|o| o.value.as_str()).collect()
    }

    #[test]
    fn buckets_follow_server_order() {
        let g = build_quality_options(&data(&[360, 480, 720, 1080]));
        assert_eq!(values(&g.high), vec!["720", "1080"]);
        assert_eq!(values(&g.standard), vec!["360", "480"]);
        assert!(g
            .high
            .iter()
            .chain(g.standard.iter())
            .all(|o| o.label.ends_with("(mp4)")));
        assert!(g.high.iter().all(|o| o.format_id.is_none()));
    }

    #[test]
    fn descending_server_order_is_kept() {
        let g = build_quality_options(&data(&[2160, 1080, 480, 360, 240]));
        assert_eq!(values(&g.high), vec!["2160", "1080"]);
        assert_eq!(values(&g.standard), vec!["480", "360"]);
    }

    #[test]
    fn format_detail_adds_id_fps_and_ext() {
        let mut detail = BTreeMap::new();
        detail.insert(
            1080,
            FormatDetail {
                format_id: Some("137".into()),
                ext: Some("webm".into()),
                fps: Some(60.0),
            },
        );
        detail.insert(
            480,
            FormatDetail {
                format_id: Some("135".into()),
                ext: None,
                fps: Some(30.0),
            },
        );
        let d = PreviewData {
            available_resolutions: Some(vec![1080, 480]),
            format_detail: Some(detail),
            ..Default::default()
        };
        let g = build_quality_options(&d);
        assert_eq!(g.high[0].label, "1080p 60fps (webm)");
        assert_eq!(g.high[0].format_id.as_deref(), Some("137"));
        // standard entries never carry the frame rate
        assert_eq!(g.standard[0].label, "480p (mp4)");
        assert_eq!(g.standard[0].format_id.as_deref(), Some("135"));
    }

    #[test]
    fn fractional_fps_is_kept() {
        let mut detail = BTreeMap::new();
        detail.insert(
            720,
            FormatDetail {
                format_id: None,
                ext: Some("mp4".into()),
                fps: Some(29.97),
            },
        );
        let d = PreviewData {
            available_resolutions: Some(vec![720]),
            format_detail: Some(detail),
            ..Default::default()
        };
        let g = build_quality_options(&d);
        assert_eq!(g.high[0].label, "720p 29.97fps (mp4)");
    }

    #[test]
    fn listed_resolutions_get_no_placeholders() {
        let g = build_quality_options(&data(&[1080]));
        assert_eq!(values(&g.high), vec!["1080"]);
        assert!(g.standard.is_empty());

        let g = build_quality_options(&data(&[240]));
        assert!(g.high.is_empty());
        assert!(g.standard.is_empty());
        assert_eq!(g.first().map(|o| o.value.as_str()), Some(ORIGINAL));
    }

    #[test]
    fn no_resolution_list_gets_placeholders() {
        // what a TikTok or Facebook preview looks like
        let d = PreviewData {
            title: Some("TikTok Video".into()),
            thumbnail: Some("https://example.com/t.jpg".into()),
            ..Default::default()
        };
        let g = build_quality_options(&d);
        assert_eq!(values(&g.high), vec![BEST]);
        assert_eq!(g.high[0].label, "Highest quality");
        assert_eq!(values(&g.standard), vec!["480"]);
        assert_eq!(g.standard[0].label, "480p");
        assert_eq!(values(&g.special), vec![ORIGINAL, AUDIO]);

        let g = build_quality_options(&data(&[]));
        assert_eq!(values(&g.high), vec![BEST]);
        assert_eq!(values(&g.standard), vec!["480"]);
    }

    #[test]
    fn special_options_always_present() {
        let g = build_quality_options(&data(&[720]));
        assert_eq!(values(&g.special), vec![ORIGINAL, AUDIO]);
        assert_eq!(g.first().map(|o| o.value.as_str()), Some("720"));
        assert!(g.find(AUDIO).is_some());
    }

    #[test]
    fn notice_only_without_transcoder() {
        let g = build_quality_options(&data(&[1080]));
        assert!(needs_transcoder_notice(&g, false));
        assert!(!needs_transcoder_notice(&g, true));

        let only_best = QualityGroups {
            high: vec![QualityOption::plain(BEST, "Highest quality")],
            ..Default::default()
        };
        assert!(!needs_transcoder_notice(&only_best, false));
    }
}
