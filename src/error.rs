use thiserror::Error;

/// Why a preview attempt did not produce something to show.
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Please enter a valid video URL (http:// or https://)")]
    Validation,
    /// Shown to the user verbatim.
    #[error("{0}")]
    ServerReported(String),
    #[error("Something went wrong while processing the request")]
    Transport(#[from] reqwest::Error),
    #[error("Something went wrong while processing the request")]
    Decode(#[from] serde_json::Error),
    #[error("Something went wrong while processing the request ({0})")]
    UnexpectedPage(String),
    #[error("No quality or format found for this video")]
    EmptyResult,
}

impl PreviewError {
    pub fn kind(&self) -> PreviewErrorKind {
        match self {
            PreviewError::Validation => PreviewErrorKind::Validation,
            PreviewError::ServerReported(_) => PreviewErrorKind::ServerReported,
            PreviewError::Transport(_)
            | PreviewError::Decode(_)
            | PreviewError::UnexpectedPage(_) => PreviewErrorKind::Transport,
            PreviewError::EmptyResult => PreviewErrorKind::EmptyResult,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewErrorKind {
    Validation,
    ServerReported,
    Transport,
    EmptyResult,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    ServerReported(String),
    #[error("could not write download: {0}")]
    Io(#[from] std::io::Error),
}
