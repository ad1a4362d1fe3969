//! Preview-and-download state machine.
//!
//! The controller owns the user's input and decides what the window shows; it
//! never touches widgets directly but drives a [`PreviewSurface`]. Network work
//! happens outside: [`Controller::begin_preview`] hands out a ticket, the caller
//! runs [`fetch`] wherever it likes and feeds the result back through
//! [`Controller::complete_preview`]. Every ticket carries a sequence number and
//! only the latest one is applied, so a slow response can never overwrite a
//! newer one.

use crate::api::{PreviewClient, PreviewData};
use crate::download::DownloadRequest;
use crate::error::{PreviewError, PreviewErrorKind};
use crate::validate::{is_valid_url, Platform};
use crate::view::PreviewView;
use tracing::{debug, info, warn};

/// What the controller needs from the window.
#[cfg_attr(test, mockall::automock)]
pub trait PreviewSurface {
    /// Empty the preview area and the quality selector.
    fn clear(&mut self);
    fn show_loading(&mut self);
    fn show_error(&mut self, message: &str);
    fn show_preview(&mut self, view: &PreviewView);
    fn set_download_enabled(&mut self, enabled: bool);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    pub url: String,
    pub platform: Platform,
    pub selected_quality: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    Loading,
    Previewed,
    Errored,
}

/// What started a preview attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Debounced URL edit. Invalid input is ignored quietly.
    Typing,
    /// Platform changed while a URL was present.
    PlatformChange,
    /// The preview button. Invalid input is reported.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewTicket {
    pub seq: u64,
    pub url: String,
    pub platform: Platform,
}

/// Result of a fetch, tagged with the ticket it answers.
#[derive(Debug)]
pub struct PreviewCompletion {
    pub seq: u64,
    pub result: Result<PreviewData, PreviewError>,
}

pub async fn fetch(client: &PreviewClient, ticket: PreviewTicket) -> PreviewCompletion {
    let result = client.preview(&ticket.url, ticket.platform).await;
    PreviewCompletion {
        seq: ticket.seq,
        result,
    }
}

pub struct Controller<S> {
    surface: S,
    input: InputState,
    state: PreviewState,
    latest: u64,
    live: Option<PreviewView>,
    local_transcoder: bool,
}

impl<S: PreviewSurface> Controller<S> {
    /// `local_transcoder` says whether FFmpeg was found on this machine; it is
    /// used when the server does not report its own capability.
    pub fn new(surface: S, local_transcoder: bool) -> Self {
        Self {
            surface,
            input: InputState::default(),
            state: PreviewState::Idle,
            latest: 0,
            live: None,
            local_transcoder,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn set_url(&mut self, url: &str) {
        self.input.url = url.to_string();
    }

    /// Returns true when the change should re-run the preview right away.
    pub fn set_platform(&mut self, platform: Platform) -> bool {
        let changed = self.input.platform != platform;
        self.input.platform = platform;
        changed && !self.input.url.is_empty()
    }

    pub fn select_quality(&mut self, value: &str) {
        self.input.selected_quality = Some(value.to_string());
    }

    /// Reset the preview area and, if the input is usable, enter `Loading`.
    ///
    /// Any response still in flight is superseded, whether or not a new
    /// request is issued.
    pub fn begin_preview(&mut self, trigger: Trigger) -> Option<PreviewTicket> {
        self.latest += 1;
        self.live = None;
        self.input.selected_quality = None;
        self.surface.clear();
        self.surface.set_download_enabled(false);

        let url = self.input.url.trim().to_string();
        if !is_valid_url(&url) {
            debug!(?trigger, "input not previewable");
            if trigger == Trigger::Explicit {
                self.surface.show_error(&PreviewError::Validation.to_string());
                self.state = PreviewState::Errored;
            } else {
                self.state = PreviewState::Idle;
            }
            return None;
        }

        self.state = PreviewState::Loading;
        self.surface.show_loading();
        info!(seq = self.latest, ?trigger, platform = %self.input.platform, "preview requested");
        Some(PreviewTicket {
            seq: self.latest,
            url,
            platform: self.input.platform,
        })
    }

    /// Apply a finished fetch. Returns false when the response was stale and
    /// got dropped.
    pub fn complete_preview(&mut self, done: PreviewCompletion) -> bool {
        if done.seq != self.latest || self.state != PreviewState::Loading {
            debug!(seq = done.seq, latest = self.latest, "dropping stale preview response");
            return false;
        }

        let view = done
            .result
            .map(|data| PreviewView::build(&data, self.local_transcoder));
        match view {
            Ok(view) => {
                info!(seq = done.seq, title = %view.title, "preview ready");
                self.input.selected_quality = Some(view.selected.clone());
                self.surface.show_preview(&view);
                self.surface.set_download_enabled(true);
                self.live = Some(view);
                self.state = PreviewState::Previewed;
            }
            Err(err) => {
                match err.kind() {
                    PreviewErrorKind::Transport => {
                        warn!(seq = done.seq, error = ?err, "preview request failed")
                    }
                    _ => info!(seq = done.seq, error = %err, "preview rejected"),
                }
                self.surface.show_error(&err.to_string());
                self.surface.set_download_enabled(false);
                self.state = PreviewState::Errored;
            }
        }
        true
    }

    /// Download request for the currently selected quality, or `None` when
    /// the URL or the quality is missing.
    pub fn download_request(&self) -> Option<DownloadRequest> {
        let quality = self.input.selected_quality.as_deref();
        let format_id = quality
            .and_then(|q| self.live.as_ref()?.qualities.find(q))
            .and_then(|o| o.format_id.as_deref());
        DownloadRequest::new(&self.input.url, self.input.platform, quality, format_id)
    }

    /// A quality button was clicked: select it and build its request.
    pub fn download_quality(&mut self, value: &str) -> Option<DownloadRequest> {
        self.select_quality(value);
        self.download_request()
    }
}
