use crate::api::PreviewClient;
use crate::controller::{Controller, PreviewState, PreviewSurface};
use crate::download::{DownloadClient, DownloadOutcome, DownloadRequest, Progress};
use crate::session::PreviewSession;
use crate::settings::{normalize_server, AppSettings};
use crate::validate::Platform;
use crate::view::{Media, PreviewView};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{info, warn};

const LABEL_COLUMN_WIDTH: f32 = 110.0;

/// What the preview area currently shows. The controller drives it through
/// [`PreviewSurface`]; `update` only reads it.
#[derive(Default)]
struct PreviewPane {
    loading: bool,
    error: Option<String>,
    preview: Option<PreviewView>,
    download_enabled: bool,
}

impl PreviewSurface for PreviewPane {
    fn clear(&mut self) {
        self.loading = false;
        self.error = None;
        self.preview = None;
    }

    fn show_loading(&mut self) {
        self.loading = true;
    }

    fn show_error(&mut self, message: &str) {
        self.loading = false;
        self.error = Some(message.to_string());
    }

    fn show_preview(&mut self, view: &PreviewView) {
        self.loading = false;
        self.error = None;
        self.preview = Some(view.clone());
    }

    fn set_download_enabled(&mut self, enabled: bool) {
        self.download_enabled = enabled;
    }
}

struct DownloadDone {
    id: usize,
    result: Result<DownloadOutcome, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum DownloadStatus {
    Running,
    Finished(DownloadOutcome),
    Failed(String),
}

impl DownloadStatus {
    fn is_running(&self) -> bool {
        matches!(self, DownloadStatus::Running)
    }

    fn text(&self) -> String {
        match self {
            DownloadStatus::Running => "Downloading".to_string(),
            DownloadStatus::Finished(DownloadOutcome::Saved(path)) => {
                format!("Done: {}", path.display())
            }
            DownloadStatus::Finished(DownloadOutcome::Acknowledged(msg)) => format!("Done: {msg}"),
            DownloadStatus::Failed(e) => format!("Failed: {e}"),
        }
    }

    fn color(&self) -> egui::Color32 {
        match self {
            DownloadStatus::Running => egui::Color32::YELLOW,
            DownloadStatus::Finished(_) => egui::Color32::GREEN,
            DownloadStatus::Failed(_) => egui::Color32::RED,
        }
    }
}

impl From<Result<DownloadOutcome, String>> for DownloadStatus {
    fn from(result: Result<DownloadOutcome, String>) -> Self {
        match result {
            Ok(outcome) => DownloadStatus::Finished(outcome),
            Err(e) => DownloadStatus::Failed(e),
        }
    }
}

struct DownloadEntry {
    label: String,
    status: DownloadStatus,
    progress: Progress,
}

pub struct VidgrabApp {
    rt: Arc<Runtime>,
    egui_ctx: egui::Context,
    settings: AppSettings,
    session: PreviewSession<PreviewPane>,
    download_client: DownloadClient,
    tx: Sender<DownloadDone>,
    rx: Receiver<DownloadDone>,
    // Inputs
    url_input: String,
    server_input: String,
    // Downloads started this session, newest last
    downloads: Vec<DownloadEntry>,
}

impl VidgrabApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        rt: Arc<Runtime>,
        settings: AppSettings,
        preview_client: PreviewClient,
        download_client: DownloadClient,
        local_transcoder: bool,
    ) -> Self {
        let mut style = (*cc.egui_ctx.style()).clone();
        style.visuals = if settings.theme_dark {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(10.0, 6.0);
        style.visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.active.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);
        cc.egui_ctx.set_style(style);

        let (tx, rx) = mpsc::channel();
        let mut controller = Controller::new(PreviewPane::default(), local_transcoder);
        controller.set_platform(settings.default_platform);
        let repaint = cc.egui_ctx.clone();
        let session = PreviewSession::new(
            controller,
            preview_client,
            rt.handle().clone(),
            settings.debounce(),
            move || repaint.request_repaint(),
        );
        Self {
            rt,
            egui_ctx: cc.egui_ctx.clone(),
            server_input: settings.server_url.clone(),
            settings,
            session,
            download_client,
            tx,
            rx,
            url_input: String::new(),
            downloads: Vec::new(),
        }
    }

    fn persist_settings(&mut self) {
        if let Err(e) = self.settings.save() {
            warn!(error = %e, "failed to save settings");
        }
    }

    fn apply_server(&mut self) {
        let server = normalize_server(&self.server_input);
        let clients = PreviewClient::new(&server, self.settings.preview_timeout())
            .map_err(|e| e.to_string())
            .and_then(|p| {
                DownloadClient::new(&server)
                    .map(|d| (p, d))
                    .map_err(|e| e.to_string())
            });
        match clients {
            Ok((preview, download)) => {
                info!(%server, "server changed");
                self.session.set_client(preview);
                self.download_client = download;
                self.server_input = server.clone();
                self.settings.server_url = server;
                self.persist_settings();
            }
            Err(e) => warn!(%server, error = %e, "could not build HTTP clients"),
        }
    }

    fn process_events(&mut self) {
        self.session.poll();
        while let Ok(DownloadDone { id, result }) = self.rx.try_recv() {
            if let Some(entry) = self.downloads.get_mut(id) {
                entry.status = result.into();
            }
        }
    }

    fn start_download(&mut self, req: DownloadRequest) {
        let id = self.downloads.len();
        let progress: Progress = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
        let title = self
            .session
            .controller()
            .surface()
            .preview
            .as_ref()
            .map(|p| p.title.clone())
            .unwrap_or_else(|| req.url.clone());
        self.downloads.push(DownloadEntry {
            label: format!("{title} [{}]", req.quality),
            status: DownloadStatus::Running,
            progress: progress.clone(),
        });

        let client = self.download_client.clone();
        let out_dir: PathBuf = self.settings.download_dir();
        let tx = self.tx.clone();
        let ctx = self.egui_ctx.clone();
        self.rt.spawn(async move {
            let result = client
                .submit(&req, &out_dir, Some(progress))
                .await
                .map_err(|e| e.to_string());
            if let Err(e) = &result {
                warn!(error = %e, "download failed");
            }
            let _ = tx.send(DownloadDone { id, result });
            ctx.request_repaint();
        });
    }

    fn open_help(&self, path: &str) {
        let url = format!("{}{}", self.settings.server_url, path);
        if let Err(e) = open::that(&url) {
            warn!(%url, error = %e, "could not open browser");
        }
    }
}

impl eframe::App for VidgrabApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_events();

        let mut apply_server = false;
        let mut theme_changed = false;
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Video Downloader");
                ui.add_space(12.0);
                ui.label("Theme:");
                if ui.selectable_label(self.settings.theme_dark, "Dark").clicked()
                    && !self.settings.theme_dark
                {
                    self.settings.theme_dark = true;
                    theme_changed = true;
                }
                if ui.selectable_label(!self.settings.theme_dark, "Light").clicked()
                    && self.settings.theme_dark
                {
                    self.settings.theme_dark = false;
                    theme_changed = true;
                }
                ui.add_space(16.0);
                ui.label("Server:");
                ui.add_sized(
                    [240.0, 24.0],
                    egui::TextEdit::singleline(&mut self.server_input),
                );
                if ui.button("Apply").clicked() {
                    apply_server = true;
                }
            });
        });
        if apply_server {
            self.apply_server();
        }
        if theme_changed {
            self.persist_settings();
        }
        if self.settings.theme_dark {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }

        let mut url_changed = false;
        let mut platform_pick: Option<Platform> = None;
        let mut preview_clicked = false;
        let mut download: Option<DownloadRequest> = None;
        let mut preview_action: Option<PreviewAction> = None;
        let mut pick_folder = false;
        let mut clear_folder = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(8.0);
            egui::Frame::group(&ctx.style())
                .inner_margin(egui::Margin::symmetric(12.0, 10.0))
                .show(ui, |ui| {
                    ui.heading("Video");
                    ui.add_space(8.0);

                    labeled_row(ui, "URL", |ui| {
                        let resp = ui.add(
                            egui::TextEdit::singleline(&mut self.url_input)
                                .desired_width(360.0)
                                .hint_text("https://www.youtube.com/watch?v=..."),
                        );
                        url_changed = resp.changed();
                    });
                    ui.add_space(6.0);

                    labeled_row(ui, "Platform", |ui| {
                        let current = self.session.controller().input().platform;
                        ui.horizontal(|ui| {
                            egui::ComboBox::from_id_source("platform")
                                .selected_text(current.label())
                                .show_ui(ui, |ui| {
                                    for p in Platform::ALL {
                                        if ui.selectable_label(p == current, p.label()).clicked() {
                                            platform_pick = Some(p);
                                        }
                                    }
                                });
                            if current == Platform::Auto {
                                if let Some(found) = Platform::detect(&self.url_input) {
                                    ui.weak(format!("looks like {}", found.label()));
                                }
                            }
                        });
                    });
                    ui.add_space(6.0);

                    labeled_row(ui, "Output folder", |ui| {
                        let shown = self.settings.download_dir().display().to_string();
                        ui.horizontal(|ui| {
                            ui.monospace(shown);
                            if ui.button("Choose").clicked() {
                                pick_folder = true;
                            }
                            if self.settings.download_dir.is_some()
                                && ui.small_button("Reset").clicked()
                            {
                                clear_folder = true;
                            }
                        });
                    });

                    ui.add_space(12.0);
                    ui.horizontal(|ui| {
                        let loading = self.session.controller().state() == PreviewState::Loading;
                        if ui
                            .add_enabled(!loading, egui::Button::new("Preview"))
                            .clicked()
                        {
                            preview_clicked = true;
                        }
                        let pane = self.session.controller().surface();
                        if ui
                            .add_enabled(pane.download_enabled, egui::Button::new("Download"))
                            .clicked()
                        {
                            download = self.session.controller().download_request();
                        }
                        if self.session.is_settling() {
                            ui.weak("waiting for input to settle...");
                        }
                    });
                });

            ui.add_space(12.0);
            egui::Frame::group(&ctx.style())
                .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                .show(ui, |ui| {
                    let controller = self.session.controller();
                    let selected = controller.input().selected_quality.clone();
                    let pane = controller.surface();
                    if pane.loading {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Loading preview...");
                        });
                    } else if let Some(err) = &pane.error {
                        ui.colored_label(egui::Color32::RED, err.as_str());
                    } else if let Some(view) = &pane.preview {
                        preview_action = preview_body(ui, view, selected.as_deref());
                    } else {
                        ui.weak("Paste a video link to see a preview.");
                    }
                });

            if !self.downloads.is_empty() {
                ui.add_space(12.0);
                egui::Frame::group(&ctx.style())
                    .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                    .show(ui, |ui| {
                        ui.heading("Downloads");
                        ui.add_space(6.0);
                        egui::ScrollArea::vertical()
                            .max_height(220.0)
                            .show(ui, |ui| {
                                for entry in &self.downloads {
                                    ui.colored_label(
                                        entry.status.color(),
                                        format!("{}: {}", entry.label, entry.status.text()),
                                    );
                                    let (total, done) = &entry.progress;
                                    let t = total.load(Ordering::Relaxed) as f32;
                                    let d = done.load(Ordering::Relaxed) as f32;
                                    if t > 0.0 {
                                        let frac = (d / t).clamp(0.0, 1.0);
                                        ui.add(
                                            egui::ProgressBar::new(frac)
                                                .text(format!("{:.0}%", frac * 100.0)),
                                        );
                                    }
                                }
                            });
                    });
            }
        });

        if url_changed {
            self.session.url_edited(&self.url_input);
        }
        if let Some(p) = platform_pick {
            self.session.set_platform(p);
        }
        if preview_clicked {
            self.session.preview_now(&self.url_input);
        }
        match preview_action {
            Some(PreviewAction::Select(value)) => {
                self.session.controller_mut().select_quality(&value)
            }
            Some(PreviewAction::Download(value)) => {
                download = self.session.controller_mut().download_quality(&value);
            }
            Some(PreviewAction::Help(path)) => self.open_help(path),
            None => {}
        }
        if let Some(req) = download {
            self.start_download(req);
        }
        if pick_folder {
            if let Some(dir) = rfd::FileDialog::new()
                .set_title("Choose download folder")
                .pick_folder()
            {
                self.settings.download_dir = Some(dir.to_string_lossy().into_owned());
                self.persist_settings();
            }
        }
        if clear_folder {
            self.settings.download_dir = None;
            self.persist_settings();
        }

        let downloading = self.downloads.iter().any(|d| d.status.is_running());
        if downloading {
            ctx.request_repaint_after(std::time::Duration::from_millis(200));
        }
    }
}

enum PreviewAction {
    Select(String),
    Download(String),
    Help(&'static str),
}

fn preview_body(
    ui: &mut egui::Ui,
    view: &PreviewView,
    selected: Option<&str>,
) -> Option<PreviewAction> {
    let mut action = None;
    ui.horizontal(|ui| {
        ui.heading(&view.title);
        if view.is_shorts {
            ui.colored_label(egui::Color32::LIGHT_RED, "Shorts");
        }
    });
    match &view.media {
        Some(Media::Embed(url)) => {
            ui.hyperlink_to("Open player", url);
        }
        Some(Media::Thumbnail { src, alt }) => {
            ui.hyperlink_to(format!("Thumbnail: {alt}"), src);
        }
        None => {}
    }
    for detail in &view.details {
        ui.label(format!("{}: {}", detail.label, detail.value));
    }

    ui.add_space(8.0);
    ui.heading("Download options");
    for (group, options) in view.qualities.groups() {
        ui.add_space(4.0);
        ui.strong(group.heading());
        if options.is_empty() {
            ui.weak("Not offered for this video");
            continue;
        }
        ui.horizontal_wrapped(|ui| {
            for opt in options {
                let is_selected = selected == Some(opt.value.as_str());
                if ui.selectable_label(is_selected, &opt.label).clicked() {
                    action = Some(PreviewAction::Select(opt.value.clone()));
                }
                if ui
                    .small_button("⬇")
                    .on_hover_text(format!("Download {}", opt.label))
                    .clicked()
                {
                    action = Some(PreviewAction::Download(opt.value.clone()));
                }
            }
        });
    }

    if let Some(notice) = &view.notice {
        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.strong("Note:");
            ui.label(notice.text);
            if ui.link("How to install").clicked() {
                action = Some(PreviewAction::Help(notice.help_path));
            }
        });
    }
    action
}

fn labeled_row(ui: &mut egui::Ui, label: &str, add_contents: impl FnOnce(&mut egui::Ui)) {
    ui.columns(2, |columns| {
        columns[0].set_min_width(LABEL_COLUMN_WIDTH);
        columns[0].label(label);
        add_contents(&mut columns[1]);
    });
}
