mod api;
mod controller;
mod debounce;
mod download;
mod error;
mod options;
mod session;
mod settings;
mod ui;
mod validate;
mod view;

use anyhow::{anyhow, Context};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vidgrab=info")))
        .init();

    let settings = settings::AppSettings::load();
    info!(server = %settings.server_url, "starting video downloader");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("tokio runtime")?;
    let preview_client = api::PreviewClient::new(&settings.server_url, settings.preview_timeout())
        .context("preview client")?;
    let download_client =
        download::DownloadClient::new(&settings.server_url).context("download client")?;
    let local_transcoder = which::which("ffmpeg").is_ok();
    info!(local_transcoder, "checked for ffmpeg");

    let rt = Arc::new(rt);
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Video Downloader",
        native_options,
        Box::new(move |cc| {
            Box::new(ui::VidgrabApp::new(
                cc,
                rt,
                settings,
                preview_client,
                download_client,
                local_transcoder,
            ))
        }),
    )
    .map_err(|e| anyhow!("failed to start app: {e}"))
}
