use crate::validate::Platform;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
/// Overrides the saved server URL for one run.
pub const SERVER_ENV: &str = "VIDGRAB_SERVER";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default = "default_true")]
    pub theme_dark: bool,
    #[serde(default)]
    pub default_platform: Platform,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub preview_timeout_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            download_dir: None,
            theme_dark: true,
            default_platform: Platform::Auto,
            debounce_ms: default_debounce_ms(),
            preview_timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    crate::debounce::DEFAULT_WAIT.as_millis() as u64
}

fn default_timeout_secs() -> u64 {
    30
}

impl AppSettings {
    /// Settings from the user's config dir, falling back to defaults when
    /// the file is missing or unreadable. `VIDGRAB_SERVER` wins over the file.
    pub fn load() -> Self {
        let mut settings = settings_file_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default();
        if let Ok(server) = std::env::var(SERVER_ENV) {
            if !server.trim().is_empty() {
                settings.server_url = normalize_server(&server);
            }
        }
        settings
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
                Ok(mut parsed) => {
                    parsed.server_url = normalize_server(&parsed.server_url);
                    parsed
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to parse settings");
                    AppSettings::default()
                }
            },
            Err(_) => AppSettings::default(),
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(path) = settings_file_path() {
            self.save_to(&path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create settings directory")?;
        }
        let mut normalized = self.clone();
        normalized.server_url = normalize_server(&self.server_url);
        let json = serde_json::to_string_pretty(&normalized).context("serialize settings")?;
        fs::write(path, json).context("write settings")
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs.max(1))
    }

    /// Where downloads land: the configured folder, else the user's download
    /// directory, else the working directory.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn settings_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut dir| {
        dir.push("vidgrab");
        dir.push("settings.json");
        dir
    })
}

pub fn normalize_server(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        DEFAULT_SERVER.to_string()
    } else {
        trimmed.trim_end_matches('/').to_string()
    }
}
