// Runtime configuration: directories, timeouts, proxy

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::downloader::probe::DEFAULT_PROBE_TIMEOUT_SECS;
use crate::ytdlp::DEFAULT_METADATA_TIMEOUT_SECS;

pub const DOWNLOAD_DIR_ENV: &str = "TUBE_DOWNLOAD_DIR";
pub const INSTALL_DIR_ENV: &str = "TUBE_INSTALL_DIR";
pub const PROXY_ENV: &str = "TUBE_PROXY";

const APP_DIR_NAME: &str = "DownloaderTube";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where finished media lands
    pub download_dir: PathBuf,
    /// Where bootstrapped tools are installed; prepended to PATH
    pub install_dir: PathBuf,
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Per-request timeout for tool downloads
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Proxy for tool downloads (e.g. "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_metadata_timeout() -> u64 {
    DEFAULT_METADATA_TIMEOUT_SECS
}

fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

fn default_http_timeout() -> u64 {
    600
}

impl Default for AppConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            download_dir: home.join("Downloads").join(APP_DIR_NAME),
            install_dir: dirs::cache_dir()
                .unwrap_or_else(|| home.join(".cache"))
                .join(APP_DIR_NAME)
                .join("bin"),
            metadata_timeout_secs: default_metadata_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            http_timeout_secs: default_http_timeout(),
            proxy: None,
        }
    }
}

impl AppConfig {
    /// Defaults, then environment overrides
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var_os(key).filter(|v| !v.is_empty()))
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<std::ffi::OsString>) -> Self {
        if let Some(dir) = lookup(DOWNLOAD_DIR_ENV) {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(INSTALL_DIR_ENV) {
            self.install_dir = PathBuf::from(dir);
        }
        if let Some(proxy) = lookup(PROXY_ENV) {
            self.proxy = Some(proxy.to_string_lossy().into_owned());
        }
        self
    }

    /// Create the download directory if needed; safe to call repeatedly.
    pub fn ensure_download_dir(&self) -> std::io::Result<&Path> {
        std::fs::create_dir_all(&self.download_dir)?;
        Ok(&self.download_dir)
    }
}
