pub mod config;
pub mod downloader;
pub mod progress;
pub mod ytdlp;

pub use config::AppConfig;
pub use downloader::{BootstrapError, DownloadError};
