// Media source trait definition

use async_trait::async_trait;

use super::errors::DownloadError;
use super::harvester::ProgressCallback;
use super::models::{DownloadOutcome, DownloadRequest, MediaDescriptor};

/// Trait for media source implementations
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Name of the source (for logging)
    fn name(&self) -> &'static str;

    /// Query title, duration, qualities and audio tracks for a URL
    async fn fetch_info(&self, url: &str) -> Result<MediaDescriptor, DownloadError>;

    /// Download with progress updates.
    ///
    /// Runs until the tool exits; there is no deadline.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome, DownloadError>;
}
