// Orchestrator: media source + result probe

use std::path::Path;

use super::errors::DownloadError;
use super::harvester::ProgressCallback;
use super::models::{DownloadOutcome, DownloadRequest, FileProbeInfo, MediaDescriptor};
use super::probe::Prober;
use super::traits::MediaSource;

/// What happened when the finished file was inspected
#[derive(Debug)]
pub enum ProbeStatus {
    /// No path was harvested, or no prober is configured
    Skipped,
    Verified(FileProbeInfo),
    /// The download itself succeeded; only the inspection failed
    Failed(DownloadError),
}

pub struct Orchestrator {
    source: Box<dyn MediaSource>,
    prober: Option<Prober>,
}

impl Orchestrator {
    pub fn new(source: Box<dyn MediaSource>) -> Self {
        Self {
            source,
            prober: None,
        }
    }

    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub async fn fetch_info(&self, url: &str) -> Result<MediaDescriptor, DownloadError> {
        log::debug!("[Orchestrator] metadata via {}", self.source.name());
        self.source.fetch_info(url).await
    }

    pub async fn download(
        &self,
        request: &DownloadRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome, DownloadError> {
        match self.source.download(request, progress).await {
            Ok(outcome) => {
                log::info!("[Orchestrator] ✓ {} finished", self.source.name());
                Ok(outcome)
            }
            Err(e) => {
                log::warn!("[Orchestrator] ✗ {} failed: {}", self.source.name(), e);
                Err(e)
            }
        }
    }

    /// Download, then probe the harvested file.
    ///
    /// A probe failure is reported next to the outcome, never instead of it.
    pub async fn download_and_validate(
        &self,
        request: &DownloadRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<(DownloadOutcome, ProbeStatus), DownloadError> {
        let outcome = self.download(request, progress).await?;

        let status = match (&self.prober, outcome.has_path()) {
            (Some(prober), true) => match prober.probe(Path::new(&outcome.resolved_file_path)).await {
                Ok(info) => ProbeStatus::Verified(info),
                Err(e) => {
                    log::warn!("[Orchestrator] probe of {} failed: {}", outcome.resolved_file_path, e);
                    ProbeStatus::Failed(e)
                }
            },
            (None, _) => ProbeStatus::Skipped,
            (_, false) => {
                log::warn!("[Orchestrator] no output path harvested; skipping probe");
                ProbeStatus::Skipped
            }
        };

        Ok((outcome, status))
    }
}
