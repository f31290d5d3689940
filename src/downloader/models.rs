// Common data models for downloader

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata of one remote video, built once per metadata query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub title: String,
    /// Display duration as reported by the extraction tool (e.g. "12:04")
    pub duration: String,
    /// Unique by height, ascending
    pub qualities: Vec<QualityOption>,
    /// One entry per base language, sorted by display name
    pub audio_tracks: Vec<AudioTrack>,
}

/// Quality option for display and selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityOption {
    /// Vertical resolution in pixels (e.g. 1080)
    pub height: u32,
    /// Display label (e.g. "1080p")
    pub label: String,
}

/// Audio language available for a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Most specific code seen for the base language (e.g. "pt-BR")
    pub code: String,
    pub display_name: String,
}

/// Download progress in bytes; `total_bytes == 0` means unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

/// Result of a finished download.
///
/// An empty path is a valid outcome: the tool succeeded but never announced
/// where it wrote the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub resolved_file_path: String,
}

impl DownloadOutcome {
    pub fn has_path(&self) -> bool {
        !self.resolved_file_path.is_empty()
    }
}

/// One download request
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Height cap for the selected video stream
    pub height: u32,
    /// Preferred audio language, possibly region-qualified ("en-US")
    pub language: Option<String>,
    pub destination: PathBuf,
}

/// Streams found in a downloaded file; only the first of each kind is kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileProbeInfo {
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl FileProbeInfo {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}
