// Platform detection and the static dependency table

use std::fmt;

use super::RequiredTool;
use crate::downloader::errors::BootstrapError;

/// Platform keys of the dependency table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlatform {
    Windows,
    Linux,
    Darwin,
    Other,
}

impl TargetPlatform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::Darwin,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a downloaded artifact becomes an installed executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStrategy {
    /// The artifact is the executable; saved under `install_name`
    SingleBinary { install_name: &'static str },
    /// Zip archive; members matched case-insensitively by file name
    ZipArchive { members: &'static [&'static str] },
    /// Tarball; members matched exactly by file name anywhere in the tree
    TarArchive { members: &'static [&'static str] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencySpec {
    pub tool: RequiredTool,
    pub platform: TargetPlatform,
    pub source_url: &'static str,
    pub strategy: InstallStrategy,
}

impl DependencySpec {
    /// Extension used for the temporary archive file
    pub fn archive_extension(&self) -> Option<&'static str> {
        match self.strategy {
            InstallStrategy::SingleBinary { .. } => None,
            InstallStrategy::ZipArchive { .. } => Some("zip"),
            InstallStrategy::TarArchive { .. } => {
                let url = self.source_url;
                if url.ends_with(".tar.gz") || url.ends_with(".tgz") {
                    Some("tar.gz")
                } else if url.ends_with(".tar.xz") {
                    Some("tar.xz")
                } else {
                    Some("tar")
                }
            }
        }
    }
}

/// Every automatic install we know how to do. Missing rows are unsupported.
pub static DEPENDENCY_TABLE: &[DependencySpec] = &[
    DependencySpec {
        tool: RequiredTool::YtDlp,
        platform: TargetPlatform::Windows,
        source_url: "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe",
        strategy: InstallStrategy::SingleBinary {
            install_name: "yt-dlp.exe",
        },
    },
    DependencySpec {
        tool: RequiredTool::YtDlp,
        platform: TargetPlatform::Linux,
        source_url: "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp",
        strategy: InstallStrategy::SingleBinary {
            install_name: "yt-dlp",
        },
    },
    DependencySpec {
        tool: RequiredTool::YtDlp,
        platform: TargetPlatform::Darwin,
        source_url: "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos",
        strategy: InstallStrategy::SingleBinary {
            install_name: "yt-dlp",
        },
    },
    DependencySpec {
        tool: RequiredTool::Ffmpeg,
        platform: TargetPlatform::Windows,
        source_url: "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip",
        strategy: InstallStrategy::ZipArchive {
            members: &["ffmpeg.exe", "ffprobe.exe"],
        },
    },
    DependencySpec {
        tool: RequiredTool::Ffmpeg,
        platform: TargetPlatform::Linux,
        source_url: "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-linux64-gpl.tar.xz",
        strategy: InstallStrategy::TarArchive {
            members: &["ffmpeg", "ffprobe"],
        },
    },
];

/// Look up how to install `tool` on `platform`.
pub fn resolve_spec(
    tool: RequiredTool,
    platform: TargetPlatform,
) -> Result<&'static DependencySpec, BootstrapError> {
    DEPENDENCY_TABLE
        .iter()
        .find(|spec| spec.tool == tool && spec.platform == platform)
        .ok_or_else(|| BootstrapError::UnsupportedPlatform {
            tool: tool.command_name().to_string(),
            platform: platform.to_string(),
            hint: tool.manual_install_hint().to_string(),
        })
}
