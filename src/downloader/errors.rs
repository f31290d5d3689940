// Error types for the downloader and the dependency bootstrap

use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single metadata query, download or probe.
///
/// These are recoverable: the caller may retry with another quality or
/// language selection.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The executable was not found or could not be started
    #[error("failed to start {tool}: {source}")]
    LaunchFailure {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited with a non-zero status
    #[error("{tool} exited with {}: {diagnostic}", exit_label(*.code))]
    ExecutionFailure {
        tool: String,
        code: Option<i32>,
        diagnostic: String,
    },

    /// Malformed JSON or unexpected schema
    #[error("failed to parse {tool} output: {message}")]
    ParseFailure { tool: String, message: String },

    /// A bounded invocation ran past its deadline and was killed
    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    /// Pipe or filesystem failure while talking to the child process
    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Diagnostic text captured from the tool, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::ExecutionFailure { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Failures of the startup dependency bootstrap.
///
/// These are terminal for the session: nothing else can run without the
/// external tools.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// No install strategy exists for this tool on this platform
    #[error("{tool} cannot be installed automatically on {platform}; install it manually: {hint}")]
    UnsupportedPlatform {
        tool: String,
        platform: String,
        hint: String,
    },

    /// Transport error or non-2xx response
    #[error("download of {url} failed: {message}")]
    NetworkFailure { url: String, message: String },

    /// Zero-byte download, or an archive without any of the wanted members
    #[error("{tool}: downloaded artifact is empty or corrupt ({reason})")]
    EmptyOrCorruptArtifact { tool: String, reason: String },

    /// The tool was installed but still does not resolve on the search path
    #[error("{tool} is still not reachable after installation; check permissions of the install directory")]
    PermissionFailure { tool: String },

    /// The archive could not be opened or unpacked
    #[error("failed to extract {tool}: {message}")]
    Extraction { tool: String, message: String },

    #[error("{stage} failed for {}: {source}", .path.display())]
    Io {
        stage: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BootstrapError {
    pub(crate) fn io(stage: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            stage,
            path: path.into(),
            source,
        }
    }
}
