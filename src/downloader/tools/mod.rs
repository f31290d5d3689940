// Dependency bootstrap: make sure yt-dlp and ffmpeg are runnable
//
// Per tool: Unchecked -> Available | Missing; Missing -> Downloading ->
// Verifying -> Installed, or Failed at any step. After every install, all
// tools are resolved again; one that still does not resolve is a
// PermissionFailure.

pub mod extract;
pub mod fetch;
pub mod platform;

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use serde::Serialize;

use super::errors::BootstrapError;
use extract::{extract_from_tarball, extract_from_zip};
use fetch::{ArtifactFetcher, TempArtifact};
use platform::{resolve_spec, DependencySpec, InstallStrategy, TargetPlatform};

pub use fetch::HttpFetcher;

/// External tools the downloader cannot work without
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequiredTool {
    YtDlp,
    /// Installing ffmpeg also installs ffprobe from the same bundle
    Ffmpeg,
}

impl RequiredTool {
    pub const ALL: [RequiredTool; 2] = [RequiredTool::YtDlp, RequiredTool::Ffmpeg];

    /// Name looked up on the search path
    pub fn command_name(&self) -> &'static str {
        match self {
            RequiredTool::YtDlp => "yt-dlp",
            RequiredTool::Ffmpeg => "ffmpeg",
        }
    }

    pub fn manual_install_hint(&self) -> &'static str {
        match self {
            RequiredTool::YtDlp => "https://github.com/yt-dlp/yt-dlp#installation",
            RequiredTool::Ffmpeg => "https://ffmpeg.org/download.html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ToolState {
    Unchecked,
    Available,
    Missing,
    Downloading,
    Verifying,
    Installed,
    Failed(String),
}

/// Receives state transitions and byte progress while bootstrapping
pub trait BootstrapObserver: Send + Sync {
    fn on_state(&self, tool: RequiredTool, state: &ToolState);

    fn on_progress(&self, _tool: RequiredTool, _downloaded: u64, _total: u64) {}
}

/// Observer that only logs
#[derive(Debug, Default)]
pub struct LogObserver;

impl BootstrapObserver for LogObserver {
    fn on_state(&self, tool: RequiredTool, state: &ToolState) {
        log::debug!("[bootstrap] {} -> {:?}", tool.command_name(), state);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: RequiredTool,
    pub state: ToolState,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapReport {
    pub tools: Vec<ToolStatus>,
}

impl BootstrapReport {
    pub fn path_of(&self, tool: RequiredTool) -> Option<&Path> {
        self.tools
            .iter()
            .find(|status| status.tool == tool)
            .and_then(|status| status.path.as_deref())
    }

    pub fn installed_any(&self) -> bool {
        self.tools.iter().any(|status| status.state == ToolState::Installed)
    }
}

static PATH_PREPEND: Once = Once::new();

/// Install directory plus the search path used to resolve tools
#[derive(Debug, Clone)]
pub struct InstallationState {
    install_dir: PathBuf,
    search_path: OsString,
}

impl InstallationState {
    /// Create the install dir and put it in front of the process `PATH`.
    ///
    /// The environment is touched at most once per process; later calls only
    /// build their own search path.
    pub fn activate(install_dir: impl Into<PathBuf>) -> Result<Self, BootstrapError> {
        let install_dir = install_dir.into();
        std::fs::create_dir_all(&install_dir)
            .map_err(|e| BootstrapError::io("create install dir", &install_dir, e))?;

        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let search_path = prepend_dir(&install_dir, &inherited)?;

        PATH_PREPEND.call_once(|| {
            log::debug!("[bootstrap] prepending {} to PATH", install_dir.display());
            std::env::set_var("PATH", &search_path);
        });

        Ok(Self {
            install_dir,
            search_path,
        })
    }

    /// Like `activate`, with an explicit base search path and no
    /// environment changes.
    pub fn with_search_path(
        install_dir: impl Into<PathBuf>,
        base: impl AsRef<OsStr>,
    ) -> Result<Self, BootstrapError> {
        let install_dir = install_dir.into();
        std::fs::create_dir_all(&install_dir)
            .map_err(|e| BootstrapError::io("create install dir", &install_dir, e))?;
        let search_path = prepend_dir(&install_dir, base.as_ref())?;
        Ok(Self {
            install_dir,
            search_path,
        })
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Resolve an executable on the search path
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        which::which_in(name, Some(&self.search_path), &self.install_dir).ok()
    }
}

fn prepend_dir(dir: &Path, base: &OsStr) -> Result<OsString, BootstrapError> {
    let paths = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(base));
    std::env::join_paths(paths)
        .map_err(|e| BootstrapError::io("build search path", dir, std::io::Error::other(e)))
}

/// Runs the bootstrap pipeline
pub struct ToolBootstrapper {
    state: InstallationState,
    platform: TargetPlatform,
    fetcher: Arc<dyn ArtifactFetcher>,
    observer: Arc<dyn BootstrapObserver>,
}

impl ToolBootstrapper {
    pub fn new(state: InstallationState, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self {
            state,
            platform: TargetPlatform::current(),
            fetcher,
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_platform(mut self, platform: TargetPlatform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn BootstrapObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> &InstallationState {
        &self.state
    }

    fn set(&self, tool: RequiredTool, state: ToolState) -> ToolState {
        self.observer.on_state(tool, &state);
        state
    }

    fn fail(&self, tool: RequiredTool, err: BootstrapError) -> BootstrapError {
        self.observer.on_state(tool, &ToolState::Failed(err.to_string()));
        err
    }

    /// Make every required tool resolvable, installing what is missing.
    ///
    /// Any failure is terminal; nothing is retried.
    pub async fn ensure(&self) -> Result<BootstrapReport, BootstrapError> {
        let mut statuses = Vec::with_capacity(RequiredTool::ALL.len());
        for tool in RequiredTool::ALL {
            self.set(tool, ToolState::Unchecked);
            let path = self.state.resolve(tool.command_name());
            let state = match &path {
                Some(found) => {
                    log::debug!("[bootstrap] {} found at {}", tool.command_name(), found.display());
                    self.set(tool, ToolState::Available)
                }
                None => self.set(tool, ToolState::Missing),
            };
            statuses.push(ToolStatus { tool, state, path });
        }

        let missing: Vec<RequiredTool> = statuses
            .iter()
            .filter(|status| status.state == ToolState::Missing)
            .map(|status| status.tool)
            .collect();

        if missing.is_empty() {
            return Ok(BootstrapReport { tools: statuses });
        }

        log::info!(
            "[bootstrap] installing {} into {}",
            missing
                .iter()
                .map(|t| t.command_name())
                .collect::<Vec<_>>()
                .join(", "),
            self.state.install_dir.display()
        );

        for tool in &missing {
            let spec = resolve_spec(*tool, self.platform).map_err(|e| self.fail(*tool, e))?;
            self.install(spec).await.map_err(|e| self.fail(*tool, e))?;
        }

        // Re-verify everything: an install that does not resolve points at
        // permissions or the search path, not at the download.
        for status in statuses.iter_mut() {
            let path = self.state.resolve(status.tool.command_name());
            if path.is_none() {
                let err = BootstrapError::PermissionFailure {
                    tool: status.tool.command_name().to_string(),
                };
                return Err(self.fail(status.tool, err));
            }
            if missing.contains(&status.tool) {
                status.state = self.set(status.tool, ToolState::Installed);
            }
            status.path = path;
        }

        Ok(BootstrapReport { tools: statuses })
    }

    async fn install(&self, spec: &DependencySpec) -> Result<(), BootstrapError> {
        let tool = spec.tool;
        let name = tool.command_name();
        let dir = self.state.install_dir();

        self.set(tool, ToolState::Downloading);
        let observer = self.observer.clone();
        let progress = move |downloaded: u64, total: u64| observer.on_progress(tool, downloaded, total);

        match spec.strategy {
            InstallStrategy::SingleBinary { install_name } => {
                let dest = dir.join(install_name);
                self.fetcher.fetch(name, spec.source_url, &dest, &progress).await?;
                self.set(tool, ToolState::Verifying);
            }
            InstallStrategy::ZipArchive { members } | InstallStrategy::TarArchive { members } => {
                let ext = spec.archive_extension().unwrap_or("bin");
                let archive = TempArtifact::new(dir.join(format!("{}-temp.{}", name, ext)));
                self.fetcher.fetch(name, spec.source_url, archive.path(), &progress).await?;
                self.set(tool, ToolState::Verifying);

                if matches!(spec.strategy, InstallStrategy::ZipArchive { .. }) {
                    extract_from_zip(name, archive.path(), dir, members).await?;
                } else {
                    extract_from_tarball(name, archive.path(), dir, members).await?;
                }
            }
        }

        Ok(())
    }
}
