// Downloader: format selection, process harvesting, probing, bootstrap

pub mod classifier;
pub mod diagnostics;
pub mod errors;
pub mod format_selector;
pub mod harvester;
pub mod models;
pub mod orchestrator;
pub mod probe;
pub mod tools;
pub mod traits;
pub mod utils;

pub use diagnostics::{diagnose_error, FailureHint};
pub use errors::{BootstrapError, DownloadError};
pub use format_selector::{FormatSelector, SelectorStyle};
pub use harvester::ProgressCallback;
pub use models::{AudioTrack, DownloadOutcome, DownloadRequest, FileProbeInfo, MediaDescriptor, QualityOption};
pub use orchestrator::{Orchestrator, ProbeStatus};
pub use probe::Prober;
pub use tools::{BootstrapReport, InstallationState, RequiredTool, ToolBootstrapper};
pub use traits::MediaSource;
