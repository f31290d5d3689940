// Terminal progress bars for the bootstrap and for downloads

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::downloader::harvester::ProgressCallback;
use crate::downloader::tools::{BootstrapObserver, RequiredTool, ToolState};
use crate::downloader::utils::format_megabytes;

const BAR_TEMPLATE: &str = "{prefix:>8} [{bar:40.green/blue}] {percent:>3}%  {msg}";
const SPINNER_TEMPLATE: &str = "{prefix:>8} {spinner} {msg}";

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Size message shown next to the bar; total 0 means unknown
fn size_message(current: u64, total: u64) -> String {
    if total == 0 {
        format_megabytes(current)
    } else {
        format!("{} / {}", format_megabytes(current), format_megabytes(total))
    }
}

/// Apply one (current, total) update to a bar.
///
/// An unknown total keeps the bar as a spinner. The total may change
/// mid-run when the tool moves from the video stream to the audio stream.
fn apply(bar: &ProgressBar, current: u64, total: u64) {
    if total > 0 {
        if bar.length() != Some(total) {
            bar.set_style(bar_style());
            bar.set_length(total);
        }
        bar.set_position(current.min(total));
    } else {
        bar.tick();
    }
    bar.set_message(size_message(current, total));
}

/// Console renderer: one bar per tool install, one bar per download
pub struct ConsoleProgress {
    multi: MultiProgress,
    /// One bar per tool being installed
    bootstrap_bars: Mutex<HashMap<RequiredTool, ProgressBar>>,
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bootstrap_bars: Mutex::new(HashMap::new()),
        }
    }

    /// Renders nothing; for non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            bootstrap_bars: Mutex::new(HashMap::new()),
        }
    }

    fn new_bar(&self, prefix: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::no_length());
        bar.set_style(spinner_style());
        bar.set_prefix(prefix.to_string());
        bar
    }

    /// Callback for one download; the bar finishes when the callback and
    /// every clone of it are dropped.
    pub fn download_callback(&self, label: &str) -> ProgressCallback {
        let bar = FinishOnDrop(self.new_bar(label));
        Arc::new(move |current, total| apply(&bar.0, current, total))
    }

    fn with_bootstrap_bars<T>(&self, f: impl FnOnce(&mut HashMap<RequiredTool, ProgressBar>) -> T) -> T {
        let mut bars = self.bootstrap_bars.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut bars)
    }
}

struct FinishOnDrop(ProgressBar);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl BootstrapObserver for ConsoleProgress {
    fn on_state(&self, tool: RequiredTool, state: &ToolState) {
        log::debug!("[bootstrap] {} -> {:?}", tool.command_name(), state);
        match state {
            ToolState::Downloading => {
                let bar = self.new_bar(tool.command_name());
                bar.set_message("downloading");
                if let Some(stale) = self.with_bootstrap_bars(|bars| bars.insert(tool, bar)) {
                    stale.abandon();
                }
            }
            ToolState::Verifying => self.with_bootstrap_bars(|bars| {
                if let Some(bar) = bars.get(&tool) {
                    bar.set_message("verifying");
                }
            }),
            ToolState::Installed => self.with_bootstrap_bars(|bars| {
                if let Some(bar) = bars.remove(&tool) {
                    bar.finish_with_message("installed");
                }
            }),
            ToolState::Failed(reason) => self.with_bootstrap_bars(|bars| {
                if let Some(bar) = bars.remove(&tool) {
                    bar.abandon_with_message(format!("failed: {}", reason));
                }
            }),
            _ => {}
        }
    }

    fn on_progress(&self, tool: RequiredTool, downloaded: u64, total: u64) {
        self.with_bootstrap_bars(|bars| {
            if let Some(bar) = bars.get(&tool) {
                apply(bar, downloaded, total);
            }
        });
    }
}
