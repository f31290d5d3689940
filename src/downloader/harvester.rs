// Process output harvester
//
// Runs the extraction tool and drains stdout and stderr concurrently through
// the line classifier. Both readers are joined before the exit status is
// read, so nothing buffered is lost and the child never blocks on a full
// pipe.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command as TokioCommand};

use super::classifier::{classify_line, LineEvent};
use super::errors::DownloadError;
use super::models::DownloadOutcome;
use super::utils::{missing_pipe, tool_label};

/// Progress callback: (bytes transferred, total bytes; 0 = unknown).
///
/// Invoked from whichever reader saw the line, so it must tolerate
/// concurrent calls.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Lines of stderr kept for the failure diagnostic
const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Last recognized file path, overwritten by whichever reader sees one.
///
/// Arrival order decides; no attempt is made to rank lifecycle stages.
#[derive(Debug, Default, Clone)]
struct LastPath(Arc<Mutex<String>>);

impl LastPath {
    fn record(&self, path: String) {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = path;
    }

    fn take(&self) -> String {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *slot)
    }
}

/// Run `program args...`, harvest progress and the final file path.
///
/// A missing path is not an error: the outcome simply carries an empty one.
pub async fn harvest<I, S>(
    program: &OsStr,
    args: I,
    progress: Option<ProgressCallback>,
) -> Result<DownloadOutcome, DownloadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_label(program);
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DownloadError::LaunchFailure {
            tool: tool.clone(),
            source,
        })?;

    let stdout = child.stdout.take().ok_or_else(|| missing_pipe(&tool, "stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe(&tool, "stderr"))?;

    let last_path = LastPath::default();

    let stdout_task = tokio::spawn(drain_stream(stdout, last_path.clone(), progress.clone(), 0));
    let stderr_task = tokio::spawn(drain_stream(
        stderr,
        last_path.clone(),
        progress,
        DIAGNOSTIC_TAIL_LINES,
    ));

    // Barrier: both readers finish before the exit status is inspected.
    let (stdout_res, stderr_res) = tokio::join!(stdout_task, stderr_task);
    let drained = flatten_reader(&tool, stdout_res).and_then(|_| flatten_reader(&tool, stderr_res));
    let stderr_tail = match drained {
        Ok(tail) => tail,
        Err(e) => return Err(reap_after_reader_error(&mut child, &tool, e).await),
    };

    let status = child.wait().await.map_err(|source| DownloadError::Io {
        tool: tool.clone(),
        source,
    })?;

    if !status.success() {
        return Err(DownloadError::ExecutionFailure {
            tool,
            code: status.code(),
            diagnostic: stderr_tail.into_iter().collect::<Vec<_>>().join("\n"),
        });
    }

    let resolved_file_path = last_path.take();
    if resolved_file_path.is_empty() {
        log::warn!("[harvester] {} finished without announcing an output path", tool);
    } else {
        log::debug!("[harvester] {} wrote {}", tool, resolved_file_path);
    }

    Ok(DownloadOutcome { resolved_file_path })
}

/// Read one stream to EOF, feeding each line to the classifier.
///
/// Keeps the last `keep_tail` non-empty lines for diagnostics.
async fn drain_stream<R>(
    stream: R,
    last_path: LastPath,
    progress: Option<ProgressCallback>,
    keep_tail: usize,
) -> std::io::Result<VecDeque<String>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(keep_tail);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);

        for event in classify_line(line) {
            match event {
                LineEvent::Progress(ev) => {
                    if let Some(cb) = &progress {
                        cb(ev.bytes_transferred, ev.total_bytes);
                    }
                }
                LineEvent::FilePath(path) => last_path.record(path),
            }
        }

        if keep_tail > 0 && !line.trim().is_empty() {
            if tail.len() == keep_tail {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
    }

    Ok(tail)
}

/// A reader failed: the child is killed and reaped so it does not outlive us.
async fn reap_after_reader_error(child: &mut Child, tool: &str, err: DownloadError) -> DownloadError {
    log::warn!("[harvester] reading {} output failed, killing it: {}", tool, err);
    if let Err(e) = child.kill().await {
        log::warn!("[harvester] could not kill {}: {}", tool, e);
    }
    err
}

fn flatten_reader(
    tool: &str,
    joined: Result<std::io::Result<VecDeque<String>>, tokio::task::JoinError>,
) -> Result<VecDeque<String>, DownloadError> {
    match joined {
        Ok(Ok(tail)) => Ok(tail),
        Ok(Err(source)) => Err(DownloadError::Io {
            tool: tool.to_string(),
            source,
        }),
        Err(e) => Err(DownloadError::Io {
            tool: tool.to_string(),
            source: std::io::Error::other(e),
        }),
    }
}
