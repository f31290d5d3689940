// Helper functions shared by the extraction, probe and bootstrap code

use std::ffi::OsStr;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

use super::errors::DownloadError;

/// Run command with timeout (shared utility).
///
/// Both pipes are drained concurrently while waiting so a chatty child
/// cannot block on a full buffer. On timeout the child is killed.
pub async fn run_output_with_timeout<I, S>(
    program: &OsStr,
    args: I,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError>
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
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| DownloadError::LaunchFailure {
            tool: tool.clone(),
            source,
        })?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| missing_pipe(&tool, "stdout"))?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| missing_pipe(&tool, "stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let waited = timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await;
    match waited {
        Ok(status_res) => {
            let status = status_res.map_err(|source| DownloadError::Io {
                tool: tool.clone(),
                source,
            })?;
            let stdout = join_reader(&tool, stdout_task).await?;
            let stderr = join_reader(&tool, stderr_task).await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::Timeout {
                tool,
                seconds: timeout_secs,
            })
        }
    }
}

async fn join_reader(
    tool: &str,
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, DownloadError> {
    match task.await {
        Ok(Ok(buf)) => Ok(buf),
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

pub(crate) fn missing_pipe(tool: &str, pipe: &str) -> DownloadError {
    DownloadError::Io {
        tool: tool.to_string(),
        source: std::io::Error::other(format!("failed to capture {}", pipe)),
    }
}

/// Short tool name for messages: file stem of the program path
pub(crate) fn tool_label(program: &OsStr) -> String {
    std::path::Path::new(program)
        .file_stem()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned()
}

/// Convert a size in a human-readable unit to bytes.
///
/// Units are binary (KiB, MiB, GiB) and matched case-insensitively; any other
/// unit, including plain bytes, passes the value through unconverted.
pub fn to_bytes(value: f64, unit: &str) -> u64 {
    let factor = match unit.to_ascii_lowercase().as_str() {
        "kib" => 1024.0,
        "mib" => 1024.0 * 1024.0,
        "gib" => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    (value * factor) as u64
}

/// Format byte count as MiB with one decimal
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1}MB", bytes as f64 / 1_048_576.0)
}

/// Base language of a possibly region-qualified code ("pt-BR" -> "pt")
pub fn base_language(code: &str) -> &str {
    code.split('-').next().unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bytes_binary_units() {
        assert_eq!(to_bytes(1.0, "GiB"), 1_073_741_824);
        assert_eq!(to_bytes(2.5, "MiB"), 2_621_440);
        assert_eq!(to_bytes(1.5, "kib"), 1536);
        assert_eq!(to_bytes(3.0, "MIB"), 3 * 1024 * 1024);
    }

    #[test]
    fn test_to_bytes_unknown_unit_passthrough() {
        assert_eq!(to_bytes(512.0, "B"), 512);
        assert_eq!(to_bytes(42.9, "furlongs"), 42);
    }

    #[test]
    fn test_base_language() {
        assert_eq!(base_language("pt-BR"), "pt");
        assert_eq!(base_language("en"), "en");
        assert_eq!(base_language(""), "");
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(1_048_576), "1.0MB");
        assert_eq!(format_megabytes(0), "0.0MB");
    }

    #[test]
    fn test_tool_label_strips_directory_and_extension() {
        assert_eq!(tool_label(OsStr::new("/usr/local/bin/yt-dlp")), "yt-dlp");
        assert_eq!(tool_label(OsStr::new("ffprobe.exe")), "ffprobe");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_output_with_timeout_captures_both_streams() {
        let out = run_output_with_timeout(
            OsStr::new("sh"),
            ["-c", "echo out; echo err 1>&2"],
            10,
        )
        .await
        .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_output_with_timeout_kills_slow_child() {
        let err = run_output_with_timeout(OsStr::new("sh"), ["-c", "sleep 5"], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Timeout { seconds: 1, .. }));
    }

    #[tokio::test]
    async fn test_run_output_with_timeout_missing_program() {
        let err = run_output_with_timeout(
            OsStr::new("definitely-not-a-real-tool-xyz"),
            Vec::<String>::new(),
            5,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::LaunchFailure { .. }));
    }
}
