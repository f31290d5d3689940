// Result probe adapter
//
// Consumes the ffprobe JSON stream listing; codec reporting beyond the first
// video and first audio stream is not interpreted.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use serde::Deserialize;

use super::errors::DownloadError;
use super::models::FileProbeInfo;
use super::utils::{run_output_with_timeout, tool_label};

pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    codec_name: Option<String>,
}

/// Runs ffprobe against finished downloads
#[derive(Debug, Clone)]
pub struct Prober {
    program: OsString,
    timeout_secs: u64,
}

impl Prober {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Probe a media file for its first video and audio codecs.
    pub async fn probe(&self, path: &Path) -> Result<FileProbeInfo, DownloadError> {
        log::debug!("[probe] inspecting {}", path.display());

        let args: [&OsStr; 6] = [
            OsStr::new("-v"),
            OsStr::new("quiet"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_streams"),
            path.as_os_str(),
        ];
        let output = run_output_with_timeout(&self.program, args, self.timeout_secs).await?;

        if !output.status.success() {
            return Err(DownloadError::ExecutionFailure {
                tool: tool_label(&self.program),
                code: output.status.code(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_output(&tool_label(&self.program), &output.stdout)
    }
}

/// Parse the `-show_streams` JSON document
pub fn parse_probe_output(tool: &str, stdout: &[u8]) -> Result<FileProbeInfo, DownloadError> {
    let parsed: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| DownloadError::ParseFailure {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

    let mut info = FileProbeInfo::default();
    for stream in parsed.streams {
        let kind = stream.codec_type.unwrap_or_default().to_ascii_lowercase();
        let codec = stream.codec_name.unwrap_or_default();
        match kind.as_str() {
            "video" if info.video_codec.is_none() => info.video_codec = Some(codec),
            "audio" if info.audio_codec.is_none() => info.audio_codec = Some(codec),
            _ => {}
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_stream_of_each_kind_wins() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac"},
                {"index": 2, "codec_type": "video", "codec_name": "mjpeg"},
                {"index": 3, "codec_type": "audio", "codec_name": "opus"}
            ]
        }"#;
        let info = parse_probe_output("ffprobe", json).unwrap();
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
    }

    #[test]
    fn test_codec_type_is_case_insensitive() {
        let json = br#"{"streams": [{"codec_type": "AUDIO", "codec_name": "mp3"}]}"#;
        let info = parse_probe_output("ffprobe", json).unwrap();
        assert!(!info.has_video());
        assert!(info.has_audio());
    }

    #[test]
    fn test_empty_listing() {
        let info = parse_probe_output("ffprobe", b"{}").unwrap();
        assert_eq!(info, FileProbeInfo::default());
    }

    #[test]
    fn test_malformed_json_is_parse_failure() {
        let err = parse_probe_output("ffprobe", b"not json").unwrap_err();
        assert!(matches!(err, DownloadError::ParseFailure { .. }));
    }

    #[tokio::test]
    async fn test_probe_missing_program() {
        let err = Prober::new("definitely-not-ffprobe-xyz")
            .probe(Path::new("/tmp/missing.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::LaunchFailure { .. }));
    }
}
