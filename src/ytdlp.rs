// yt-dlp media source
//
// Metadata comes from `yt-dlp -j` under a bounded timeout; downloads run
// unbounded through the output harvester.

use std::ffi::{OsStr, OsString};

use async_trait::async_trait;
use serde::Deserialize;

use crate::downloader::errors::DownloadError;
use crate::downloader::format_selector::{FormatSelector, RawFormat, SelectorStyle};
use crate::downloader::harvester::{harvest, ProgressCallback};
use crate::downloader::models::{DownloadOutcome, DownloadRequest, MediaDescriptor};
use crate::downloader::traits::MediaSource;
use crate::downloader::utils::{run_output_with_timeout, tool_label};

pub const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 30;

/// Fields of the `-j` payload we care about
#[derive(Debug, Deserialize)]
struct InfoPayload {
    #[serde(default)]
    title: String,
    #[serde(default)]
    duration_string: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// Media source backed by the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    program: OsString,
    /// Fixed selector style; `None` picks one per URL
    style: Option<SelectorStyle>,
    metadata_timeout_secs: u64,
}

impl YtDlpSource {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            style: None,
            metadata_timeout_secs: DEFAULT_METADATA_TIMEOUT_SECS,
        }
    }

    pub fn with_style(mut self, style: SelectorStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn with_metadata_timeout(mut self, secs: u64) -> Self {
        self.metadata_timeout_secs = secs;
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    fn style_for(&self, url: &str) -> SelectorStyle {
        self.style.unwrap_or_else(|| SelectorStyle::for_url(url))
    }

    /// Selector expression for a request
    pub fn selector_for(&self, request: &DownloadRequest) -> String {
        FormatSelector::build(
            self.style_for(&request.url),
            request.height,
            request.language.as_deref(),
        )
    }

    /// Full argument list for a download
    pub fn build_download_args(&self, request: &DownloadRequest) -> Vec<OsString> {
        let template = request.destination.join("%(title)s.%(ext)s");

        let mut args: Vec<OsString> = vec!["-f".into(), self.selector_for(request).into()];
        args.extend(
            [
                "--merge-output-format",
                "mp4",
                "--embed-thumbnail",
                "--embed-metadata",
                "--newline",
                "--no-warnings",
                "-o",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(template.into_os_string());
        args.push(request.url.clone().into());
        args
    }
}

/// Turn the `-j` payload into a descriptor.
///
/// Height-only sources never report audio tracks.
pub fn parse_info(
    tool: &str,
    stdout: &[u8],
    style: SelectorStyle,
) -> Result<MediaDescriptor, DownloadError> {
    let payload: InfoPayload =
        serde_json::from_slice(stdout).map_err(|e| DownloadError::ParseFailure {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;

    let audio_tracks = match style {
        SelectorStyle::LanguageAware => FormatSelector::build_audio_tracks(&payload.formats),
        SelectorStyle::HeightOnly => Vec::new(),
    };

    Ok(MediaDescriptor {
        title: payload.title,
        duration: payload.duration_string.unwrap_or_default(),
        qualities: FormatSelector::build_quality_options(&payload.formats),
        audio_tracks,
    })
}

#[async_trait]
impl MediaSource for YtDlpSource {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_info(&self, url: &str) -> Result<MediaDescriptor, DownloadError> {
        log::info!("[yt-dlp] fetching metadata for {}", url);

        let args = ["-j", "--no-warnings", url];
        let output = run_output_with_timeout(&self.program, args, self.metadata_timeout_secs).await?;

        if !output.status.success() {
            return Err(DownloadError::ExecutionFailure {
                tool: tool_label(&self.program),
                code: output.status.code(),
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let info = parse_info(&tool_label(&self.program), &output.stdout, self.style_for(url))?;
        log::debug!(
            "[yt-dlp] {} qualities, {} audio tracks for \"{}\"",
            info.qualities.len(),
            info.audio_tracks.len(),
            info.title
        );
        Ok(info)
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: Option<ProgressCallback>,
    ) -> Result<DownloadOutcome, DownloadError> {
        let args = self.build_download_args(request);
        log::info!(
            "[yt-dlp] downloading {} (height<={}, lang={})",
            request.url,
            request.height,
            request.language.as_deref().unwrap_or("-")
        );
        log::debug!("[yt-dlp] args: {:?}", args);

        harvest(&self.program, args, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"{
        "title": "Sample clip",
        "duration_string": "3:05",
        "formats": [
            {"format_id": "140", "vcodec": "none", "acodec": "mp4a.40.2", "language": "en"},
            {"format_id": "140-1", "vcodec": "none", "acodec": "mp4a.40.2", "language": "en-US"},
            {"format_id": "140-2", "vcodec": "none", "acodec": "mp4a.40.2", "language": "pt-BR"},
            {"format_id": "137", "height": 1080, "vcodec": "avc1", "acodec": "none"},
            {"format_id": "136", "height": 720, "vcodec": "avc1", "acodec": "none"},
            {"format_id": "248", "height": 1080, "vcodec": "vp9", "acodec": "none"}
        ]
    }"#;

    fn request(url: &str, language: Option<&str>) -> DownloadRequest {
        DownloadRequest {
            url: url.to_string(),
            height: 720,
            language: language.map(str::to_string),
            destination: PathBuf::from("/data/videos"),
        }
    }

    #[test]
    fn test_parse_info_language_aware() {
        let info = parse_info("yt-dlp", SAMPLE.as_bytes(), SelectorStyle::LanguageAware).unwrap();
        assert_eq!(info.title, "Sample clip");
        assert_eq!(info.duration, "3:05");
        let heights: Vec<u32> = info.qualities.iter().map(|q| q.height).collect();
        assert_eq!(heights, vec![720, 1080]);
        let codes: Vec<&str> = info.audio_tracks.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["en-US", "pt-BR"]);
    }

    #[test]
    fn test_parse_info_height_only_has_no_tracks() {
        let info = parse_info("yt-dlp", SAMPLE.as_bytes(), SelectorStyle::HeightOnly).unwrap();
        assert_eq!(info.qualities.len(), 2);
        assert!(info.audio_tracks.is_empty());
    }

    #[test]
    fn test_parse_info_formats_without_codecs() {
        let payload = r#"{"title": "t", "formats": [
            {"height": 360, "language": "fr"},
            {"height": 720, "language": "fr"}
        ]}"#;
        let info = parse_info("yt-dlp", payload.as_bytes(), SelectorStyle::LanguageAware).unwrap();
        let labels: Vec<&str> = info.qualities.iter().map(|q| q.label.as_str()).collect();
        assert_eq!(labels, vec!["360p", "720p"]);
        assert_eq!(info.audio_tracks.len(), 1);
        assert_eq!(info.audio_tracks[0].code, "fr");
    }

    #[test]
    fn test_parse_info_rejects_garbage() {
        let err = parse_info("yt-dlp", b"<html>", SelectorStyle::LanguageAware).unwrap_err();
        assert!(matches!(err, DownloadError::ParseFailure { .. }));
    }

    #[test]
    fn test_download_args_layout() {
        let source = YtDlpSource::new("yt-dlp");
        let args = source.build_download_args(&request("https://youtu.be/abc", Some("en")));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(args[0], "-f");
        assert!(args[1].starts_with("bv[height<=720]+ba[language=en]"));
        assert!(args.contains(&"--newline".to_string()));
        assert!(args.contains(&"--embed-thumbnail".to_string()));
        let merge = args.iter().position(|a| a == "--merge-output-format").unwrap();
        assert_eq!(args[merge + 1], "mp4");
        let out = args.iter().position(|a| a == "-o").unwrap();
        let template = PathBuf::from("/data/videos").join("%(title)s.%(ext)s");
        assert_eq!(args[out + 1], template.to_string_lossy());
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
    }

    #[test]
    fn test_style_follows_url_unless_fixed() {
        let auto = YtDlpSource::new("yt-dlp");
        assert_eq!(
            auto.selector_for(&request("https://www.facebook.com/watch/?v=1", Some("en"))),
            "bv[height<=720]+ba/b[height<=720]/b"
        );

        let fixed = YtDlpSource::new("yt-dlp").with_style(SelectorStyle::LanguageAware);
        assert!(fixed
            .selector_for(&request("https://www.facebook.com/watch/?v=1", Some("en")))
            .contains("language=en"));
    }

    #[tokio::test]
    async fn test_fetch_info_missing_program() {
        let source = YtDlpSource::new("definitely-not-yt-dlp-xyz");
        let err = source.fetch_info("https://youtu.be/abc").await.unwrap_err();
        assert!(matches!(err, DownloadError::LaunchFailure { .. }));
    }
}
