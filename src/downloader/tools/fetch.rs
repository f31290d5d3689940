// Artifact download: temp file, size check, move into place

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::downloader::errors::BootstrapError;

const USER_AGENT: &str = concat!("tube-downloader/", env!("CARGO_PKG_VERSION"));

/// Downloads one artifact to `dest`.
///
/// Implementations never leave a partial file at `dest`.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Returns the number of bytes written. `progress` receives
    /// (downloaded, total) with total 0 when the size is unknown.
    async fn fetch(
        &self,
        tool: &str,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> Result<u64, BootstrapError>;
}

/// Removes its path when dropped, whatever happened in between
#[derive(Debug)]
pub(crate) struct TempArtifact(PathBuf);

impl TempArtifact {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(&self.0) {
                log::warn!("[bootstrap] could not remove {}: {}", self.0.display(), e);
            }
        }
    }
}

/// `<final>.download`
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".download");
    PathBuf::from(name)
}

/// Rename, falling back to copy + remove across devices.
pub(crate) async fn move_file(src: &Path, dst: &Path) -> Result<(), BootstrapError> {
    if tokio::fs::rename(src, dst).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(src, dst)
        .await
        .map_err(|e| BootstrapError::io("copy", dst, e))?;
    tokio::fs::remove_file(src)
        .await
        .map_err(|e| BootstrapError::io("remove", src, e))?;
    Ok(())
}

/// chmod 0755; no-op on Windows
pub(crate) async fn make_executable(path: &Path) -> Result<(), BootstrapError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(|e| BootstrapError::io("chmod", path, e))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// HTTP fetcher sharing one client for every artifact
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// `proxy` accepts anything `reqwest::Proxy::all` does, socks5 included.
    pub fn new(timeout_secs: u64, proxy: Option<&str>) -> Result<Self, BootstrapError> {
        let client_error = |url: &str, e: reqwest::Error| BootstrapError::NetworkFailure {
            url: url.to_string(),
            message: format!("failed to build HTTP client: {}", e),
        };

        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT);
        if let Some(proxy_url) = proxy {
            log::info!("[bootstrap] using proxy {}", proxy_url);
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| client_error(proxy_url, e))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| client_error("", e))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(
        &self,
        tool: &str,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> Result<u64, BootstrapError> {
        let network = |e: reqwest::Error| BootstrapError::NetworkFailure {
            url: url.to_string(),
            message: e.to_string(),
        };

        log::info!("[bootstrap] downloading {} from {}", tool, url);
        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::NetworkFailure {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let partial = TempArtifact::new(partial_path(dest));
        let total = response.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(partial.path())
            .await
            .map_err(|e| BootstrapError::io("create", partial.path(), e))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| BootstrapError::io("write", partial.path(), e))?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total);
        }
        file.flush()
            .await
            .map_err(|e| BootstrapError::io("write", partial.path(), e))?;
        drop(file);

        let size = tokio::fs::metadata(partial.path())
            .await
            .map_err(|e| BootstrapError::io("stat", partial.path(), e))?
            .len();
        if size == 0 {
            return Err(BootstrapError::EmptyOrCorruptArtifact {
                tool: tool.to_string(),
                reason: "zero-byte download".to_string(),
            });
        }

        move_file(partial.path(), dest).await?;
        make_executable(dest).await?;
        log::info!(
            "[bootstrap] saved {} ({})",
            dest.display(),
            crate::downloader::utils::format_megabytes(size)
        );
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a loopback port.
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let head = format!(
                "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/artifact", addr)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_client(reqwest::Client::builder().no_proxy().build().unwrap())
    }

    fn no_progress(_: u64, _: u64) {}

    #[tokio::test]
    async fn test_fetch_writes_final_file() {
        let url = serve_once("HTTP/1.1 200 OK", b"#!/bin/sh\necho hi\n").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("yt-dlp");

        let size = fetcher().fetch("yt-dlp", &url, &dest, &no_progress).await.unwrap();
        assert_eq!(size, 18);
        assert!(dest.exists());
        assert!(!partial_path(&dest).exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_empty_body() {
        let url = serve_once("HTTP/1.1 200 OK", b"").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("yt-dlp");

        let err = fetcher().fetch("yt-dlp", &url, &dest, &no_progress).await.unwrap_err();
        assert!(matches!(err, BootstrapError::EmptyOrCorruptArtifact { .. }));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_fetch_non_2xx_is_network_failure() {
        let url = serve_once("HTTP/1.1 404 Not Found", b"missing").await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("yt-dlp");

        let err = fetcher().fetch("yt-dlp", &url, &dest, &no_progress).await.unwrap_err();
        match err {
            BootstrapError::NetworkFailure { url: failed, message } => {
                assert_eq!(failed, url);
                assert!(message.contains("404"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let err = HttpFetcher::new(5, Some("not a proxy url")).unwrap_err();
        assert!(matches!(err, BootstrapError::NetworkFailure { .. }));
        assert!(HttpFetcher::new(5, Some("socks5://127.0.0.1:1080")).is_ok());
    }

    #[test]
    fn test_partial_path_suffix() {
        assert_eq!(
            partial_path(Path::new("/opt/bin/ffmpeg-temp.zip")),
            PathBuf::from("/opt/bin/ffmpeg-temp.zip.download")
        );
    }

    #[tokio::test]
    async fn test_move_file_and_guard_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        std::fs::write(&src, b"x").unwrap();
        move_file(&src, &dst).await.unwrap();
        assert!(!src.exists());
        assert!(dst.exists());

        {
            let _guard = TempArtifact::new(dst.clone());
        }
        assert!(!dst.exists());
    }
}
