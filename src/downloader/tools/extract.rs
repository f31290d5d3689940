// Archive extraction for the ffmpeg bundles
//
// Zip: only the wanted members are written, matched case-insensitively by
// file name. Tarballs: unpacked whole into a scratch dir, then searched.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use walkdir::WalkDir;
use zip::ZipArchive;

use super::fetch::{make_executable, move_file};
use crate::downloader::errors::BootstrapError;

fn extraction(tool: &str, message: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::Extraction {
        tool: tool.to_string(),
        message: message.to_string(),
    }
}

fn no_members(tool: &str, members: &[&str]) -> BootstrapError {
    BootstrapError::EmptyOrCorruptArtifact {
        tool: tool.to_string(),
        reason: format!("none of [{}] found in archive", members.join(", ")),
    }
}

/// Extract the wanted members of a zip archive into `dest_dir`.
///
/// Succeeds when at least one member matched; returns the written paths.
pub async fn extract_from_zip(
    tool: &str,
    archive_path: &Path,
    dest_dir: &Path,
    members: &[&str],
) -> Result<Vec<PathBuf>, BootstrapError> {
    let tool_owned = tool.to_string();
    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();
    let wanted: HashSet<String> = members.iter().map(|m| m.to_lowercase()).collect();

    let written = tokio::task::spawn_blocking(move || {
        extract_zip_blocking(&tool_owned, &archive_path, &dest_dir, &wanted)
    })
    .await
    .map_err(|e| extraction(tool, e))??;

    if written.is_empty() {
        return Err(no_members(tool, members));
    }
    for path in &written {
        make_executable(path).await?;
    }
    log::info!("[bootstrap] extracted {} file(s) for {}", written.len(), tool);
    Ok(written)
}

fn extract_zip_blocking(
    tool: &str,
    archive_path: &Path,
    dest_dir: &Path,
    wanted: &HashSet<String>,
) -> Result<Vec<PathBuf>, BootstrapError> {
    let file = fs::File::open(archive_path).map_err(|e| BootstrapError::io("open", archive_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| extraction(tool, e))?;

    let mut written = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| extraction(tool, e))?;
        if !entry.is_file() {
            continue;
        }

        // Entry names may use either separator regardless of host.
        let base = match entry.name().rsplit(['/', '\\']).next() {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => continue,
        };
        if !wanted.contains(&base.to_lowercase()) {
            continue;
        }

        let out_path = dest_dir.join(&base);
        let mut out = fs::File::create(&out_path).map_err(|e| BootstrapError::io("create", &out_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| BootstrapError::io("extract", &out_path, e))?;
        log::debug!("[bootstrap] {} -> {}", base, out_path.display());
        written.push(out_path);
    }

    Ok(written)
}

/// Unpack a tarball into a scratch dir under `dest_dir` and move every
/// wanted member into `dest_dir`.
///
/// `.tar.gz`/`.tgz` is unpacked natively; anything else goes through the
/// system `tar`. The scratch dir is removed on every path out.
pub async fn extract_from_tarball(
    tool: &str,
    archive_path: &Path,
    dest_dir: &Path,
    members: &[&str],
) -> Result<Vec<PathBuf>, BootstrapError> {
    let scratch = tempfile::Builder::new()
        .prefix(&format!("{}-extract-", tool))
        .tempdir_in(dest_dir)
        .map_err(|e| BootstrapError::io("create scratch dir", dest_dir, e))?;

    if is_gzip_tarball(archive_path) {
        let archive = archive_path.to_path_buf();
        let into = scratch.path().to_path_buf();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let file = fs::File::open(&archive)?;
            Archive::new(GzDecoder::new(file)).unpack(&into)
        })
        .await
        .map_err(|e| extraction(tool, e))?
        .map_err(|e| extraction(tool, e))?;
    } else {
        let output = tokio::process::Command::new("tar")
            .arg("xf")
            .arg(archive_path)
            .arg("-C")
            .arg(scratch.path())
            .output()
            .await
            .map_err(|e| extraction(tool, format!("could not run tar (is it installed?): {}", e)))?;
        if !output.status.success() {
            return Err(extraction(
                tool,
                format!("tar failed: {}", String::from_utf8_lossy(&output.stderr).trim()),
            ));
        }
    }

    let found = find_members(scratch.path(), members);
    if found.is_empty() {
        return Err(no_members(tool, members));
    }

    let mut written = Vec::with_capacity(found.len());
    for (name, src) in found {
        let dst = dest_dir.join(&name);
        move_file(&src, &dst).await?;
        make_executable(&dst).await?;
        log::debug!("[bootstrap] {} -> {}", name, dst.display());
        written.push(dst);
    }

    log::info!("[bootstrap] extracted {} file(s) for {}", written.len(), tool);
    Ok(written)
}

fn is_gzip_tarball(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// First file found for each member name, exact match
fn find_members(root: &Path, members: &[&str]) -> Vec<(String, PathBuf)> {
    let mut seen = HashSet::new();
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            (members.contains(&name.as_str()) && seen.insert(name.clone()))
                .then(|| (name, entry.into_path()))
        })
        .collect()
}
