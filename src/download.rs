use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use futures_util::StreamExt;
use reqwest::Client as HttpClient;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::errors::{Result, SongError};

/// Streams remote artifacts to disk.
///
/// Bytes go to `<dest>.part` first and are renamed over `dest` once complete,
/// so a failed download never leaves a truncated file at the destination.
#[derive(Clone)]
pub struct Downloader {
    http_client: HttpClient,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let http_client = HttpClient::builder()
            .user_agent("songsmith/0.1")
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| SongError::other(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { http_client })
    }

    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        info!(target: "download", %url, dest = %dest.display(), "downloading");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|err| SongError::download(format!("request to {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SongError::download(format!("{url} returned HTTP {status}")));
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|err| {
                SongError::download(format!("cannot create {}: {err}", parent.display()))
            })?;
        }

        let total = response.content_length();
        if let Some(total) = total {
            debug!(target: "download", "file size: {:.2} MB", total as f64 / 1024.0 / 1024.0);
        }

        let part = part_path(dest);
        match stream_to(response, &part).await {
            Ok(written) => {
                fs::rename(&part, dest).await.map_err(|err| {
                    SongError::download(format!("cannot move file to {}: {err}", dest.display()))
                })?;
                info!(target: "download", dest = %dest.display(), bytes = written, "download complete");
                Ok(written)
            }
            Err(err) => {
                let _ = fs::remove_file(&part).await;
                Err(err)
            }
        }
    }

    /// Writes an in-memory artifact with the same destination semantics as `download`.
    pub async fn write_bytes(&self, data: &[u8], dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let part = part_path(dest);
        let written = async {
            fs::write(&part, data).await?;
            fs::rename(&part, dest).await
        }
        .await;

        match written {
            Ok(()) => Ok(data.len() as u64),
            Err(err) => {
                let _ = fs::remove_file(&part).await;
                Err(SongError::download(format!(
                    "cannot write {}: {err}",
                    dest.display()
                )))
            }
        }
    }
}

async fn stream_to(response: reqwest::Response, part: &Path) -> Result<u64> {
    let mut file = fs::File::create(part)
        .await
        .map_err(|err| SongError::download(format!("cannot create {}: {err}", part.display())))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| SongError::download(format!("transfer interrupted: {err}")))?;
        file.write_all(&chunk)
            .await
            .map_err(|err| SongError::download(format!("write failed: {err}")))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|err| SongError::download(format!("write failed: {err}")))?;

    if written == 0 {
        return Err(SongError::download("server returned an empty body"));
    }
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    dest.with_file_name(name)
}
