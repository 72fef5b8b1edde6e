//! Media file downloading.

use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use md5::{Digest, Md5};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::api::client::FetchClient;
use crate::download::state::{FileOutcome, FileReport};
use crate::error::{Error, Result};
use crate::fs::ensure_dir;
use crate::fs::naming::part_path;
use crate::model::media::file_extension;
use crate::model::MediaResource;
use crate::output::create_download_bar;

/// Minimum file size to show progress bar (20 MB).
const PROGRESS_THRESHOLD: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Compare existing files by md5 rather than by size.
    pub verify: bool,
    pub show_progress: bool,
    /// Modification time to stamp on the file.
    pub modified: Option<DateTime<Utc>>,
}

/// Download `resource` to `<stem>.<ext>`.
///
/// The whole transfer is retried on transient failures. The body is
/// written to a `.part` file first; an identical existing file is kept and
/// reported as skipped.
pub async fn fetch_media(
    client: &FetchClient,
    resource: &MediaResource,
    stem: &Path,
    options: FetchOptions,
) -> Result<FileReport> {
    client
        .retry_policy()
        .run(|| transfer(client, resource, stem, options))
        .await
}

fn with_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

async fn transfer(
    client: &FetchClient,
    resource: &MediaResource,
    stem: &Path,
    options: FetchOptions,
) -> Result<FileReport> {
    let stream = client.open_media(&resource.url).await?;
    let ext = file_extension(stream.content_type.as_deref(), &resource.url);
    let target = with_extension(stem, &ext);
    if let Some(parent) = target.parent() {
        ensure_dir(parent)?;
    }

    let existing = fs::metadata(&target).ok().map(|m| m.len());
    if let (false, Some(size), Some(expected)) = (options.verify, existing, stream.content_length) {
        if size == expected {
            tracing::debug!("Skipping existing file: {}", target.display());
            return Ok(report(target, resource, FileOutcome::Skipped, size));
        }
    }

    let content_length = stream.content_length;
    let progress = (options.show_progress
        && content_length.is_some_and(|l| l > PROGRESS_THRESHOLD))
    .then(|| create_download_bar(content_length.unwrap_or(0)));

    let part = part_path(&target);
    let written = write_part(&part, stream.body, progress.as_ref()).await;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    let (bytes, digest) = match written {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&part);
            return Err(e);
        }
    };

    if existing.is_some() && same_file(&target, bytes, &digest, options.verify)? {
        let _ = fs::remove_file(&part);
        tracing::debug!("Skipping identical file: {}", target.display());
        return Ok(report(target, resource, FileOutcome::Skipped, bytes));
    }

    fs::rename(&part, &target).map_err(|e| Error::storage(&target, e))?;
    if let Some(time) = options.modified {
        set_modified(&target, time.into());
    }
    tracing::debug!("Downloaded: {} ({} bytes)", target.display(), bytes);
    Ok(report(target, resource, FileOutcome::Downloaded, bytes))
}

fn report(path: PathBuf, resource: &MediaResource, outcome: FileOutcome, bytes: u64) -> FileReport {
    FileReport {
        path,
        kind: resource.kind,
        outcome,
        bytes,
    }
}

async fn write_part(
    part: &Path,
    mut body: futures::stream::BoxStream<'static, Result<bytes::Bytes>>,
    progress: Option<&indicatif::ProgressBar>,
) -> Result<(u64, String)> {
    let mut file = File::create(part)
        .await
        .map_err(|e| Error::storage(part, e))?;
    let mut hasher = Md5::new();
    let mut written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::storage(part, e))?;
        hasher.update(&chunk);
        written += chunk.len() as u64;
        if let Some(bar) = progress {
            bar.set_position(written);
        }
    }

    file.flush().await.map_err(|e| Error::storage(part, e))?;
    Ok((written, format!("{:x}", hasher.finalize())))
}

fn same_file(path: &Path, size: u64, digest: &str, verify: bool) -> Result<bool> {
    let existing = fs::metadata(path).map_err(|e| Error::storage(path, e))?;
    if existing.len() != size {
        return Ok(false);
    }
    if !verify {
        return Ok(true);
    }
    Ok(file_md5(path)? == digest)
}

/// Hex md5 of a file on disk.
pub fn file_md5(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| Error::storage(path, e))?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::storage(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn set_modified(path: &Path, time: SystemTime) {
    let result = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(time));
    if let Err(e) = result {
        tracing::debug!("Could not set mtime of {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::api::client::testing;
    use crate::api::transport::mock::{MockReply, MockTransport};
    use crate::model::MediaKind;

    fn image(url: &str) -> MediaResource {
        MediaResource {
            kind: MediaKind::Image,
            url: url.into(),
            width: 10,
            height: 10,
        }
    }

    fn options(verify: bool) -> FetchOptions {
        FetchOptions {
            verify,
            show_progress: false,
            modified: Some(Utc.timestamp_opt(1_600_000_000, 0).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_download_then_skip_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.on(|_| true, MockReply::bytes("image/jpeg", b"jpeg-bytes-here"));
        let client = testing::client(mock);
        let stem = dir.path().join("B1");

        let first = fetch_media(&client, &image("https://cdn/x"), &stem, options(true))
            .await
            .unwrap();
        assert_eq!(first.outcome, FileOutcome::Downloaded);
        assert_eq!(first.path, dir.path().join("B1.jpg"));
        assert_eq!(fs::read(&first.path).unwrap(), b"jpeg-bytes-here");
        assert!(!part_path(&first.path).exists());

        let mtime: DateTime<Utc> = fs::metadata(&first.path).unwrap().modified().unwrap().into();
        assert_eq!(mtime.timestamp(), 1_600_000_000);

        let second = fetch_media(&client, &image("https://cdn/x"), &stem, options(true))
            .await
            .unwrap();
        assert_eq!(second.outcome, FileOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_changed_content_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("B1.jpg"), b"jpeg-bytes-HERE").unwrap();

        let mock = Arc::new(MockTransport::new());
        mock.on(|_| true, MockReply::bytes("image/jpeg", b"jpeg-bytes-here"));
        let client = testing::client(mock);

        let report = fetch_media(&client, &image("https://cdn/x"), &dir.path().join("B1"), options(true))
            .await
            .unwrap();
        assert_eq!(report.outcome, FileOutcome::Downloaded);
        assert_eq!(fs::read(&report.path).unwrap(), b"jpeg-bytes-here");
    }

    #[tokio::test]
    async fn test_size_match_skips_without_verification() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("B1.mp4"), b"0123456789").unwrap();

        let mock = Arc::new(MockTransport::new());
        mock.on(|_| true, MockReply::bytes("video/mp4", b"abcdefghij"));
        let client = testing::client(mock);

        let report = fetch_media(&client, &image("https://cdn/x"), &dir.path().join("B1"), options(false))
            .await
            .unwrap();
        assert_eq!(report.outcome, FileOutcome::Skipped);
        assert_eq!(fs::read(dir.path().join("B1.mp4")).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.once(|_| true, vec![MockReply::status(503)]);
        mock.on(|_| true, MockReply::bytes("image/png", b"png"));
        let client = testing::client(mock.clone());

        let report = fetch_media(&client, &image("https://cdn/x.jpg"), &dir.path().join("B1"), options(true))
            .await
            .unwrap();
        assert_eq!(report.path, dir.path().join("B1.png"));
        assert_eq!(mock.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_media_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.on(|_| true, MockReply::status(404));
        let client = testing::client(mock);

        let result = fetch_media(&client, &image("https://cdn/x"), &dir.path().join("B1"), options(true)).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
