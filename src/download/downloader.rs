//! Post downloading.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::api::client::FetchClient;
use crate::api::endpoints::Listing;
use crate::download::hooks::Hooks;
use crate::download::media::{fetch_media, FetchOptions};
use crate::download::metadata::{sidecar, write_sidecar};
use crate::download::state::{DownloadSummary, FileReport, ItemFailure, PostReport};
use crate::error::{Error, Result};
use crate::fs::naming::media_file_stem;
use crate::fs::{ensure_dir, sanitize_filename};
use crate::model::{Comment, MediaKind, MediaResource, Post, Profile, Record};
use crate::pipeline::{ItemSequence, Paginator};
use crate::session::SessionHandle;

pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub dest: PathBuf,
    pub dump_metadata: bool,
    /// Add the post's comments to the sidecar.
    pub dump_comments: bool,
    /// Add the usernames of the post's likers to the sidecar.
    pub dump_likes: bool,
    /// Compare existing files by md5 instead of size.
    pub verify: bool,
    /// Stop at the first failed post.
    pub fail_fast: bool,
    pub hook_timeout: Duration,
    pub show_progress: bool,
}

impl DownloadOptions {
    fn writes_sidecar(&self) -> bool {
        self.dump_metadata || self.dump_comments || self.dump_likes
    }
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("."),
            dump_metadata: false,
            dump_comments: false,
            dump_likes: false,
            verify: true,
            fail_fast: false,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
            show_progress: false,
        }
    }
}

/// One post to download into one directory.
#[derive(Debug)]
pub struct DownloadTask<'a> {
    pub post: &'a Post,
    pub dest: PathBuf,
}

impl DownloadTask<'_> {
    /// Target file stems, without extension, for every media of the post.
    fn targets(&self) -> Result<Vec<(&MediaResource, PathBuf)>> {
        let total = self.post.media.len();
        self.post
            .media
            .iter()
            .enumerate()
            .map(|(i, media)| {
                let stem = media_file_stem(&self.post.shortcode, i + 1, total)?;
                Ok((media, self.dest.join(stem)))
            })
            .collect()
    }
}

pub struct Downloader {
    client: Arc<FetchClient>,
    handle: SessionHandle,
    options: DownloadOptions,
    hooks: Hooks,
}

impl Downloader {
    pub fn new(client: Arc<FetchClient>, options: DownloadOptions) -> Self {
        Self {
            client,
            handle: SessionHandle::anonymous(),
            options,
            hooks: Hooks::default(),
        }
    }

    /// Session used for the comment and like listings of sidecars.
    #[must_use]
    pub fn with_session(mut self, handle: SessionHandle) -> Self {
        self.handle = handle;
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    fn fetch_options(&self, post: &Post) -> FetchOptions {
        FetchOptions {
            verify: self.options.verify,
            show_progress: self.options.show_progress,
            modified: post.created_time,
        }
    }

    /// Download every post of `sequence`.
    ///
    /// Per-post failures are reported through the error hook and collected
    /// in the summary; the run continues unless `fail_fast` is set. Fatal
    /// errors end the run.
    pub async fn download_all(&self, sequence: &mut ItemSequence<Post>) -> Result<DownloadSummary> {
        ensure_dir(&self.options.dest)?;
        let mut summary = DownloadSummary::default();
        let mut index = 0;

        while let Some(item) = sequence.next().await {
            let failure = match item {
                Ok(post) => {
                    let position = post.position.unwrap_or(index);
                    match self.download_post(&post).await {
                        Ok(report) => {
                            summary.record(&report);
                            None
                        }
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => Some((ItemFailure::new(position, &post.shortcode, &e), e)),
                    }
                }
                Err(e) => match ItemFailure::from_item_error(&e) {
                    Some(failure) => Some((failure, e)),
                    None => return Err(e),
                },
            };
            index += 1;

            if let Some((failure, error)) = failure {
                tracing::warn!("Post {} failed: {}", failure.key, failure.message);
                self.hooks.failed(&failure, self.options.hook_timeout).await;
                summary.failures.push(failure);
                if self.options.fail_fast {
                    return Err(error);
                }
            }
        }

        tracing::info!(
            "Downloaded {} files from {} posts ({} skipped, {} failed)",
            summary.downloaded(),
            summary.posts,
            summary.skipped,
            summary.failures.len()
        );
        Ok(summary)
    }

    /// Download the media of one full post, and its sidecar if enabled.
    pub async fn download_post(&self, post: &Post) -> Result<PostReport> {
        self.hooks.started(post, self.options.hook_timeout).await;

        let task = DownloadTask {
            post,
            dest: self.options.dest.clone(),
        };
        let report = self.execute(&task).await?;

        self.hooks
            .finished(post, &report, self.options.hook_timeout)
            .await;
        Ok(report)
    }

    async fn execute(&self, task: &DownloadTask<'_>) -> Result<PostReport> {
        if task.post.media.is_empty() {
            return Err(Error::Download(format!(
                "post {} has no downloadable media",
                task.post.shortcode
            )));
        }

        let options = self.fetch_options(task.post);
        let mut files = Vec::with_capacity(task.post.media.len());
        for (media, stem) in task.targets()? {
            files.push(fetch_media(&self.client, media, &stem, options).await?);
        }

        let metadata_written = if self.options.writes_sidecar() {
            let value = self.sidecar(task.post).await?;
            write_sidecar(&task.post.shortcode, &value, &task.dest)?
        } else {
            false
        };

        tracing::debug!("Post {} done ({} files)", task.post.shortcode, files.len());
        Ok(PostReport {
            shortcode: task.post.shortcode.clone(),
            files,
            metadata_written,
        })
    }

    async fn sidecar(&self, post: &Post) -> Result<Value> {
        let comments = if self.options.dump_comments {
            let listing = Listing::Comments {
                shortcode: post.shortcode.clone(),
            };
            Some(self.collect::<Comment>(listing).await?)
        } else {
            None
        };
        let likes = if self.options.dump_likes {
            let listing = Listing::Likes {
                shortcode: post.shortcode.clone(),
            };
            let likers = self.collect::<Profile>(listing).await?;
            Some(likers.into_iter().map(|p| p.username).collect::<Vec<_>>())
        } else {
            None
        };

        sidecar(
            self.options.dump_metadata.then_some(post),
            comments.as_deref(),
            likes.as_deref(),
        )
    }

    /// Every summary of `listing`.
    async fn collect<R: Record>(&self, listing: Listing) -> Result<Vec<R>> {
        let mut paginator = Paginator::new(Arc::clone(&self.client), self.handle.clone(), listing);
        let mut items = Vec::new();
        while let Some(item) = paginator.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Download the profile picture to `<dest>/<username>.<ext>`.
    pub async fn download_profile_picture(&self, profile: &Profile) -> Result<FileReport> {
        let url = profile.profile_picture_url.as_deref().ok_or_else(|| {
            Error::Download(format!("@{} has no profile picture", profile.username))
        })?;
        let resource = MediaResource {
            kind: MediaKind::Image,
            url: url.to_string(),
            width: 0,
            height: 0,
        };
        let stem = self.options.dest.join(sanitize_filename(&profile.username)?);
        let options = FetchOptions {
            verify: self.options.verify,
            show_progress: false,
            modified: None,
        };
        fetch_media(&self.client, &resource, &stem, options).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::api::client::testing;
    use crate::api::endpoints::{query_hash, Listing};
    use crate::api::transport::mock::{MockReply, MockTransport};
    use crate::download::state::FileOutcome;
    use crate::pipeline::testing::{serve_details, serve_timeline, shortcodes};
    use crate::pipeline::Paginator;
    use crate::session::SessionHandle;

    fn downloader(mock: &Arc<MockTransport>, dest: &std::path::Path) -> (Arc<FetchClient>, Downloader) {
        let client = Arc::new(testing::client(mock.clone()));
        let options = DownloadOptions {
            dest: dest.to_path_buf(),
            dump_metadata: true,
            ..DownloadOptions::default()
        };
        (Arc::clone(&client), Downloader::new(client, options))
    }

    fn timeline(client: Arc<FetchClient>) -> ItemSequence<Post> {
        let handle = SessionHandle::anonymous();
        let paginator = Paginator::new(
            Arc::clone(&client),
            handle.clone(),
            Listing::Timeline {
                user_id: "9".into(),
            },
        );
        ItemSequence::new(client, handle, paginator)
    }

    #[tokio::test]
    async fn test_one_of_five_failing_reports_once() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        let codes = shortcodes(5);
        serve_timeline(&mock, &codes, 5);
        serve_details(&mock, &codes, None);
        mock.on(|r| r.url == "https://cdn.test/SC3.jpg", MockReply::status(404));
        mock.on(
            |r| r.url.starts_with("https://cdn.test/"),
            MockReply::bytes("image/jpeg", b"jpeg"),
        );

        let errors = Arc::new(Mutex::new(Vec::new()));
        let finished = Arc::new(AtomicUsize::new(0));
        let (client, downloader) = downloader(&mock, dir.path());
        let downloader = downloader.with_hooks({
            let errors = Arc::clone(&errors);
            let finished = Arc::clone(&finished);
            Hooks::new()
                .on_error(move |f| {
                    errors.lock().unwrap().push(f.key.clone());
                    Ok(())
                })
                .on_finish(move |_, _| {
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
        });

        let mut sequence = timeline(client);
        sequence.preload(true).unwrap().workers(3).unwrap();
        let summary = downloader.download_all(&mut sequence).await.unwrap();

        assert_eq!(summary.downloaded(), 4);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].key, "SC3");
        assert_eq!(*errors.lock().unwrap(), vec!["SC3".to_string()]);
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert!(dir.path().join("SC0.jpg").exists());
        assert!(dir.path().join("SC0.json").exists());
        assert!(!dir.path().join("SC3.jpg").exists());
    }

    #[tokio::test]
    async fn test_detail_failing_after_retries_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        let codes = shortcodes(5);
        serve_timeline(&mock, &codes, 2);
        mock.on(|r| r.url.ends_with("/p/SC2/"), MockReply::status(503));
        serve_details(&mock, &codes, None);
        mock.on(
            |r| r.url.starts_with("https://cdn.test/"),
            MockReply::bytes("image/jpeg", b"jpeg"),
        );

        let errors = Arc::new(Mutex::new(Vec::new()));
        let (client, downloader) = downloader(&mock, dir.path());
        let attempts = client.retry_policy().max_attempts() as usize;
        let downloader = downloader.with_hooks({
            let errors = Arc::clone(&errors);
            Hooks::new().on_error(move |f| {
                errors.lock().unwrap().push((f.position, f.key.clone()));
                Ok(())
            })
        });

        let mut sequence = timeline(client);
        sequence.preload(true).unwrap().workers(2).unwrap();
        let summary = downloader.download_all(&mut sequence).await.unwrap();

        assert_eq!(summary.downloaded(), 4);
        assert_eq!(*errors.lock().unwrap(), vec![(2, "SC2".to_string())]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(mock.count(|r| r.url.ends_with("/p/SC2/")), attempts);
        assert!(!dir.path().join("SC2.jpg").exists());
        assert!(dir.path().join("SC4.jpg").exists());
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        let codes = shortcodes(3);
        serve_timeline(&mock, &codes, 3);
        mock.on(|r| r.url.ends_with("/p/SC0/"), MockReply::status(404));
        serve_details(&mock, &codes, None);
        mock.on(|_| true, MockReply::bytes("image/jpeg", b"jpeg"));

        let client = Arc::new(testing::client(mock.clone()));
        let downloader = Downloader::new(
            Arc::clone(&client),
            DownloadOptions {
                dest: dir.path().to_path_buf(),
                fail_fast: true,
                ..DownloadOptions::default()
            },
        );

        let result = downloader.download_all(&mut timeline(client)).await;
        assert!(matches!(result, Err(Error::Item { position: 0, .. })));
        assert_eq!(mock.count(|r| r.url.starts_with("https://cdn.test/")), 0);
    }

    #[tokio::test]
    async fn test_multi_media_post_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.on(|r| r.url.ends_with(".mp4"), MockReply::bytes("video/mp4", b"video"));
        mock.on(|_| true, MockReply::bytes("image/jpeg", b"image"));
        let (_, downloader) = downloader(&mock, dir.path());

        let node = serde_json::from_value(json!({
            "shortcode": "SIDE",
            "id": "1",
            "taken_at_timestamp": 1_600_000_000,
            "edge_sidecar_to_children": {"edges": [
                {"node": {"display_url": "https://cdn/1.jpg"}},
                {"node": {"is_video": true, "video_url": "https://cdn/2.mp4"}}
            ]}
        }))
        .unwrap();
        let post = Post::from_node(&node, true);

        let report = downloader.download_post(&post).await.unwrap();
        assert_eq!(report.downloaded(), 2);
        assert_eq!(report.files[0].path, dir.path().join("SIDE").join("1.jpg"));
        assert_eq!(report.files[1].path, dir.path().join("SIDE").join("2.mp4"));
        assert!(report.metadata_written);

        let again = downloader.download_post(&post).await.unwrap();
        assert!(again.files.iter().all(|f| f.outcome == FileOutcome::Skipped));
        assert!(!again.metadata_written);
    }

    #[tokio::test]
    async fn test_sidecar_with_comments_and_likes() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        let query = |hash: &'static str| {
            move |r: &crate::api::transport::HttpRequest| r.query_value("query_hash") == Some(hash)
        };
        mock.on(
            query(query_hash::COMMENTS),
            MockReply::json(200, json!({"status": "ok", "data": {"shortcode_media": {
                "edge_media_to_comment": {"count": 1, "edges": [{"node": {
                    "id": "7", "text": "nice", "owner": {"id": "3", "username": "carol"}
                }}]}
            }}})),
        );
        mock.on(
            query(query_hash::LIKES),
            MockReply::json(200, json!({"status": "ok", "data": {"shortcode_media": {
                "edge_liked_by": {"count": 2, "edges": [
                    {"node": {"id": "1", "username": "alice"}},
                    {"node": {"id": "2", "username": "bob"}}
                ]}
            }}})),
        );
        mock.on(
            |r| r.url.starts_with("https://cdn.test/"),
            MockReply::bytes("image/jpeg", b"jpeg"),
        );

        let client = Arc::new(testing::client(mock.clone()));
        let downloader = Downloader::new(
            client,
            DownloadOptions {
                dest: dir.path().to_path_buf(),
                dump_comments: true,
                dump_likes: true,
                ..DownloadOptions::default()
            },
        );
        let node = serde_json::from_value(json!({
            "shortcode": "B1",
            "id": "1",
            "display_url": "https://cdn.test/B1.jpg"
        }))
        .unwrap();

        let report = downloader.download_post(&Post::from_node(&node, true)).await.unwrap();
        assert!(report.metadata_written);

        let text = std::fs::read_to_string(dir.path().join("B1.json")).unwrap();
        let sidecar: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(sidecar["comments"][0]["author"], "carol");
        assert_eq!(sidecar["likes"], json!(["alice", "bob"]));
        assert!(sidecar.get("shortcode").is_none());
    }

    #[tokio::test]
    async fn test_profile_picture() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.on(|_| true, MockReply::bytes("image/jpeg", b"face"));
        let (_, downloader) = downloader(&mock, dir.path());

        let node = serde_json::from_value(json!({
            "id": "9",
            "username": "alice",
            "profile_pic_url_hd": "https://cdn/alice.jpg"
        }))
        .unwrap();
        let report = downloader
            .download_profile_picture(&Profile::from_node(&node, true))
            .await
            .unwrap();
        assert_eq!(report.path, dir.path().join("alice.jpg"));
    }
}
