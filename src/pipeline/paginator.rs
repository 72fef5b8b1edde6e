//! Cursor-driven traversal of a remote listing.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, OnceLock};

use crate::api::client::FetchClient;
use crate::api::endpoints::{Listing, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::model::Record;
use crate::session::SessionHandle;

/// Opaque continuation token returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of item summaries.
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub next: Option<Cursor>,
    /// Size of the whole listing, when advertised.
    pub total: Option<u64>,
}

/// Pages through a listing in server order.
///
/// The cursor only advances after a page was fetched and decoded. Once an
/// error was returned the paginator is exhausted; restart by building a
/// new one.
pub struct Paginator<R: Record> {
    client: Arc<FetchClient>,
    handle: SessionHandle,
    listing: Listing,
    page_size: usize,
    limit: Option<usize>,
    emitted: usize,
    cursor: Option<Cursor>,
    seen: HashSet<Cursor>,
    started: bool,
    done: bool,
    buffer: VecDeque<R>,
    total: Arc<OnceLock<u64>>,
}

impl<R: Record> Paginator<R> {
    pub fn new(client: Arc<FetchClient>, handle: SessionHandle, listing: Listing) -> Self {
        Self {
            client,
            handle,
            listing,
            page_size: DEFAULT_PAGE_SIZE,
            limit: None,
            emitted: 0,
            cursor: None,
            seen: HashSet::new(),
            started: false,
            done: false,
            buffer: VecDeque::new(),
            total: Arc::new(OnceLock::new()),
        }
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub(crate) fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    /// Advertised size of the listing, known after the first page.
    pub fn total(&self) -> Option<u64> {
        self.total.get().copied()
    }

    pub(crate) fn total_cell(&self) -> Arc<OnceLock<u64>> {
        Arc::clone(&self.total)
    }

    /// Fetch the next page, or `None` at the end of the listing.
    pub async fn next_page(&mut self) -> Result<Option<Page<R>>> {
        if self.done {
            return Ok(None);
        }

        let remaining = self.limit.map(|limit| limit.saturating_sub(self.emitted));
        if remaining == Some(0) {
            self.done = true;
            return Ok(None);
        }
        let first = remaining.map_or(self.page_size, |r| r.min(self.page_size));

        match self.fetch_page(first).await {
            Ok(page) => Ok(page),
            Err(e) => {
                tracing::debug!("{} listing stopped: {}", self.listing.name(), e);
                self.done = true;
                Err(e)
            }
        }
    }

    async fn fetch_page(&mut self, first: usize) -> Result<Option<Page<R>>> {
        let request = self
            .listing
            .request(first, self.cursor.as_ref().map(Cursor::as_str));
        tracing::debug!(
            "Fetching {} page of {} (after {:?})",
            self.listing.name(),
            first,
            self.cursor.as_ref().map(Cursor::as_str)
        );

        let data = self.client.request(&request, &self.handle).await?;
        let raw = self.client.decoder().page(&data, &self.listing)?;

        let first_page = !self.started;
        self.started = true;
        if let Some(total) = raw.total {
            let _ = self.total.set(total);
        }

        if raw.nodes.is_empty() {
            if first_page && raw.total.is_some_and(|t| t > 0) {
                return Err(Error::PrivateAccess(self.listing.name().to_string()));
            }
            self.done = true;
            return Ok(None);
        }

        let next = match raw.end_cursor.filter(|_| raw.has_next_page) {
            Some(token) => {
                let cursor = Cursor(token);
                if !self.seen.insert(cursor.clone()) {
                    return Err(Error::MalformedResponse(format!(
                        "{} listing repeated cursor '{}'",
                        self.listing.name(),
                        cursor.as_str()
                    )));
                }
                Some(cursor)
            }
            None => None,
        };

        let decoder = self.client.decoder();
        let mut items = Vec::with_capacity(raw.nodes.len());
        for node in &raw.nodes {
            if self.limit.is_some_and(|limit| self.emitted + items.len() >= limit) {
                break;
            }
            items.push(R::decode_summary(decoder, node)?);
        }
        for item in &mut items {
            item.set_position(self.emitted);
            self.emitted += 1;
        }

        let total_reached = raw.total.is_some_and(|t| self.emitted as u64 >= t);
        let limit_reached = self.limit.is_some_and(|limit| self.emitted >= limit);
        let next = next.filter(|_| !total_reached);
        if next.is_none() || limit_reached {
            self.done = true;
        }
        self.cursor = next.clone();

        Ok(Some(Page {
            items,
            next,
            total: raw.total,
        }))
    }

    /// Next summary, fetching a page when the buffer runs dry.
    pub async fn next(&mut self) -> Option<Result<R>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            match self.next_page().await {
                Ok(Some(page)) => self.buffer.extend(page.items),
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::api::client::testing;
    use crate::api::transport::mock::{MockReply, MockTransport};
    use crate::model::{Comment, Post};
    use crate::pipeline::testing::{is_page, page_reply, requested_first, serve_timeline, shortcodes};

    fn timeline() -> Listing {
        Listing::Timeline {
            user_id: "9".into(),
        }
    }

    fn paginator(mock: &Arc<MockTransport>) -> Paginator<Post> {
        Paginator::new(
            Arc::new(testing::client(mock.clone())),
            SessionHandle::anonymous(),
            timeline(),
        )
    }

    #[tokio::test]
    async fn test_pages_of_two_over_five() {
        let mock = Arc::new(MockTransport::new());
        let codes = shortcodes(5);
        serve_timeline(&mock, &codes, 2);

        let mut pages = paginator(&mock).page_size(2);
        let mut sizes = Vec::new();
        let mut seen = Vec::new();
        while let Some(page) = pages.next_page().await.unwrap() {
            sizes.push(page.items.len());
            seen.extend(page.items.into_iter().map(|p| (p.position.unwrap(), p.shortcode)));
        }

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(pages.total(), Some(5));
        let expected: Vec<_> = codes.into_iter().enumerate().collect();
        assert_eq!(seen, expected);
        assert_eq!(mock.count(is_page), 3);
    }

    #[tokio::test]
    async fn test_limit_shrinks_page_and_stops_fetching() {
        let mock = Arc::new(MockTransport::new());
        serve_timeline(&mock, &shortcodes(10), 2);

        let mut pages = paginator(&mock).page_size(2).limit(Some(3));
        let mut count = 0;
        while let Some(item) = pages.next().await {
            item.unwrap();
            count += 1;
        }

        assert_eq!(count, 3);
        let firsts: Vec<_> = mock.requests().iter().filter_map(requested_first).collect();
        assert_eq!(firsts, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_private_listing() {
        let mock = Arc::new(MockTransport::new());
        mock.on(is_page, page_reply(&[], 0, 12, None));

        let mut pages = paginator(&mock);
        assert!(matches!(pages.next().await, Some(Err(Error::PrivateAccess(_)))));
        assert!(pages.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_listing_ends_cleanly() {
        let mock = Arc::new(MockTransport::new());
        mock.on(is_page, page_reply(&[], 0, 0, None));

        assert!(paginator(&mock).next().await.is_none());
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_malformed() {
        let mock = Arc::new(MockTransport::new());
        let codes = shortcodes(2);
        mock.on(is_page, page_reply(&codes, 0, 100, Some("same".into())));

        let mut pages = paginator(&mock);
        assert!(pages.next_page().await.unwrap().is_some());
        assert!(matches!(
            pages.next_page().await,
            Err(Error::MalformedResponse(_))
        ));
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_page_is_retried_with_same_cursor() {
        let mock = Arc::new(MockTransport::new());
        let codes = shortcodes(4);
        mock.once(
            |r| crate::pipeline::testing::variables(r)
                .is_some_and(|v| v.get("after") == Some(&json!("c1"))),
            vec![MockReply::status(502)],
        );
        serve_timeline(&mock, &codes, 2);

        let mut pages = paginator(&mock).page_size(2);
        let mut got = Vec::new();
        while let Some(item) = pages.next().await {
            got.push(item.unwrap().shortcode);
        }

        assert_eq!(got, codes);
        assert_eq!(mock.count(is_page), 3);
    }

    #[tokio::test]
    async fn test_comments_are_paged_complete() {
        let mock = Arc::new(MockTransport::new());
        let comment = |id: u32, author: &str| {
            json!({"node": {
                "id": id.to_string(),
                "text": format!("comment {}", id),
                "created_at": 1_600_000_000,
                "owner": {"id": "1", "username": author}
            }})
        };
        mock.on(
            |r| crate::pipeline::testing::variables(r)
                .is_some_and(|v| v.get("after") == Some(&json!("k1"))),
            MockReply::json(200, json!({"status": "ok", "data": {"shortcode_media": {
                "edge_media_to_comment": {
                    "count": 3,
                    "page_info": {"has_next_page": false, "end_cursor": null},
                    "edges": [comment(3, "carol")]
                }
            }}})),
        );
        mock.on(
            is_page,
            MockReply::json(200, json!({"status": "ok", "data": {"shortcode_media": {
                "edge_media_to_comment": {
                    "count": 3,
                    "page_info": {"has_next_page": true, "end_cursor": "k1"},
                    "edges": [comment(1, "alice"), comment(2, "bob")]
                }
            }}})),
        );

        let mut pages: Paginator<Comment> = Paginator::new(
            Arc::new(testing::client(mock.clone())),
            SessionHandle::anonymous(),
            Listing::Comments {
                shortcode: "B1".into(),
            },
        )
        .page_size(2);
        let mut got = Vec::new();
        while let Some(item) = pages.next().await {
            let comment = item.unwrap();
            got.push((comment.position.unwrap(), comment.author));
        }

        assert_eq!(
            got,
            vec![
                (0, "alice".to_string()),
                (1, "bob".to_string()),
                (2, "carol".to_string())
            ]
        );
        assert_eq!(pages.total(), Some(3));
        assert_eq!(mock.count(is_page), 2);
    }

    #[tokio::test]
    async fn test_top_posts_are_one_page_from_the_hashtag() {
        let mock = Arc::new(MockTransport::new());
        let edges: Vec<_> = shortcodes(9)
            .into_iter()
            .map(|sc| json!({"node": {"shortcode": sc, "id": "1"}}))
            .collect();
        mock.on(
            |r| r.url.ends_with("/explore/tags/rust/"),
            MockReply::json(200, json!({"graphql": {"hashtag": {
                "name": "rust",
                "edge_hashtag_to_top_posts": {"edges": edges}
            }}})),
        );

        let mut pages: Paginator<Post> = Paginator::new(
            Arc::new(testing::client(mock.clone())),
            SessionHandle::anonymous(),
            Listing::HashtagTop { tag: "rust".into() },
        )
        .limit(Some(4));
        let mut got = Vec::new();
        while let Some(item) = pages.next().await {
            got.push(item.unwrap().shortcode);
        }

        assert_eq!(got, shortcodes(4));
        assert_eq!(mock.requests().len(), 1);
        assert_eq!(mock.count(is_page), 0);
    }
}
