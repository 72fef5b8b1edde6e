//! Listing pipeline.
//!
//! A [`Paginator`] walks a remote listing page by page and yields item
//! summaries. An [`ItemSequence`] turns those into full items, either one
//! at a time or through the concurrent [`PreloadEngine`], in listing order.

pub mod paginator;
pub mod preload;
pub mod sequence;

use crate::api::client::FetchClient;
use crate::error::{Error, Result};
use crate::model::Record;
use crate::session::SessionHandle;

pub use paginator::{Cursor, Page, Paginator};
pub use preload::{PreloadEngine, PreloadOptions};
pub use sequence::ItemSequence;

/// Fetch the full form of `summary`. Already promoted records are returned
/// as they are.
pub async fn materialize<R: Record>(
    client: &FetchClient,
    handle: &SessionHandle,
    mut summary: R,
) -> Result<R> {
    if summary.is_preloaded() {
        return Ok(summary);
    }
    let Some(request) = summary.detail_request() else {
        return Ok(summary);
    };
    let data = client.request(&request, handle).await?;
    let full = R::decode_detail(client.decoder(), &data)?;
    summary.promote(full);
    Ok(summary)
}

/// Wrap a per-item failure with the item's identity. Fatal errors pass
/// through unchanged.
pub(crate) fn item_error<R: Record>(summary: &R, fallback_position: usize, err: Error) -> Error {
    if err.is_fatal() {
        return err;
    }
    Error::Item {
        position: summary.position().unwrap_or(fallback_position),
        key: summary.key().to_string(),
        source: Box::new(err),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted timeline listings for pipeline and download tests.

    use std::time::Duration;

    use serde_json::{json, Value};

    use crate::api::endpoints::QUERY_PATH;
    use crate::api::transport::mock::{MockReply, MockTransport};
    use crate::api::transport::HttpRequest;

    pub(crate) fn shortcodes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("SC{}", i)).collect()
    }

    fn summary_node(shortcode: &str, index: usize) -> Value {
        json!({
            "__typename": "GraphImage",
            "shortcode": shortcode,
            "id": format!("{}", 1000 + index),
            "taken_at_timestamp": 1_600_000_000 + index as i64,
            "edge_media_preview_like": {"count": index * 10},
            "edge_media_to_comment": {"count": 1},
        })
    }

    /// The page variables of a GraphQL request.
    pub(crate) fn variables(request: &HttpRequest) -> Option<Value> {
        if !request.url.ends_with(QUERY_PATH) {
            return None;
        }
        serde_json::from_str(request.query_value("variables")?).ok()
    }

    pub(crate) fn is_page(request: &HttpRequest) -> bool {
        variables(request).is_some()
    }

    pub(crate) fn requested_first(request: &HttpRequest) -> Option<u64> {
        variables(request)?.get("first")?.as_u64()
    }

    pub(crate) fn is_detail(request: &HttpRequest) -> bool {
        request.url.contains("/p/")
    }

    pub(crate) fn page_reply(
        codes: &[String],
        offset: usize,
        total: usize,
        next: Option<String>,
    ) -> MockReply {
        let edges: Vec<Value> = codes
            .iter()
            .enumerate()
            .map(|(i, sc)| json!({"node": summary_node(sc, offset + i)}))
            .collect();
        MockReply::json(
            200,
            json!({
                "status": "ok",
                "data": {"user": {"edge_owner_to_timeline_media": {
                    "count": total,
                    "page_info": {"has_next_page": next.is_some(), "end_cursor": next},
                    "edges": edges,
                }}}
            }),
        )
    }

    /// Serve `codes` as a timeline split into pages of `page_size`, chained
    /// by cursors `c1`, `c2`, ...
    pub(crate) fn serve_timeline(mock: &MockTransport, codes: &[String], page_size: usize) {
        let pages: Vec<&[String]> = codes.chunks(page_size.max(1)).collect();
        let count = pages.len();
        let total = codes.len();
        for (p, chunk) in pages.into_iter().enumerate() {
            let expected = (p > 0).then(|| format!("c{}", p));
            let next = (p + 1 < count).then(|| format!("c{}", p + 1));
            mock.on(
                move |r| {
                    variables(r).is_some_and(|v| {
                        v.get("after").and_then(Value::as_str) == expected.as_deref()
                    })
                },
                page_reply(chunk, p * page_size, total, next),
            );
        }
    }

    pub(crate) fn detail_reply(shortcode: &str) -> MockReply {
        MockReply::json(
            200,
            json!({"graphql": {"shortcode_media": {
                "__typename": "GraphImage",
                "shortcode": shortcode,
                "id": format!("id-{}", shortcode),
                "taken_at_timestamp": 1_600_000_000,
                "display_url": format!("https://cdn.test/{}.jpg", shortcode),
                "owner": {"id": "9", "username": "alice"},
                "edge_media_preview_like": {"count": 3},
            }}}),
        )
    }

    /// Serve detail payloads for `codes`. With `stagger`, earlier items
    /// answer later, so completions arrive in reverse order.
    pub(crate) fn serve_details(mock: &MockTransport, codes: &[String], stagger: Option<Duration>) {
        let n = codes.len() as u32;
        for (i, sc) in codes.iter().enumerate() {
            let path = format!("/p/{}/", sc);
            let mut reply = detail_reply(sc);
            if let Some(step) = stagger {
                reply = reply.delayed(step * (n - i as u32));
            }
            mock.on(move |r| r.url.ends_with(&path), reply);
        }
    }
}
