//! Posts.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::api::client::ApiRequest;
use crate::api::decoder::Decoder;
use crate::api::types::PostNode;
use crate::error::Result;
use crate::model::media::{post_media, MediaResource};
use crate::model::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    pub id: String,
    pub username: Option<String>,
}

/// A post. Fields marked full-only are empty until the post is preloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub shortcode: String,
    pub id: String,
    /// `GraphImage`, `GraphVideo` or `GraphSidecar`.
    pub typename: String,
    pub created_time: Option<DateTime<Utc>>,
    pub caption: Option<String>,
    pub likes_count: u64,
    pub comments_count: u64,
    pub is_video: bool,
    /// Full-only.
    pub owner: Option<Owner>,
    /// Full-only.
    pub media: Vec<MediaResource>,
    #[serde(skip)]
    pub position: Option<usize>,
    #[serde(skip)]
    pub preloaded: bool,
}

impl Post {
    /// Build a post from a wire node. `full` selects whether the full-only
    /// fields are taken from the node.
    pub fn from_node(node: &PostNode, full: bool) -> Self {
        let typename = node.media.typename.clone().unwrap_or_else(|| {
            if node.edge_sidecar_to_children.is_some() {
                "GraphSidecar".to_string()
            } else if node.media.is_video {
                "GraphVideo".to_string()
            } else {
                "GraphImage".to_string()
            }
        });

        Self {
            shortcode: node.shortcode.clone(),
            id: node.id.clone(),
            typename,
            created_time: node
                .taken_at_timestamp
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
            caption: node.caption(),
            likes_count: node.likes_count(),
            comments_count: node.comments_count(),
            is_video: node.media.is_video,
            owner: if full {
                node.owner.as_ref().map(|o| Owner {
                    id: o.id.clone(),
                    username: o.username.clone(),
                })
            } else {
                None
            },
            media: if full { post_media(node) } else { Vec::new() },
            position: None,
            preloaded: full,
        }
    }

    /// A post known only by its shortcode, e.g. from a URL.
    pub fn from_shortcode(shortcode: impl Into<String>) -> Self {
        Self {
            shortcode: shortcode.into(),
            id: String::new(),
            typename: String::new(),
            created_time: None,
            caption: None,
            likes_count: 0,
            comments_count: 0,
            is_video: false,
            owner: None,
            media: Vec::new(),
            position: None,
            preloaded: false,
        }
    }

    pub fn is_multi_media(&self) -> bool {
        self.media.len() > 1
    }
}

impl Record for Post {
    const KIND: &'static str = "post";

    const SUMMARY_FIELDS: &'static [&'static str] = &[
        "shortcode",
        "id",
        "typename",
        "created_time",
        "caption",
        "likes_count",
        "comments_count",
        "is_video",
    ];

    const FULL_FIELDS: &'static [&'static str] = &["owner", "media_count"];

    fn key(&self) -> &str {
        &self.shortcode
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = Some(position);
    }

    fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    fn decode_summary(decoder: &dyn Decoder, node: &Value) -> Result<Self> {
        decoder.post_summary(node)
    }

    fn detail_request(&self) -> Option<ApiRequest> {
        Some(ApiRequest::post(&self.shortcode))
    }

    fn decode_detail(decoder: &dyn Decoder, data: &Value) -> Result<Self> {
        decoder.post_detail(data)
    }

    fn promote(&mut self, full: Self) {
        let position = self.position.or(full.position);
        *self = full;
        self.position = position;
        self.preloaded = true;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "shortcode" => Some(FieldValue::Text(self.shortcode.clone())),
            "id" => Some(FieldValue::Text(self.id.clone())),
            "typename" => Some(FieldValue::Text(self.typename.clone())),
            "created_time" => self.created_time.map(|t| FieldValue::Int(t.timestamp())),
            "caption" => Some(FieldValue::Text(self.caption.clone().unwrap_or_default())),
            "likes_count" => Some(FieldValue::Int(self.likes_count as i64)),
            "comments_count" => Some(FieldValue::Int(self.comments_count as i64)),
            "is_video" => Some(FieldValue::Bool(self.is_video)),
            "owner" => self
                .owner
                .as_ref()
                .map(|o| FieldValue::Text(o.username.clone().unwrap_or_else(|| o.id.clone()))),
            "media_count" if self.preloaded => Some(FieldValue::Int(self.media.len() as i64)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node() -> PostNode {
        serde_json::from_value(json!({
            "__typename": "GraphSidecar",
            "shortcode": "B1abc",
            "id": "123",
            "taken_at_timestamp": 1_600_000_000,
            "owner": {"id": "9", "username": "alice"},
            "edge_media_to_caption": {"edges": [{"node": {"text": "hello"}}]},
            "edge_media_preview_like": {"count": 7},
            "edge_media_to_comment": {"count": 2},
            "edge_sidecar_to_children": {"edges": [
                {"node": {"display_url": "https://cdn/1.jpg"}},
                {"node": {"is_video": true, "video_url": "https://cdn/2.mp4"}}
            ]}
        }))
        .unwrap()
    }

    #[test]
    fn test_summary_leaves_full_fields_empty() {
        let post = Post::from_node(&node(), false);
        assert_eq!(post.shortcode, "B1abc");
        assert_eq!(post.caption.as_deref(), Some("hello"));
        assert_eq!(post.likes_count, 7);
        assert_eq!(post.comments_count, 2);
        assert!(post.owner.is_none());
        assert!(post.media.is_empty());
        assert!(!post.preloaded);
    }

    #[test]
    fn test_full_post_has_media_in_order() {
        let post = Post::from_node(&node(), true);
        assert!(post.is_multi_media());
        assert_eq!(post.media[0].url, "https://cdn/1.jpg");
        assert_eq!(post.media[1].url, "https://cdn/2.mp4");
        assert_eq!(post.owner.unwrap().username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_promote_is_idempotent_and_keeps_position() {
        let mut post = Post::from_node(&node(), false);
        post.set_position(4);
        let full = Post::from_node(&node(), true);

        post.promote(full.clone());
        let once = post.clone();
        post.promote(full);

        assert_eq!(post, once);
        assert_eq!(post.position, Some(4));
        assert!(post.preloaded);
    }

    #[test]
    fn test_full_only_field_hidden_on_summary() {
        let summary = Post::from_node(&node(), false);
        assert_eq!(summary.field("media_count"), None);
        assert_eq!(summary.field("likes_count"), Some(FieldValue::Int(7)));
    }
}
