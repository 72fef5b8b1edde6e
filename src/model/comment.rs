//! Comments on a post.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::api::client::ApiRequest;
use crate::api::decoder::Decoder;
use crate::api::types::CommentNode;
use crate::error::Result;
use crate::model::{FieldValue, Record};

/// A comment. Listings deliver comments complete, so there is nothing to
/// preload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: String,
    /// Username of the commenter.
    pub author: String,
    pub text: String,
    pub created_time: Option<DateTime<Utc>>,
    pub likes_count: u64,
    #[serde(skip)]
    pub position: Option<usize>,
}

impl Comment {
    pub fn from_node(node: &CommentNode) -> Self {
        Self {
            id: node.id.clone(),
            author: node
                .owner
                .as_ref()
                .and_then(|o| o.username.clone())
                .unwrap_or_default(),
            text: node.text.clone(),
            created_time: node
                .created_at
                .and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
            likes_count: node.edge_liked_by.as_ref().map_or(0, |c| c.count),
            position: None,
        }
    }
}

impl Record for Comment {
    const KIND: &'static str = "comment";

    const SUMMARY_FIELDS: &'static [&'static str] =
        &["id", "author", "text", "created_time", "likes_count"];

    const FULL_FIELDS: &'static [&'static str] = &[];

    fn key(&self) -> &str {
        &self.id
    }

    fn position(&self) -> Option<usize> {
        self.position
    }

    fn set_position(&mut self, position: usize) {
        self.position = Some(position);
    }

    fn is_preloaded(&self) -> bool {
        true
    }

    fn decode_summary(decoder: &dyn Decoder, node: &Value) -> Result<Self> {
        decoder.comment(node)
    }

    fn detail_request(&self) -> Option<ApiRequest> {
        None
    }

    fn decode_detail(decoder: &dyn Decoder, data: &Value) -> Result<Self> {
        decoder.comment(data)
    }

    fn promote(&mut self, full: Self) {
        let position = self.position.or(full.position);
        *self = full;
        self.position = position;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::Text(self.id.clone())),
            "author" => Some(FieldValue::Text(self.author.clone())),
            "text" => Some(FieldValue::Text(self.text.clone())),
            "created_time" => self.created_time.map(|t| FieldValue::Int(t.timestamp())),
            "likes_count" => Some(FieldValue::Int(self.likes_count as i64)),
            _ => None,
        }
    }
}
