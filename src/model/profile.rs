//! Profiles.

use serde::Serialize;
use serde_json::Value;

use crate::api::client::ApiRequest;
use crate::api::decoder::Decoder;
use crate::api::types::ProfileNode;
use crate::error::Result;
use crate::model::{FieldValue, Record};

/// A user profile. Counts, biography and website are full-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub username: String,
    pub id: String,
    pub full_name: Option<String>,
    pub is_verified: bool,
    pub is_private: bool,
    pub profile_picture_url: Option<String>,
    pub biography: Option<String>,
    pub website: Option<String>,
    pub followers_count: Option<u64>,
    pub followings_count: Option<u64>,
    pub posts_count: Option<u64>,
    #[serde(skip)]
    pub position: Option<usize>,
    #[serde(skip)]
    pub preloaded: bool,
}

impl Profile {
    pub fn from_node(node: &ProfileNode, full: bool) -> Self {
        let picture = node
            .profile_pic_url_hd
            .clone()
            .or_else(|| node.profile_pic_url.clone());

        Self {
            username: node.username.clone(),
            id: node.id.clone(),
            full_name: node.full_name.clone().filter(|n| !n.is_empty()),
            is_verified: node.is_verified,
            is_private: node.is_private,
            profile_picture_url: picture,
            biography: if full { node.biography.clone() } else { None },
            website: if full { node.external_url.clone() } else { None },
            followers_count: if full {
                node.edge_followed_by.as_ref().map(|c| c.count)
            } else {
                None
            },
            followings_count: if full {
                node.edge_follow.as_ref().map(|c| c.count)
            } else {
                None
            },
            posts_count: if full {
                node.edge_owner_to_timeline_media.as_ref().map(|c| c.count)
            } else {
                None
            },
            position: None,
            preloaded: full,
        }
    }

    /// A profile known only by its username.
    pub fn from_username(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            id: String::new(),
            full_name: None,
            is_verified: false,
            is_private: false,
            profile_picture_url: None,
            biography: None,
            website: None,
            followers_count: None,
            followings_count: None,
            posts_count: None,
            position: None,
            preloaded: false,
        }
    }
}

impl Record for Profile {
    const KIND: &'static str = "profile";

    const SUMMARY_FIELDS: &'static [&'static str] = &[
        "username",
        "id",
        "full_name",
        "is_verified",
        "is_private",
    ];

    const FULL_FIELDS: &'static [&'static str] = &[
        "biography",
        "website",
        "followers_count",
        "followings_count",
        "posts_count",
    ];

    fn key(&self) -> &str {
        &self.username
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
        decoder.profile_summary(node)
    }

    fn detail_request(&self) -> Option<ApiRequest> {
        Some(ApiRequest::profile(&self.username))
    }

    fn decode_detail(decoder: &dyn Decoder, data: &Value) -> Result<Self> {
        decoder.profile_detail(data)
    }

    fn promote(&mut self, full: Self) {
        let position = self.position.or(full.position);
        *self = full;
        self.position = position;
        self.preloaded = true;
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        let count = |c: Option<u64>| c.map(|n| FieldValue::Int(n as i64));
        match name {
            "username" => Some(FieldValue::Text(self.username.clone())),
            "id" => Some(FieldValue::Text(self.id.clone())),
            "full_name" => Some(FieldValue::Text(self.full_name.clone().unwrap_or_default())),
            "is_verified" => Some(FieldValue::Bool(self.is_verified)),
            "is_private" => Some(FieldValue::Bool(self.is_private)),
            "biography" => self.biography.clone().map(FieldValue::Text),
            "website" => self.website.clone().map(FieldValue::Text),
            "followers_count" => count(self.followers_count),
            "followings_count" => count(self.followings_count),
            "posts_count" => count(self.posts_count),
            _ => None,
        }
    }
}
