//! API response type definitions.

use serde::{Deserialize, Deserializer};

/// Accept ids sent either as strings or as numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

/// `{"count": N}` objects.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Count {
    #[serde(default)]
    pub count: u64,
}

/// Pagination info of an edge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

/// A GraphQL connection.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    pub count: Option<u64>,
    pub page_info: Option<PageInfo>,
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            count: None,
            page_info: None,
            edges: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextNode {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Dimensions {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// One rendition of an image.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayResource {
    pub src: String,
    #[serde(default)]
    pub config_width: u32,
    #[serde(default)]
    pub config_height: u32,
}

/// Media fields shared by posts and sidecar children.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaNode {
    #[serde(rename = "__typename")]
    pub typename: Option<String>,
    #[serde(default)]
    pub is_video: bool,
    pub display_url: Option<String>,
    #[serde(default)]
    pub display_resources: Vec<DisplayResource>,
    pub video_url: Option<String>,
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerNode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub profile_pic_url: Option<String>,
}

/// A post as found in listings and in `shortcode_media`.
#[derive(Debug, Clone, Deserialize)]
pub struct PostNode {
    pub shortcode: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(flatten)]
    pub media: MediaNode,
    pub owner: Option<OwnerNode>,
    pub taken_at_timestamp: Option<i64>,
    pub edge_media_to_caption: Option<Connection<TextNode>>,
    pub edge_media_preview_like: Option<Count>,
    pub edge_liked_by: Option<Count>,
    pub edge_media_to_comment: Option<Count>,
    pub edge_media_preview_comment: Option<Count>,
    pub edge_media_to_parent_comment: Option<Count>,
    pub edge_sidecar_to_children: Option<Connection<MediaNode>>,
}

impl PostNode {
    pub fn caption(&self) -> Option<String> {
        self.edge_media_to_caption
            .as_ref()
            .and_then(|c| c.edges.first())
            .map(|e| e.node.text.clone())
    }

    pub fn likes_count(&self) -> u64 {
        self.edge_media_preview_like
            .as_ref()
            .or(self.edge_liked_by.as_ref())
            .map(|c| c.count)
            .unwrap_or(0)
    }

    pub fn comments_count(&self) -> u64 {
        self.edge_media_preview_comment
            .as_ref()
            .or(self.edge_media_to_comment.as_ref())
            .or(self.edge_media_to_parent_comment.as_ref())
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

/// A user as found in follower listings and in profile pages.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileNode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub username: String,
    pub full_name: Option<String>,
    pub biography: Option<String>,
    pub external_url: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_private: bool,
    pub profile_pic_url: Option<String>,
    pub profile_pic_url_hd: Option<String>,
    pub edge_followed_by: Option<Count>,
    pub edge_follow: Option<Count>,
    pub edge_owner_to_timeline_media: Option<Count>,
}

/// A comment as found in `edge_media_to_comment`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommentNode {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub created_at: Option<i64>,
    pub owner: Option<OwnerNode>,
    pub edge_liked_by: Option<Count>,
}

/// The two-factor section of a login reply.
#[derive(Debug, Clone, Deserialize)]
pub struct TwoFactorInfo {
    pub username: String,
    pub two_factor_identifier: String,
    pub obfuscated_phone_number: Option<String>,
}

/// Reply of the login endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub authenticated: Option<bool>,
    #[serde(default)]
    pub user: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub two_factor_required: bool,
    pub two_factor_info: Option<TwoFactorInfo>,
    pub checkpoint_url: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<serde_json::Value>,
}
