//! Endpoint URLs, GraphQL query hashes and listing definitions.

use serde_json::{json, Value};

use crate::api::client::ApiRequest;

pub const BASE_URL: &str = "https://www.instagram.com";
pub const MID_URL: &str = "https://www.instagram.com/web/__mid/";
pub const LOGIN_URL: &str = "https://www.instagram.com/accounts/login/ajax/";
pub const TWO_FACTOR_URL: &str = "https://www.instagram.com/accounts/login/ajax/two_factor/";
pub const LOGOUT_URL: &str = "https://www.instagram.com/accounts/logout/";
pub const QUERY_PATH: &str = "/graphql/query/";

/// Default number of edges requested per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub mod query_hash {
    pub const LIKES: &str = "e0f59e4a1c8d78d0161873bc2ee7ec44";
    pub const FOLLOWERS: &str = "56066f031e6239f35a904ac20c9f37d9";
    pub const FOLLOWINGS: &str = "c56ee0ae1f89cdbd1c89e2bc6b8f3d18";
    pub const TIMELINE: &str = "66eb9403e44cc12e5b5ecda48b667d41";
    pub const SAVED: &str = "8c86fed24fa03a8a2eea2a70a80c7b6b";
    pub const TAGGED: &str = "ff260833edf142911047af6024eb634a";
    pub const IGTV: &str = "7a5416b9d9138c7a520a66f58a53132c";
    pub const HASHTAG: &str = "f92f56d47dc7a55b606908374b43a314";
    pub const COMMENTS: &str = "f0986789a5c5d17c2400faebf16efd0d";
}

pub fn profile_path(username: &str) -> String {
    format!("/{}/", username)
}

pub fn post_path(shortcode: &str) -> String {
    format!("/p/{}/", shortcode)
}

pub fn hashtag_path(tag: &str) -> String {
    format!("/explore/tags/{}/", tag)
}

/// A paginated remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Timeline { user_id: String },
    Tagged { user_id: String },
    Igtv { user_id: String },
    Saved { user_id: String },
    Followers { user_id: String },
    Followings { user_id: String },
    Likes { shortcode: String },
    Comments { shortcode: String },
    HashtagRecent { tag: String },
    /// The few top posts shown on a hashtag page. Served in one page.
    HashtagTop { tag: String },
}

impl Listing {
    /// GraphQL query serving this listing; `None` when it comes from a page.
    pub fn query_hash(&self) -> Option<&'static str> {
        Some(match self {
            Listing::Timeline { .. } => query_hash::TIMELINE,
            Listing::Tagged { .. } => query_hash::TAGGED,
            Listing::Igtv { .. } => query_hash::IGTV,
            Listing::Saved { .. } => query_hash::SAVED,
            Listing::Followers { .. } => query_hash::FOLLOWERS,
            Listing::Followings { .. } => query_hash::FOLLOWINGS,
            Listing::Likes { .. } => query_hash::LIKES,
            Listing::Comments { .. } => query_hash::COMMENTS,
            Listing::HashtagRecent { .. } => query_hash::HASHTAG,
            Listing::HashtagTop { .. } => return None,
        })
    }

    /// Request for one page of `first` items after `after`.
    pub fn request(&self, first: usize, after: Option<&str>) -> ApiRequest {
        match self {
            Listing::HashtagTop { tag } => ApiRequest::hashtag(tag),
            _ => ApiRequest::graphql(
                self.query_hash().unwrap_or_default(),
                &self.variables(first, after),
            ),
        }
    }

    /// Key of the object holding the edge under `data`.
    pub fn struct_key(&self) -> &'static str {
        match self {
            Listing::Likes { .. } | Listing::Comments { .. } => "shortcode_media",
            Listing::HashtagRecent { .. } | Listing::HashtagTop { .. } => "hashtag",
            _ => "user",
        }
    }

    pub fn edge_key(&self) -> &'static str {
        match self {
            Listing::Timeline { .. } => "edge_owner_to_timeline_media",
            Listing::Tagged { .. } => "edge_user_to_photos_of_you",
            Listing::Igtv { .. } => "edge_felix_video_timeline",
            Listing::Saved { .. } => "edge_saved_media",
            Listing::Followers { .. } => "edge_followed_by",
            Listing::Followings { .. } => "edge_follow",
            Listing::Likes { .. } => "edge_liked_by",
            Listing::Comments { .. } => "edge_media_to_comment",
            Listing::HashtagRecent { .. } => "edge_hashtag_to_media",
            Listing::HashtagTop { .. } => "edge_hashtag_to_top_posts",
        }
    }

    /// Listings the server only serves to logged in users.
    pub fn requires_auth(&self) -> bool {
        matches!(
            self,
            Listing::Saved { .. } | Listing::Followers { .. } | Listing::Followings { .. }
        )
    }

    /// Short name used for logging and destination folders.
    pub fn name(&self) -> &'static str {
        match self {
            Listing::Timeline { .. } => "timeline",
            Listing::Tagged { .. } => "tagged",
            Listing::Igtv { .. } => "igtv",
            Listing::Saved { .. } => "saved",
            Listing::Followers { .. } => "followers",
            Listing::Followings { .. } => "followings",
            Listing::Likes { .. } => "likes",
            Listing::Comments { .. } => "comments",
            Listing::HashtagRecent { .. } => "recent",
            Listing::HashtagTop { .. } => "top",
        }
    }

    /// Query variables for one page.
    pub fn variables(&self, first: usize, after: Option<&str>) -> Value {
        let mut vars = match self {
            Listing::Timeline { user_id }
            | Listing::Tagged { user_id }
            | Listing::Igtv { user_id }
            | Listing::Saved { user_id } => json!({ "id": user_id }),
            Listing::Followers { user_id } | Listing::Followings { user_id } => {
                json!({ "id": user_id, "include_reel": false, "fetch_mutual": false })
            }
            Listing::Likes { shortcode } => json!({ "shortcode": shortcode, "include_reel": false }),
            Listing::Comments { shortcode } => json!({ "shortcode": shortcode }),
            Listing::HashtagRecent { tag } | Listing::HashtagTop { tag } => json!({ "tag_name": tag }),
        };

        if let Some(map) = vars.as_object_mut() {
            map.insert("first".into(), json!(first));
            if let Some(cursor) = after {
                map.insert("after".into(), json!(cursor));
            }
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_include_cursor_only_when_present() {
        let listing = Listing::Timeline {
            user_id: "42".into(),
        };
        assert_eq!(listing.variables(12, None), json!({"id": "42", "first": 12}));
        assert_eq!(
            listing.variables(12, Some("QVF")),
            json!({"id": "42", "first": 12, "after": "QVF"})
        );
    }

    #[test]
    fn test_top_posts_come_from_the_hashtag_page() {
        let top = Listing::HashtagTop { tag: "rust".into() };
        assert_eq!(top.query_hash(), None);
        assert_eq!(top.request(50, None), ApiRequest::hashtag("rust"));
        assert!(top.request(50, None).url().ends_with("/explore/tags/rust/"));

        let comments = Listing::Comments {
            shortcode: "B1".into(),
        };
        assert_eq!(
            comments.request(10, Some("c")),
            ApiRequest::graphql(
                query_hash::COMMENTS,
                &json!({"shortcode": "B1", "first": 10, "after": "c"})
            )
        );
    }

    #[test]
    fn test_listing_keys() {
        let likes = Listing::Likes {
            shortcode: "B1".into(),
        };
        assert_eq!(likes.struct_key(), "shortcode_media");
        assert_eq!(likes.edge_key(), "edge_liked_by");
        assert!(!likes.requires_auth());
        assert!(Listing::Saved {
            user_id: "1".into()
        }
        .requires_auth());
    }
}
