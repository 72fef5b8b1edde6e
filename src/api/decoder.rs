//! Pluggable decoding of remote payloads.
//!
//! The fetch client and the pipeline only see [`Decoder`]; everything that
//! knows the shape of the remote JSON lives in [`GraphQlDecoder`]. Decode
//! failures are [`Error::MalformedResponse`] and are never retried.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::endpoints::Listing;
use crate::api::types::{CommentNode, Connection, LoginResponse, PostNode, ProfileNode};
use crate::error::{Error, Result};
use crate::model::{Comment, Post, Profile};

/// One listing page before the nodes are decoded into records.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub nodes: Vec<Value>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
    /// Size of the whole listing, when the server advertises it.
    pub total: Option<u64>,
}

/// Outcome of a login-type request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginReply {
    Authenticated {
        user_id: Option<String>,
    },
    TwoFactor {
        username: String,
        identifier: String,
        obfuscated_phone: Option<String>,
    },
    Checkpoint {
        url: String,
    },
    Rejected {
        message: String,
    },
}

pub trait Decoder: Send + Sync {
    /// Unwrap the response envelope, returning its data object.
    fn envelope(&self, payload: Value) -> Result<Value>;

    fn page(&self, data: &Value, listing: &Listing) -> Result<RawPage>;

    fn post_summary(&self, node: &Value) -> Result<Post>;

    fn post_detail(&self, data: &Value) -> Result<Post>;

    fn profile_summary(&self, node: &Value) -> Result<Profile>;

    fn profile_detail(&self, data: &Value) -> Result<Profile>;

    fn comment(&self, node: &Value) -> Result<Comment>;

    /// Reply to the credential and two-factor endpoints.
    fn login_reply(&self, payload: &Value) -> Result<LoginReply>;

    /// Reply to a checkpoint security code submission.
    fn checkpoint_reply(&self, payload: &Value) -> Result<LoginReply>;
}

/// Decoder for the web GraphQL interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphQlDecoder;

fn parse<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T> {
    T::deserialize(value).map_err(|e| Error::MalformedResponse(format!("{}: {}", what, e)))
}

fn object<'a>(data: &'a Value, key: &str, what: &str) -> Result<&'a Value> {
    match data.get(key) {
        Some(Value::Null) => Err(Error::NotFound(what.to_string())),
        Some(value) => Ok(value),
        None => Err(Error::MalformedResponse(format!("'{}' missing from {}", key, what))),
    }
}

fn is_auth_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("login_required")
        || message.contains("checkpoint_required")
        || message.contains("not-logged-in")
}

impl Decoder for GraphQlDecoder {
    fn envelope(&self, payload: Value) -> Result<Value> {
        if payload.get("require_login").and_then(Value::as_bool) == Some(true) {
            return Err(Error::AuthExpired);
        }

        let status = payload.get("status").and_then(Value::as_str);
        let message = payload.get("message").and_then(Value::as_str);

        if status == Some("fail") || (message.is_some() && status != Some("ok")) {
            let message = message.unwrap_or("request failed").to_string();
            if is_auth_message(&message) {
                return Err(Error::AuthExpired);
            }
            if payload.get("spam").and_then(Value::as_bool) == Some(true)
                || message.to_ascii_lowercase().contains("wait a few minutes")
            {
                return Err(Error::RateLimited { retry_after: None });
            }
            return Err(Error::Api(message));
        }

        let Value::Object(mut map) = payload else {
            return Err(Error::MalformedResponse("response is not an object".into()));
        };
        map.remove("data")
            .or_else(|| map.remove("graphql"))
            .ok_or_else(|| Error::MalformedResponse("response has no data".into()))
    }

    fn page(&self, data: &Value, listing: &Listing) -> Result<RawPage> {
        let parent = object(data, listing.struct_key(), listing.name())?;
        let edge = parent.get(listing.edge_key()).ok_or_else(|| {
            Error::MalformedResponse(format!("'{}' missing from page", listing.edge_key()))
        })?;

        let connection: Connection<Value> = parse(edge, listing.name())?;
        let page_info = connection.page_info.unwrap_or_default();
        Ok(RawPage {
            nodes: connection.edges.into_iter().map(|e| e.node).collect(),
            has_next_page: page_info.has_next_page,
            end_cursor: page_info.end_cursor.filter(|c| !c.is_empty()),
            total: connection.count,
        })
    }

    fn post_summary(&self, node: &Value) -> Result<Post> {
        let node: PostNode = parse(node, "post node")?;
        Ok(Post::from_node(&node, false))
    }

    fn post_detail(&self, data: &Value) -> Result<Post> {
        let node: PostNode = parse(object(data, "shortcode_media", "post")?, "post")?;
        Ok(Post::from_node(&node, true))
    }

    fn profile_summary(&self, node: &Value) -> Result<Profile> {
        let node: ProfileNode = parse(node, "profile node")?;
        Ok(Profile::from_node(&node, false))
    }

    fn profile_detail(&self, data: &Value) -> Result<Profile> {
        let node: ProfileNode = parse(object(data, "user", "profile")?, "profile")?;
        Ok(Profile::from_node(&node, true))
    }

    fn comment(&self, node: &Value) -> Result<Comment> {
        let node: CommentNode = parse(node, "comment node")?;
        Ok(Comment::from_node(&node))
    }

    fn login_reply(&self, payload: &Value) -> Result<LoginReply> {
        let reply: LoginResponse = parse(payload, "login reply")?;

        if reply.two_factor_required {
            let info = reply.two_factor_info.ok_or_else(|| {
                Error::MalformedResponse("two-factor reply without two_factor_info".into())
            })?;
            return Ok(LoginReply::TwoFactor {
                username: info.username,
                identifier: info.two_factor_identifier,
                obfuscated_phone: info.obfuscated_phone_number,
            });
        }

        if let Some(url) = reply.checkpoint_url {
            return Ok(LoginReply::Checkpoint { url });
        }

        if reply.status.as_deref() == Some("ok") && reply.authenticated == Some(true) {
            let user_id = reply.user_id.and_then(|v| match v {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            return Ok(LoginReply::Authenticated { user_id });
        }

        let message = match (reply.message, reply.user) {
            (Some(message), _) if !message.is_empty() => message,
            (_, Some(Value::Bool(false))) => "user does not exist".to_string(),
            _ => "wrong password".to_string(),
        };
        Ok(LoginReply::Rejected { message })
    }

    fn checkpoint_reply(&self, payload: &Value) -> Result<LoginReply> {
        let reply: LoginResponse = parse(payload, "checkpoint reply")?;
        if reply.status.as_deref() == Some("ok") {
            return Ok(LoginReply::Authenticated { user_id: None });
        }
        Ok(LoginReply::Rejected {
            message: reply
                .message
                .unwrap_or_else(|| "incorrect security code".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_unwraps_data_and_graphql() {
        let decoder = GraphQlDecoder;
        let data = decoder
            .envelope(json!({"data": {"user": {}}, "status": "ok"}))
            .unwrap();
        assert_eq!(data, json!({"user": {}}));

        let data = decoder
            .envelope(json!({"graphql": {"shortcode_media": {}}}))
            .unwrap();
        assert_eq!(data, json!({"shortcode_media": {}}));
    }

    #[test]
    fn test_envelope_classifies_failures() {
        let decoder = GraphQlDecoder;
        assert!(matches!(
            decoder.envelope(json!({"status": "fail", "message": "login_required"})),
            Err(Error::AuthExpired)
        ));
        assert!(matches!(
            decoder.envelope(json!({"status": "fail", "message": "Please wait a few minutes before you try again."})),
            Err(Error::RateLimited { .. })
        ));
        assert!(matches!(
            decoder.envelope(json!({"status": "fail", "message": "execution failure"})),
            Err(Error::Api(_))
        ));
        assert!(matches!(
            decoder.envelope(json!({"status": "ok"})),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_page() {
        let listing = Listing::Timeline {
            user_id: "1".into(),
        };
        let data = json!({"user": {"edge_owner_to_timeline_media": {
            "count": 5,
            "page_info": {"has_next_page": true, "end_cursor": "c1"},
            "edges": [{"node": {"shortcode": "a", "id": "1"}}, {"node": {"shortcode": "b", "id": "2"}}]
        }}});

        let page = GraphQlDecoder.page(&data, &listing).unwrap();
        assert_eq!(page.nodes.len(), 2);
        assert_eq!(page.total, Some(5));
        assert!(page.has_next_page);
        assert_eq!(page.end_cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn test_page_of_missing_user_is_not_found() {
        let listing = Listing::Timeline {
            user_id: "1".into(),
        };
        assert!(matches!(
            GraphQlDecoder.page(&json!({"user": null}), &listing),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_post_detail_shape_drift_is_malformed() {
        let result = GraphQlDecoder.post_detail(&json!({"shortcode_media": {"id": "1"}}));
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn test_login_replies() {
        let decoder = GraphQlDecoder;
        assert_eq!(
            decoder
                .login_reply(&json!({"status": "ok", "authenticated": true, "userId": 42}))
                .unwrap(),
            LoginReply::Authenticated {
                user_id: Some("42".into())
            }
        );
        assert_eq!(
            decoder
                .login_reply(&json!({
                    "status": "fail",
                    "two_factor_required": true,
                    "two_factor_info": {
                        "username": "alice",
                        "two_factor_identifier": "tf1",
                        "obfuscated_phone_number": "12"
                    }
                }))
                .unwrap(),
            LoginReply::TwoFactor {
                username: "alice".into(),
                identifier: "tf1".into(),
                obfuscated_phone: Some("12".into())
            }
        );
        assert_eq!(
            decoder
                .login_reply(&json!({"status": "fail", "checkpoint_url": "/challenge/1/"}))
                .unwrap(),
            LoginReply::Checkpoint {
                url: "/challenge/1/".into()
            }
        );
        assert_eq!(
            decoder
                .login_reply(&json!({"status": "ok", "authenticated": false, "user": false}))
                .unwrap(),
            LoginReply::Rejected {
                message: "user does not exist".into()
            }
        );
    }
}
