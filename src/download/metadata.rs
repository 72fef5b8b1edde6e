//! JSON sidecar files.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::fs::{sanitize_filename, write_atomic};
use crate::model::{Comment, Post};

pub fn metadata_path(dest: &Path, shortcode: &str) -> Result<PathBuf> {
    Ok(dest.join(format!("{}.json", sanitize_filename(shortcode)?)))
}

/// Sidecar content: the post's own fields when `post` is given, plus
/// `comments` and `likes` (usernames) when collected.
pub fn sidecar(post: Option<&Post>, comments: Option<&[Comment]>, likes: Option<&[String]>) -> Result<Value> {
    let mut map = match post.map(serde_json::to_value).transpose()? {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    if let Some(comments) = comments {
        map.insert("comments".into(), serde_json::to_value(comments)?);
    }
    if let Some(likes) = likes {
        map.insert("likes".into(), serde_json::to_value(likes)?);
    }
    Ok(Value::Object(map))
}

/// Write `<dest>/<shortcode>.json` with sorted keys.
///
/// Returns `false` when an identical file is already there.
pub fn write_sidecar(shortcode: &str, value: &Value, dest: &Path) -> Result<bool> {
    let path = metadata_path(dest, shortcode)?;
    // serde_json::Value keeps object keys sorted
    let mut data = serde_json::to_vec_pretty(value)?;
    data.push(b'\n');

    if fs::read(&path).is_ok_and(|existing| existing == data) {
        tracing::debug!("Metadata unchanged: {}", path.display());
        return Ok(false);
    }
    write_atomic(&path, &data)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_is_sorted_and_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut post = Post::from_shortcode("B1");
        post.caption = Some("hi".into());

        let value = sidecar(Some(&post), None, None).unwrap();
        assert!(write_sidecar("B1", &value, dir.path()).unwrap());
        assert!(!write_sidecar("B1", &value, dir.path()).unwrap());

        let text = fs::read_to_string(dir.path().join("B1.json")).unwrap();
        let caption = text.find("\"caption\"").unwrap();
        let shortcode = text.find("\"shortcode\"").unwrap();
        assert!(caption < shortcode);

        post.likes_count = 5;
        let value = sidecar(Some(&post), None, None).unwrap();
        assert!(write_sidecar("B1", &value, dir.path()).unwrap());
    }

    #[test]
    fn test_comments_and_likes_without_metadata() {
        let comment = Comment {
            id: "1".into(),
            author: "carol".into(),
            text: "nice".into(),
            created_time: None,
            likes_count: 0,
            position: Some(0),
        };
        let comments = vec![comment];
        let likes = vec!["alice".to_string()];

        let value = sidecar(None, Some(comments.as_slice()), Some(likes.as_slice())).unwrap();
        assert_eq!(value["comments"][0]["author"], "carol");
        assert_eq!(value["likes"], serde_json::json!(["alice"]));
        assert!(value.get("shortcode").is_none());
    }
}
