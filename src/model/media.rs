//! Media resources and rendition selection.

use serde::Serialize;

use crate::api::types::{DisplayResource, MediaNode, PostNode};

/// Type of media content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// One downloadable file of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaResource {
    pub kind: MediaKind,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl MediaResource {
    /// Pick the file to download for one media node: the video if there is
    /// one, otherwise the largest image rendition.
    pub fn from_node(node: &MediaNode) -> Option<Self> {
        let (width, height) = node
            .dimensions
            .map(|d| (d.width, d.height))
            .unwrap_or((0, 0));

        if node.is_video {
            if let Some(url) = &node.video_url {
                return Some(Self {
                    kind: MediaKind::Video,
                    url: url.clone(),
                    width,
                    height,
                });
            }
        }

        if let Some(best) = best_display_resource(&node.display_resources) {
            return Some(Self {
                kind: MediaKind::Image,
                url: best.src.clone(),
                width: best.config_width,
                height: best.config_height,
            });
        }

        node.display_url.as_ref().map(|url| Self {
            kind: MediaKind::Image,
            url: url.clone(),
            width,
            height,
        })
    }

    pub fn resolution(&self) -> u64 {
        (self.width as u64) * (self.height as u64)
    }
}

/// The rendition with the largest pixel area. Ties keep the later entry,
/// which is how the server orders ascending sizes.
pub fn best_display_resource(resources: &[DisplayResource]) -> Option<&DisplayResource> {
    resources
        .iter()
        .max_by_key(|r| (r.config_width as u64) * (r.config_height as u64))
}

/// All media of a post, in display order.
pub fn post_media(node: &PostNode) -> Vec<MediaResource> {
    match &node.edge_sidecar_to_children {
        Some(children) if !children.edges.is_empty() => children
            .edges
            .iter()
            .filter_map(|edge| MediaResource::from_node(&edge.node))
            .collect(),
        _ => MediaResource::from_node(&node.media).into_iter().collect(),
    }
}

/// File extension for a downloaded resource, from its content type and
/// falling back to the URL.
pub fn file_extension(content_type: Option<&str>, url: &str) -> String {
    if let Some(ext) = content_type.and_then(mime_to_extension) {
        return ext.to_string();
    }
    extract_extension_from_url(url).unwrap_or_else(|| "bin".to_string())
}

/// Extract extension from URL path.
fn extract_extension_from_url(url: &str) -> Option<String> {
    let path = url.split('?').next()?;
    let filename = path.rsplit('/').next()?;
    let (_, ext) = filename.rsplit_once('.')?;

    if !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_lowercase())
    } else {
        None
    }
}

/// Convert a MIME type to a file extension.
fn mime_to_extension(content_type: &str) -> Option<&'static str> {
    let mimetype = content_type.split(';').next()?.trim();
    let known = match mimetype {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        _ => None,
    };
    known.or_else(|| {
        mime_guess::get_mime_extensions_str(mimetype).and_then(|exts| exts.first().copied())
    })
}
