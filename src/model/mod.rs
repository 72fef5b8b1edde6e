//! Records produced by listings.
//!
//! A record starts out as a summary decoded from a listing node and is
//! promoted to its full form once the detail fetch completes.

pub mod comment;
pub mod media;
pub mod post;
pub mod profile;

use std::fmt;

use serde_json::Value;

use crate::api::client::ApiRequest;
use crate::api::decoder::Decoder;
use crate::error::Result;

pub use comment::Comment;
pub use media::{MediaKind, MediaResource};
pub use post::{Owner, Post};
pub use profile::Profile;

/// A field value exposed to filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// An item that can flow through the pipeline.
pub trait Record: fmt::Debug + Clone + Send + Sync + 'static {
    /// Human readable kind, used in messages.
    const KIND: &'static str;

    /// Fields available before promotion.
    const SUMMARY_FIELDS: &'static [&'static str];

    /// Fields only available once promoted.
    const FULL_FIELDS: &'static [&'static str];

    /// Stable identifier (shortcode or username).
    fn key(&self) -> &str;

    /// Position in the listing, assigned by the paginator.
    fn position(&self) -> Option<usize>;

    fn set_position(&mut self, position: usize);

    fn is_preloaded(&self) -> bool;

    fn decode_summary(decoder: &dyn Decoder, node: &Value) -> Result<Self>;

    /// Request fetching the full record, `None` when the listing already
    /// delivers it complete.
    fn detail_request(&self) -> Option<ApiRequest>;

    fn decode_detail(decoder: &dyn Decoder, data: &Value) -> Result<Self>;

    /// Replace this record's fields with `full`. Applying the same detail
    /// twice leaves the record unchanged.
    fn promote(&mut self, full: Self);

    fn field(&self, name: &str) -> Option<FieldValue>;
}
