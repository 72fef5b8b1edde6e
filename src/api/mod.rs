//! Instagram web API access.
//!
//! This module provides:
//! - The raw HTTP transport and its test double
//! - The fetch client with throttling, retry and session renewal
//! - Request signing and browser headers
//! - Endpoint definitions, wire types and the payload decoder

pub mod auth;
pub mod client;
pub mod decoder;
pub mod endpoints;
pub mod retry;
pub mod transport;
pub mod types;

pub use client::{ApiRequest, FetchClient};
pub use decoder::{Decoder, GraphQlDecoder, LoginReply, RawPage};
pub use endpoints::Listing;
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, MediaStream, ReqwestTransport, Transport};
