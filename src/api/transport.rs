//! Raw HTTP transport.
//!
//! All network I/O in the crate goes through [`Transport`]. Production code
//! uses [`ReqwestTransport`]; tests plug in a scripted transport.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Client};

use crate::error::{Error, Result};

/// HTTP method used by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A transport-level request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            form: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a query parameter by name.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a header by (case-insensitive) name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A cookie set by a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    /// `Max-Age` in seconds, if the server sent one.
    pub max_age: Option<i64>,
}

impl SetCookie {
    /// Parse a `Set-Cookie` header value. Only name, value and `Max-Age` are kept.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let max_age = parts.find_map(|attr| {
            let (key, val) = attr.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("max-age") {
                val.trim().parse::<i64>().ok()
            } else {
                None
            }
        });

        Some(Self {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            max_age,
        })
    }
}

/// A fully buffered transport-level response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lower-case.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_cookies(&self) -> Vec<SetCookie> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, v)| SetCookie::parse(v))
            .collect()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Retry-After` in whole seconds.
    pub fn retry_after(&self) -> Option<u64> {
        self.header("retry-after")?.trim().parse().ok()
    }

    /// Parse the body as JSON. A body that is not JSON is protocol drift.
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.body).map_err(|e| {
            let text = self.text();
            Error::MalformedResponse(format!(
                "expected JSON ({}) - Response: {}",
                e,
                &text[..floor_char_boundary(&text, 300)]
            ))
        })
    }
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    let mut end = text.len().min(max);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// A streamed media body.
pub struct MediaStream {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Network seam used by the fetch client and the downloader.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and buffer the whole response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Open a streaming GET for a static media URL (no auth attached).
    async fn stream(&self, url: &str) -> Result<MediaStream>;
}

/// Map an unsuccessful HTTP status to the error taxonomy.
pub fn status_error(status: u16, retry_after: Option<u64>, context: &str) -> Option<Error> {
    match status {
        200..=399 => None,
        401 => Some(Error::AuthExpired),
        404 => Some(Error::NotFound(context.to_string())),
        429 => Some(Error::RateLimited { retry_after }),
        500..=599 => Some(Error::TransientNetwork(format!(
            "HTTP {} from {}",
            status, context
        ))),
        _ => Some(Error::Api(format!("HTTP {} from {}", status, context))),
    }
}

/// Transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn network_error(err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        Error::TransientNetwork(err.to_string())
    } else {
        Error::Http(err)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        tracing::debug!("{:?} {}", request.method, request.url);

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        tracing::debug!("Response status: {}", status);

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(network_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn stream(&self, url: &str) -> Result<MediaStream> {
        let response = self.client.get(url).send().await.map_err(network_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        if let Some(err) = status_error(status, retry_after, url) {
            return Err(match err {
                Error::AuthExpired | Error::Api(_) => {
                    Error::Download(format!("Failed to download file: HTTP {}", status))
                }
                other => other,
            });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map_err(|e| Error::TransientNetwork(format!("Stream error: {}", e)))
            .boxed();

        Ok(MediaStream {
            content_type,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory transport for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::StreamExt;

    use super::{status_error, HttpRequest, HttpResponse, MediaStream, Transport};
    use crate::error::{Error, Result};

    type Matcher = Box<dyn Fn(&HttpRequest) -> bool + Send + Sync>;

    /// One scripted reply.
    #[derive(Debug, Clone)]
    pub struct MockReply {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: Bytes,
        pub delay: Duration,
        pub network_failure: bool,
    }

    impl MockReply {
        pub fn json(status: u16, value: serde_json::Value) -> Self {
            Self {
                status,
                headers: vec![("content-type".into(), "application/json".into())],
                body: Bytes::from(value.to_string()),
                delay: Duration::ZERO,
                network_failure: false,
            }
        }

        pub fn status(status: u16) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body: Bytes::new(),
                delay: Duration::ZERO,
                network_failure: false,
            }
        }

        pub fn bytes(content_type: &str, body: &'static [u8]) -> Self {
            Self {
                status: 200,
                headers: vec![
                    ("content-type".into(), content_type.into()),
                    ("content-length".into(), body.len().to_string()),
                ],
                body: Bytes::from_static(body),
                delay: Duration::ZERO,
                network_failure: false,
            }
        }

        pub fn text(status: u16, body: &str) -> Self {
            Self {
                status,
                headers: vec![("content-type".into(), "text/html".into())],
                body: Bytes::from(body.to_string()),
                delay: Duration::ZERO,
                network_failure: false,
            }
        }

        pub fn network_failure() -> Self {
            Self {
                network_failure: true,
                ..Self::status(0)
            }
        }

        pub fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn cookie(mut self, raw: &str) -> Self {
            self.headers.push(("set-cookie".into(), raw.into()));
            self
        }
    }

    struct Route {
        matcher: Matcher,
        replies: VecDeque<MockReply>,
        repeat: bool,
    }

    /// Transport answering from scripted routes, in insertion order.
    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<Vec<Route>>,
        log: Mutex<Vec<HttpRequest>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every matching request with `reply`.
        pub fn on<F>(&self, matcher: F, reply: MockReply) -> &Self
        where
            F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
        {
            self.push(matcher, vec![reply], true)
        }

        /// Answer the next matching requests with `replies`, one each.
        pub fn once<F>(&self, matcher: F, replies: Vec<MockReply>) -> &Self
        where
            F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
        {
            self.push(matcher, replies, false)
        }

        fn push<F>(&self, matcher: F, replies: Vec<MockReply>, repeat: bool) -> &Self
        where
            F: Fn(&HttpRequest) -> bool + Send + Sync + 'static,
        {
            self.routes.lock().unwrap().push(Route {
                matcher: Box::new(matcher),
                replies: replies.into(),
                repeat,
            });
            self
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.log.lock().unwrap().clone()
        }

        pub fn count<F: Fn(&HttpRequest) -> bool>(&self, predicate: F) -> usize {
            self.log.lock().unwrap().iter().filter(|r| predicate(r)).count()
        }

        fn next_reply(&self, request: &HttpRequest) -> Option<MockReply> {
            self.log.lock().unwrap().push(request.clone());
            let mut routes = self.routes.lock().unwrap();
            for route in routes.iter_mut() {
                if route.replies.is_empty() || !(route.matcher)(request) {
                    continue;
                }
                return if route.repeat {
                    route.replies.front().cloned()
                } else {
                    route.replies.pop_front()
                };
            }
            None
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            let reply = self
                .next_reply(&request)
                .ok_or_else(|| Error::NotFound(format!("no mock route for {}", request.url)))?;
            if !reply.delay.is_zero() {
                tokio::time::sleep(reply.delay).await;
            }
            if reply.network_failure {
                return Err(Error::TransientNetwork("connection reset".into()));
            }
            Ok(HttpResponse {
                status: reply.status,
                headers: reply.headers,
                body: reply.body,
            })
        }

        async fn stream(&self, url: &str) -> Result<MediaStream> {
            let response = self.send(HttpRequest::get(url)).await?;
            if let Some(err) = status_error(response.status, response.retry_after(), url) {
                return Err(err);
            }
            let content_type = response.header("content-type").map(str::to_string);
            let content_length = Some(response.body.len() as u64);
            let chunks: Vec<Result<Bytes>> = response
                .body
                .chunks(4)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            Ok(MediaStream {
                content_type,
                content_length,
                body: futures::stream::iter(chunks).boxed(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_parse() {
        let cookie =
            SetCookie::parse("csrftoken=abc123; Domain=.instagram.com; Max-Age=31449600; Path=/")
                .unwrap();
        assert_eq!(cookie.name, "csrftoken");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.max_age, Some(31449600));

        let cookie = SetCookie::parse("sessionid=\"x:y\"; HttpOnly").unwrap();
        assert_eq!(cookie.value, "x:y");
        assert_eq!(cookie.max_age, None);

        assert!(SetCookie::parse("garbage").is_none());
    }

    #[test]
    fn test_status_error_classification() {
        assert!(status_error(200, None, "x").is_none());
        assert!(matches!(status_error(401, None, "x"), Some(Error::AuthExpired)));
        assert!(matches!(status_error(404, None, "x"), Some(Error::NotFound(_))));
        assert!(matches!(
            status_error(429, Some(7), "x"),
            Some(Error::RateLimited { retry_after: Some(7) })
        ));
        assert!(matches!(
            status_error(503, None, "x"),
            Some(Error::TransientNetwork(_))
        ));
        assert!(matches!(status_error(400, None, "x"), Some(Error::Api(_))));
    }

    #[test]
    fn test_response_json_is_malformed_on_html() {
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::from_static(b"<html>login</html>"),
        };
        assert!(matches!(response.json(), Err(Error::MalformedResponse(_))));
    }
}
