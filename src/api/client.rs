//! Instagram fetch client.
//!
//! Attaches session credentials, spaces requests, retries transient
//! failures and classifies the rest. All network I/O of the crate goes
//! through here and, below it, the [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::api::auth::{extract_shared_data, gis_signature, rhx_gis, session_headers, BROWSER_HEADERS};
use crate::api::decoder::{Decoder, GraphQlDecoder};
use crate::api::endpoints::{hashtag_path, post_path, profile_path, BASE_URL, QUERY_PATH};
use crate::api::retry::{RetryPolicy, Throttle};
use crate::api::transport::{
    status_error, HttpRequest, HttpResponse, MediaStream, ReqwestTransport, Transport,
};
use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::session::{Session, SessionHandle};

/// A request against the JSON API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    path: String,
    query: Vec<(String, String)>,
    /// GraphQL variables, signed on anonymous requests.
    variables: Option<String>,
    description: String,
}

impl ApiRequest {
    pub fn profile(username: &str) -> Self {
        Self {
            path: profile_path(username),
            query: vec![("__a".into(), "1".into())],
            variables: None,
            description: format!("profile @{}", username),
        }
    }

    pub fn post(shortcode: &str) -> Self {
        Self {
            path: post_path(shortcode),
            query: vec![("__a".into(), "1".into())],
            variables: None,
            description: format!("post :{}", shortcode),
        }
    }

    pub fn hashtag(tag: &str) -> Self {
        Self {
            path: hashtag_path(tag),
            query: vec![("__a".into(), "1".into())],
            variables: None,
            description: format!("hashtag #{}", tag),
        }
    }

    pub fn graphql(query_hash: &str, variables: &Value) -> Self {
        let variables = variables.to_string();
        Self {
            path: QUERY_PATH.to_string(),
            query: vec![
                ("query_hash".into(), query_hash.to_string()),
                ("variables".into(), variables.clone()),
            ],
            variables: Some(variables),
            description: format!("query {}", query_hash),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", BASE_URL, self.path)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Stateless request executor shared by every component.
pub struct FetchClient {
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn Decoder>,
    throttle: Throttle,
    retry: RetryPolicy,
    rhx_gis: OnceCell<String>,
}

impl FetchClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn Decoder>,
        retry: RetryPolicy,
        request_interval: Duration,
    ) -> Self {
        Self {
            transport,
            decoder,
            throttle: Throttle::new(request_interval),
            retry,
            rhx_gis: OnceCell::new(),
        }
    }

    /// Client over `reqwest` with the GraphQL decoder.
    pub fn from_config(config: &NetworkConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(GraphQlDecoder),
            RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
            Duration::from_millis(config.request_interval_ms),
        ))
    }

    pub fn decoder(&self) -> &dyn Decoder {
        self.decoder.as_ref()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn prepare(&self, mut request: HttpRequest, session: Option<&Session>) -> HttpRequest {
        for (name, value) in BROWSER_HEADERS {
            if request.header_value(name).is_none() {
                request.headers.push((name.to_string(), value.to_string()));
            }
        }
        if let Some(session) = session {
            request.headers.extend(session_headers(session));
        }
        request
    }

    async fn send_once(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.throttle.wait().await;
        let response = self.transport.send(request).await?;
        match response.status {
            429 => Err(Error::RateLimited {
                retry_after: response.retry_after(),
            }),
            500..=599 => Err(Error::TransientNetwork(format!(
                "HTTP {} from server",
                response.status
            ))),
            _ => Ok(response),
        }
    }

    /// Send a raw request with the session's credentials.
    ///
    /// Rate limiting and transient failures are retried; any other status
    /// is returned for the caller to interpret.
    pub async fn send(&self, request: HttpRequest, session: Option<&Session>) -> Result<HttpResponse> {
        let prepared = self.prepare(request, session);
        self.retry.run(|| self.send_once(prepared.clone())).await
    }

    /// Execute an API request on behalf of the process-wide session.
    ///
    /// An expired session is flagged invalid and renewed once; if renewal is
    /// impossible the error is [`Error::AuthExpired`].
    pub async fn request(&self, request: &ApiRequest, handle: &SessionHandle) -> Result<Value> {
        let snapshot = handle.active().await?;
        match self.request_as(request, snapshot.session.as_ref()).await {
            Err(Error::AuthExpired) => match snapshot.session {
                Some(_) => {
                    handle.mark_invalid(snapshot.generation).await;
                    let renewed = handle.renew_snapshot(snapshot.generation).await?;
                    let result = self.request_as(request, renewed.session.as_ref()).await;
                    if let Err(Error::AuthExpired) = result {
                        handle.mark_invalid(renewed.generation).await;
                    }
                    result
                }
                None => Err(Error::AuthenticationRequired),
            },
            other => other,
        }
    }

    async fn request_as(&self, request: &ApiRequest, session: Option<&Session>) -> Result<Value> {
        let mut http = HttpRequest::get(request.url());
        http.query = request.query.clone();

        let authenticated = session.is_some_and(Session::is_authenticated);
        if let (Some(variables), false) = (&request.variables, authenticated) {
            let key = self.rhx_gis().await;
            http = http.header("X-Instagram-Gis", gis_signature(&key, variables));
        }

        let response = self.send(http, session).await?;

        if matches!(response.status, 400 | 403) {
            if let Ok(payload) = response.json() {
                if let Err(Error::AuthExpired) = self.decoder.envelope(payload) {
                    return Err(Error::AuthExpired);
                }
            }
        }
        if let Some(err) = status_error(response.status, response.retry_after(), request.description()) {
            return Err(err);
        }

        let payload = response.json()?;
        self.decoder.envelope(payload)
    }

    /// Signing key for anonymous queries. Pages without a key, and pages
    /// that cannot be fetched, give the empty key.
    async fn rhx_gis(&self) -> String {
        self.rhx_gis
            .get_or_init(|| async {
                let shared = match self.send(HttpRequest::get(BASE_URL), None).await {
                    Ok(response) => extract_shared_data(&response.text()),
                    Err(e) => Err(e),
                };
                match shared {
                    Ok(shared) => rhx_gis(&shared),
                    Err(e) => {
                        tracing::debug!("No signing key available: {}", e);
                        String::new()
                    }
                }
            })
            .await
            .clone()
    }

    /// Open a static media URL. Opening is retried; the body stream is not.
    pub async fn open_media(&self, url: &str) -> Result<MediaStream> {
        self.retry.run(|| self.transport.stream(url)).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use super::FetchClient;
    use crate::api::decoder::GraphQlDecoder;
    use crate::api::retry::RetryPolicy;
    use crate::api::transport::mock::MockTransport;

    /// A client over `mock` that retries three times without sleeping.
    pub(crate) fn client(mock: Arc<MockTransport>) -> FetchClient {
        FetchClient::new(
            mock,
            Arc::new(GraphQlDecoder),
            RetryPolicy::immediate(3),
            Duration::ZERO,
        )
    }
}
