//! `ReqwestTransport` against a local HTTP server.

use std::time::Duration;

use futures::StreamExt;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use instascrape::api::{HttpRequest, ReqwestTransport, Transport};
use instascrape::Error;

fn transport() -> ReqwestTransport {
    ReqwestTransport::new("instascrape-test", Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn test_get_sends_query_and_headers_and_keeps_every_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/graphql/query/"))
        .and(query_param("query_hash", "abc"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "csrftoken=tok; Max-Age=31449600; Path=/")
                .append_header("Set-Cookie", "mid=m1; Path=/")
                .set_body_string(r#"{"status":"ok"}"#),
        )
        .mount(&server)
        .await;

    let request = HttpRequest::get(format!("{}/graphql/query/", server.uri()))
        .query("query_hash", "abc")
        .header("X-Requested-With", "XMLHttpRequest");
    let response = transport().send(request).await.expect("response");

    assert_eq!(response.status, 200);
    assert_eq!(response.json().expect("json")["status"], "ok");

    let cookies = response.set_cookies();
    assert_eq!(cookies.len(), 2);
    assert_eq!(cookies[0].name, "csrftoken");
    assert_eq!(cookies[0].value, "tok");
    assert_eq!(cookies[0].max_age, Some(31_449_600));
    assert_eq!(cookies[1].name, "mid");
}

#[tokio::test]
async fn test_post_sends_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/accounts/login/ajax/"))
        .and(body_string_contains("username=alice"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let request = HttpRequest::post(format!("{}/accounts/login/ajax/", server.uri()))
        .form("username", "alice")
        .form("enc_password", "#PWD_INSTAGRAM_BROWSER:0:1:pw");
    let response = transport().send(request).await.expect("response");
    assert!(response.is_success());
}

#[tokio::test]
async fn test_error_statuses_are_returned_raw() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let response = transport()
        .send(HttpRequest::get(server.uri()))
        .await
        .expect("response");
    assert_eq!(response.status, 429);
    assert_eq!(response.retry_after(), Some(7));
}

#[tokio::test]
async fn test_stream_reads_body_and_maps_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_bytes(b"jpeg-data".to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/gone.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/busy.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let transport = transport();
    let stream = transport
        .stream(&format!("{}/media/a.jpg", server.uri()))
        .await
        .expect("stream");
    assert_eq!(stream.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(stream.content_length, Some(9));

    let mut body = Vec::new();
    let mut chunks = stream.body;
    while let Some(chunk) = chunks.next().await {
        body.extend_from_slice(&chunk.expect("chunk"));
    }
    assert_eq!(body, b"jpeg-data");

    let missing = transport
        .stream(&format!("{}/media/gone.jpg", server.uri()))
        .await;
    assert!(matches!(missing, Err(Error::NotFound(_))));

    let busy = transport
        .stream(&format!("{}/media/busy.jpg", server.uri()))
        .await;
    assert!(matches!(busy, Err(ref e) if e.is_retryable()));
}

#[tokio::test]
async fn test_unreachable_host_is_transient() {
    // nothing listens on the port of a dropped server
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };
    let result = transport().send(HttpRequest::get(uri)).await;
    assert!(matches!(result, Err(ref e) if e.is_retryable()));
}
