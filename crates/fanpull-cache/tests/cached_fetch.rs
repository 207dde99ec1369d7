//! Integration tests for CachedFetcher over the HTTP transport.
//!
//! Uses wiremock for HTTP mocking. `.expect(n)` on each mock asserts how many
//! requests actually reached the network.

use std::sync::Arc;

use fanpull_cache::{
    CacheError, CacheStore, CachedFetcher, FetchOptions, FetchRequest, HttpConfig, Payload,
};
use tempfile::TempDir;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A local port with nothing listening on it.
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

fn create_test_fetcher(temp_dir: &TempDir) -> CachedFetcher {
    let store = Arc::new(CacheStore::with_dir(temp_dir.path().join("cache")));
    let config = HttpConfig::default().with_timeout_secs(5);
    CachedFetcher::http(store, &config).expect("failed to create fetcher")
}

#[tokio::test]
async fn test_cache_hit_avoids_network() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/album/some-album"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(&temp_dir);
    let request = FetchRequest::get(format!("{}/album/some-album", mock_server.uri()));

    assert!(!fetcher.is_cached(&request).await);
    let first = fetcher.fetch_text(&request, false).await.unwrap();
    assert!(fetcher.is_cached(&request).await);
    let second = fetcher.fetch_text(&request, false).await.unwrap();

    assert_eq!(first, "hello");
    assert_eq!(second, "hello");
}

#[tokio::test]
async fn test_persisted_entry_survives_restart() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/someone"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>fan</html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/someone", mock_server.uri());
    create_test_fetcher(&temp_dir)
        .fetch_text(&FetchRequest::get(&url), false)
        .await
        .unwrap();

    // New process: load from disk, then fetch again without network.
    let store = CacheStore::with_dir(temp_dir.path().join("cache"));
    let report = store.load_all().await.unwrap();
    assert_eq!(report.loaded, 1);

    let fetcher = CachedFetcher::http(Arc::new(store), &HttpConfig::default()).unwrap();
    let body = fetcher
        .fetch_text(&FetchRequest::get(&url), false)
        .await
        .unwrap();
    assert_eq!(body, "<html>fan</html>");
}

#[tokio::test]
async fn test_force_refresh_hits_network() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/someone"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(&temp_dir);
    let request = FetchRequest::get(format!("{}/someone", mock_server.uri()));

    fetcher.fetch_text(&request, false).await.unwrap();
    let refreshed = fetcher.fetch_text(&request, true).await.unwrap();
    assert_eq!(refreshed, "fresh");
}

#[tokio::test]
async fn test_post_json_sends_headers_and_body() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let body = r#"{"fan_id":42,"older_than_token":"3000000000:1:a::","count":10000}"#;

    Mock::given(method("POST"))
        .and(path("/api/fancollection/1/collection_items"))
        .and(header("referer", "https://bandcamp.com/someone"))
        .and(body_string(body))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"items":[{"item_url":"https://a.bandcamp.com/album/b"}]}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(&temp_dir);
    let request = FetchRequest::post(
        format!("{}/api/fancollection/1/collection_items", mock_server.uri()),
        body,
    )
    .header("Referer", "https://bandcamp.com/someone");

    let payload = fetcher.fetch(&request, FetchOptions::json()).await.unwrap();
    assert_eq!(
        payload.as_json().unwrap()["items"][0]["item_url"],
        "https://a.bandcamp.com/album/b"
    );

    // Same identity, served from cache.
    let again = fetcher.fetch(&request, FetchOptions::json()).await.unwrap();
    assert_eq!(again, payload);
}

#[tokio::test]
async fn test_non_success_status_fails_and_is_not_cached() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(&temp_dir);
    let url = format!("{}/missing", mock_server.uri());
    let request = FetchRequest::get(&url);

    for _ in 0..2 {
        let err = fetcher
            .fetch(&request, FetchOptions::text())
            .await
            .unwrap_err();
        match err {
            CacheError::FetchFailed {
                url: failed_url,
                status,
                reason,
            } => {
                assert_eq!(failed_url, url);
                assert_eq!(status, 404);
                assert_eq!(reason, "Not Found");
            }
            other => panic!("expected FetchFailed, got {:?}", other),
        }
    }
    assert!(!fetcher.is_cached(&request).await);
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(&temp_dir);
    let request = FetchRequest::get(format!("{}/api", mock_server.uri()));

    let err = fetcher
        .fetch(&request, FetchOptions::json())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Decode { .. }));
    assert!(!fetcher.is_cached(&request).await);
}

#[tokio::test]
async fn test_fetch_all_sequential_with_partial_cache() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    for album in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/album/{}", album)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("album {}", album)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let fetcher = create_test_fetcher(&temp_dir);
    let requests: Vec<FetchRequest> = ["a", "b", "c"]
        .iter()
        .map(|album| FetchRequest::get(format!("{}/album/{}", mock_server.uri(), album)))
        .collect();

    // Warm one entry first.
    fetcher.fetch_text(&requests[1], false).await.unwrap();

    let survey = fetcher.survey(&requests).await;
    assert_eq!(survey.marks(), "-+-");

    let payloads = fetcher
        .fetch_all(requests, FetchOptions::text())
        .await
        .unwrap();
    assert_eq!(
        payloads,
        vec![
            Payload::from("album a"),
            Payload::from("album b"),
            Payload::from("album c"),
        ]
    );
}

#[tokio::test]
async fn test_fetch_all_stops_at_first_failure() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/album/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("album a"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/album/b"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/album/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string("album c"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = create_test_fetcher(&temp_dir);
    let requests: Vec<FetchRequest> = ["a", "b", "c"]
        .iter()
        .map(|album| FetchRequest::get(format!("{}/album/{}", mock_server.uri(), album)))
        .collect();

    let err = fetcher
        .fetch_all(requests, FetchOptions::text())
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::FetchFailed { status: 503, .. }));
}

#[tokio::test]
async fn test_connection_failure_is_network_error() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = create_test_fetcher(&temp_dir);

    let url = format!("http://127.0.0.1:{}/", closed_port());
    let err = fetcher
        .fetch_text(&FetchRequest::get(url), false)
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Network { .. }));
}

#[tokio::test]
async fn test_json_string_payload_survives_restart() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#""abc""#))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = FetchRequest::get(format!("{}/api/token", mock_server.uri()));
    let fresh: String = create_test_fetcher(&temp_dir)
        .fetch_json(&request, false)
        .await
        .unwrap();
    assert_eq!(fresh, "abc");

    let store = CacheStore::with_dir(temp_dir.path().join("cache"));
    store.load_all().await.unwrap();
    let fetcher = CachedFetcher::http(Arc::new(store), &HttpConfig::default()).unwrap();

    let payload = fetcher.fetch(&request, FetchOptions::json()).await.unwrap();
    assert_eq!(payload, Payload::Json(serde_json::json!("abc")));
    let cached: String = fetcher.fetch_json(&request, false).await.unwrap();
    assert_eq!(cached, "abc");
}
