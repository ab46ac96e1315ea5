//! Comment dump into a JSON array file

use reddit_dump::cli::comments::dump_listing;
use reddit_dump::cli::CliError;
use reddit_dump::client::ApiError;
use reddit_dump::shutdown::ShutdownCoordinator;
use serde_json::Value;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{client, listing, mount_token, options};

const COMMENTS: &str = "/user/alice/comments";

#[tokio::test]
async fn test_dump_writes_every_page() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(COMMENTS))
        .and(query_param("count", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(Some("t1_b"), &["a", "b"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COMMENTS))
        .and(query_param("count", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(None, &["c"])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out/comments.json");
    let (client, _) = client(&server, options(0, 1));

    let pages = dump_listing(&client, COMMENTS, &output, ShutdownCoordinator::shared())
        .await
        .unwrap();
    assert_eq!(pages, 2);

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let written = written.as_array().unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0], listing(Some("t1_b"), &["a", "b"]));
    assert_eq!(written[1], listing(None, &["c"]));
}

#[tokio::test]
async fn test_failed_dump_keeps_written_pages() {
    let server = MockServer::start().await;
    // The 403 refresh costs a second exchange
    mount_token(&server, 2).await;
    Mock::given(method("GET"))
        .and(path(COMMENTS))
        .and(query_param("count", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(Some("t1_b"), &["a"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(COMMENTS))
        .and(query_param("count", "1"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("comments.json");
    let (client, _) = client(&server, options(0, 1));

    let err = dump_listing(&client, COMMENTS, &output, ShutdownCoordinator::shared())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CliError::ApiError(ApiError::AuthorizationExpiredTwice { .. })
    ));

    let contents = std::fs::read_to_string(&output).unwrap();
    assert!(contents.starts_with('['));
    assert!(contents.contains("\"t1_b\""));
    assert!(!contents.trim_end().ends_with(']'));
}

#[tokio::test]
async fn test_requested_shutdown_stops_before_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(COMMENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(None, &[])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(crate::support::token_body(3600)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("comments.json");
    let (client, _) = client(&server, options(0, 1));

    let shutdown = ShutdownCoordinator::shared();
    shutdown.request_shutdown();

    let err = dump_listing(&client, COMMENTS, &output, shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err, CliError::Interrupted { pages: 0 }));
    assert!(output.exists());
}
