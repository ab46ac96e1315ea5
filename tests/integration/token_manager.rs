//! Token exchange and caching against a mock token endpoint

use chrono::Utc;
use futures_util::future::join_all;
use reddit_dump::client::{ApiError, Credentials, Token};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{basic_auth, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{credentials, mount_token, token_body, token_manager, RecordingWaiter, TOKEN_PATH};

#[tokio::test]
async fn test_exchange_uses_basic_auth_and_password_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(basic_auth("app", "secret"))
        .and(header("user-agent", "reddit-dump-tests"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(100)))
        .expect(1)
        .mount(&server)
        .await;

    let waiter = Arc::new(RecordingWaiter::default());
    let manager = token_manager(&server, credentials(), waiter.clone(), 0);

    let before = Utc::now();
    let token = manager.get_token().await.unwrap();
    assert_eq!(token.value(), "bearer abc");

    // Half of the declared 100 seconds
    let lifetime = token.expires_at() - before;
    assert!(lifetime <= chrono::Duration::seconds(50));
    assert!(lifetime > chrono::Duration::seconds(45));
    assert!(waiter.waits().is_empty());
}

#[tokio::test]
async fn test_one_time_code_appended_to_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("password=hunter2%3A123456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(3600)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = reddit_dump::ClientConfig::new("alice", "hunter2", "app", "secret");
    config.totp = Some("123456".into());

    let manager = token_manager(
        &server,
        config.credentials(),
        Arc::new(RecordingWaiter::default()),
        0,
    );
    manager.get_token().await.unwrap();
}

#[tokio::test]
async fn test_token_reused_until_expiry() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    let manager = token_manager(&server, credentials(), Arc::new(RecordingWaiter::default()), 0);
    let first = manager.get_token().await.unwrap();
    let second = manager.get_token().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(manager.exchange_count(), 1);
}

#[tokio::test]
async fn test_missing_expiry_exchanges_every_time() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "abc", "token_type": "bearer"})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let manager = token_manager(&server, credentials(), Arc::new(RecordingWaiter::default()), 0);
    manager.get_token().await.unwrap();
    manager.get_token().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_callers_share_one_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body(3600))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = token_manager(&server, credentials(), Arc::new(RecordingWaiter::default()), 0);
    let tokens = join_all((0..8).map(|_| manager.get_token())).await;

    assert_eq!(tokens.len(), 8);
    for token in tokens {
        assert_eq!(token.unwrap().value(), "bearer abc");
    }
    assert_eq!(manager.exchange_count(), 1);
}

#[tokio::test]
async fn test_invalidate_ignores_tokens_no_longer_cached() {
    let server = MockServer::start().await;
    mount_token(&server, 2).await;

    let manager = token_manager(&server, credentials(), Arc::new(RecordingWaiter::default()), 0);
    let current = manager.get_token().await.unwrap();

    let stranger = Token::new("bearer old", Utc::now() + chrono::Duration::hours(1));
    manager.invalidate(&stranger).await;
    manager.get_token().await.unwrap();
    assert_eq!(manager.exchange_count(), 1);

    manager.invalidate(&current).await;
    manager.get_token().await.unwrap();
    assert_eq!(manager.exchange_count(), 2);
}

#[tokio::test]
async fn test_client_error_is_terminal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_grant"})))
        .expect(1)
        .mount(&server)
        .await;

    let waiter = Arc::new(RecordingWaiter::default());
    let manager = token_manager(&server, credentials(), waiter.clone(), 3);

    let err = manager.get_token().await.unwrap_err();
    match err {
        ApiError::AuthenticationFailed { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, json!({"error": "invalid_grant"}));
        }
        other => panic!("expected authentication failure, got {other:?}"),
    }
    assert!(waiter.waits().is_empty());
}

#[tokio::test]
async fn test_server_error_recovers_within_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_token(&server, 1).await;

    let waiter = Arc::new(RecordingWaiter::default());
    let manager = token_manager(&server, credentials(), waiter.clone(), 1);

    assert_eq!(manager.get_token().await.unwrap().value(), "bearer abc");
    assert_eq!(waiter.waits(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_server_error_without_retries_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let waiter = Arc::new(RecordingWaiter::default());
    let manager = token_manager(&server, credentials(), waiter.clone(), 0);

    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::ServerUnavailable {
            status: 503,
            attempts: 1
        }
    ));
    assert!(waiter.waits().is_empty());
}

#[tokio::test]
async fn test_exhausted_exchange_repeated_before_failing() {
    let server = MockServer::start().await;
    // One retry: two attempts per exchange, and the exchange runs twice
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let waiter = Arc::new(RecordingWaiter::default());
    let manager = token_manager(&server, credentials(), waiter.clone(), 1);

    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::ServerUnavailable {
            status: 500,
            attempts: 4
        }
    ));
    assert_eq!(waiter.waits(), vec![Duration::from_secs(1); 3]);
    assert_eq!(manager.exchange_count(), 2);
}

#[tokio::test]
async fn test_unreachable_token_endpoint_is_transport_failure() {
    let waiter = Arc::new(RecordingWaiter::default());
    let transport = reddit_dump::client::HttpTransport::new(
        "http://127.0.0.1:1",
        "http://127.0.0.1:1/api/v1/access_token",
        "reddit-dump-tests",
    )
    .unwrap();
    let manager = reddit_dump::client::TokenManager::new(
        transport,
        Credentials::new("alice", "pw", "app", "secret"),
        waiter.clone(),
        1,
        Duration::from_secs(1),
    );

    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, ApiError::TransportFailure { attempts: 2, .. }));
    assert_eq!(waiter.waits(), vec![Duration::from_secs(1)]);
}
