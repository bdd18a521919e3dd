//! Chain directory client against a mock HTTP server.

use serde_json::json;
use std::time::Duration;
use tinyseed_registry::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, retries: u32) -> HttpChainDirectory {
    HttpChainDirectory::new(&server.uri(), Duration::from_secs(2), retries).unwrap()
}

#[tokio::test]
async fn test_fetch_chain_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chains"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"chains": ["cosmoshub-4", "osmosis-1"]})),
        )
        .mount(&server)
        .await;

    let chains = client(&server, 0).fetch_chain_list().await.unwrap();
    assert_eq!(chains, vec!["cosmoshub-4", "osmosis-1"]);
}

#[tokio::test]
async fn test_fetch_chain() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chains/osmosis-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chain_id": "osmosis-1",
            "peers": {"persistent_peers": [
                {"id": "abcd", "address": "1.2.3.4:26656"},
                {"id": "ef01", "address": "node.example.com:26656"}
            ]}
        })))
        .mount(&server)
        .await;

    let chain = client(&server, 0).fetch_chain("osmosis-1").await.unwrap();
    assert_eq!(chain.chain_id, "osmosis-1");
    assert_eq!(
        chain.raw_peers(),
        &[
            RawPeer::new("abcd", "1.2.3.4:26656"),
            RawPeer::new("ef01", "node.example.com:26656"),
        ]
    );
}

#[tokio::test]
async fn test_not_found_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chains/missing-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 2).fetch_chain("missing-1").await.unwrap_err();
    assert!(matches!(err, RegistryError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chains"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 2).fetch_chain_list().await.unwrap_err();
    assert!(matches!(err, RegistryError::Decode { .. }));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chains"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chains"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chains": ["juno-1"]})))
        .expect(1)
        .mount(&server)
        .await;

    let chains = client(&server, 2).fetch_chain_list().await.unwrap();
    assert_eq!(chains, vec!["juno-1"]);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/chains/cosmoshub-4"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server, 1).fetch_chain("cosmoshub-4").await.unwrap_err();
    assert!(matches!(err, RegistryError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_unreachable_registry() {
    let directory =
        HttpChainDirectory::new("http://127.0.0.1:1", Duration::from_millis(500), 0).unwrap();
    let err = directory.fetch_chain_list().await.unwrap_err();
    assert!(matches!(err, RegistryError::Http { .. }));
}
