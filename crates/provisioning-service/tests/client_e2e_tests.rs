//! The meeting client's HTTP provisioning client against a live service.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use meeting_client::errors::ClientError;
use meeting_client::provisioning::{HttpProvisioningClient, JoinRequest, ProvisioningClient};
use metrics_exporter_prometheus::PrometheusBuilder;
use provisioning_service::backend::InMemoryBackend;
use provisioning_service::config::Config;
use provisioning_service::routes::{build_routes, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_service() -> (String, Arc<InMemoryBackend>) {
    let config = Config::from_vars(&HashMap::new()).unwrap();
    let backend = Arc::new(InMemoryBackend::new("us-east-1"));
    let state = Arc::new(AppState::new(config, backend.clone()));
    let app = build_routes(state, PrometheusBuilder::new().build_recorder().handle());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), backend)
}

fn request(title: &str, name: &str) -> JoinRequest {
    JoinRequest {
        title: title.to_string(),
        name: name.to_string(),
        region: "us-east-1".to_string(),
    }
}

#[tokio::test]
async fn test_client_join_and_end_round_trip() {
    let (url, backend) = spawn_service().await;
    let client = HttpProvisioningClient::new(&url, Duration::from_secs(5)).unwrap();

    let alice = client.join(&request("standup", "Alice")).await.unwrap();
    let bob = client.join(&request("standup", "Bob")).await.unwrap();
    assert_eq!(alice.meeting_id(), bob.meeting_id());
    assert!(alice.attendee.attendee.external_user_id.ends_with("#Alice"));
    assert_eq!(backend.meetings_created(), 1);

    client.end("standup").await.unwrap();

    let err = client.end("standup").await.unwrap_err();
    assert!(
        matches!(&err, ClientError::Provisioning(msg) if msg == "Meeting not found: standup"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_client_surfaces_missing_parameters() {
    let (url, _) = spawn_service().await;
    let client = HttpProvisioningClient::new(&url, Duration::from_secs(5)).unwrap();

    let err = client.join(&request("standup", "")).await.unwrap_err();
    assert!(
        matches!(&err, ClientError::Provisioning(msg) if msg == "Need parameters: title, name, region"),
        "unexpected error: {err:?}"
    );
}
