//! Retry behaviour of the BotSpace sender against a loopback server that
//! counts deliveries.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::Value;

use print_support_bot::{config::BotSpaceConfig, error::DeliveryError, whatsapp::WhatsAppSender};

#[derive(Clone, Default)]
struct Hits(Arc<AtomicUsize>);

impl Hits {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn respond(
    State(hits): State<Hits>,
    Path(code): Path<u16>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> StatusCode {
    hits.0.fetch_add(1, Ordering::SeqCst);
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer bs-key");
    if !authorized || payload["phone"] != "919876543210" || payload["type"] != "text" {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn spawn_botspace() -> (SocketAddr, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/status/{code}", post(respond))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

fn sender(addr: SocketAddr, code: u16) -> WhatsAppSender {
    WhatsAppSender::new(
        &BotSpaceConfig {
            api_url: Some(format!("http://{addr}/status/{code}")),
            api_key: "bs-key".to_string(),
            webhook_secret: String::new(),
            max_retries: 3,
        },
        Duration::from_secs(1),
    )
    .with_base_backoff(Duration::from_millis(5))
}

#[tokio::test]
async fn delivered_on_first_attempt() {
    let (addr, hits) = spawn_botspace().await;
    sender(addr, 200)
        .send_text("919876543210", "Your order is on the way")
        .await
        .unwrap();
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn server_errors_are_retried_until_the_limit() {
    let (addr, hits) = spawn_botspace().await;
    let err = sender(addr, 503)
        .send_text("919876543210", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 503, .. }));
    assert_eq!(hits.count(), 4);
}

#[tokio::test]
async fn throttling_is_retried() {
    let (addr, hits) = spawn_botspace().await;
    let err = sender(addr, 429)
        .send_text("919876543210", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 429, .. }));
    assert_eq!(hits.count(), 4);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (addr, hits) = spawn_botspace().await;
    let err = sender(addr, 400)
        .send_text("919876543210", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 400, .. }));
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn unreachable_endpoint_is_retried_then_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = sender(addr, 200)
        .send_text("919876543210", "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Request(_)));
}
