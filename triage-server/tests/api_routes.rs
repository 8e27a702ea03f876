use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use shared::models::ImageRecord;
use tokio::sync::mpsc;
use tower::ServiceExt;
use triage_server::api::create_router;
use triage_server::config::RelocationConfig;
use triage_server::db::{MemoryMetadataStore, MetadataStore};
use triage_server::dispatch::Delivery;
use triage_server::state::AppState;
use triage_server::store::MemoryContentStore;

async fn router_with_image() -> (axum::Router, AppState, mpsc::Receiver<Delivery>) {
    let content = Arc::new(MemoryContentStore::new("photos"));
    let metadata = Arc::new(MemoryMetadataStore::new());
    let record = ImageRecord::new_ingested(
        "img-1",
        "new/2024/03/02/IMG_0001.jpg",
        "new/2024/03/02/IMG_0001_small.jpg",
        "new/2024/03/02/IMG_0001_large.jpg",
        0,
    );
    metadata.insert_image(&record).await.unwrap();

    let (state, rx) = AppState::from_parts(content, metadata, None, RelocationConfig::default());
    (create_router(state.clone()), state, rx)
}

async fn send(
    router: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (router, _, _rx) = router_with_image().await;
    let (status, body) = send(router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "triage-server");
}

#[tokio::test]
async fn test_get_image() {
    let (router, _, _rx) = router_with_image().await;
    let (status, body) = send(router.clone(), "GET", "/api/images/img-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["status"], "new");
    assert_eq!(body["data"]["reviewed"], "false");

    let (status, body) = send(router, "GET", "/api/images/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
}

#[tokio::test]
async fn test_approve_is_acknowledged() {
    let (router, state, mut rx) = router_with_image().await;
    let (status, body) = send(
        router,
        "PUT",
        "/api/images/img-1",
        Some(json!({"color_group": 2, "reviewed": "true"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["image_id"], "img-1");
    assert_eq!(body["data"]["relocation_state"], "pending");
    assert_eq!(body["data"]["dispatched"], true);

    let record = state.metadata.get_image("img-1").await.unwrap().unwrap();
    assert_eq!(record.color_group, 2);
    let delivery = rx.try_recv().unwrap();
    assert_eq!(delivery.payload.image_id(), "img-1");
}

#[tokio::test]
async fn test_invalid_transition_status() {
    let (router, _, _rx) = router_with_image().await;
    let (status, body) = send(router, "POST", "/api/images/img-1/undelete", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], 4002);
}

#[tokio::test]
async fn test_create_and_list_projects() {
    let (router, _, _rx) = router_with_image().await;
    let (status, body) = send(
        router.clone(),
        "POST",
        "/api/projects",
        Some(json!({"name": "Summer Trip 2024", "keywords": ["beach", "Beach"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["storage_prefix"], "summer_trip_2024");
    assert_eq!(body["data"]["keywords"], json!(["beach"]));
    assert_eq!(body["data"]["image_count"], 0);

    let (status, body) = send(router.clone(), "GET", "/api/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(router, "POST", "/api/projects", Some(json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5003);
}
