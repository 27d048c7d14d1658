//! End-to-end provisioning against a local service double
//!
//! The server plays both roles: the provisioning API (instances + images)
//! and the remote host the firmware assets are downloaded from.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use vdev_client::{http_provisioner, Config, ProvisionError};
use vdev_core::CreationRequest;

#[derive(Default)]
struct Service {
    /// Base URL of this server, known once it is bound
    base: Mutex<String>,
    creates: Mutex<Vec<Value>>,
    uploads: Mutex<Vec<Value>>,
    downloads: Mutex<u32>,
}

impl Service {
    fn asset_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.base.lock().unwrap(), name)
    }
}

async fn create(State(svc): State<Arc<Service>>, Json(body): Json<Value>) -> Response {
    svc.creates.lock().unwrap().push(body.clone());
    let registered = svc.uploads.lock().unwrap().len();

    if body["name"] == "never" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Missing firmware assets",
                "errorID": "MissingFwAssets",
                "missingFwAssets": [svc.asset_url("absent")],
                "projectId": body["project"],
            })),
        )
            .into_response();
    }

    if registered == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Missing firmware assets",
                "errorID": "MissingFwAssets",
                "missingFwAssets": [svc.asset_url("fw1")],
                "projectId": body["project"],
            })),
        )
            .into_response();
    }

    Json(json!({ "id": format!("{}-instance", body["name"].as_str().unwrap_or("")) })).into_response()
}

async fn upload(State(svc): State<Arc<Service>>, mut multipart: Multipart) -> Json<Value> {
    let mut fields = serde_json::Map::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap().to_string();
        if name == "file" {
            let bytes = field.bytes().await.unwrap();
            fields.insert("content".into(), json!(String::from_utf8_lossy(&bytes)));
        } else {
            fields.insert(name, json!(field.text().await.unwrap()));
        }
    }
    let record = json!({
        "id": "img-1",
        "name": fields["name"],
        "type": fields["type"],
        "project": fields["project"],
    });
    svc.uploads.lock().unwrap().push(Value::Object(fields));
    Json(record)
}

async fn file_fw1(State(svc): State<Arc<Service>>) -> Vec<u8> {
    *svc.downloads.lock().unwrap() += 1;
    b"fw1-contents".to_vec()
}

async fn spawn_service() -> Arc<Service> {
    let svc = Arc::new(Service::default());
    let app = Router::new()
        .route("/api/v1/instances", post(create))
        .route("/api/v1/images", post(upload))
        .route("/files/fw1", get(file_fw1))
        .route("/files/absent", get(|| async { StatusCode::NOT_FOUND }))
        .with_state(svc.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    *svc.base.lock().unwrap() = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    svc
}

fn config(svc: &Service, scratch: &std::path::Path, enabled: bool) -> Config {
    let mut config = Config::default();
    config.service.endpoint = format!("{}/api", svc.base.lock().unwrap());
    config.remediation.enabled = enabled;
    config.remediation.max_attempts = 2;
    config.remediation.scratch_dir = Some(scratch.to_path_buf());
    config
}

#[tokio::test]
async fn test_missing_asset_is_fetched_registered_and_retried() {
    let svc = spawn_service().await;
    let scratch = tempfile::tempdir().unwrap();
    let (_api, provisioner) = http_provisioner(&config(&svc, scratch.path(), true)).unwrap();

    let request = CreationRequest::new("p1", "d1", "ranchu", "14.0.0");
    let outcome = provisioner.provision(&request).await.unwrap();

    assert_eq!(outcome.instance.id, "d1-instance");
    assert_eq!(outcome.attempts, 2);
    assert_eq!(*svc.downloads.lock().unwrap(), 1);

    let uploads = svc.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["type"], "fwasset");
    assert_eq!(uploads[0]["encoding"], "plain");
    assert_eq!(uploads[0]["encapsulated"], "false");
    assert_eq!(uploads[0]["project"], "p1");
    assert_eq!(uploads[0]["name"], svc.asset_url("fw1"));
    assert_eq!(uploads[0]["content"], "fw1-contents");

    let creates = svc.creates.lock().unwrap();
    assert_eq!(creates.len(), 2);
    assert_eq!(creates[0], creates[1]);
    assert_eq!(creates[0]["patches"], json!(["jailbroken"]));

    // No scratch files survive the call
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_disabled_remediation_never_downloads() {
    let svc = spawn_service().await;
    let scratch = tempfile::tempdir().unwrap();
    let (_api, provisioner) = http_provisioner(&config(&svc, scratch.path(), false)).unwrap();

    let request = CreationRequest::new("p1", "d1", "ranchu", "14.0.0");
    let err = provisioner.provision(&request).await.unwrap_err();

    assert!(matches!(err, ProvisionError::RemediationDisabled(_)));
    assert_eq!(*svc.downloads.lock().unwrap(), 0);
    assert!(svc.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_asset_exhausts_retries() {
    let svc = spawn_service().await;
    let scratch = tempfile::tempdir().unwrap();
    let (_api, provisioner) = http_provisioner(&config(&svc, scratch.path(), true)).unwrap();

    let request = CreationRequest::new("p1", "never", "ranchu", "14.0.0");
    match provisioner.provision(&request).await.unwrap_err() {
        ProvisionError::RemediationExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.missing_assets, vec![svc.asset_url("absent")]);
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert!(svc.uploads.lock().unwrap().is_empty());
    assert_eq!(svc.creates.lock().unwrap().len(), 3);
}
