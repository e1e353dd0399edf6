//! EpicorProvider against an in-process fake Kinetic server.

use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use gembasync_common::{Error, FileName, VersionId};
use gembasync_storage::{
    CatalogProvider, CatalogPublisher, ContentFetcher, Credentials, EpicorConfig, EpicorProvider,
};

const ROOT: &str = "/Kinetic/api/v2/odata/ACME01";

#[derive(Default)]
struct FakeKinetic {
    rows: Vec<Value>,
    files: HashMap<String, Vec<u8>>,
    patches: Vec<Value>,
    next_id: usize,
}

type Shared = Arc<Mutex<FakeKinetic>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("x-api-key").map(|v| v == "key").unwrap_or(false)
        && headers
            .get("authorization")
            .map(|v| v == "Basic dXNlcjpwYXNz")
            .unwrap_or(false)
}

async fn list_rows(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let rows = state.lock().unwrap().rows.clone();
    Json(json!({ "value": rows })).into_response()
}

async fn get_new(headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({
        "value": [{
            "UD05_Company": "ACME01",
            "UD05_Key1": "",
            "UD05_Key2": "",
            "UD05_Character01": "",
            "UD05_ShortChar01": "",
            "UD05_CheckBox02": false,
            "RowMod": "A",
            "RowIdent": "",
            "SysRowID": "00000000-0000-0000-0000-000000000000"
        }]
    }))
    .into_response()
}

async fn patch_row(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(row): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = state.lock().unwrap();
    state.patches.push(row.clone());
    match row["RowMod"].as_str() {
        Some("A") => state.rows.push(row.clone()),
        Some("D") => {
            let key = row["UD05_Key1"].clone();
            state.rows.retain(|r| r["UD05_Key1"] != key);
        }
        _ => return StatusCode::BAD_REQUEST.into_response(),
    }
    Json(json!({ "value": [row] })).into_response()
}

async fn read_all_bytes(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = body["id"].as_str().unwrap_or_default().to_string();
    if id == "forbidden" {
        return StatusCode::FORBIDDEN.into_response();
    }
    if id == "flaky" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "database busy").into_response();
    }
    if id == "empty" {
        return Json(json!({ "returnObj": "" })).into_response();
    }
    match state.lock().unwrap().files.get(&id) {
        Some(data) => Json(json!({
            "returnObj": base64::engine::general_purpose::STANDARD.encode(data)
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn create_file(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let data = base64::engine::general_purpose::STANDARD
        .decode(body["bytes"].as_str().unwrap_or_default())
        .unwrap();
    let mut state = state.lock().unwrap();
    state.next_id += 1;
    let id = format!("file-{}", state.next_id);
    state.files.insert(id.clone(), data);
    Json(json!({ "returnObj": id })).into_response()
}

async fn delete_file(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = body["id"].as_str().unwrap_or_default();
    match state.lock().unwrap().files.remove(id) {
        Some(_) => Json(json!({})).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_fake(state: Shared) -> String {
    let app = Router::new()
        .route(
            &format!("{}/BaqSvc/AccessGembaFiles/Data", ROOT),
            get(list_rows).patch(patch_row),
        )
        .route(&format!("{}/BaqSvc/AccessGembaFiles/GetNew", ROOT), get(get_new))
        .route(
            &format!("{}/Ice.LIB.FileStoreSvc/ReadAllBytes", ROOT),
            post(read_all_bytes),
        )
        .route(&format!("{}/Ice.LIB.FileStoreSvc/Create", ROOT), post(create_file))
        .route(&format!("{}/Ice.LIB.FileStoreSvc/Delete", ROOT), post(delete_file))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn provider(domain: &str, api_key: &str) -> EpicorProvider {
    let config = EpicorConfig::new(
        domain,
        "Kinetic",
        "ACME01",
        Credentials::from_login(api_key, "user", "pass"),
    );
    EpicorProvider::new(&config).unwrap()
}

fn row(name: &str, id: &str, post_date: &str) -> Value {
    json!({
        "UD05_Company": "ACME01",
        "UD05_Character01": name,
        "UD05_ShortChar01": post_date,
        "UD05_Key1": id,
        "UD05_Key2": "",
        "UD05_CheckBox02": false,
        "RowMod": "",
        "RowIdent": "",
        "SysRowID": format!("sys-{}", id)
    })
}

#[tokio::test]
async fn test_catalog_skips_unusable_rows() {
    let state = Shared::default();
    {
        let mut s = state.lock().unwrap();
        s.rows.push(row("a.svg", "f-1", "2024-05-01T08:00:00"));
        s.rows.push(row("a.svg", "f-2", "2024-05-02T08:00:00.250000"));
        s.rows.push(row("b.svg", "f-3", "not a date"));
        s.rows.push(row("", "f-4", "2024-05-01T08:00:00"));
        let mut blank = row("c.svg", "f-5", "");
        blank["UD05_ShortChar01"] = Value::Null;
        blank["UD05_Key2"] = Value::Null;
        blank["UD05_CheckBox02"] = Value::Null;
        s.rows.push(blank);
    }
    let provider = provider(&spawn_fake(state).await, "key");

    let catalog = provider.fetch_catalog().await.unwrap();
    let ids: Vec<&str> = catalog.iter().map(|r| r.version_id.as_str()).collect();
    assert_eq!(ids, vec!["f-1", "f-2"]);
    assert!(catalog[1].posted_at > catalog[0].posted_at);
    assert_eq!(catalog[0].extra.as_ref().unwrap()["SysRowID"], "sys-f-1");
}

#[tokio::test]
async fn test_empty_catalog_is_ok() {
    let provider = provider(&spawn_fake(Shared::default()).await, "key");
    assert!(provider.fetch_catalog().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_credentials_map_to_authentication() {
    let provider = provider(&spawn_fake(Shared::default()).await, "wrong");
    let err = provider.fetch_catalog().await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_fetch_content_outcomes() {
    let state = Shared::default();
    state
        .lock()
        .unwrap()
        .files
        .insert("f-1".to_string(), b"<svg>one</svg>".to_vec());
    let provider = provider(&spawn_fake(state).await, "key");

    let id = |s: &str| VersionId::new(s).unwrap();
    assert_eq!(
        provider.fetch_content(&id("f-1")).await.unwrap(),
        Some(b"<svg>one</svg>".to_vec())
    );
    assert_eq!(provider.fetch_content(&id("missing")).await.unwrap(), None);
    assert_eq!(provider.fetch_content(&id("empty")).await.unwrap(), None);
    assert!(matches!(
        provider.fetch_content(&id("forbidden")).await,
        Err(Error::PermissionDenied(_))
    ));
    let err = provider.fetch_content(&id("flaky")).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_publish_retire_and_purge() {
    let state = Shared::default();
    let provider = provider(&spawn_fake(state.clone()).await, "key");
    let name = FileName::from("press-4.svg");

    let record = provider.publish(&name, b"<svg/>".to_vec()).await.unwrap();
    assert_eq!(record.version_id.as_str(), "file-1");

    let catalog = provider.fetch_catalog().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].name, name);
    assert_eq!(
        catalog[0].posted_at.timestamp_micros(),
        record.posted_at.timestamp_micros()
    );
    assert_eq!(
        provider.fetch_content(&record.version_id).await.unwrap(),
        Some(b"<svg/>".to_vec())
    );

    provider.retire(&catalog[0]).await.unwrap();
    assert!(provider.fetch_catalog().await.unwrap().is_empty());
    {
        let s = state.lock().unwrap();
        let last = s.patches.last().unwrap();
        assert_eq!(last["RowMod"], "D");
        assert_eq!(last["UD05_CheckBox02"], true);
        assert_eq!(last["SysRowID"], s.patches[0]["SysRowID"]);
    }

    provider.purge_content(&record.version_id).await.unwrap();
    assert_eq!(provider.fetch_content(&record.version_id).await.unwrap(), None);
    assert!(matches!(
        provider.purge_content(&record.version_id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_publish_rejects_unsafe_name() {
    let state = Shared::default();
    let provider = provider(&spawn_fake(state.clone()).await, "key");

    let result = provider.publish(&FileName::from("../x.svg"), b"x".to_vec()).await;
    assert!(result.is_err());
    assert!(state.lock().unwrap().files.is_empty());
}
