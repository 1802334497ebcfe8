use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use client_core::{
    coordinator::{MSG_ADDED, MSG_DELETED, MSG_EMPTY_NAME, MSG_UPDATED},
    DirectoryHandle, IntentError, Notification, Settings, UserDirectory,
};
use serde_json::{json, Value};
use shared::domain::UserId;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct CollectionState {
    requests: Arc<AtomicUsize>,
    fail_deletes: bool,
}

async fn list(State(state): State<CollectionState>) -> Json<Value> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    Json(json!([
        { "id": 1, "name": "Ann", "username": "ann" },
        { "id": 2, "name": "Bob", "username": "bob" }
    ]))
}

/// Echoes an id that collides with an existing record.
async fn create(
    State(state): State<CollectionState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::CREATED,
        Json(json!({ "id": 2, "name": body["name"] })),
    )
}

async fn update(
    State(state): State<CollectionState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "id": id, "name": body["name"] }))
}

async fn delete(State(state): State<CollectionState>) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if state.fail_deletes {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "storage offline" })),
        );
    }
    (StatusCode::OK, Json(json!({})))
}

async fn spawn_directory(state: CollectionState) -> anyhow::Result<Arc<UserDirectory>> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/users", get(list).post(create))
        .route("/users/:id", put(update).delete(delete))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let settings = Settings {
        request_timeout: Duration::from_secs(5),
        ..Settings::default()
    }
    .with_collection_url(&format!("http://{addr}/users"))?;
    Ok(UserDirectory::new(&settings)?)
}

fn names(directory: &UserDirectory) -> Vec<(i64, String)> {
    directory
        .snapshot()
        .records()
        .iter()
        .map(|r| (r.id.0, r.name.clone()))
        .collect()
}

#[tokio::test]
async fn initial_list_populates_cache_in_order() {
    let directory = spawn_directory(CollectionState::default())
        .await
        .expect("spawn");

    let count = directory.load().await.expect("load");

    assert_eq!(count, 2);
    assert_eq!(
        names(&directory),
        vec![(1, "Ann".to_string()), (2, "Bob".to_string())]
    );
}

#[tokio::test]
async fn create_with_colliding_echo_gets_distinct_local_id() {
    let directory = spawn_directory(CollectionState::default())
        .await
        .expect("spawn");
    directory.load().await.expect("load");

    let created = directory.create("Cid").await.expect("create");

    let snapshot = directory.snapshot();
    let ids: HashSet<_> = snapshot.records().iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), 3);
    assert_ne!(created.id, UserId(2));
    assert_eq!(snapshot.records()[2].name, "Cid");
    assert_eq!(
        directory.notifications().current(),
        Some(Notification::success(MSG_ADDED))
    );
}

#[tokio::test]
async fn delete_present_and_absent_ids() {
    let directory = spawn_directory(CollectionState::default())
        .await
        .expect("spawn");
    directory.load().await.expect("load");

    directory.delete(UserId(1)).await.expect("delete 1");
    assert_eq!(names(&directory), vec![(2, "Bob".to_string())]);

    let before = directory.snapshot();
    directory.delete(UserId(99)).await.expect("delete 99");
    assert!(before.same_records(&directory.snapshot()));
    assert_eq!(
        directory.notifications().current(),
        Some(Notification::success(MSG_DELETED))
    );
}

#[tokio::test]
async fn blank_update_is_rejected_locally() {
    let state = CollectionState::default();
    let directory = spawn_directory(state.clone()).await.expect("spawn");
    directory.load().await.expect("load");

    let err = directory.update(UserId(2), "").await.expect_err("blank");

    assert!(matches!(err, IntentError::Validation(_)));
    assert_eq!(state.requests.load(Ordering::SeqCst), 1);
    assert_eq!(
        names(&directory),
        vec![(1, "Ann".to_string()), (2, "Bob".to_string())]
    );
    assert_eq!(
        directory.notifications().current(),
        Some(Notification::error(MSG_EMPTY_NAME))
    );
}

#[tokio::test]
async fn update_of_created_record_never_hits_the_collection() {
    let state = CollectionState::default();
    let directory = spawn_directory(state.clone()).await.expect("spawn");
    directory.load().await.expect("load");
    let created = directory.create("Cid").await.expect("create");
    let requests_before = state.requests.load(Ordering::SeqCst);

    directory
        .update(created.id, "Cidney")
        .await
        .expect("update");

    assert_eq!(state.requests.load(Ordering::SeqCst), requests_before);
    assert_eq!(
        directory.cache().get(created.id).map(|r| r.name),
        Some("Cidney".to_string())
    );
    assert_eq!(
        directory.notifications().current(),
        Some(Notification::success(MSG_UPDATED))
    );
}

#[tokio::test]
async fn failed_delete_keeps_record_and_reports() {
    let directory = spawn_directory(CollectionState {
        fail_deletes: true,
        ..CollectionState::default()
    })
    .await
    .expect("spawn");
    directory.load().await.expect("load");

    let err = directory.delete(UserId(1)).await.expect_err("delete fails");

    match err {
        IntentError::Fetch(fetch) => {
            assert_eq!(fetch.server_message(), Some("storage offline"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(directory.cache().contains(UserId(1)));
    assert!(directory
        .notifications()
        .current()
        .is_some_and(|n| n.is_error()));
}
