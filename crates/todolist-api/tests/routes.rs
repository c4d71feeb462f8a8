use std::sync::Arc;

use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::Value;
use todolist_api::{app_router, AppConfig, AppState};

const FORM: &str = "application/x-www-form-urlencoded";

async fn spawn_server(config: AppConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app_router(AppState::from_config(Arc::new(config)));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn post_form(client: &reqwest::Client, url: &str, body: &str) -> reqwest::Response {
    client
        .post(url)
        .header("content-type", FORM)
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn entry_lifecycle() {
    let base = spawn_server(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let entries = format!("{base}/todolist/entries");

    let response = post_form(&client, &entries, "title=Buy%20milk;notes=;complete=0").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["title"], "Buy milk");
    assert_eq!(created["complete"], 0);
    let id = created["id"].as_i64().unwrap();

    let response = client
        .put(format!("{entries}/{id}"))
        .header("content-type", FORM)
        .body("title=Buy%20milk;notes=oat;complete=1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let replaced: Value = response.json().await.unwrap();
    assert_eq!(replaced["notes"], "oat");
    assert_eq!(replaced["complete"], 1);
    assert!(replaced["modified"].as_f64().unwrap() > created["modified"].as_f64().unwrap());

    let listed: Value = client
        .get(&entries)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["entries"].as_array().unwrap().len(), 1);
    assert!(listed["timestamp"].as_f64().unwrap() >= replaced["modified"].as_f64().unwrap());

    let response = client
        .delete(format!("{entries}/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .delete(format!("{entries}/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);

    let response = client
        .put(format!("{entries}/{id}"))
        .header("content-type", FORM)
        .body("title=again")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn incremental_list_includes_deletions() {
    let base = spawn_server(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let entries = format!("{base}/todolist/entries");

    let created: Value = post_form(&client, &entries, "title=temp")
        .await
        .json()
        .await
        .unwrap();
    let snapshot: Value = client.get(&entries).send().await.unwrap().json().await.unwrap();
    let since = snapshot["timestamp"].as_f64().unwrap();

    client
        .delete(format!("{entries}/{}", created["id"]))
        .send()
        .await
        .unwrap();

    let changed: Value = client
        .get(&entries)
        .query(&[("modified", format!("{since:.6}"))])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let changed = changed["entries"].as_array().unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0]["deleted"], 1);
}

#[tokio::test]
async fn fields_may_arrive_in_query_string() {
    let base = spawn_server(AppConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{base}/todolist/entries?title=From%20query;complete=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["title"], "From query");
    assert_eq!(created["complete"], 1);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let base = spawn_server(AppConfig::default()).await;
    let client = reqwest::Client::new();
    let entries = format!("{base}/todolist/entries");

    let response = post_form(&client, &entries, "notes=no%20title").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("title"));

    for modified in ["0", "soon"] {
        let response = client
            .get(&entries)
            .query(&[("modified", modified)])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "modified={modified}");
    }
}

#[tokio::test]
async fn token_guards_entry_routes_only() {
    let config = AppConfig {
        api_token: Some("s3cret".to_string()),
        ..AppConfig::default()
    };
    let base = spawn_server(config).await;
    let client = reqwest::Client::new();
    let entries = format!("{base}/todolist/entries");

    let response = client.get(&entries).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(&entries)
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(&entries)
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: Value = client
        .get(format!("{base}/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}
