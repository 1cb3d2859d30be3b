//! HTTP server for the Exodus resource store.
//!
//! Mounts the JSON API from `exodus-api` under `/api`, gated by bearer-token
//! authorization and wrapped in request tracing.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use exodus_core::store::ResourceStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_bearer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `EXODUS_*` environment variables.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub store_path:    PathBuf,
  /// SHA-256 hex digests of the accepted bearer tokens.
  #[serde(default)]
  pub token_digests: Vec<String>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state the router is built from.
#[derive(Clone)]
pub struct AppState<S: ResourceStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's axum [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ResourceStore + 'static,
{
  Router::new()
    .nest("/api", exodus_api::api_router(state.store))
    .layer(middleware::from_fn_with_state(state.auth, require_bearer))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use exodus_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  const TOKEN: &str = "test-token";

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    router(AppState {
      store: Arc::new(store),
      auth:  Arc::new(AuthConfig::new([auth::digest_token(TOKEN)])),
    })
  }

  async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let mut builder = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    app
      .clone()
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap()
  }

  async fn json_body(res: Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
      .await
      .unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  async fn create_identity(app: &Router, name: &str) -> i64 {
    let res = send(
      app,
      "POST",
      "/api/identities",
      Some(json!({ "name": name, "domain": "example.com" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await["id"].as_i64().unwrap()
  }

  async fn create_resource(app: &Router, identity_id: i64) -> i64 {
    let res = send(
      app,
      "POST",
      "/api/resources",
      Some(json!({ "identity_id": identity_id })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await["id"].as_i64().unwrap()
  }

  // ── Auth ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn missing_token_is_unauthorized() {
    let app = app().await;
    let res = app
      .oneshot(
        Request::builder()
          .uri("/api/identities")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
      res.headers().get(header::WWW_AUTHENTICATE).unwrap(),
      "Bearer realm=\"exodus\""
    );
  }

  #[tokio::test]
  async fn wrong_token_is_unauthorized() {
    let app = app().await;
    let res = app
      .oneshot(
        Request::builder()
          .uri("/api/identities")
          .header(header::AUTHORIZATION, "Bearer nope")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["error"], json!("unknown bearer token"));
  }

  // ── Identities ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn identity_projection_and_lookup() {
    let app = app().await;
    let id = create_identity(&app, "alice").await;

    let res = send(&app, "GET", &format!("/api/identities/{id}"), None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
      json_body(res).await,
      json!({ "id": id, "name": "alice", "domain": "example.com", "fqn": "alice@example.com" })
    );

    let res = send(&app, "GET", "/api/identities?fqn=alice@example.com", None).await;
    let found = json_body(res).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["id"], json!(id));

    let res = send(&app, "GET", "/api/identities?fqn=nobody@example.com", None).await;
    assert_eq!(json_body(res).await, json!([]));
  }

  #[tokio::test]
  async fn identity_errors_map_to_statuses() {
    let app = app().await;
    create_identity(&app, "alice").await;

    let dup = send(
      &app,
      "POST",
      "/api/identities",
      Some(json!({ "name": "alice", "domain": "example.com" })),
    )
    .await;
    assert_eq!(dup.status(), StatusCode::CONFLICT);

    let invalid = send(
      &app,
      "POST",
      "/api/identities",
      Some(json!({ "name": "", "domain": "example.com" })),
    )
    .await;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let missing = send(&app, "GET", "/api/identities/999", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let bad_fqn = send(&app, "GET", "/api/identities?fqn=alice", None).await;
    assert_eq!(bad_fqn.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn malformed_requests_are_json_bad_requests() {
    let app = app().await;
    let owner = create_identity(&app, "alice").await;
    let id = create_resource(&app, owner).await;

    let cases = [
      ("POST", "/api/identities".to_owned(), Some(json!({ "name": 5 }))),
      ("GET", "/api/resources/abc".to_owned(), None),
      ("GET", format!("/api/resources/{id}/data/latest"), None),
      (
        "POST",
        format!("/api/resources/{id}/data"),
        Some(json!({ "attachment_type": "image", "data": {} })),
      ),
      (
        "POST",
        format!("/api/resources/{id}/attachments"),
        Some(json!({ "resource_type": "status", "data": {} })),
      ),
    ];
    for (method, uri, body) in cases {
      let res = send(&app, method, &uri, body).await;
      assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{method} {uri}");
      assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "application/json",
        "{method} {uri}"
      );
      assert!(json_body(res).await["error"].is_string(), "{method} {uri}");
    }
  }

  // ── Resources ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn empty_resource_document() {
    let app = app().await;
    let owner = create_identity(&app, "alice").await;
    let id = create_resource(&app, owner).await;

    let doc = json_body(send(&app, "GET", &format!("/api/resources/{id}"), None).await).await;
    assert_eq!(doc["current_version"], json!(0));
    assert_eq!(doc["data"], json!({}));
    assert_eq!(doc["identity_id"], json!(owner));
  }

  #[tokio::test]
  async fn appending_versions_advances_current_version() {
    let app = app().await;
    let owner = create_identity(&app, "alice").await;
    let id = create_resource(&app, owner).await;

    for text in ["hello", "hello, edited"] {
      let res = send(
        &app,
        "POST",
        &format!("/api/resources/{id}/data"),
        Some(json!({ "resource_type": "status", "data": { "text": text } })),
      )
      .await;
      assert_eq!(res.status(), StatusCode::CREATED);
    }

    let doc = json_body(send(&app, "GET", &format!("/api/resources/{id}"), None).await).await;
    assert_eq!(doc["current_version"], json!(2));
    assert_eq!(doc["data"]["1"]["data"]["text"], json!("hello"));
    assert_eq!(doc["data"]["2"]["data"]["text"], json!("hello, edited"));
    assert_eq!(doc["data"]["2"]["resource_type"], json!("status"));

    let v1 = send(&app, "GET", &format!("/api/resources/{id}/data/1"), None).await;
    assert_eq!(json_body(v1).await["version"], json!(1));

    let v9 = send(&app, "GET", &format!("/api/resources/{id}/data/9"), None).await;
    assert_eq!(v9.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn stale_append_is_a_conflict() {
    let app = app().await;
    let owner = create_identity(&app, "alice").await;
    let id = create_resource(&app, owner).await;
    let uri = format!("/api/resources/{id}/data");

    let first = send(
      &app,
      "POST",
      &uri,
      Some(json!({ "resource_type": "status", "data": {}, "expected_version": 0 })),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);

    let stale = send(
      &app,
      "POST",
      &uri,
      Some(json!({ "resource_type": "status", "data": {}, "expected_version": 0 })),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn attachments_meta_and_edges() {
    let app = app().await;
    let alice = create_identity(&app, "alice").await;
    let bob = create_identity(&app, "bob").await;
    let r1 = create_resource(&app, alice).await;
    let r2 = create_resource(&app, bob).await;

    let res = send(
      &app,
      "POST",
      &format!("/api/resources/{r1}/attachments"),
      Some(json!({ "attachment_type": "image", "data": { "href": "cat.png" } })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(json_body(res).await["attachments"]["1"]["attachment_type"], json!("image"));

    let res = send(
      &app,
      "POST",
      &format!("/api/resources/{r1}/references"),
      Some(json!({ "to_resource_id": r2, "position": 0 })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = send(
      &app,
      "POST",
      &format!("/api/resources/{r1}/mentions"),
      Some(json!({ "identity_id": bob })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(json_body(res).await["position"], json!(0));

    let res = send(
      &app,
      "PUT",
      &format!("/api/resources/{r1}/meta"),
      Some(json!({ "visibility": "public" })),
    )
    .await;
    let doc = json_body(res).await;
    assert_eq!(doc["meta"], json!({ "visibility": "public" }));
    assert_eq!(doc["references"], json!({ "0": r2 }));
    assert_eq!(doc["mentions"], json!({ "0": bob }));

    let incoming =
      json_body(send(&app, "GET", &format!("/api/resources/{r2}/referenced-from"), None).await)
        .await;
    assert_eq!(incoming[0]["from_resource_id"], json!(r1));

    let owned =
      json_body(send(&app, "GET", &format!("/api/identities/{alice}/resources"), None).await)
        .await;
    assert_eq!(owned.as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn delete_resource_then_identity() {
    let app = app().await;
    let owner = create_identity(&app, "alice").await;
    let id = create_resource(&app, owner).await;

    let blocked = send(&app, "DELETE", &format!("/api/identities/{owner}"), None).await;
    assert_eq!(blocked.status(), StatusCode::CONFLICT);

    let res = send(&app, "DELETE", &format!("/api/resources/{id}"), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = send(&app, "GET", &format!("/api/resources/{id}"), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = send(&app, "DELETE", &format!("/api/identities/{owner}"), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
  }
}
