//! Handlers for `/identities` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/identities` | Optional `?fqn=name@domain` |
//! | `POST`   | `/identities` | Body: `{"name":"alice","domain":"example.com"}` |
//! | `GET`    | `/identities/{id}` | 404 if not found |
//! | `DELETE` | `/identities/{id}` | 409 while the identity owns or is mentioned by resources |
//! | `GET`    | `/identities/{id}/resources` | Resource documents owned by the identity |

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use exodus_core::{
  identity::{Identity, NewIdentity, parse_fqn},
  json::{IdentityDocument, ResourceDocument},
  store::ResourceStore,
};
use serde::Deserialize;

use crate::{
  error::ApiError,
  extract::{Json, Path, Query},
};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Restrict the listing to the identity with this fully-qualified name.
  pub fqn: Option<String>,
}

/// `GET /identities[?fqn=<name@domain>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<IdentityDocument>>, ApiError>
where
  S: ResourceStore,
{
  let identities: Vec<Identity> = match params.fqn.as_deref() {
    Some(fqn) => {
      let (name, domain) =
        parse_fqn(fqn).map_err(|e| ApiError::BadRequest(e.to_string()))?;
      store
        .find_identity(name, domain)
        .await
        .map_err(ApiError::store)?
        .into_iter()
        .collect()
    }
    None => store.list_identities().await.map_err(ApiError::store)?,
  };

  Ok(Json(identities.iter().map(|i| i.document()).collect()))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:   String,
  pub domain: String,
}

/// `POST /identities`: returns 201 + the identity document.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResourceStore,
{
  let identity = store
    .create_identity(NewIdentity::new(body.name, body.domain))
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(identity.document())))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /identities/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<IdentityDocument>, ApiError>
where
  S: ResourceStore,
{
  let identity = store
    .get_identity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("identity {id} not found")))?;
  Ok(Json(identity.document()))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /identities/{id}`: 204 on success.
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: ResourceStore,
{
  store.delete_identity(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Owned resources ──────────────────────────────────────────────────────────

/// `GET /identities/{id}/resources`
pub async fn resources<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<ResourceDocument>>, ApiError>
where
  S: ResourceStore,
{
  let resources = store.list_resources(id).await.map_err(ApiError::store)?;
  Ok(Json(resources.iter().map(|r| r.document()).collect()))
}
