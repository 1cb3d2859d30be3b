//! Handlers for `/resources` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/resources` | Body: `{"identity_id":1,"meta":{...}}`; returns 201 + resource |
//! | `GET`    | `/resources/{id}` | Resource document |
//! | `DELETE` | `/resources/{id}` | Cascades to every child |
//! | `PUT`    | `/resources/{id}/meta` | Body: any JSON value (or `null`) |
//! | `POST`   | `/resources/{id}/data` | Body: [`DataBody`]; returns 201 + resource |
//! | `GET`    | `/resources/{id}/data/{version}` | One data version |
//! | `POST`   | `/resources/{id}/attachments` | Body: [`AttachmentBody`]; returns 201 + resource |
//! | `POST`   | `/resources/{id}/references` | Body: `{"to_resource_id":2,"position":0}` |
//! | `GET`    | `/resources/{id}/referenced-from` | Incoming references |
//! | `POST`   | `/resources/{id}/mentions` | Body: `{"identity_id":3,"position":0}` |

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use exodus_core::{
  json::{DataDocument, ResourceDocument},
  resource::{
    NewMention, NewReference, NewResource, NewResourceAttachment, NewResourceData,
    ResourceMention, ResourceReference,
  },
  store::ResourceStore,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
  error::ApiError,
  extract::{Json, Path},
};

/// Reload the aggregate after a write so the response reflects every child.
async fn document<S>(store: &S, id: i64) -> Result<ResourceDocument, ApiError>
where
  S: ResourceStore,
{
  let resource = store
    .get_resource(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("resource {id} not found")))?;
  Ok(resource.document())
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub identity_id: i64,
  #[serde(default)]
  pub meta:        Option<Value>,
}

/// `POST /resources`: returns 201 + the (empty) resource document.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResourceStore,
{
  let resource = store
    .create_resource(NewResource {
      identity_id: body.identity_id,
      metadata:    body.meta,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(resource.document())))
}

// ─── Get / delete ─────────────────────────────────────────────────────────────

/// `GET /resources/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<ResourceDocument>, ApiError>
where
  S: ResourceStore,
{
  Ok(Json(document(store.as_ref(), id).await?))
}

/// `DELETE /resources/{id}`: 204 on success.
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: ResourceStore,
{
  store.delete_resource(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Metadata ─────────────────────────────────────────────────────────────────

/// `PUT /resources/{id}/meta`: the body replaces the metadata wholesale.
pub async fn set_meta<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(meta): Json<Value>,
) -> Result<Json<ResourceDocument>, ApiError>
where
  S: ResourceStore,
{
  let meta = (!meta.is_null()).then_some(meta);
  let resource = store.set_metadata(id, meta).await.map_err(ApiError::store)?;
  Ok(Json(resource.document()))
}

// ─── Versions ─────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /resources/{id}/data`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataBody {
  pub resource_type:    String,
  pub data:             Value,
  /// Explicit version number; omitted means "after the current version".
  pub version:          Option<i64>,
  /// Reject the write unless this is still the current version number.
  pub expected_version: Option<i64>,
}

/// JSON body accepted by `POST /resources/{id}/attachments`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachmentBody {
  pub attachment_type:  String,
  pub data:             Value,
  pub version:          Option<i64>,
  pub expected_version: Option<i64>,
}

/// `POST /resources/{id}/data`: returns 201 + the updated resource document.
pub async fn append_data<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<DataBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResourceStore,
{
  let input = NewResourceData {
    resource_type:    body.resource_type,
    data:             body.data,
    version:          body.version,
    expected_version: body.expected_version,
  };
  store.append_data(id, input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(document(store.as_ref(), id).await?)))
}

/// `GET /resources/{id}/data/{version}`
pub async fn get_data<S>(
  State(store): State<Arc<S>>,
  Path((id, version)): Path<(i64, i64)>,
) -> Result<Json<DataDocument>, ApiError>
where
  S: ResourceStore,
{
  let data = store
    .get_data(id, version)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("resource {id} has no data version {version}"))
    })?;
  Ok(Json(data.document()))
}

/// `POST /resources/{id}/attachments`: returns 201 + the updated resource
/// document.
pub async fn append_attachment<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<AttachmentBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResourceStore,
{
  let input = NewResourceAttachment {
    attachment_type:  body.attachment_type,
    data:             body.data,
    version:          body.version,
    expected_version: body.expected_version,
  };
  store.append_attachment(id, input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(document(store.as_ref(), id).await?)))
}

// ─── Edges ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReferenceBody {
  pub to_resource_id: i64,
  pub position:       Option<i64>,
}

/// `POST /resources/{id}/references`: returns 201 + the stored edge.
pub async fn add_reference<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<ReferenceBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResourceStore,
{
  let reference = store
    .add_reference(id, NewReference {
      to_resource_id: body.to_resource_id,
      position:       body.position,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(reference)))
}

/// `GET /resources/{id}/referenced-from`
pub async fn referenced_from<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<ResourceReference>>, ApiError>
where
  S: ResourceStore,
{
  let references = store.referenced_from(id).await.map_err(ApiError::store)?;
  Ok(Json(references))
}

#[derive(Debug, Deserialize)]
pub struct MentionBody {
  pub identity_id: i64,
  pub position:    Option<i64>,
}

/// `POST /resources/{id}/mentions`: returns 201 + the stored edge.
pub async fn add_mention<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(body): Json<MentionBody>,
) -> Result<(StatusCode, Json<ResourceMention>), ApiError>
where
  S: ResourceStore,
{
  let mention = store
    .add_mention(id, NewMention {
      identity_id: body.identity_id,
      position:    body.position,
    })
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(mention)))
}
