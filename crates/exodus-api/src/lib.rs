//! JSON REST API for the Exodus resource server.
//!
//! Exposes an axum [`Router`] backed by any [`exodus_core::store::ResourceStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", exodus_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod extract;
pub mod identities;
pub mod resources;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use exodus_core::store::ResourceStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ResourceStore + 'static,
{
  Router::new()
    // Identities
    .route(
      "/identities",
      get(identities::list::<S>).post(identities::create::<S>),
    )
    .route(
      "/identities/{id}",
      get(identities::get_one::<S>).delete(identities::delete_one::<S>),
    )
    .route("/identities/{id}/resources", get(identities::resources::<S>))
    // Resources
    .route("/resources", post(resources::create::<S>))
    .route(
      "/resources/{id}",
      get(resources::get_one::<S>).delete(resources::delete_one::<S>),
    )
    .route("/resources/{id}/meta", put(resources::set_meta::<S>))
    .route("/resources/{id}/data", post(resources::append_data::<S>))
    .route("/resources/{id}/data/{version}", get(resources::get_data::<S>))
    .route("/resources/{id}/attachments", post(resources::append_attachment::<S>))
    .route("/resources/{id}/references", post(resources::add_reference::<S>))
    .route("/resources/{id}/referenced-from", get(resources::referenced_from::<S>))
    .route("/resources/{id}/mentions", post(resources::add_mention::<S>))
    .with_state(store)
}
