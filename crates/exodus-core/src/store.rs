//! The `ResourceStore` trait.
//!
//! A store is the explicit persistence context for every operation: callers
//! hold one (usually behind an `Arc`) and pass it where it is needed. It is
//! implemented by storage backends (e.g. `exodus-store-sqlite`); the API layer
//! depends on this abstraction, not on any concrete backend.

use std::future::Future;

use serde_json::Value;

use crate::{
  StoreError,
  identity::{Identity, NewIdentity},
  resource::{
    NewMention, NewReference, NewResource, NewResourceAttachment, NewResourceData,
    Resource, ResourceAttachment, ResourceData, ResourceMention, ResourceReference,
  },
};

/// Abstraction over an Exodus resource store backend.
///
/// Data and attachment versions are append-only. Each operation is atomic:
/// an append either lands completely or not at all, and a resource is always
/// read together with all of its children.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ResourceStore: Send + Sync {
  type Error: StoreError;

  // ── Identities ────────────────────────────────────────────────────────

  /// Validate and persist a new identity. `(name, domain)` is unique.
  fn create_identity(
    &self,
    input: NewIdentity,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;

  /// Retrieve an identity by id. Returns `None` if not found.
  fn get_identity(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Retrieve an identity by the two halves of its fqn.
  fn find_identity<'a>(
    &'a self,
    name: &'a str,
    domain: &'a str,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  fn list_identities(
    &self,
  ) -> impl Future<Output = Result<Vec<Identity>, Self::Error>> + Send + '_;

  /// Delete an identity. Refused while it still owns resources or is
  /// mentioned by one.
  fn delete_identity(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Resources ─────────────────────────────────────────────────────────

  /// Create an empty resource owned by `input.identity_id`.
  fn create_resource(
    &self,
    input: NewResource,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + '_;

  /// Load a resource with all of its children. Returns `None` if not found.
  fn get_resource(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Resource>, Self::Error>> + Send + '_;

  /// All resources owned by an identity.
  fn list_resources(
    &self,
    identity_id: i64,
  ) -> impl Future<Output = Result<Vec<Resource>, Self::Error>> + Send + '_;

  /// Replace the resource-level metadata and return the updated aggregate.
  fn set_metadata(
    &self,
    id: i64,
    metadata: Option<Value>,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + '_;

  /// Delete a resource along with every child it owns and every reference
  /// pointing at it.
  fn delete_resource(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Versions (append-only) ─────────────────────────────────────

  /// Append a data version. The `created_at` timestamp is set by the store.
  fn append_data(
    &self,
    resource_id: i64,
    input: NewResourceData,
  ) -> impl Future<Output = Result<ResourceData, Self::Error>> + Send + '_;

  /// Retrieve one data version. Returns `None` if the resource or the
  /// version does not exist.
  fn get_data(
    &self,
    resource_id: i64,
    version: i64,
  ) -> impl Future<Output = Result<Option<ResourceData>, Self::Error>> + Send + '_;

  /// Append an attachment version; the sequence is independent of data.
  fn append_attachment(
    &self,
    resource_id: i64,
    input: NewResourceAttachment,
  ) -> impl Future<Output = Result<ResourceAttachment, Self::Error>> + Send + '_;

  // ── Edges ─────────────────────────────────────────────────────────────

  fn add_reference(
    &self,
    from_resource_id: i64,
    input: NewReference,
  ) -> impl Future<Output = Result<ResourceReference, Self::Error>> + Send + '_;

  fn add_mention(
    &self,
    resource_id: i64,
    input: NewMention,
  ) -> impl Future<Output = Result<ResourceMention, Self::Error>> + Send + '_;

  /// Incoming references: edges whose `to_resource_id` is `resource_id`.
  fn referenced_from(
    &self,
    resource_id: i64,
  ) -> impl Future<Output = Result<Vec<ResourceReference>, Self::Error>> + Send + '_;
}
