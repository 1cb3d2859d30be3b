//! Error types for `exodus-core`.
//!
//! Every failure a store can report is classified by [`ErrorKind`], which the
//! HTTP layer maps onto a status code.

use thiserror::Error;

/// Broad classification of a failure, independent of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A referenced identity, resource or version does not exist.
  NotFound,
  /// The write collides with existing state (duplicate or stale).
  Conflict,
  /// The input is malformed.
  Validation,
  /// Anything else: storage or encoding failures in a backend.
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("identity not found: {0}")]
  IdentityNotFound(i64),

  #[error("resource not found: {0}")]
  ResourceNotFound(i64),

  #[error("resource {resource_id} has no data version {version}")]
  VersionNotFound { resource_id: i64, version: i64 },

  #[error("identity {0} already exists")]
  DuplicateIdentity(String),

  #[error("resource {resource_id} already has data version {version}")]
  DuplicateVersion { resource_id: i64, version: i64 },

  #[error("resource {resource_id} already has attachment version {version}")]
  DuplicateAttachmentVersion { resource_id: i64, version: i64 },

  #[error(
    "stale write on resource {resource_id}: expected version {expected}, current is {current}"
  )]
  StaleVersion {
    resource_id: i64,
    expected:    i64,
    current:     i64,
  },

  #[error("resource {resource_id} already has an edge at position {position}")]
  DuplicatePosition { resource_id: i64, position: i64 },

  #[error("identity {0} still owns or is mentioned by resources")]
  IdentityInUse(i64),

  #[error("invalid input: {0}")]
  Validation(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::IdentityNotFound(_)
      | Self::ResourceNotFound(_)
      | Self::VersionNotFound { .. } => ErrorKind::NotFound,
      Self::DuplicateIdentity(_)
      | Self::DuplicateVersion { .. }
      | Self::DuplicateAttachmentVersion { .. }
      | Self::StaleVersion { .. }
      | Self::DuplicatePosition { .. }
      | Self::IdentityInUse(_) => ErrorKind::Conflict,
      Self::Validation(_) => ErrorKind::Validation,
    }
  }
}

/// Implemented by every backend error type so callers can classify failures
/// without knowing the backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn kind(&self) -> ErrorKind;
}

impl StoreError for Error {
  fn kind(&self) -> ErrorKind { Error::kind(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
