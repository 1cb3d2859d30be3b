//! Resources, the versioned units of shared content, and their children.
//!
//! A [`Resource`] is the aggregate root. Its payload lives in immutable,
//! numbered [`ResourceData`] versions; auxiliary payloads live in
//! [`ResourceAttachment`] versions with their own sequence. Nothing in a
//! version is ever edited: a change is a new version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  json::{AttachmentDocument, DataDocument, ResourceDocument},
};

// ─── Children ────────────────────────────────────────────────────────────────

/// One immutable version of a resource's primary payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData {
  pub id:            i64,
  pub resource_id:   i64,
  pub version:       i64,
  pub resource_type: String,
  pub created_at:    DateTime<Utc>,
  pub data:          Value,
}

impl ResourceData {
  pub fn document(&self) -> DataDocument {
    DataDocument {
      resource_type: self.resource_type.clone(),
      version:       self.version,
      created_at:    self.created_at,
      data:          self.data.clone(),
    }
  }
}

/// One immutable version of a resource's auxiliary payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAttachment {
  pub id:              i64,
  pub resource_id:     i64,
  pub version:         i64,
  pub attachment_type: String,
  pub created_at:      DateTime<Utc>,
  pub data:            Value,
}

impl ResourceAttachment {
  pub fn document(&self) -> AttachmentDocument {
    AttachmentDocument {
      attachment_type: self.attachment_type.clone(),
      version:         self.version,
      created_at:      self.created_at,
      data:            self.data.clone(),
    }
  }
}

/// A directed edge from one resource to another (threads, quotes, albums).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReference {
  pub id:               i64,
  pub position:         i64,
  pub from_resource_id: i64,
  pub to_resource_id:   i64,
}

/// A directed edge from a resource to an identity (@-replies, photo tags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMention {
  pub id:          i64,
  pub position:    i64,
  pub resource_id: i64,
  pub identity_id: i64,
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// A resource together with every child row it owns.
///
/// Children are kept in whatever order the store returned them; nothing here
/// relies on that order.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
  pub id:          i64,
  pub identity_id: i64,
  pub created_at:  DateTime<Utc>,
  pub metadata:    Option<Value>,
  pub data:        Vec<ResourceData>,
  pub attachments: Vec<ResourceAttachment>,
  pub references:  Vec<ResourceReference>,
  pub mentions:    Vec<ResourceMention>,
}

impl Resource {
  /// The most recent data version: the one with the highest version number.
  pub fn current_version(&self) -> Option<&ResourceData> {
    self.data.iter().max_by_key(|d| d.version)
  }

  /// The highest data version number, or `0` when there is no data yet.
  pub fn current_version_number(&self) -> i64 {
    self.current_version().map_or(0, |d| d.version)
  }

  pub fn current_attachment(&self) -> Option<&ResourceAttachment> {
    self.attachments.iter().max_by_key(|a| a.version)
  }

  pub fn current_attachment_number(&self) -> i64 {
    self.current_attachment().map_or(0, |a| a.version)
  }

  pub fn data_version(&self, version: i64) -> Option<&ResourceData> {
    self.data.iter().find(|d| d.version == version)
  }

  /// The canonical JSON projection of the aggregate.
  pub fn document(&self) -> ResourceDocument {
    ResourceDocument {
      id:              self.id,
      identity_id:     self.identity_id,
      current_version: self.current_version_number(),
      created_at:      self.created_at,
      data:            self
        .data
        .iter()
        .map(|d| (d.version, d.document()))
        .collect(),
      attachments:     self
        .attachments
        .iter()
        .map(|a| (a.version, a.document()))
        .collect(),
      references:      self
        .references
        .iter()
        .map(|r| (r.position, r.to_resource_id))
        .collect(),
      mentions:        self
        .mentions
        .iter()
        .map(|m| (m.position, m.identity_id))
        .collect(),
      meta:            self.metadata.clone(),
    }
  }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ResourceStore::create_resource`].
#[derive(Debug, Clone)]
pub struct NewResource {
  pub identity_id: i64,
  pub metadata:    Option<Value>,
}

/// Input to [`crate::store::ResourceStore::append_data`].
/// `created_at` is always set by the store.
#[derive(Debug, Clone)]
pub struct NewResourceData {
  pub resource_type:    String,
  pub data:             Value,
  /// Explicit version number, e.g. when importing versions from a remote
  /// server. `None` appends after the current version.
  pub version:          Option<i64>,
  /// Optimistic concurrency guard: the write is rejected unless the current
  /// version number equals this value.
  pub expected_version: Option<i64>,
}

impl NewResourceData {
  pub fn new(resource_type: impl Into<String>, data: Value) -> Self {
    Self {
      resource_type: resource_type.into(),
      data,
      version: None,
      expected_version: None,
    }
  }

  pub fn validate(&self) -> Result<()> { validate_type("resource_type", &self.resource_type) }
}

/// Input to [`crate::store::ResourceStore::append_attachment`].
#[derive(Debug, Clone)]
pub struct NewResourceAttachment {
  pub attachment_type:  String,
  pub data:             Value,
  pub version:          Option<i64>,
  pub expected_version: Option<i64>,
}

impl NewResourceAttachment {
  pub fn new(attachment_type: impl Into<String>, data: Value) -> Self {
    Self {
      attachment_type: attachment_type.into(),
      data,
      version: None,
      expected_version: None,
    }
  }

  pub fn validate(&self) -> Result<()> {
    validate_type("attachment_type", &self.attachment_type)
  }
}

/// Input to [`crate::store::ResourceStore::add_reference`].
#[derive(Debug, Clone, Copy)]
pub struct NewReference {
  pub to_resource_id: i64,
  /// `None` places the edge after the last existing one.
  pub position:       Option<i64>,
}

/// Input to [`crate::store::ResourceStore::add_mention`].
#[derive(Debug, Clone, Copy)]
pub struct NewMention {
  pub identity_id: i64,
  pub position:    Option<i64>,
}

fn validate_type(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} is empty")));
  }
  Ok(())
}

// ─── Sequencing rules ────────────────────────────────────────────────────────

/// Decide the version number for an append, given the resource's current
/// version number.
///
/// Does not check for duplicates: an explicit version at or below `current`
/// may fill a gap, so the store checks existence itself.
pub fn assign_version(
  resource_id: i64,
  current: i64,
  requested: Option<i64>,
  expected: Option<i64>,
) -> Result<i64> {
  if let Some(expected) = expected
    && expected != current
  {
    return Err(Error::StaleVersion { resource_id, expected, current });
  }
  match requested {
    None => current.checked_add(1).ok_or_else(|| {
      Error::Validation(format!("resource {resource_id} has no version left after {current}"))
    }),
    Some(v) if v < 1 => Err(Error::Validation(format!(
      "version must be at least 1, got {v}"
    ))),
    Some(v) => Ok(v),
  }
}

/// Decide the position of a new reference or mention, given the highest
/// position already used by the owning resource.
pub fn assign_position(max_existing: Option<i64>, requested: Option<i64>) -> Result<i64> {
  match requested {
    None => match max_existing {
      None => Ok(0),
      Some(p) => p.checked_add(1).ok_or_else(|| {
        Error::Validation(format!("no position left after {p}"))
      }),
    },
    Some(p) if p < 0 => Err(Error::Validation(format!(
      "position must not be negative, got {p}"
    ))),
    Some(p) => Ok(p),
  }
}
