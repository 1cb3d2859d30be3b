//! JSON projections of the entities.
//!
//! These documents are the wire contract: what the API returns and what a
//! peer server parses back. Version and position maps are keyed by integers,
//! which `serde_json` writes as object keys (`"1"`, `"2"`, ...) and reads back
//! as integers; `BTreeMap` keeps them in numeric order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{ id, name, domain, fqn }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDocument {
  pub id:     i64,
  pub name:   String,
  pub domain: String,
  pub fqn:    String,
}

/// Envelope (`resource_type`, `version`, `created_at`) plus the opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDocument {
  pub resource_type: String,
  pub version:       i64,
  pub created_at:    DateTime<Utc>,
  pub data:          Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDocument {
  pub attachment_type: String,
  pub version:         i64,
  pub created_at:      DateTime<Utc>,
  pub data:            Value,
}

/// The aggregate projection of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDocument {
  pub id:              i64,
  pub identity_id:     i64,
  /// `0` when the resource has no data yet.
  pub current_version: i64,
  pub created_at:      DateTime<Utc>,
  /// version -> data
  pub data:            BTreeMap<i64, DataDocument>,
  /// version -> attachment
  #[serde(default)]
  pub attachments:     BTreeMap<i64, AttachmentDocument>,
  /// position -> referenced resource id
  #[serde(default)]
  pub references:      BTreeMap<i64, i64>,
  /// position -> mentioned identity id
  #[serde(default)]
  pub mentions:        BTreeMap<i64, i64>,
  pub meta:            Option<Value>,
}

impl ResourceDocument {
  /// The data entry named by `current_version`, if any.
  pub fn current(&self) -> Option<&DataDocument> { self.data.get(&self.current_version) }
}
