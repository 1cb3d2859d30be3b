//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, opaque payloads as compact JSON
//! text. Ids are native SQLite integers and need no encoding.

use chrono::{DateTime, Utc};
use exodus_core::{
  identity::Identity,
  resource::{
    Resource, ResourceAttachment, ResourceData, ResourceMention, ResourceReference,
  },
};
use rusqlite::Row;
use serde_json::Value;

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Opaque JSON ─────────────────────────────────────────────────────────────

pub fn encode_json(v: &Value) -> String { v.to_string() }

pub fn decode_json(s: &str) -> Result<Value> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns read directly from an `identity` row.
pub struct RawIdentity {
  pub id:         i64,
  pub name:       String,
  pub domain:     String,
  pub created_at: String,
}

impl RawIdentity {
  pub const COLUMNS: &'static str = "id, name, domain, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      name:       row.get(1)?,
      domain:     row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      id:         self.id,
      name:       self.name,
      domain:     self.domain,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw columns of a `resource_data` or `resource_attachment` row; the two
/// tables share a layout, with `kind` holding the type column.
pub struct RawVersion {
  pub id:          i64,
  pub resource_id: i64,
  pub version:     i64,
  pub kind:        String,
  pub created_at:  String,
  pub data:        String,
}

impl RawVersion {
  pub const DATA_COLUMNS: &'static str =
    "id, resource_id, version, resource_type, created_at, data";
  pub const ATTACHMENT_COLUMNS: &'static str =
    "id, resource_id, version, attachment_type, created_at, data";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      resource_id: row.get(1)?,
      version:     row.get(2)?,
      kind:        row.get(3)?,
      created_at:  row.get(4)?,
      data:        row.get(5)?,
    })
  }

  pub fn into_data(self) -> Result<ResourceData> {
    Ok(ResourceData {
      id:            self.id,
      resource_id:   self.resource_id,
      version:       self.version,
      resource_type: self.kind,
      created_at:    decode_dt(&self.created_at)?,
      data:          decode_json(&self.data)?,
    })
  }

  pub fn into_attachment(self) -> Result<ResourceAttachment> {
    Ok(ResourceAttachment {
      id:              self.id,
      resource_id:     self.resource_id,
      version:         self.version,
      attachment_type: self.kind,
      created_at:      decode_dt(&self.created_at)?,
      data:            decode_json(&self.data)?,
    })
  }
}

pub const REFERENCE_COLUMNS: &str = "id, position, from_resource_id, to_resource_id";

pub fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceReference> {
  Ok(ResourceReference {
    id:               row.get(0)?,
    position:         row.get(1)?,
    from_resource_id: row.get(2)?,
    to_resource_id:   row.get(3)?,
  })
}

pub const MENTION_COLUMNS: &str = "id, position, resource_id, identity_id";

pub fn mention_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceMention> {
  Ok(ResourceMention {
    id:          row.get(0)?,
    position:    row.get(1)?,
    resource_id: row.get(2)?,
    identity_id: row.get(3)?,
  })
}

/// A `resource` row with every child row, read in one transaction.
pub struct RawResource {
  pub id:          i64,
  pub identity_id: i64,
  pub created_at:  String,
  pub metadata:    Option<String>,
  pub data:        Vec<RawVersion>,
  pub attachments: Vec<RawVersion>,
  pub references:  Vec<ResourceReference>,
  pub mentions:    Vec<ResourceMention>,
}

impl RawResource {
  pub fn into_resource(self) -> Result<Resource> {
    Ok(Resource {
      id:          self.id,
      identity_id: self.identity_id,
      created_at:  decode_dt(&self.created_at)?,
      metadata:    self.metadata.as_deref().map(decode_json).transpose()?,
      data:        self
        .data
        .into_iter()
        .map(RawVersion::into_data)
        .collect::<Result<_>>()?,
      attachments: self
        .attachments
        .into_iter()
        .map(RawVersion::into_attachment)
        .collect::<Result<_>>()?,
      references:  self.references,
      mentions:    self.mentions,
    })
  }
}
