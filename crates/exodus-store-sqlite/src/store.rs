//! [`SqliteStore`]: the SQLite implementation of [`ResourceStore`].

use std::path::Path;

use chrono::Utc;
use exodus_core::{
  identity::{Identity, NewIdentity},
  resource::{
    NewMention, NewReference, NewResource, NewResourceAttachment, NewResourceData,
    Resource, ResourceAttachment, ResourceData, ResourceMention, ResourceReference,
    assign_position, assign_version,
  },
  store::ResourceStore,
};
use rusqlite::{Connection, OptionalExtension as _};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::{
    MENTION_COLUMNS, REFERENCE_COLUMNS, RawIdentity, RawResource, RawVersion,
    encode_dt, encode_json, mention_from_row, reference_from_row,
  },
  schema::{Migrated, PRAGMAS, migrate, user_version},
};

type CoreError = exodus_core::Error;

/// Carry a domain error out of a connection closure. Recovered by
/// `From<tokio_rusqlite::Error> for Error`.
fn reject(e: CoreError) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Exodus resource store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and apply pending migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let migrated = self
      .conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        Ok(migrate(conn)?)
      })
      .await?;

    match migrated {
      Migrated::UpToDate(version) => debug!(version, "schema up to date"),
      Migrated::Applied { from, to } => info!(from, to, "applied schema migrations"),
      Migrated::TooNew { found, supported } => {
        return Err(Error::UnsupportedSchemaVersion { found, supported });
      }
    }
    Ok(())
  }

  /// The schema version recorded in the database file.
  pub async fn schema_version(&self) -> Result<u32> {
    Ok(self.conn.call(|conn| Ok(user_version(conn)?)).await?)
  }

  async fn append_version(
    &self,
    table: VersionTable,
    resource_id: i64,
    kind: String,
    data: &Value,
    requested: Option<i64>,
    expected: Option<i64>,
  ) -> Result<(i64, i64, chrono::DateTime<Utc>)> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let data_str = encode_json(data);

    let (id, version) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !resource_exists(&tx, resource_id)? {
          return Err(reject(CoreError::ResourceNotFound(resource_id)));
        }

        let current = max_version(&tx, table, resource_id)?;
        let version =
          assign_version(resource_id, current, requested, expected).map_err(reject)?;
        if version_exists(&tx, table, resource_id, version)? {
          return Err(reject(table.duplicate(resource_id, version)));
        }

        tx.execute(
          &format!(
            "INSERT INTO {} (resource_id, version, {}, created_at, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            table.name(),
            table.kind_column(),
          ),
          rusqlite::params![resource_id, version, kind, at_str, data_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok((id, version))
      })
      .await?;

    debug!(table = table.name(), resource_id, version, "appended version");
    Ok((id, version, created_at))
  }
}

// ─── ResourceStore impl ──────────────────────────────────────────────────────

impl ResourceStore for SqliteStore {
  type Error = Error;

  // ── Identities ────────────────────────────────────────────────────────────

  async fn create_identity(&self, input: NewIdentity) -> Result<Identity> {
    input.validate()?;

    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let (name, domain) = (input.name.clone(), input.domain.clone());

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM identity WHERE name = ?1 AND domain = ?2",
            rusqlite::params![name, domain],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(reject(CoreError::DuplicateIdentity(format!("{name}@{domain}"))));
        }

        tx.execute(
          "INSERT INTO identity (name, domain, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![name, domain, at_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
      })
      .await?;

    let identity = Identity { id, name: input.name, domain: input.domain, created_at };
    info!(id, fqn = %identity.fqn(), "created identity");
    Ok(identity)
  }

  async fn get_identity(&self, id: i64) -> Result<Option<Identity>> {
    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM identity WHERE id = ?1", RawIdentity::COLUMNS),
            rusqlite::params![id],
            RawIdentity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn find_identity(&self, name: &str, domain: &str) -> Result<Option<Identity>> {
    let (name, domain) = (name.to_owned(), domain.to_owned());

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM identity WHERE name = ?1 AND domain = ?2",
              RawIdentity::COLUMNS
            ),
            rusqlite::params![name, domain],
            RawIdentity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn list_identities(&self) -> Result<Vec<Identity>> {
    let raws: Vec<RawIdentity> = self
      .conn
      .call(|conn| {
        let mut stmt = conn
          .prepare(&format!("SELECT {} FROM identity ORDER BY id", RawIdentity::COLUMNS))?;
        let rows = stmt
          .query_map([], RawIdentity::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentity::into_identity).collect()
  }

  async fn delete_identity(&self, id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !identity_exists(&tx, id)? {
          return Err(reject(CoreError::IdentityNotFound(id)));
        }

        let in_use: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM resource WHERE identity_id = ?1)
               OR EXISTS (SELECT 1 FROM resource_mention WHERE identity_id = ?1)",
          rusqlite::params![id],
          |row| row.get(0),
        )?;
        if in_use {
          return Err(reject(CoreError::IdentityInUse(id)));
        }

        tx.execute("DELETE FROM identity WHERE id = ?1", rusqlite::params![id])?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(id, "deleted identity");
    Ok(())
  }

  // ── Resources ─────────────────────────────────────────────────────────────

  async fn create_resource(&self, input: NewResource) -> Result<Resource> {
    let created_at = Utc::now();
    let at_str = encode_dt(created_at);
    let meta_str = input.metadata.as_ref().map(encode_json);
    let identity_id = input.identity_id;

    let id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !identity_exists(&tx, identity_id)? {
          return Err(reject(CoreError::IdentityNotFound(identity_id)));
        }

        tx.execute(
          "INSERT INTO resource (created_at, identity_id, metadata) VALUES (?1, ?2, ?3)",
          rusqlite::params![at_str, identity_id, meta_str],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
      })
      .await?;

    debug!(id, identity_id, "created resource");
    Ok(Resource {
      id,
      identity_id,
      created_at,
      metadata: input.metadata,
      data: Vec::new(),
      attachments: Vec::new(),
      references: Vec::new(),
      mentions: Vec::new(),
    })
  }

  async fn get_resource(&self, id: i64) -> Result<Option<Resource>> {
    let raw: Option<RawResource> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = load_resource(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawResource::into_resource).transpose()
  }

  async fn list_resources(&self, identity_id: i64) -> Result<Vec<Resource>> {
    let raws: Vec<RawResource> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !identity_exists(&tx, identity_id)? {
          return Err(reject(CoreError::IdentityNotFound(identity_id)));
        }

        let ids = {
          let mut stmt =
            tx.prepare("SELECT id FROM resource WHERE identity_id = ?1 ORDER BY id")?;
          stmt
            .query_map(rusqlite::params![identity_id], |row| row.get::<_, i64>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut raws = Vec::with_capacity(ids.len());
        for id in ids {
          raws.extend(load_resource(&tx, id)?);
        }
        tx.commit()?;
        Ok(raws)
      })
      .await?;

    raws.into_iter().map(RawResource::into_resource).collect()
  }

  async fn set_metadata(&self, id: i64, metadata: Option<Value>) -> Result<Resource> {
    let meta_str = metadata.as_ref().map(encode_json);

    let raw: RawResource = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE resource SET metadata = ?1 WHERE id = ?2",
          rusqlite::params![meta_str, id],
        )?;
        if changed == 0 {
          return Err(reject(CoreError::ResourceNotFound(id)));
        }
        let raw = load_resource(&tx, id)?
          .ok_or_else(|| reject(CoreError::ResourceNotFound(id)))?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_resource()
  }

  async fn delete_resource(&self, id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let deleted =
          conn.execute("DELETE FROM resource WHERE id = ?1", rusqlite::params![id])?;
        if deleted == 0 {
          return Err(reject(CoreError::ResourceNotFound(id)));
        }
        Ok(())
      })
      .await?;

    info!(id, "deleted resource");
    Ok(())
  }

  // ── Versions — append-only writes ─────────────────────────────────────────

  async fn append_data(&self, resource_id: i64, input: NewResourceData) -> Result<ResourceData> {
    input.validate()?;

    let (id, version, created_at) = self
      .append_version(
        VersionTable::Data,
        resource_id,
        input.resource_type.clone(),
        &input.data,
        input.version,
        input.expected_version,
      )
      .await?;

    Ok(ResourceData {
      id,
      resource_id,
      version,
      resource_type: input.resource_type,
      created_at,
      data: input.data,
    })
  }

  async fn get_data(&self, resource_id: i64, version: i64) -> Result<Option<ResourceData>> {
    let raw: Option<RawVersion> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM resource_data WHERE resource_id = ?1 AND version = ?2",
              RawVersion::DATA_COLUMNS
            ),
            rusqlite::params![resource_id, version],
            RawVersion::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawVersion::into_data).transpose()
  }

  async fn append_attachment(
    &self,
    resource_id: i64,
    input: NewResourceAttachment,
  ) -> Result<ResourceAttachment> {
    input.validate()?;

    let (id, version, created_at) = self
      .append_version(
        VersionTable::Attachment,
        resource_id,
        input.attachment_type.clone(),
        &input.data,
        input.version,
        input.expected_version,
      )
      .await?;

    Ok(ResourceAttachment {
      id,
      resource_id,
      version,
      attachment_type: input.attachment_type,
      created_at,
      data: input.data,
    })
  }

  // ── Edges ─────────────────────────────────────────────────────────────────

  async fn add_reference(
    &self,
    from_resource_id: i64,
    input: NewReference,
  ) -> Result<ResourceReference> {
    let to_resource_id = input.to_resource_id;

    let reference = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in [from_resource_id, to_resource_id] {
          if !resource_exists(&tx, id)? {
            return Err(reject(CoreError::ResourceNotFound(id)));
          }
        }

        let max: Option<i64> = tx.query_row(
          "SELECT MAX(position) FROM resource_reference WHERE from_resource_id = ?1",
          rusqlite::params![from_resource_id],
          |row| row.get(0),
        )?;
        let position = assign_position(max, input.position).map_err(reject)?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM resource_reference WHERE from_resource_id = ?1 AND position = ?2",
            rusqlite::params![from_resource_id, position],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(reject(CoreError::DuplicatePosition {
            resource_id: from_resource_id,
            position,
          }));
        }

        tx.execute(
          "INSERT INTO resource_reference (position, from_resource_id, to_resource_id)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![position, from_resource_id, to_resource_id],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(ResourceReference { id, position, from_resource_id, to_resource_id })
      })
      .await?;

    Ok(reference)
  }

  async fn add_mention(&self, resource_id: i64, input: NewMention) -> Result<ResourceMention> {
    let identity_id = input.identity_id;

    let mention = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !resource_exists(&tx, resource_id)? {
          return Err(reject(CoreError::ResourceNotFound(resource_id)));
        }
        if !identity_exists(&tx, identity_id)? {
          return Err(reject(CoreError::IdentityNotFound(identity_id)));
        }

        let max: Option<i64> = tx.query_row(
          "SELECT MAX(position) FROM resource_mention WHERE resource_id = ?1",
          rusqlite::params![resource_id],
          |row| row.get(0),
        )?;
        let position = assign_position(max, input.position).map_err(reject)?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM resource_mention WHERE resource_id = ?1 AND position = ?2",
            rusqlite::params![resource_id, position],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(reject(CoreError::DuplicatePosition { resource_id, position }));
        }

        tx.execute(
          "INSERT INTO resource_mention (position, resource_id, identity_id)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![position, resource_id, identity_id],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(ResourceMention { id, position, resource_id, identity_id })
      })
      .await?;

    Ok(mention)
  }

  async fn referenced_from(&self, resource_id: i64) -> Result<Vec<ResourceReference>> {
    let references = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !resource_exists(&tx, resource_id)? {
          return Err(reject(CoreError::ResourceNotFound(resource_id)));
        }

        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {REFERENCE_COLUMNS} FROM resource_reference
             WHERE to_resource_id = ?1 ORDER BY id"
          ))?;
          stmt
            .query_map(rusqlite::params![resource_id], reference_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(rows)
      })
      .await?;

    Ok(references)
  }
}

// ─── Query helpers ───────────────────────────────────────────────────────────
//
// Synchronous helpers run inside a connection closure, usually against an
// open transaction.

#[derive(Debug, Clone, Copy)]
enum VersionTable {
  Data,
  Attachment,
}

impl VersionTable {
  fn name(self) -> &'static str {
    match self {
      Self::Data => "resource_data",
      Self::Attachment => "resource_attachment",
    }
  }

  fn kind_column(self) -> &'static str {
    match self {
      Self::Data => "resource_type",
      Self::Attachment => "attachment_type",
    }
  }

  fn duplicate(self, resource_id: i64, version: i64) -> CoreError {
    match self {
      Self::Data => CoreError::DuplicateVersion { resource_id, version },
      Self::Attachment => CoreError::DuplicateAttachmentVersion { resource_id, version },
    }
  }
}

fn identity_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM identity WHERE id = ?1)",
    rusqlite::params![id],
    |row| row.get(0),
  )
}

fn resource_exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM resource WHERE id = ?1)",
    rusqlite::params![id],
    |row| row.get(0),
  )
}

/// Highest version number in `table` for the resource, `0` if none.
fn max_version(conn: &Connection, table: VersionTable, resource_id: i64) -> rusqlite::Result<i64> {
  conn.query_row(
    &format!("SELECT COALESCE(MAX(version), 0) FROM {} WHERE resource_id = ?1", table.name()),
    rusqlite::params![resource_id],
    |row| row.get(0),
  )
}

fn version_exists(
  conn: &Connection,
  table: VersionTable,
  resource_id: i64,
  version: i64,
) -> rusqlite::Result<bool> {
  conn.query_row(
    &format!(
      "SELECT EXISTS (SELECT 1 FROM {} WHERE resource_id = ?1 AND version = ?2)",
      table.name()
    ),
    rusqlite::params![resource_id, version],
    |row| row.get(0),
  )
}

/// Read a resource row and all of its children.
fn load_resource(conn: &Connection, id: i64) -> rusqlite::Result<Option<RawResource>> {
  let head = conn
    .query_row(
      "SELECT identity_id, created_at, metadata FROM resource WHERE id = ?1",
      rusqlite::params![id],
      |row| {
        Ok((
          row.get::<_, i64>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, Option<String>>(2)?,
        ))
      },
    )
    .optional()?;

  let Some((identity_id, created_at, metadata)) = head else {
    return Ok(None);
  };

  let data = {
    let mut stmt = conn.prepare(&format!(
      "SELECT {} FROM resource_data WHERE resource_id = ?1 ORDER BY version",
      RawVersion::DATA_COLUMNS
    ))?;
    stmt
      .query_map(rusqlite::params![id], RawVersion::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let attachments = {
    let mut stmt = conn.prepare(&format!(
      "SELECT {} FROM resource_attachment WHERE resource_id = ?1 ORDER BY version",
      RawVersion::ATTACHMENT_COLUMNS
    ))?;
    stmt
      .query_map(rusqlite::params![id], RawVersion::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let references = {
    let mut stmt = conn.prepare(&format!(
      "SELECT {REFERENCE_COLUMNS} FROM resource_reference
       WHERE from_resource_id = ?1 ORDER BY position"
    ))?;
    stmt
      .query_map(rusqlite::params![id], reference_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  let mentions = {
    let mut stmt = conn.prepare(&format!(
      "SELECT {MENTION_COLUMNS} FROM resource_mention
       WHERE resource_id = ?1 ORDER BY position"
    ))?;
    stmt
      .query_map(rusqlite::params![id], mention_from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?
  };

  Ok(Some(RawResource {
    id,
    identity_id,
    created_at,
    metadata,
    data,
    attachments,
    references,
    mentions,
  }))
}
