//! SQL schema and migrations for the Exodus SQLite store.
//!
//! Migrations are applied in order inside one transaction; the applied version
//! is mirrored to `PRAGMA user_version`.

use rusqlite::Connection;

/// Per-connection settings. Must run outside a transaction: `foreign_keys`
/// is a no-op inside one.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

#[derive(Debug, Clone, Copy)]
struct Migration {
  version: u32,
  sql:     &'static str,
}

const MIGRATIONS: &[Migration] = &[
  Migration { version: 1, sql: INIT },
  Migration { version: 2, sql: ATTACHMENTS },
];

pub(crate) const INIT: &str = "
CREATE TABLE identity (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    domain      TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- ISO 8601 UTC; server-assigned
    UNIQUE (name, domain)
);

CREATE TABLE resource (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at   TEXT NOT NULL,
    identity_id  INTEGER NOT NULL REFERENCES identity(id) ON DELETE RESTRICT,
    metadata     TEXT             -- opaque JSON or NULL
);

-- Versions are strictly append-only.
-- No UPDATE is ever issued against this table.
CREATE TABLE resource_data (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    version        INTEGER NOT NULL,
    created_at     TEXT NOT NULL,
    resource_type  TEXT NOT NULL,
    resource_id    INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    data           TEXT NOT NULL,  -- opaque JSON payload
    UNIQUE (resource_id, version),
    CHECK  (version >= 1)
);

CREATE TABLE resource_reference (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    position          INTEGER NOT NULL,
    from_resource_id  INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    to_resource_id    INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    UNIQUE (from_resource_id, position),
    CHECK  (position >= 0)
);

CREATE TABLE resource_mention (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    position     INTEGER NOT NULL,
    resource_id  INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    identity_id  INTEGER NOT NULL REFERENCES identity(id) ON DELETE RESTRICT,
    UNIQUE (resource_id, position),
    CHECK  (position >= 0)
);

CREATE INDEX identity_name_idx           ON identity(name);
CREATE INDEX resource_identity_idx       ON resource(identity_id);
CREATE INDEX resource_data_type_idx      ON resource_data(resource_type);
CREATE INDEX resource_data_created_idx   ON resource_data(created_at);
CREATE INDEX resource_reference_to_idx   ON resource_reference(to_resource_id);
CREATE INDEX resource_mention_ident_idx  ON resource_mention(identity_id);
";

const ATTACHMENTS: &str = "
-- Same discipline as resource_data, with an independent version sequence.
CREATE TABLE resource_attachment (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    version          INTEGER NOT NULL,
    created_at       TEXT NOT NULL,
    attachment_type  TEXT NOT NULL,
    resource_id      INTEGER NOT NULL REFERENCES resource(id) ON DELETE CASCADE,
    data             TEXT NOT NULL,
    UNIQUE (resource_id, version),
    CHECK  (version >= 1)
);

CREATE INDEX resource_attachment_type_idx ON resource_attachment(attachment_type);
";

/// The latest schema version known by this binary.
pub fn latest_version() -> u32 {
  MIGRATIONS.last().map_or(0, |m| m.version)
}

/// What [`migrate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migrated {
  UpToDate(u32),
  Applied { from: u32, to: u32 },
  /// The database was written by a newer binary; nothing was touched.
  TooNew { found: u32, supported: u32 },
}

/// Apply all pending migrations atomically.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<Migrated> {
  let current = user_version(conn)?;
  let latest = latest_version();

  if current > latest {
    return Ok(Migrated::TooNew { found: current, supported: latest });
  }
  if current == latest {
    return Ok(Migrated::UpToDate(current));
  }

  let tx = conn.transaction()?;
  for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
    tx.execute_batch(migration.sql)?;
    tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
  }
  tx.commit()?;

  Ok(Migrated::Applied { from: current, to: latest })
}

pub fn user_version(conn: &Connection) -> rusqlite::Result<u32> {
  conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
}
