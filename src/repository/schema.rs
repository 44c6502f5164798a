// urraca is a configuration history tool for the Claude toolchain
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Database schema and connection setup.
//!
//! The snapshot owns its observations, changes, tags, annotations and entity
//! records (`ON DELETE CASCADE`). Blobs are shared and reference counted;
//! they are never cascaded, only released.

use anyhow::{Context, Result, bail};
use rusqlite::Connection;

pub const THIS_SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS manifest (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshots (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at        INTEGER NOT NULL,
    parent_id         INTEGER REFERENCES snapshots(id) ON DELETE SET NULL,
    trigger_kind      TEXT NOT NULL,
    originator        TEXT,
    notes             TEXT,
    os_kind           TEXT NOT NULL,
    os_version        TEXT NOT NULL,
    hostname          TEXT NOT NULL,
    username          TEXT NOT NULL,
    working_dir       TEXT NOT NULL,
    num_files         INTEGER NOT NULL,
    num_dirs          INTEGER NOT NULL,
    total_bytes       INTEGER NOT NULL,
    num_locations     INTEGER NOT NULL,
    num_errors        INTEGER NOT NULL,
    content_cap_bytes INTEGER NOT NULL,
    fingerprint       TEXT NOT NULL,
    baseline          INTEGER NOT NULL,
    changed           INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_created ON snapshots(created_at, id);

CREATE TABLE IF NOT EXISTS blobs (
    hash      TEXT PRIMARY KEY,
    size      INTEGER NOT NULL,
    refcount  INTEGER NOT NULL,
    external  INTEGER NOT NULL,
    data      BLOB
);

CREATE TABLE IF NOT EXISTS observations (
    snapshot_id   INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    location_id   TEXT NOT NULL,
    path          TEXT NOT NULL,
    kind          TEXT NOT NULL,
    size          INTEGER NOT NULL,
    mtime         INTEGER,
    mode          INTEGER,
    content_hash  TEXT,
    has_content   INTEGER NOT NULL,
    annotations   TEXT,
    PRIMARY KEY (snapshot_id, path)
);

CREATE TABLE IF NOT EXISTS changes (
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    path        TEXT NOT NULL,
    kind        TEXT NOT NULL,
    size_delta  INTEGER NOT NULL,
    old_hash    TEXT,
    new_hash    TEXT,
    transition  TEXT,
    PRIMARY KEY (snapshot_id, path)
);

CREATE TABLE IF NOT EXISTS mcp_servers (
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    command     TEXT NOT NULL,
    args        TEXT NOT NULL,
    env         TEXT NOT NULL,
    enabled     INTEGER NOT NULL,
    source_path TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, name)
);

CREATE TABLE IF NOT EXISTS subagents (
    snapshot_id  INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    content_hash TEXT NOT NULL REFERENCES blobs(hash),
    source_path  TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, name)
);

CREATE TABLE IF NOT EXISTS slash_commands (
    snapshot_id  INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    name         TEXT NOT NULL,
    content_hash TEXT NOT NULL REFERENCES blobs(hash),
    source_path  TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, name)
);

CREATE TABLE IF NOT EXISTS memories (
    snapshot_id  INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    scope        TEXT NOT NULL,
    content_hash TEXT NOT NULL REFERENCES blobs(hash),
    source_path  TEXT NOT NULL,
    PRIMARY KEY (snapshot_id, scope)
);

CREATE TABLE IF NOT EXISTS tags (
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    created_by  TEXT,
    created_at  INTEGER NOT NULL,
    PRIMARY KEY (snapshot_id, name)
);

CREATE TABLE IF NOT EXISTS annotations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    snapshot_id INTEGER NOT NULL REFERENCES snapshots(id) ON DELETE CASCADE,
    text        TEXT NOT NULL,
    created_by  TEXT,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_annotations_snapshot ON annotations(snapshot_id);
";

/// Per-connection pragmas. WAL keeps readers unblocked by the single writer;
/// foreign keys drive the cascade deletes the ownership model relies on.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .with_context(|| "Could not enable WAL mode")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .with_context(|| "Could not enable foreign keys")?;
    Ok(())
}

/// Creates all tables and stamps the manifest. Idempotent.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .with_context(|| "Could not create database schema")?;

    conn.execute(
        "INSERT OR IGNORE INTO manifest (key, value) VALUES ('schema_version', ?1)",
        [THIS_SCHEMA_VERSION.to_string()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO manifest (key, value) VALUES ('created_at', ?1)",
        [chrono::Utc::now().timestamp_millis().to_string()],
    )?;

    Ok(())
}

/// Rejects databases written by an incompatible schema.
pub fn check_schema_version(conn: &Connection) -> Result<()> {
    let version: String = conn
        .query_row(
            "SELECT value FROM manifest WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .with_context(|| "Database has no schema version; not an urraca repository?")?;

    let version: u32 = version
        .parse()
        .with_context(|| format!("Malformed schema version '{version}'"))?;

    if version != THIS_SCHEMA_VERSION {
        bail!("Unsupported repository version '{version}' (expected {THIS_SCHEMA_VERSION})");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_initializes_in_memory() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        check_schema_version(&conn).unwrap();

        // Idempotent.
        init_schema(&conn).unwrap();
        check_schema_version(&conn).unwrap();
    }

    #[test]
    fn test_cascade_from_snapshot_to_observations() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO snapshots (created_at, trigger_kind, os_kind, os_version, hostname,
             username, working_dir, num_files, num_dirs, total_bytes, num_locations,
             num_errors, content_cap_bytes, fingerprint, baseline, changed)
             VALUES (0, 'manual', 'linux', 'v', 'h', 'u', '/', 0, 0, 0, 0, 0, 0, 'f', 1, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO observations (snapshot_id, location_id, path, kind, size, has_content)
             VALUES (1, 'loc', '/p', 'file', 0, 0)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM snapshots WHERE id = 1", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
