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

//! The repository: one embedded database plus an external blob directory.
//!
//! All inbound operations of the engine live here. Every write path is a
//! single transaction, and snapshot creation/deletion additionally holds the
//! exclusive writer lock, so readers observe either the pre-commit or the
//! post-commit state and never anything in between.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use serde::Serialize;

use crate::changes::{PathChange, detect_changes};
use crate::entities::EntitySet;
use crate::entities::differ::{EntityDeltas, diff_entities};
use crate::global::defaults;
use crate::hashing::ContentHash;
use crate::repository::content::{ContentStats, ContentStore};
use crate::repository::entities;
use crate::repository::schema;
use crate::repository::snapshot::{
    self, AnnotationRow, ObservationRow, Page, SnapshotFilter, SnapshotRecord, SnapshotSort,
    TagRow,
};

#[derive(Debug)]
pub struct RepoConfig {
    pub inline_blob_limit: u64,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            inline_blob_limit: defaults::INLINE_BLOB_LIMIT,
        }
    }
}

/// Which relations `get_snapshot` loads eagerly. There is no lazy loading:
/// what is not asked for is not read.
#[derive(Debug, Clone, Copy, Default)]
pub struct Include {
    pub observations: bool,
    pub changes: bool,
    pub entities: bool,
}

impl Include {
    pub fn all() -> Self {
        Self {
            observations: true,
            changes: true,
            entities: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotDetail {
    pub snapshot: SnapshotRecord,
    pub tags: Vec<TagRow>,
    pub annotations: Vec<AnnotationRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<Vec<ObservationRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<Vec<PathChange>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<EntitySet>,
}

/// Result of `compare_snapshots`: path-level changes plus entity deltas,
/// both computed fresh from the two snapshots' records.
#[derive(Debug, Serialize)]
pub struct Comparison {
    pub from: SnapshotRecord,
    pub to: SnapshotRecord,
    pub path_changes: Vec<PathChange>,
    pub entity_deltas: EntityDeltas,
}

#[derive(Debug, Serialize)]
pub struct RepoStats {
    pub num_snapshots: u64,
    pub num_observations: u64,
    pub content: ContentStats,
    /// Size of the database file on disk.
    pub database_bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
}

/// Result of a full content verification sweep.
#[derive(Debug, Default, Serialize)]
pub struct VerifyReport {
    pub num_checked: u64,
    pub corrupted: Vec<String>,
    /// (hash, stored refcount, actual reference count)
    pub refcount_mismatches: Vec<(String, i64, i64)>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.corrupted.is_empty() && self.refcount_mismatches.is_empty()
    }
}

pub struct Repo {
    conn: Mutex<Connection>,
    writer_lock: Mutex<()>,
    root: PathBuf,
    content: ContentStore,
}

impl Repo {
    /// Create and initialize a new repository directory.
    pub fn init(root: &Path) -> Result<()> {
        let db_path = root.join(defaults::DATABASE_FILENAME);
        if db_path.exists() {
            bail!(
                "A repository already exists at {}",
                db_path.display()
            );
        }

        std::fs::create_dir_all(root)
            .with_context(|| format!("Could not create repository directory {}", root.display()))?;

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Could not create database {}", db_path.display()))?;
        schema::configure_connection(&conn)?;
        schema::init_schema(&conn)?;

        // A stable identity for this repository, derived from its birth.
        let repo_id = ContentHash::from_content(
            format!(
                "{}:{}:{}",
                Utc::now().timestamp_nanos_opt().unwrap_or_default(),
                std::process::id(),
                root.display()
            )
            .as_bytes(),
        );
        conn.execute(
            "INSERT OR IGNORE INTO manifest (key, value) VALUES ('repo_id', ?1)",
            [repo_id.to_hex()],
        )?;

        let blobs_path = root.join(defaults::BLOBS_DIR);
        std::fs::create_dir_all(&blobs_path)?;

        Ok(())
    }

    /// Open an existing repository.
    pub fn open(root: &Path, config: RepoConfig) -> Result<Arc<Self>> {
        let db_path = root.join(defaults::DATABASE_FILENAME);
        if !db_path.exists() {
            bail!(
                "No repository found at {}. Run 'init' first.",
                root.display()
            );
        }

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Could not open database {}", db_path.display()))?;
        schema::configure_connection(&conn)?;
        schema::check_schema_version(&conn)?;

        let content = ContentStore::new(root.join(defaults::BLOBS_DIR), config.inline_blob_limit);

        Ok(Arc::new(Self {
            conn: Mutex::new(conn),
            writer_lock: Mutex::new(()),
            root: root.to_path_buf(),
            content,
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn repo_id(&self) -> Result<String> {
        let conn = self.conn();
        let id: String = conn.query_row(
            "SELECT value FROM manifest WHERE key = 'repo_id'",
            [],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// The exclusive writer lock. Snapshot creation and deletion hold this
    /// for their whole transaction.
    pub(crate) fn writer_lock(&self) -> MutexGuard<'_, ()> {
        self.writer_lock.lock()
    }

    // -- Queries --

    pub fn list_snapshots(
        &self,
        filter: &SnapshotFilter,
        sort: SnapshotSort,
        page: &Page,
    ) -> Result<Vec<SnapshotRecord>> {
        snapshot::list_snapshots(&self.conn(), filter, sort, page)
    }

    pub fn get_snapshot(&self, id: i64) -> Result<SnapshotRecord> {
        snapshot::load_snapshot(&self.conn(), id)
    }

    pub fn latest_snapshot(&self) -> Result<Option<SnapshotRecord>> {
        let conn = self.conn();
        match snapshot::latest_snapshot_id(&conn)? {
            Some(id) => Ok(Some(snapshot::load_snapshot(&conn, id)?)),
            None => Ok(None),
        }
    }

    pub fn get_snapshot_detail(&self, id: i64, include: &Include) -> Result<SnapshotDetail> {
        let conn = self.conn();
        let record = snapshot::load_snapshot(&conn, id)?;

        Ok(SnapshotDetail {
            tags: snapshot::tags(&conn, id)?,
            annotations: snapshot::annotations(&conn, id)?,
            observations: include
                .observations
                .then(|| snapshot::observations(&conn, id))
                .transpose()?,
            changes: include.changes.then(|| snapshot::changes(&conn, id)).transpose()?,
            entities: include
                .entities
                .then(|| entities::load_entities(&conn, id))
                .transpose()?,
            snapshot: record,
        })
    }

    pub fn observations(&self, id: i64) -> Result<Vec<ObservationRow>> {
        snapshot::observations(&self.conn(), id)
    }

    pub fn changes(&self, id: i64) -> Result<Vec<PathChange>> {
        snapshot::changes(&self.conn(), id)
    }

    pub fn entities(&self, id: i64) -> Result<EntitySet> {
        entities::load_entities(&self.conn(), id)
    }

    /// Loads the bytes of a stored blob, verifying the hash.
    pub fn blob(&self, hash: &ContentHash) -> Result<Vec<u8>> {
        self.content.get(&self.conn(), hash, true)
    }

    /// Reference count of a blob, or `None` if no such blob is stored.
    pub fn blob_refcount(&self, hash: &ContentHash) -> Result<Option<i64>> {
        self.content.refcount(&self.conn(), hash)
    }

    // -- Mutations --

    /// Deletes a snapshot, cascading to everything it owns and releasing
    /// every blob reference it held. Blobs that reach zero references stay
    /// on disk as garbage until `gc`.
    pub fn delete_snapshot(&self, id: i64) -> Result<()> {
        let _writer = self.writer_lock();
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !snapshot::snapshot_exists(&tx, id)? {
            bail!("No snapshot with id {id} exists");
        }

        let mut refs = snapshot::observation_blob_refs(&tx, id)?;
        refs.extend(entities::entity_blob_refs(&tx, id)?);
        for hash in &refs {
            self.content.release(&tx, hash)?;
        }

        tx.execute("DELETE FROM snapshots WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(())
    }

    /// Computes the full comparison between any two snapshots: path-level
    /// changes plus semantic entity deltas. `compare(S, S)` is empty.
    pub fn compare_snapshots(&self, from_id: i64, to_id: i64) -> Result<Comparison> {
        let conn = self.conn();
        let from = snapshot::load_snapshot(&conn, from_id)?;
        let to = snapshot::load_snapshot(&conn, to_id)?;

        let from_keys = snapshot::observation_keys(&conn, from_id)?;
        let to_keys = snapshot::observation_keys(&conn, to_id)?;
        let path_changes = detect_changes(&from_keys, &to_keys);

        let from_entities = entities::load_entities(&conn, from_id)?;
        let to_entities = entities::load_entities(&conn, to_id)?;
        let entity_deltas = diff_entities(&from_entities, &to_entities);

        Ok(Comparison {
            from,
            to,
            path_changes,
            entity_deltas,
        })
    }

    pub fn add_tag(&self, id: i64, name: &str, created_by: Option<&str>) -> Result<bool> {
        let conn = self.conn();
        if !snapshot::snapshot_exists(&conn, id)? {
            bail!("No snapshot with id {id} exists");
        }
        snapshot::add_tag(&conn, id, name, created_by)
    }

    pub fn remove_tag(&self, id: i64, name: &str) -> Result<bool> {
        snapshot::remove_tag(&self.conn(), id, name)
    }

    pub fn add_annotation(&self, id: i64, text: &str, created_by: Option<&str>) -> Result<i64> {
        let conn = self.conn();
        if !snapshot::snapshot_exists(&conn, id)? {
            bail!("No snapshot with id {id} exists");
        }
        snapshot::add_annotation(&conn, id, text, created_by)
    }

    pub fn remove_annotation(&self, annotation_id: i64) -> Result<bool> {
        snapshot::remove_annotation(&self.conn(), annotation_id)
    }

    // -- Introspection --

    pub fn stats(&self) -> Result<RepoStats> {
        let conn = self.conn();
        let num_snapshots = snapshot::count_snapshots(&conn)?;
        let num_observations: i64 =
            conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        let content = self.content.stats(&conn)?;

        let db_path = self.root.join(defaults::DATABASE_FILENAME);
        let database_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

        Ok(RepoStats {
            num_snapshots,
            num_observations: num_observations as u64,
            content,
            database_bytes,
        })
    }

    pub fn health(&self) -> Result<HealthReport> {
        let conn = self.conn();
        let mut checks = Vec::new();

        let database_ok = conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok();
        checks.push(HealthCheck {
            name: "database",
            ok: database_ok,
            detail: self.root.join(defaults::DATABASE_FILENAME).display().to_string(),
        });

        let schema_ok = schema::check_schema_version(&conn).is_ok();
        checks.push(HealthCheck {
            name: "schema",
            ok: schema_ok,
            detail: format!("version {}", schema::THIS_SCHEMA_VERSION),
        });

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap_or_else(|_| "unknown".to_string());
        checks.push(HealthCheck {
            name: "journal_mode",
            ok: journal_mode.eq_ignore_ascii_case("wal"),
            detail: journal_mode,
        });

        let blobs_ok = self.content.blobs_path().is_dir();
        checks.push(HealthCheck {
            name: "blob_directory",
            ok: blobs_ok,
            detail: self.content.blobs_path().display().to_string(),
        });

        let negative_refs: i64 = conn
            .query_row("SELECT COUNT(*) FROM blobs WHERE refcount < 0", [], |row| row.get(0))
            .unwrap_or(-1);
        checks.push(HealthCheck {
            name: "refcounts",
            ok: negative_refs == 0,
            detail: format!("{negative_refs} blobs with negative refcount"),
        });

        Ok(HealthReport {
            healthy: checks.iter().all(|check| check.ok),
            checks,
        })
    }

    /// Re-hashes every stored blob and recomputes every reference count from
    /// the referring tables.
    pub fn verify_content(&self) -> Result<VerifyReport> {
        let conn = self.conn();
        let mut report = VerifyReport::default();

        // Actual reference counts, derived from the referring records.
        let mut actual_refs: HashMap<String, i64> = HashMap::new();
        let queries = [
            "SELECT content_hash FROM observations WHERE has_content = 1 AND content_hash IS NOT NULL",
            "SELECT content_hash FROM subagents",
            "SELECT content_hash FROM slash_commands",
            "SELECT content_hash FROM memories",
        ];
        for query in queries {
            let mut stmt = conn.prepare(query)?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for row in rows {
                *actual_refs.entry(row?).or_insert(0) += 1;
            }
        }

        for hash in self.content.list_hashes(&conn)? {
            report.num_checked += 1;

            if self.content.get(&conn, &hash, true).is_err() {
                report.corrupted.push(hash.to_hex());
            }

            let stored = self.content.refcount(&conn, &hash)?.unwrap_or(0);
            let actual = actual_refs.get(&hash.to_hex()).copied().unwrap_or(0);
            if stored != actual {
                report.refcount_mismatches.push((hash.to_hex(), stored, actual));
            }
        }

        Ok(report)
    }
}
