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

//! Snapshot rows and everything the snapshot owns: observations, changes,
//! tags and annotations.
//!
//! Snapshots are totally ordered by (creation time, id); the latest one in
//! that order becomes the parent of the next capture. Tags and annotations
//! may be added or removed after creation; they never mutate the snapshot
//! row itself.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::changes::{ObservationKey, PathChange};
use crate::global::{ChangeKind, PathKind, Trigger, defaults};
use crate::hashing::ContentHash;
use crate::scanner::ObservationDraft;

/// Identity of the host a snapshot was taken on.
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub os_kind: String,
    pub os_version: String,
    pub hostname: String,
    pub username: String,
}

impl HostInfo {
    /// Best-effort identity of the current host. Every field degrades to
    /// "unknown" rather than failing a capture.
    pub fn capture() -> Self {
        Self {
            os_kind: std::env::consts::OS.to_string(),
            os_version: os_version(),
            hostname: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("COMPUTERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
            username: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }
}

#[cfg(target_os = "linux")]
fn os_version() -> String {
    std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|text| {
            text.lines()
                .find_map(|line| line.strip_prefix("PRETTY_NAME=").map(|v| v.trim_matches('"').to_string()))
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(not(target_os = "linux"))]
fn os_version() -> String {
    "unknown".to_string()
}

/// An immutable snapshot row.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRecord {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<i64>,
    pub trigger: Trigger,
    pub originator: Option<String>,
    pub notes: Option<String>,
    pub os_kind: String,
    pub os_version: String,
    pub hostname: String,
    pub username: String,
    pub working_dir: String,
    pub num_files: u64,
    pub num_dirs: u64,
    pub total_bytes: u64,
    pub num_locations: u64,
    pub num_errors: u64,
    pub content_cap_bytes: u64,
    pub fingerprint: ContentHash,
    pub baseline: bool,
    pub changed: bool,
}

/// Field values for a snapshot row about to be inserted.
pub(crate) struct NewSnapshot<'a> {
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<i64>,
    pub trigger: Trigger,
    pub originator: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub host: &'a HostInfo,
    pub working_dir: &'a str,
    pub num_files: u64,
    pub num_dirs: u64,
    pub total_bytes: u64,
    pub num_locations: u64,
    pub num_errors: u64,
    pub content_cap_bytes: u64,
    pub fingerprint: ContentHash,
    pub baseline: bool,
}

/// A persisted path observation.
#[derive(Debug, Clone, Serialize)]
pub struct ObservationRow {
    pub location_id: String,
    pub path: String,
    pub kind: PathKind,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub mode: Option<u32>,
    pub content_hash: Option<ContentHash>,
    pub has_content: bool,
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagRow {
    pub name: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationRow {
    pub id: i64,
    pub text: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing filter. All conditions are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub trigger: Option<Trigger>,
    pub originator: Option<String>,
    pub os_kind: Option<String>,
    pub baseline: Option<bool>,
    pub changed: Option<bool>,
    pub tags_any: Vec<String>,
    pub tags_all: Vec<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    /// Free-text search over the notes field.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: defaults::DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

fn to_millis(time: &DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}

const SNAPSHOT_COLUMNS: &str = "id, created_at, parent_id, trigger_kind, originator, notes, \
     os_kind, os_version, hostname, username, working_dir, num_files, num_dirs, total_bytes, \
     num_locations, num_errors, content_cap_bytes, fingerprint, baseline, changed";

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<(SnapshotRecord, String, String)> {
    let record = SnapshotRecord {
        id: row.get(0)?,
        created_at: from_millis(row.get(1)?),
        parent_id: row.get(2)?,
        trigger: Trigger::Manual, // patched below from the raw text
        originator: row.get(4)?,
        notes: row.get(5)?,
        os_kind: row.get(6)?,
        os_version: row.get(7)?,
        hostname: row.get(8)?,
        username: row.get(9)?,
        working_dir: row.get(10)?,
        num_files: row.get::<_, i64>(11)? as u64,
        num_dirs: row.get::<_, i64>(12)? as u64,
        total_bytes: row.get::<_, i64>(13)? as u64,
        num_locations: row.get::<_, i64>(14)? as u64,
        num_errors: row.get::<_, i64>(15)? as u64,
        content_cap_bytes: row.get::<_, i64>(16)? as u64,
        fingerprint: ContentHash::empty(), // patched below from the raw text
        baseline: row.get(18)?,
        changed: row.get(19)?,
    };
    let trigger_text: String = row.get(3)?;
    let fingerprint_text: String = row.get(17)?;
    Ok((record, trigger_text, fingerprint_text))
}

fn finish_snapshot(raw: (SnapshotRecord, String, String)) -> Result<SnapshotRecord> {
    let (mut record, trigger_text, fingerprint_text) = raw;
    record.trigger = Trigger::parse(&trigger_text)?;
    record.fingerprint = ContentHash::from_hex(&fingerprint_text)?;
    Ok(record)
}

pub(crate) fn insert_snapshot(conn: &Connection, new: &NewSnapshot<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO snapshots (created_at, parent_id, trigger_kind, originator, notes,
             os_kind, os_version, hostname, username, working_dir, num_files, num_dirs,
             total_bytes, num_locations, num_errors, content_cap_bytes, fingerprint,
             baseline, changed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
             ?18, 0)",
        params![
            to_millis(&new.created_at),
            new.parent_id,
            new.trigger.as_str(),
            new.originator,
            new.notes,
            new.host.os_kind,
            new.host.os_version,
            new.host.hostname,
            new.host.username,
            new.working_dir,
            new.num_files as i64,
            new.num_dirs as i64,
            new.total_bytes as i64,
            new.num_locations as i64,
            new.num_errors as i64,
            new.content_cap_bytes as i64,
            new.fingerprint.to_hex(),
            new.baseline,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn set_fingerprint(conn: &Connection, id: i64, fingerprint: &ContentHash) -> Result<()> {
    conn.execute(
        "UPDATE snapshots SET fingerprint = ?1 WHERE id = ?2",
        params![fingerprint.to_hex(), id],
    )?;
    Ok(())
}

pub(crate) fn set_changed(conn: &Connection, id: i64, changed: bool) -> Result<()> {
    conn.execute(
        "UPDATE snapshots SET changed = ?1 WHERE id = ?2",
        params![changed, id],
    )?;
    Ok(())
}

/// The most recent snapshot by (creation time, id). This is the parent of
/// the next capture.
pub(crate) fn latest_snapshot_id(conn: &Connection) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM snapshots ORDER BY created_at DESC, id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub(crate) fn load_snapshot(conn: &Connection, id: i64) -> Result<SnapshotRecord> {
    let raw = conn
        .query_row(
            &format!("SELECT {SNAPSHOT_COLUMNS} FROM snapshots WHERE id = ?1"),
            [id],
            snapshot_from_row,
        )
        .optional()?
        .with_context(|| format!("No snapshot with id {id} exists"))?;
    finish_snapshot(raw)
}

pub(crate) fn snapshot_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM snapshots WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn count_snapshots(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
    Ok(count as u64)
}

pub(crate) fn list_snapshots(
    conn: &Connection,
    filter: &SnapshotFilter,
    sort: SnapshotSort,
    page: &Page,
) -> Result<Vec<SnapshotRecord>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut bindings: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    let bind = |value: Box<dyn rusqlite::ToSql>, bindings: &mut Vec<Box<dyn rusqlite::ToSql>>| {
        bindings.push(value);
        format!("?{}", bindings.len())
    };

    if let Some(trigger) = filter.trigger {
        let p = bind(Box::new(trigger.as_str().to_string()), &mut bindings);
        conditions.push(format!("s.trigger_kind = {p}"));
    }
    if let Some(originator) = &filter.originator {
        let p = bind(Box::new(originator.clone()), &mut bindings);
        conditions.push(format!("s.originator = {p}"));
    }
    if let Some(os_kind) = &filter.os_kind {
        let p = bind(Box::new(os_kind.clone()), &mut bindings);
        conditions.push(format!("s.os_kind = {p}"));
    }
    if let Some(baseline) = filter.baseline {
        let p = bind(Box::new(baseline), &mut bindings);
        conditions.push(format!("s.baseline = {p}"));
    }
    if let Some(changed) = filter.changed {
        let p = bind(Box::new(changed), &mut bindings);
        conditions.push(format!("s.changed = {p}"));
    }
    if let Some(after) = &filter.created_after {
        let p = bind(Box::new(to_millis(after)), &mut bindings);
        conditions.push(format!("s.created_at >= {p}"));
    }
    if let Some(before) = &filter.created_before {
        let p = bind(Box::new(to_millis(before)), &mut bindings);
        conditions.push(format!("s.created_at <= {p}"));
    }
    if let Some(search) = &filter.search {
        let p = bind(Box::new(format!("%{search}%")), &mut bindings);
        conditions.push(format!("s.notes LIKE {p}"));
    }
    if !filter.tags_any.is_empty() {
        let placeholders: Vec<String> = filter
            .tags_any
            .iter()
            .map(|tag| bind(Box::new(tag.clone()), &mut bindings))
            .collect();
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM tags t WHERE t.snapshot_id = s.id AND t.name IN ({}))",
            placeholders.join(", ")
        ));
    }
    for tag in &filter.tags_all {
        let p = bind(Box::new(tag.clone()), &mut bindings);
        conditions.push(format!(
            "EXISTS (SELECT 1 FROM tags t WHERE t.snapshot_id = s.id AND t.name = {p})"
        ));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let order = match sort {
        SnapshotSort::CreatedDesc => "ORDER BY s.created_at DESC, s.id DESC",
        SnapshotSort::CreatedAsc => "ORDER BY s.created_at ASC, s.id ASC",
    };
    let limit_p = bind(Box::new(page.limit as i64), &mut bindings);
    let offset_p = bind(Box::new(page.offset as i64), &mut bindings);

    let sql = format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM snapshots s {where_clause} {order} \
         LIMIT {limit_p} OFFSET {offset_p}"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(bindings.iter().map(|b| b.as_ref())),
        snapshot_from_row,
    )?;

    let mut snapshots = Vec::new();
    for row in rows {
        snapshots.push(finish_snapshot(row?)?);
    }
    Ok(snapshots)
}

// -- Observations --

pub(crate) fn insert_observation(
    conn: &Connection,
    snapshot_id: i64,
    draft: &ObservationDraft,
) -> Result<()> {
    let annotations = if draft.annotations.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&draft.annotations)?)
    };

    conn.execute(
        "INSERT INTO observations (snapshot_id, location_id, path, kind, size, mtime, mode,
             content_hash, has_content, annotations)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            snapshot_id,
            draft.location_id,
            draft.path.display().to_string(),
            draft.kind.as_str(),
            draft.size as i64,
            draft.mtime.as_ref().map(to_millis),
            draft.mode,
            draft.content_hash.map(|h| h.to_hex()),
            draft.has_content(),
            annotations,
        ],
    )?;
    Ok(())
}

pub(crate) fn observations(conn: &Connection, snapshot_id: i64) -> Result<Vec<ObservationRow>> {
    let mut stmt = conn.prepare(
        "SELECT location_id, path, kind, size, mtime, mode, content_hash, has_content,
                annotations
         FROM observations WHERE snapshot_id = ?1
         ORDER BY location_id, path",
    )?;

    type Raw = (
        String,
        String,
        String,
        i64,
        Option<i64>,
        Option<u32>,
        Option<String>,
        bool,
        Option<String>,
    );
    let rows = stmt.query_map([snapshot_id], |row| {
        Ok::<Raw, rusqlite::Error>((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    })?;

    let mut observations = Vec::new();
    for row in rows {
        let (location_id, path, kind, size, mtime, mode, content_hash, has_content, annotations) =
            row?;
        observations.push(ObservationRow {
            location_id,
            path,
            kind: PathKind::parse(&kind)?,
            size: size as u64,
            mtime: mtime.map(from_millis),
            mode,
            content_hash: content_hash.as_deref().map(ContentHash::from_hex).transpose()?,
            has_content,
            annotations: annotations
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?
                .unwrap_or_default(),
        });
    }
    Ok(observations)
}

/// The comparable facts of a snapshot's observations, keyed by path. Absent
/// observations are excluded: for change detection "absent" means the path
/// was not present.
pub(crate) fn observation_keys(
    conn: &Connection,
    snapshot_id: i64,
) -> Result<BTreeMap<String, ObservationKey>> {
    let mut keys = BTreeMap::new();
    for row in observations(conn, snapshot_id)? {
        if row.kind == PathKind::Absent {
            continue;
        }
        keys.insert(
            row.path,
            ObservationKey {
                kind: row.kind,
                size: row.size,
                content_hash: row.content_hash,
            },
        );
    }
    Ok(keys)
}

/// Content hashes a snapshot's observations hold references to.
pub(crate) fn observation_blob_refs(
    conn: &Connection,
    snapshot_id: i64,
) -> Result<Vec<ContentHash>> {
    let mut stmt = conn.prepare(
        "SELECT content_hash FROM observations
         WHERE snapshot_id = ?1 AND has_content = 1 AND content_hash IS NOT NULL",
    )?;
    let rows = stmt.query_map([snapshot_id], |row| row.get::<_, String>(0))?;

    let mut hashes = Vec::new();
    for row in rows {
        hashes.push(ContentHash::from_hex(&row?)?);
    }
    Ok(hashes)
}

// -- Changes --

pub(crate) fn insert_change(conn: &Connection, snapshot_id: i64, change: &PathChange) -> Result<()> {
    conn.execute(
        "INSERT INTO changes (snapshot_id, path, kind, size_delta, old_hash, new_hash, transition)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            snapshot_id,
            change.path,
            change.kind.as_str(),
            change.size_delta,
            change.old_hash.map(|h| h.to_hex()),
            change.new_hash.map(|h| h.to_hex()),
            change.transition,
        ],
    )?;
    Ok(())
}

pub(crate) fn changes(conn: &Connection, snapshot_id: i64) -> Result<Vec<PathChange>> {
    let mut stmt = conn.prepare(
        "SELECT path, kind, size_delta, old_hash, new_hash, transition
         FROM changes WHERE snapshot_id = ?1 ORDER BY path",
    )?;

    type Raw = (String, String, i64, Option<String>, Option<String>, Option<String>);
    let rows = stmt.query_map([snapshot_id], |row| {
        Ok::<Raw, rusqlite::Error>((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    })?;

    let mut changes = Vec::new();
    for row in rows {
        let (path, kind, size_delta, old_hash, new_hash, transition) = row?;
        changes.push(PathChange {
            path,
            kind: ChangeKind::parse(&kind)?,
            size_delta,
            old_hash: old_hash.as_deref().map(ContentHash::from_hex).transpose()?,
            new_hash: new_hash.as_deref().map(ContentHash::from_hex).transpose()?,
            transition,
        });
    }
    Ok(changes)
}

// -- Tags --

pub(crate) fn add_tag(
    conn: &Connection,
    snapshot_id: i64,
    name: &str,
    created_by: Option<&str>,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tags (snapshot_id, name, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![snapshot_id, name, created_by, Utc::now().timestamp_millis()],
    )?;
    Ok(inserted > 0)
}

pub(crate) fn remove_tag(conn: &Connection, snapshot_id: i64, name: &str) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM tags WHERE snapshot_id = ?1 AND name = ?2",
        params![snapshot_id, name],
    )?;
    Ok(removed > 0)
}

pub(crate) fn tags(conn: &Connection, snapshot_id: i64) -> Result<Vec<TagRow>> {
    let mut stmt = conn.prepare(
        "SELECT name, created_by, created_at FROM tags WHERE snapshot_id = ?1 ORDER BY name",
    )?;
    let rows = stmt.query_map([snapshot_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?, row.get::<_, i64>(2)?))
    })?;

    let mut tags = Vec::new();
    for row in rows {
        let (name, created_by, created_at) = row?;
        tags.push(TagRow {
            name,
            created_by,
            created_at: from_millis(created_at),
        });
    }
    Ok(tags)
}

// -- Annotations --

pub(crate) fn add_annotation(
    conn: &Connection,
    snapshot_id: i64,
    text: &str,
    created_by: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO annotations (snapshot_id, text, created_by, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![snapshot_id, text, created_by, Utc::now().timestamp_millis()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn remove_annotation(conn: &Connection, annotation_id: i64) -> Result<bool> {
    let removed = conn.execute("DELETE FROM annotations WHERE id = ?1", [annotation_id])?;
    Ok(removed > 0)
}

pub(crate) fn annotations(conn: &Connection, snapshot_id: i64) -> Result<Vec<AnnotationRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, created_by, created_at FROM annotations
         WHERE snapshot_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([snapshot_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;

    let mut annotations = Vec::new();
    for row in rows {
        let (id, text, created_by, created_at) = row?;
        annotations.push(AnnotationRow {
            id,
            text,
            created_by,
            created_at: from_millis(created_at),
        });
    }
    Ok(annotations)
}
