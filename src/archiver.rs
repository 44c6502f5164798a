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

//! The snapshot writer: scan, parse, persist — atomically.
//!
//! The whole capture is one database transaction under the exclusive writer
//! lock: snapshot row, blobs, observations, fingerprint, parent linkage,
//! change set, entity records, tags and annotations all become visible
//! together or not at all. Blob files written outside the database during
//! the attempt are removed again when the transaction rolls back.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;

use crate::changes::{ObservationKey, detect_changes};
use crate::entities::parser::{ParsedEntities, parse_entities};
use crate::global::{CancelToken, PathKind, Trigger};
use crate::hashing::{ContentHash, StreamHasher};
use crate::locations::ResolvedLocation;
use crate::repository::entities::insert_entities;
use crate::repository::repo::Repo;
use crate::repository::snapshot::{self, HostInfo, NewSnapshot, SnapshotRecord};
use crate::scanner::{ObservationDraft, ScanReport, Scanner};

/// Caller-supplied metadata for one capture.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOptions {
    pub trigger: Trigger,
    pub originator: Option<String>,
    pub notes: Option<String>,
    pub tags: BTreeSet<String>,
}

pub struct Archiver {
    repo: Arc<Repo>,
    locations: Vec<ResolvedLocation>,
    working_dir: PathBuf,
    options: SnapshotOptions,
    scanner: Scanner,
}

impl Archiver {
    pub fn new(
        repo: Arc<Repo>,
        locations: Vec<ResolvedLocation>,
        working_dir: PathBuf,
        options: SnapshotOptions,
    ) -> Self {
        Self {
            repo,
            locations,
            working_dir,
            options,
            scanner: Scanner::new(),
        }
    }

    /// Overrides the content capture cap (mainly for tests).
    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Runs the full pipeline and returns the committed snapshot.
    pub fn snapshot(&self, cancel: &CancelToken) -> Result<SnapshotRecord> {
        // Filesystem work happens before the writer lock: scanning can take
        // a while and holds no database state.
        let report = self
            .scanner
            .scan(&self.locations, cancel)
            .with_context(|| "Scan failed")?;
        let parsed = parse_entities(&report.observations);
        cancel.check()?;

        let host = HostInfo::capture();

        let _writer = self.repo.writer_lock();
        let mut conn = self.repo.conn();

        let mut created_files: Vec<PathBuf> = Vec::new();
        match self.write_snapshot(&mut conn, &report, &parsed, &host, cancel, &mut created_files) {
            Ok(id) => snapshot::load_snapshot(&conn, id),
            Err(e) => {
                // The transaction already rolled back on drop; blob files
                // written out-of-band during the attempt go with it.
                for path in created_files {
                    let _ = std::fs::remove_file(path);
                }
                Err(e)
            }
        }
    }

    fn write_snapshot(
        &self,
        conn: &mut Connection,
        report: &ScanReport,
        parsed: &ParsedEntities,
        host: &HostInfo,
        cancel: &CancelToken,
        created_files: &mut Vec<PathBuf>,
    ) -> Result<i64> {
        let tx = conn.transaction()?;
        let content = self.repo.content();

        let parent_id = snapshot::latest_snapshot_id(&tx)?;
        let baseline = parent_id.is_none();

        let snapshot_id = snapshot::insert_snapshot(
            &tx,
            &NewSnapshot {
                created_at: Utc::now(),
                parent_id,
                trigger: self.options.trigger,
                originator: self.options.originator.as_deref(),
                notes: self.options.notes.as_deref(),
                host,
                working_dir: &self.working_dir.display().to_string(),
                num_files: report.num_files,
                num_dirs: report.num_dirs,
                total_bytes: report.total_bytes,
                num_locations: self.locations.len() as u64,
                num_errors: report.error_count,
                content_cap_bytes: self.scanner.content_cap(),
                fingerprint: ContentHash::zero(),
                baseline,
            },
        )?;

        for draft in &report.observations {
            cancel.check()?;

            if let Some(bytes) = &draft.content {
                let put = content.put(&tx, bytes)?;
                if let Some(path) = put.external_file {
                    created_files.push(path);
                }
            }
            snapshot::insert_observation(&tx, snapshot_id, draft)?;
        }

        snapshot::set_fingerprint(&tx, snapshot_id, &compute_fingerprint(&report.observations))?;

        let changed = match parent_id {
            None => false,
            Some(parent_id) => {
                let parent_keys = snapshot::observation_keys(&tx, parent_id)?;
                let child_keys = draft_keys(&report.observations);
                let changes = detect_changes(&parent_keys, &child_keys);
                for change in &changes {
                    snapshot::insert_change(&tx, snapshot_id, change)?;
                }
                !changes.is_empty()
            }
        };
        snapshot::set_changed(&tx, snapshot_id, changed)?;

        insert_entities(&tx, snapshot_id, &parsed.set, content)?;

        for note in &report.notes {
            snapshot::add_annotation(&tx, snapshot_id, note, Some("scanner"))?;
        }
        for note in &parsed.annotations {
            snapshot::add_annotation(&tx, snapshot_id, note, Some("parser"))?;
        }
        for tag in &self.options.tags {
            snapshot::add_tag(&tx, snapshot_id, tag, self.options.originator.as_deref())?;
        }

        cancel.check()?;
        tx.commit()?;
        Ok(snapshot_id)
    }
}

/// The comparable key set of the drafts, as the change detector sees them.
/// Absent observations are markers, not presence.
fn draft_keys(drafts: &[ObservationDraft]) -> BTreeMap<String, ObservationKey> {
    drafts
        .iter()
        .filter(|draft| draft.kind != PathKind::Absent)
        .map(|draft| {
            (
                draft.path.display().to_string(),
                ObservationKey {
                    kind: draft.kind,
                    size: draft.size,
                    content_hash: draft.content_hash,
                },
            )
        })
        .collect()
}

/// Snapshot fingerprint: SHA-256 over the canonical serialization of
/// `(location, path, kind, size, content hash)` tuples, sorted by location
/// id then path. Equal captured state yields equal fingerprints.
fn compute_fingerprint(drafts: &[ObservationDraft]) -> ContentHash {
    let mut tuples: Vec<(String, String, &'static str, u64, Option<ContentHash>)> = drafts
        .iter()
        .map(|draft| {
            (
                draft.location_id.clone(),
                draft.path.display().to_string(),
                draft.kind.as_str(),
                draft.size,
                draft.content_hash,
            )
        })
        .collect();
    tuples.sort();

    let mut hasher = StreamHasher::new();
    for (location, path, kind, size, hash) in tuples {
        let hash_text = hash.map(|h| h.to_hex()).unwrap_or_else(|| "-".to_string());
        hasher.update(format!("{location}\0{path}\0{kind}\0{size}\0{hash_text}\n").as_bytes());
    }
    hasher.finalize().0
}
