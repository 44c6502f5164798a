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

//! Filesystem scanner.
//!
//! Converts resolved locations into observation drafts for one snapshot.
//! The walk is deterministic: locations in id order, directory entries in
//! sorted-name order, depth first. Per-path errors never abort the scan;
//! they become annotations on the affected observation plus an error count
//! on the report.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use glob::Pattern;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::global::{CancelToken, PathKind, defaults};
use crate::hashing::{ContentHash, StreamHasher};
use crate::locations::{Category, ResolvedLocation};

/// Annotation keys attached to observations.
pub const ANNOTATION_ERROR: &str = "error";
pub const ANNOTATION_CONTENT: &str = "content";

/// Annotation value for files above the capture cap.
pub const CONTENT_NOT_CAPTURED_EXCEEDS_CAP: &str = "not_captured:exceeds_cap";
/// Annotation value for files whose bytes could not be read.
pub const CONTENT_NOT_CAPTURED_READ_ERROR: &str = "not_captured:read_error";

/// Draft record of what was found at one path. Becomes a `PathObservation`
/// row once the snapshot writer persists it.
#[derive(Debug, Clone)]
pub struct ObservationDraft {
    pub location_id: String,
    pub category: Category,
    pub path: PathBuf,
    pub kind: PathKind,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
    pub mode: Option<u32>,

    /// Captured bytes. `None` for directories, absent paths, files above the
    /// capture cap and files that errored mid-read.
    pub content: Option<Vec<u8>>,

    /// Content hash. Present for every readable file, captured or not.
    pub content_hash: Option<ContentHash>,

    pub annotations: BTreeMap<String, String>,
}

impl ObservationDraft {
    fn new(location: &ResolvedLocation, path: &Path, kind: PathKind) -> Self {
        Self {
            location_id: location.id.clone(),
            category: location.category,
            path: path.to_path_buf(),
            kind,
            size: 0,
            mtime: None,
            mode: None,
            content: None,
            content_hash: None,
            annotations: BTreeMap::new(),
        }
    }

    /// True when the file's bytes were captured for storage.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    fn annotate_error(&mut self, message: String) {
        self.annotations.insert(ANNOTATION_ERROR.to_string(), message);
    }
}

/// Outcome of scanning all locations for one snapshot.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Observations ordered by (location id, path), deduplicated by path.
    pub observations: Vec<ObservationDraft>,

    /// Number of per-path errors absorbed into annotations.
    pub error_count: u64,

    /// Snapshot-scoped notes (e.g. paths dropped as duplicates).
    pub notes: Vec<String>,

    pub num_files: u64,
    pub num_dirs: u64,
    pub total_bytes: u64,
}

pub struct Scanner {
    content_cap: u64,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            content_cap: defaults::MAX_CONTENT_CAPTURE_BYTES,
        }
    }

    pub fn with_content_cap(content_cap: u64) -> Self {
        Self { content_cap }
    }

    pub fn content_cap(&self) -> u64 {
        self.content_cap
    }

    /// Scans all locations. Locations are walked independently (in parallel)
    /// and stitched back together in location-id order, so the output is the
    /// same ordered sequence a serial walk would produce.
    pub fn scan(
        &self,
        locations: &[ResolvedLocation],
        cancel: &CancelToken,
    ) -> Result<ScanReport> {
        let mut sorted: Vec<&ResolvedLocation> = locations.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let per_location: Vec<Result<Vec<ObservationDraft>>> = sorted
            .par_iter()
            .map(|location| self.scan_location(location, cancel))
            .collect();

        let mut report = ScanReport::default();
        let mut seen_paths = BTreeMap::new();

        for drafts in per_location {
            for draft in drafts? {
                // Two locations may resolve to the same path; the first one
                // (in id order) wins, since (snapshot, path) is the identity
                // of an observation.
                if let Some(winner) = seen_paths.get(&draft.path) {
                    report.notes.push(format!(
                        "path {} of location '{}' already observed via location '{}'",
                        draft.path.display(),
                        draft.location_id,
                        winner
                    ));
                    continue;
                }
                seen_paths.insert(draft.path.clone(), draft.location_id.clone());

                if draft.annotations.contains_key(ANNOTATION_ERROR) {
                    report.error_count += 1;
                }
                match draft.kind {
                    PathKind::File => {
                        report.num_files += 1;
                        report.total_bytes += draft.size;
                    }
                    PathKind::Directory => report.num_dirs += 1,
                    PathKind::Absent => {}
                }

                report.observations.push(draft);
            }
        }

        Ok(report)
    }

    fn scan_location(
        &self,
        location: &ResolvedLocation,
        cancel: &CancelToken,
    ) -> Result<Vec<ObservationDraft>> {
        let mut drafts = Vec::new();

        match std::fs::metadata(&location.path) {
            Err(_) => {
                drafts.push(ObservationDraft::new(
                    location,
                    &location.path,
                    PathKind::Absent,
                ));
            }
            Ok(meta) if meta.is_dir() => {
                self.scan_dir(location, &location.path, true, cancel, &mut drafts)?;
            }
            Ok(_) => {
                drafts.push(self.observe_file(location, &location.path));
            }
        }

        Ok(drafts)
    }

    fn scan_dir(
        &self,
        location: &ResolvedLocation,
        dir: &Path,
        is_root: bool,
        cancel: &CancelToken,
        drafts: &mut Vec<ObservationDraft>,
    ) -> Result<()> {
        cancel.check()?;

        // The directory itself is always recorded, even when a glob filters
        // its children.
        let mut dir_draft = ObservationDraft::new(location, dir, PathKind::Directory);
        fill_metadata(&mut dir_draft, dir);
        drafts.push(dir_draft);

        let log_pattern = if location.options.enumerate_logs && is_root {
            match location.options.log_pattern.as_deref() {
                Some(pattern_str) => match Pattern::new(pattern_str) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        // A broken glob is a config problem local to this
                        // location; record it and capture nothing below.
                        if let Some(last) = drafts.last_mut() {
                            last.annotate_error(format!("invalid log pattern: {e}"));
                        }
                        return Ok(());
                    }
                },
                None => None,
            }
        } else {
            None
        };

        let mut entries = match std::fs::read_dir(dir) {
            Ok(read_dir) => {
                let mut entries: Vec<PathBuf> =
                    read_dir.filter_map(|e| e.ok().map(|e| e.path())).collect();
                entries.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
                entries
            }
            Err(e) => {
                if let Some(last) = drafts.last_mut() {
                    last.annotate_error(format!("could not list directory: {e}"));
                }
                return Ok(());
            }
        };

        // A log directory is enumerated flat: only matching direct children
        // are captured, non-matching siblings are omitted entirely.
        if let Some(pattern) = &log_pattern {
            entries.retain(|path| {
                path.is_file()
                    && path
                        .file_name()
                        .map(|name| pattern.matches(&name.to_string_lossy()))
                        .unwrap_or(false)
            });
            for path in entries {
                cancel.check()?;
                drafts.push(self.observe_file(location, &path));
            }
            return Ok(());
        }

        for path in entries {
            cancel.check()?;

            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    self.scan_dir(location, &path, false, cancel, drafts)?;
                }
                Ok(_) => drafts.push(self.observe_file(location, &path)),
                Err(e) => {
                    let mut draft = ObservationDraft::new(location, &path, PathKind::Absent);
                    draft.annotate_error(format!("could not stat: {e}"));
                    drafts.push(draft);
                }
            }
        }

        Ok(())
    }

    /// Observes a single file, streaming its bytes through the hasher. Files
    /// above the capture cap are hashed without retaining the bytes.
    fn observe_file(&self, location: &ResolvedLocation, path: &Path) -> ObservationDraft {
        let mut draft = ObservationDraft::new(location, path, PathKind::File);
        fill_metadata(&mut draft, path);

        let capture = draft.size <= self.content_cap;
        if !capture {
            draft.annotations.insert(
                ANNOTATION_CONTENT.to_string(),
                CONTENT_NOT_CAPTURED_EXCEEDS_CAP.to_string(),
            );
        }

        match read_and_hash(path, capture) {
            Ok((hash, num_bytes, content)) => {
                draft.content_hash = Some(hash);
                draft.size = num_bytes;
                draft.content = content;
            }
            Err(e) => {
                draft.annotate_error(format!("could not read file: {e}"));
                draft.annotations.insert(
                    ANNOTATION_CONTENT.to_string(),
                    CONTENT_NOT_CAPTURED_READ_ERROR.to_string(),
                );
                draft.content = None;
                draft.content_hash = None;
            }
        }

        draft
    }
}

fn fill_metadata(draft: &mut ObservationDraft, path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        draft.size = meta.len();
        draft.mtime = meta.modified().ok().map(DateTime::<Utc>::from);
        draft.mode = file_mode(&meta);
    }
}

#[cfg(unix)]
fn file_mode(meta: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode())
}

#[cfg(not(unix))]
fn file_mode(meta: &std::fs::Metadata) -> Option<u32> {
    Some(if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    })
}

/// Streams a file through SHA-256. Returns (hash, bytes read, captured
/// content). `capture` controls whether the bytes are retained.
fn read_and_hash(path: &Path, capture: bool) -> Result<(ContentHash, u64, Option<Vec<u8>>)> {
    let mut file = File::open(path)?;
    let mut hasher = StreamHasher::new();
    let mut content = if capture { Some(Vec::new()) } else { None };
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        if let Some(bytes) = &mut content {
            bytes.extend_from_slice(&buffer[..n]);
        }
    }

    let (hash, num_bytes) = hasher.finalize();
    Ok((hash, num_bytes, content))
}
