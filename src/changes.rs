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

//! Path-level change detection between two snapshots.
//!
//! Works on sorted observation maps keyed by resolved path, so the result is
//! deterministic and ordered by path. A path whose kind flips (file to
//! directory or back) is one `modified` change with a transition note, never
//! a removed + added pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::global::{ChangeKind, PathKind};
use crate::hashing::ContentHash;

/// The comparable facts of one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationKey {
    pub kind: PathKind,
    pub size: u64,
    pub content_hash: Option<ContentHash>,
}

/// One difference between two snapshots at a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathChange {
    pub path: String,
    pub kind: ChangeKind,
    pub size_delta: i64,
    pub old_hash: Option<ContentHash>,
    pub new_hash: Option<ContentHash>,

    /// Present when the path kind changed, e.g. `file->directory`.
    pub transition: Option<String>,
}

/// Merge-walks two sorted observation sets and emits the minimal change set,
/// ordered by path. `parent` may be the empty map (baseline case).
pub fn detect_changes(
    parent: &BTreeMap<String, ObservationKey>,
    child: &BTreeMap<String, ObservationKey>,
) -> Vec<PathChange> {
    let mut changes = Vec::new();
    let mut old_iter = parent.iter().peekable();
    let mut new_iter = child.iter().peekable();

    loop {
        match (old_iter.peek(), new_iter.peek()) {
            (None, None) => break,
            (Some((path, old)), None) => {
                changes.push(removed(path, old));
                old_iter.next();
            }
            (None, Some((path, new))) => {
                changes.push(added(path, new));
                new_iter.next();
            }
            (Some((old_path, old)), Some((new_path, new))) => match old_path.cmp(new_path) {
                std::cmp::Ordering::Less => {
                    changes.push(removed(old_path, old));
                    old_iter.next();
                }
                std::cmp::Ordering::Greater => {
                    changes.push(added(new_path, new));
                    new_iter.next();
                }
                std::cmp::Ordering::Equal => {
                    if let Some(change) = modified(old_path, old, new) {
                        changes.push(change);
                    }
                    old_iter.next();
                    new_iter.next();
                }
            },
        }
    }

    changes
}

fn added(path: &str, new: &ObservationKey) -> PathChange {
    PathChange {
        path: path.to_string(),
        kind: ChangeKind::Added,
        size_delta: new.size as i64,
        old_hash: None,
        new_hash: new.content_hash,
        transition: None,
    }
}

fn removed(path: &str, old: &ObservationKey) -> PathChange {
    PathChange {
        path: path.to_string(),
        kind: ChangeKind::Removed,
        size_delta: -(old.size as i64),
        old_hash: old.content_hash,
        new_hash: None,
        transition: None,
    }
}

fn modified(path: &str, old: &ObservationKey, new: &ObservationKey) -> Option<PathChange> {
    let kind_changed = old.kind != new.kind;
    let content_changed = old.content_hash != new.content_hash;
    let size_changed = old.size != new.size;

    if !kind_changed && !content_changed && !size_changed {
        return None;
    }

    Some(PathChange {
        path: path.to_string(),
        kind: ChangeKind::Modified,
        size_delta: new.size as i64 - old.size as i64,
        old_hash: old.content_hash,
        new_hash: new.content_hash,
        transition: kind_changed.then(|| format!("{}->{}", old.kind, new.kind)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content: &[u8]) -> ObservationKey {
        ObservationKey {
            kind: PathKind::File,
            size: content.len() as u64,
            content_hash: Some(ContentHash::from_content(content)),
        }
    }

    fn dir() -> ObservationKey {
        ObservationKey {
            kind: PathKind::Directory,
            size: 0,
            content_hash: None,
        }
    }

    fn map(entries: Vec<(&str, ObservationKey)>) -> BTreeMap<String, ObservationKey> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_empty_parent_reports_everything_added() {
        // Baseline semantics live in the writer: it skips change detection
        // entirely when there is no parent. Diffing against the empty map
        // reports everything as added.
        let child = map(vec![("/a", file(b"hi"))]);
        let changes = detect_changes(&BTreeMap::new(), &child);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }

    #[test]
    fn test_identical_sets_produce_no_changes() {
        let a = map(vec![("/a", file(b"hi")), ("/d", dir())]);
        let b = map(vec![("/a", file(b"hi")), ("/d", dir())]);
        assert!(detect_changes(&a, &b).is_empty());
    }

    #[test]
    fn test_added_and_removed() {
        let a = map(vec![("/gone", file(b"old"))]);
        let b = map(vec![("/new", file(b"new!"))]);

        let changes = detect_changes(&a, &b);
        assert_eq!(changes.len(), 2);

        assert_eq!(changes[0].path, "/gone");
        assert_eq!(changes[0].kind, ChangeKind::Removed);
        assert_eq!(changes[0].size_delta, -3);
        assert_eq!(changes[0].old_hash, Some(ContentHash::from_content(b"old")));
        assert_eq!(changes[0].new_hash, None);

        assert_eq!(changes[1].path, "/new");
        assert_eq!(changes[1].kind, ChangeKind::Added);
        assert_eq!(changes[1].size_delta, 4);
        assert_eq!(changes[1].new_hash, Some(ContentHash::from_content(b"new!")));
    }

    #[test]
    fn test_modified_content() {
        let a = map(vec![("/a.txt", file(b"hi"))]);
        let b = map(vec![("/a.txt", file(b"bye"))]);

        let changes = detect_changes(&a, &b);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].size_delta, 1);
        assert_eq!(changes[0].old_hash, Some(ContentHash::from_content(b"hi")));
        assert_eq!(changes[0].new_hash, Some(ContentHash::from_content(b"bye")));
        assert!(changes[0].transition.is_none());
    }

    #[test]
    fn test_kind_change_is_single_modified_with_transition() {
        let a = map(vec![("/p", file(b"data"))]);
        let b = map(vec![("/p", dir())]);

        let changes = detect_changes(&a, &b);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].transition.as_deref(), Some("file->directory"));
    }

    #[test]
    fn test_output_is_sorted_by_path() {
        let a = map(vec![("/c", file(b"1")), ("/a", file(b"2"))]);
        let b = map(vec![("/b", file(b"3")), ("/d", file(b"4"))]);

        let changes = detect_changes(&a, &b);
        let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/b", "/c", "/d"]);
    }

    #[test]
    fn test_absent_to_present_is_added() {
        // An `absent` observation means the location had nothing there; the
        // writer does not include absent paths in the comparable set, so a
        // path appearing later is a plain `added`.
        let b = map(vec![("/x", file(b"now"))]);
        let changes = detect_changes(&BTreeMap::new(), &b);
        assert_eq!(changes[0].kind, ChangeKind::Added);
    }
}
