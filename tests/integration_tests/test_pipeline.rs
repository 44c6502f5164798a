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

mod tests {
    use std::path::PathBuf;

    use tempfile::tempdir;
    use urraca::archiver::{Archiver, SnapshotOptions};
    use urraca::global::{CancelToken, ChangeKind, PathKind};
    use urraca::hashing::ContentHash;
    use urraca::locations::Category;
    use urraca::repository::gc;
    use urraca::repository::repo::Include;

    use crate::test_utils::{self, location, take_snapshot};

    /// Scenario: the first snapshot of a fresh repository is the baseline.
    #[test]
    fn test_first_snapshot_is_baseline() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let file = tmp.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();
        let locations = vec![location("tree", Category::Settings, &file)];

        let snapshot = take_snapshot(&repo, &locations);

        assert!(snapshot.baseline);
        assert!(!snapshot.changed);
        assert!(snapshot.parent_id.is_none());
        assert_eq!(snapshot.num_files, 1);
        assert_eq!(snapshot.num_errors, 0);
        assert_ne!(snapshot.fingerprint, ContentHash::zero());

        let observations = repo.observations(snapshot.id).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, PathKind::File);
        assert!(observations[0].has_content);

        let hash = ContentHash::from_content(b"hi");
        assert_eq!(observations[0].content_hash, Some(hash));
        assert_eq!(repo.blob_refcount(&hash).unwrap(), Some(1));
        assert_eq!(repo.blob(&hash).unwrap(), b"hi");

        assert!(repo.changes(snapshot.id).unwrap().is_empty());
    }

    /// Scenario: re-scanning an unchanged tree dedups content and reports
    /// no changes.
    #[test]
    fn test_unchanged_second_scan() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let file = tmp.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();
        let locations = vec![location("tree", Category::Settings, &file)];

        let first = take_snapshot(&repo, &locations);
        let second = take_snapshot(&repo, &locations);

        assert!(!second.baseline);
        assert!(!second.changed);
        assert_eq!(second.parent_id, Some(first.id));
        assert!(repo.changes(second.id).unwrap().is_empty());

        // Same captured state, same fingerprint.
        assert_eq!(first.fingerprint, second.fingerprint);

        let hash = ContentHash::from_content(b"hi");
        assert_eq!(repo.blob_refcount(&hash).unwrap(), Some(2));
    }

    /// Scenario: a modification produces exactly one modified change with
    /// both hashes, and the old blob stays referenced by older snapshots.
    #[test]
    fn test_modification() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let file = tmp.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();
        let locations = vec![location("tree", Category::Settings, &file)];

        take_snapshot(&repo, &locations);
        take_snapshot(&repo, &locations);

        std::fs::write(&file, b"bye").unwrap();
        let third = take_snapshot(&repo, &locations);

        assert!(third.changed);
        let changes = repo.changes(third.id).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].old_hash, Some(ContentHash::from_content(b"hi")));
        assert_eq!(changes[0].new_hash, Some(ContentHash::from_content(b"bye")));
        assert_eq!(changes[0].size_delta, 1);

        assert_eq!(
            repo.blob_refcount(&ContentHash::from_content(b"hi")).unwrap(),
            Some(2)
        );
        assert_eq!(
            repo.blob_refcount(&ContentHash::from_content(b"bye")).unwrap(),
            Some(1)
        );
    }

    /// Scenario: an MCP server replaced between snapshots shows up as one
    /// removed and one added delta, never as modified.
    #[test]
    fn test_mcp_server_added_and_removed() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let config = tmp.path().join("claude.json");
        std::fs::write(&config, br#"{"mcpServers": {"fs": {"command": "npx"}}}"#).unwrap();
        let locations = vec![location("user_claude_json", Category::McpConfig, &config)];

        let first = take_snapshot(&repo, &locations);
        std::fs::write(
            &config,
            br#"{"mcpServers": {"search": {"command": "python", "args": ["-m", "s"]}}}"#,
        )
        .unwrap();
        let second = take_snapshot(&repo, &locations);

        let comparison = repo.compare_snapshots(first.id, second.id).unwrap();
        let deltas = &comparison.entity_deltas.mcp_servers;
        assert_eq!(deltas.len(), 2);
        assert_eq!(comparison.entity_deltas.summary.mcp_servers.modified, 0);

        let removed = deltas.iter().find(|d| d.kind == ChangeKind::Removed).unwrap();
        assert_eq!(removed.name, "fs");
        assert_eq!(removed.before.as_ref().unwrap().command, "npx");
        assert!(removed.after.is_none());

        let added = deltas.iter().find(|d| d.kind == ChangeKind::Added).unwrap();
        assert_eq!(added.name, "search");
        let payload = added.after.as_ref().unwrap();
        assert_eq!(payload.command, "python");
        assert_eq!(payload.args, vec!["-m", "s"]);
    }

    /// Scenario: an edited subagent reports both a semantic delta and a
    /// path-level modification for the same file.
    #[test]
    fn test_subagent_content_changed() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let agents = tmp.path().join("agents");
        std::fs::create_dir_all(&agents).unwrap();
        let agent_file = agents.join("agent1.md");
        std::fs::write(&agent_file, b"original instructions").unwrap();
        let locations = vec![location("user_agents", Category::Agents, &agents)];

        let first = take_snapshot(&repo, &locations);
        std::fs::write(&agent_file, b"edited instructions").unwrap();
        let second = take_snapshot(&repo, &locations);

        let comparison = repo.compare_snapshots(first.id, second.id).unwrap();

        let deltas = &comparison.entity_deltas.subagents;
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, ChangeKind::Modified);
        assert_eq!(deltas[0].name, "agent1");
        assert_eq!(
            deltas[0].before.as_ref().unwrap().content_hash,
            ContentHash::from_content(b"original instructions")
        );
        assert_eq!(
            deltas[0].after.as_ref().unwrap().content_hash,
            ContentHash::from_content(b"edited instructions")
        );

        let path_change = comparison
            .path_changes
            .iter()
            .find(|change| change.path == agent_file.display().to_string())
            .unwrap();
        assert_eq!(path_change.kind, ChangeKind::Modified);
    }

    /// Scenario: deleting a snapshot restores the content store to the
    /// state it would have had without it.
    #[test]
    fn test_delete_snapshot_reclaims_blobs() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let file = tmp.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();
        let locations = vec![location("tree", Category::Settings, &file)];

        take_snapshot(&repo, &locations);
        take_snapshot(&repo, &locations);
        std::fs::write(&file, b"bye").unwrap();
        let third = take_snapshot(&repo, &locations);

        repo.delete_snapshot(third.id).unwrap();

        let hi = ContentHash::from_content(b"hi");
        let bye = ContentHash::from_content(b"bye");
        assert_eq!(repo.blob_refcount(&hi).unwrap(), Some(2));
        assert_eq!(repo.blob_refcount(&bye).unwrap(), Some(0));

        // The zero-reference blob is garbage and gc reclaims it.
        let plan = gc::scan(&repo).unwrap();
        assert_eq!(plan.len(), 1);
        plan.execute(&repo).unwrap();
        assert_eq!(repo.blob_refcount(&bye).unwrap(), None);
        assert_eq!(repo.blob_refcount(&hi).unwrap(), Some(2));

        assert!(repo.verify_content().unwrap().is_clean());
        assert!(repo.get_snapshot(third.id).is_err());
    }

    /// A snapshot's entity records are denormalized: deleting a neighbor
    /// snapshot does not affect them.
    #[test]
    fn test_entities_are_denormalized_per_snapshot() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let agents = tmp.path().join("agents");
        std::fs::create_dir_all(&agents).unwrap();
        std::fs::write(agents.join("helper.md"), b"helper body").unwrap();
        let locations = vec![location("user_agents", Category::Agents, &agents)];

        let first = take_snapshot(&repo, &locations);
        let second = take_snapshot(&repo, &locations);

        repo.delete_snapshot(first.id).unwrap();

        let entities = repo.entities(second.id).unwrap();
        assert_eq!(entities.subagents.len(), 1);
        assert_eq!(
            repo.blob(&entities.subagents[0].content_hash).unwrap(),
            b"helper body"
        );
    }

    #[test]
    fn test_compare_snapshot_with_itself_is_empty() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let config = tmp.path().join("claude.json");
        std::fs::write(&config, br#"{"mcpServers": {"fs": {"command": "npx"}}}"#).unwrap();
        let locations = vec![location("user_claude_json", Category::McpConfig, &config)];

        let snapshot = take_snapshot(&repo, &locations);
        let comparison = repo.compare_snapshots(snapshot.id, snapshot.id).unwrap();

        assert!(comparison.path_changes.is_empty());
        assert!(comparison.entity_deltas.is_empty());
    }

    #[test]
    fn test_compare_is_inverse() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let dir = tmp.path().join("tree");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("kept.txt"), b"same").unwrap();
        std::fs::write(dir.join("old.txt"), b"old").unwrap();
        let locations = vec![location("tree", Category::Settings, &dir)];

        let first = take_snapshot(&repo, &locations);
        std::fs::remove_file(dir.join("old.txt")).unwrap();
        std::fs::write(dir.join("new.txt"), b"new").unwrap();
        let second = take_snapshot(&repo, &locations);

        let forward = repo.compare_snapshots(first.id, second.id).unwrap();
        let backward = repo.compare_snapshots(second.id, first.id).unwrap();

        let count = |changes: &[urraca::changes::PathChange], kind: ChangeKind| {
            changes.iter().filter(|c| c.kind == kind).count()
        };
        assert_eq!(
            count(&forward.path_changes, ChangeKind::Added),
            count(&backward.path_changes, ChangeKind::Removed)
        );
        assert_eq!(
            count(&forward.path_changes, ChangeKind::Removed),
            count(&backward.path_changes, ChangeKind::Added)
        );
    }

    /// A path that flips from file to directory is one modified change with
    /// a kind transition, not a removed + added pair.
    #[test]
    fn test_kind_change_is_single_modified() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let root = tmp.path().join("tree");
        std::fs::create_dir_all(&root).unwrap();
        let flipping = root.join("entry");
        std::fs::write(&flipping, b"file for now").unwrap();
        let locations = vec![location("tree", Category::Settings, &root)];

        let first = take_snapshot(&repo, &locations);
        std::fs::remove_file(&flipping).unwrap();
        std::fs::create_dir(&flipping).unwrap();
        let second = take_snapshot(&repo, &locations);

        let comparison = repo.compare_snapshots(first.id, second.id).unwrap();
        let change = comparison
            .path_changes
            .iter()
            .find(|change| change.path == flipping.display().to_string())
            .unwrap();
        assert_eq!(change.kind, ChangeKind::Modified);
        assert_eq!(change.transition.as_deref(), Some("file->directory"));

        let markers: Vec<ChangeKind> = comparison
            .path_changes
            .iter()
            .filter(|c| c.path == flipping.display().to_string())
            .map(|c| c.kind)
            .collect();
        assert_eq!(markers, vec![ChangeKind::Modified]);
    }

    /// A log directory with a glob only captures matching children.
    #[test]
    fn test_log_glob_end_to_end() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let logs = tmp.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("mcp-a.log"), b"a").unwrap();
        std::fs::write(logs.join("window.log"), b"w").unwrap();
        let locations = vec![test_utils::log_location("claude_logs", &logs, "mcp*.log")];

        let snapshot = take_snapshot(&repo, &locations);
        let observations = repo.observations(snapshot.id).unwrap();

        let paths: Vec<&str> = observations.iter().map(|o| o.path.as_str()).collect();
        assert!(paths.contains(&logs.display().to_string().as_str()));
        assert!(paths.contains(&logs.join("mcp-a.log").display().to_string().as_str()));
        assert!(!paths.iter().any(|p| p.ends_with("window.log")));
    }

    /// An absent location is recorded as such and does not fail the capture.
    #[test]
    fn test_absent_location_is_observed() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let locations = vec![location(
            "enterprise_memory",
            Category::Memory,
            &tmp.path().join("missing").join("CLAUDE.md"),
        )];

        let snapshot = take_snapshot(&repo, &locations);
        let observations = repo.observations(snapshot.id).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].kind, PathKind::Absent);
        assert!(repo.entities(snapshot.id).unwrap().is_empty());
    }

    /// Two identical empty files share the canonical empty blob.
    #[test]
    fn test_empty_files_share_canonical_blob() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let dir = tmp.path().join("tree");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("one.empty"), b"").unwrap();
        std::fs::write(dir.join("two.empty"), b"").unwrap();
        let locations = vec![location("tree", Category::Settings, &dir)];

        take_snapshot(&repo, &locations);

        assert_eq!(repo.blob_refcount(&ContentHash::empty()).unwrap(), Some(2));
    }

    /// A malformed MCP document produces zero records plus a parser
    /// annotation, and the snapshot still commits.
    #[test]
    fn test_malformed_mcp_document_is_annotated() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let config = tmp.path().join("claude.json");
        std::fs::write(&config, br#"{"mcpServers": "not an object"}"#).unwrap();
        let locations = vec![location("user_claude_json", Category::McpConfig, &config)];

        let snapshot = take_snapshot(&repo, &locations);

        assert!(repo.entities(snapshot.id).unwrap().mcp_servers.is_empty());
        let detail = repo.get_snapshot_detail(snapshot.id, &Include::default()).unwrap();
        let parser_notes: Vec<_> = detail
            .annotations
            .iter()
            .filter(|a| a.created_by.as_deref() == Some("parser"))
            .collect();
        assert_eq!(parser_notes.len(), 1);
        assert!(parser_notes[0].text.contains("not an object"));
    }

    /// Cancellation before commit leaves no trace.
    #[test]
    fn test_cancellation_leaves_no_snapshot() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let file = tmp.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();
        let locations = vec![location("tree", Category::Settings, &file)];

        let token = CancelToken::new();
        token.cancel();

        let archiver = Archiver::new(
            repo.clone(),
            locations,
            PathBuf::from("/work"),
            SnapshotOptions::default(),
        );
        assert!(archiver.snapshot(&token).is_err());

        assert!(repo.latest_snapshot().unwrap().is_none());
        assert_eq!(repo.stats().unwrap().content.num_blobs, 0);
    }

    /// Reference counts stay exact across mixed observation and entity
    /// references to the same bytes.
    #[test]
    fn test_refcounts_match_references() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let agents = tmp.path().join("agents");
        std::fs::create_dir_all(&agents).unwrap();
        // Two agent files with identical bodies: 2 observation refs plus
        // 2 entity refs on a single blob.
        std::fs::write(agents.join("first.md"), b"same body").unwrap();
        std::fs::write(agents.join("second.md"), b"same body").unwrap();
        let locations = vec![location("user_agents", Category::Agents, &agents)];

        take_snapshot(&repo, &locations);

        let hash = ContentHash::from_content(b"same body");
        assert_eq!(repo.blob_refcount(&hash).unwrap(), Some(4));
        assert!(repo.verify_content().unwrap().is_clean());
    }

    /// Memory scope comes from the location id, and each scope is diffable.
    #[test]
    fn test_memory_scopes_and_diff() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let user_memory = tmp.path().join("user_CLAUDE.md");
        let project_memory = tmp.path().join("project_CLAUDE.md");
        std::fs::write(&user_memory, b"user v1").unwrap();
        std::fs::write(&project_memory, b"project v1").unwrap();
        let locations = vec![
            location("user_memory", Category::Memory, &user_memory),
            location("project_memory", Category::Memory, &project_memory),
        ];

        let first = take_snapshot(&repo, &locations);
        std::fs::write(&project_memory, b"project v2").unwrap();
        let second = take_snapshot(&repo, &locations);

        let entities = repo.entities(first.id).unwrap();
        assert_eq!(entities.memories.len(), 2);

        let comparison = repo.compare_snapshots(first.id, second.id).unwrap();
        let deltas = &comparison.entity_deltas.memories;
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].name, "project");
        assert_eq!(deltas[0].kind, ChangeKind::Modified);
    }

    /// Snapshot tags set at capture time are persisted and filterable.
    #[test]
    fn test_snapshot_options_are_recorded() {
        let tmp = tempdir().unwrap();
        let repo = test_utils::init_repo(&tmp.path().join("repo"));

        let file = tmp.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();
        let locations = vec![location("tree", Category::Settings, &file)];

        let snapshot = test_utils::take_snapshot_with(
            &repo,
            &locations,
            test_utils::tagged_options(&["stable", "ci"], Some("nightly capture")),
        );

        assert_eq!(snapshot.originator.as_deref(), Some("tests"));
        assert_eq!(snapshot.notes.as_deref(), Some("nightly capture"));

        let detail = repo.get_snapshot_detail(snapshot.id, &Include::default()).unwrap();
        let names: Vec<&str> = detail.tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(names, vec!["ci", "stable"]);
    }
}
