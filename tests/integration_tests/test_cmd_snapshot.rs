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
    use anyhow::{Context, Result};
    use tempfile::tempdir;
    use urraca::commands::{
        self, cmd_delete, cmd_diff, cmd_export, cmd_gc, cmd_init, cmd_list, cmd_show,
        cmd_snapshot, cmd_stats, cmd_tag, cmd_verify,
    };
    use urraca::global::{Trigger, set_global_opts_with_args};
    use urraca::repository::repo::{Repo, RepoConfig};

    use crate::test_utils::{self, global_args};

    fn snapshot_args() -> cmd_snapshot::CmdArgs {
        cmd_snapshot::CmdArgs {
            trigger: Trigger::Manual,
            originator: Some("it".to_string()),
            notes: None,
            tags_str: None,
            dry_run: false,
        }
    }

    #[test]
    fn test_init_snapshot_list_show() -> Result<()> {
        let tmp = tempdir().unwrap();
        let tmp_path = tmp.path();

        let claude_root = tmp_path.join("home");
        test_utils::write_claude_tree(&claude_root);
        let catalog_path = tmp_path.join("locations.yaml");
        test_utils::write_catalog(&catalog_path, &claude_root);

        let repo_path = tmp_path.join("repo");
        let global = global_args(&repo_path, Some(&catalog_path));
        set_global_opts_with_args(&global);

        cmd_init::run(&global, &cmd_init::CmdArgs {})
            .with_context(|| "Failed to run cmd_init")?;

        cmd_snapshot::run(&global, &snapshot_args())
            .with_context(|| "Failed to run cmd_snapshot")?;

        let repo = Repo::open(&repo_path, RepoConfig::default())?;
        let snapshot = repo.latest_snapshot()?.expect("snapshot should exist");
        assert!(snapshot.baseline);

        let entities = repo.entities(snapshot.id)?;
        assert_eq!(entities.mcp_servers.len(), 1);
        assert_eq!(entities.mcp_servers[0].name, "fs");
        assert_eq!(entities.subagents.len(), 1);
        assert_eq!(entities.slash_commands.len(), 1);
        assert_eq!(entities.memories.len(), 1);
        drop(repo);

        let list_args = cmd_list::CmdArgs {
            trigger: Some(Trigger::Manual),
            originator: None,
            os: None,
            baseline: true,
            changed: false,
            tags_any: None,
            tags_all: None,
            since: None,
            until: None,
            search: None,
            oldest_first: false,
            limit: 10,
            offset: 0,
        };
        cmd_list::run(&global, &list_args).with_context(|| "Failed to run cmd_list")?;

        let show_args = cmd_show::CmdArgs {
            id: 1,
            observations: true,
            no_changes: false,
            no_entities: false,
        };
        cmd_show::run(&global, &show_args).with_context(|| "Failed to run cmd_show")?;

        cmd_stats::run(&global, &cmd_stats::CmdArgs {})
            .with_context(|| "Failed to run cmd_stats")?;
        cmd_verify::run(&global, &cmd_verify::CmdArgs {})
            .with_context(|| "Failed to run cmd_verify")?;

        Ok(())
    }

    #[test]
    fn test_snapshot_dry_run_writes_nothing() -> Result<()> {
        let tmp = tempdir().unwrap();
        let tmp_path = tmp.path();

        let claude_root = tmp_path.join("home");
        test_utils::write_claude_tree(&claude_root);
        let catalog_path = tmp_path.join("locations.yaml");
        test_utils::write_catalog(&catalog_path, &claude_root);

        let repo_path = tmp_path.join("repo");
        let global = global_args(&repo_path, Some(&catalog_path));
        set_global_opts_with_args(&global);

        cmd_init::run(&global, &cmd_init::CmdArgs {})?;

        let mut args = snapshot_args();
        args.dry_run = true;
        cmd_snapshot::run(&global, &args)?;

        let repo = Repo::open(&repo_path, RepoConfig::default())?;
        assert!(repo.latest_snapshot()?.is_none());
        assert_eq!(repo.stats()?.num_snapshots, 0);

        Ok(())
    }

    #[test]
    fn test_diff_tag_export_delete_gc() -> Result<()> {
        let tmp = tempdir().unwrap();
        let tmp_path = tmp.path();

        let claude_root = tmp_path.join("home");
        test_utils::write_claude_tree(&claude_root);
        let catalog_path = tmp_path.join("locations.yaml");
        test_utils::write_catalog(&catalog_path, &claude_root);

        let repo_path = tmp_path.join("repo");
        let global = global_args(&repo_path, Some(&catalog_path));
        set_global_opts_with_args(&global);

        cmd_init::run(&global, &cmd_init::CmdArgs {})?;
        cmd_snapshot::run(&global, &snapshot_args())?;

        // Change the MCP config and the subagent, then capture again.
        std::fs::write(
            claude_root.join(".claude.json"),
            br#"{"mcpServers": {"search": {"command": "python"}}}"#,
        )?;
        std::fs::write(
            claude_root.join(".claude").join("agents").join("reviewer.md"),
            b"You review code carefully.\n",
        )?;
        cmd_snapshot::run(&global, &snapshot_args())?;

        let diff_args = cmd_diff::CmdArgs {
            from: 1,
            to: 2,
            entities_only: false,
            paths_only: false,
        };
        cmd_diff::run(&global, &diff_args).with_context(|| "Failed to run cmd_diff")?;

        let tag_args = cmd_tag::CmdArgs {
            id: 2,
            add: Some("reviewed,good".to_string()),
            remove: None,
            annotate: Some("second capture".to_string()),
            remove_annotation: None,
            by: Some("it".to_string()),
        };
        cmd_tag::run(&global, &tag_args).with_context(|| "Failed to run cmd_tag")?;

        let export_path = tmp_path.join("snapshot2.json");
        let export_args = cmd_export::CmdArgs {
            id: 2,
            output: Some(export_path.clone()),
            include_content: true,
        };
        cmd_export::run(&global, &export_args).with_context(|| "Failed to run cmd_export")?;

        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&export_path)?)?;
        assert_eq!(exported["snapshot"]["id"], 2);
        assert_eq!(exported["entities"]["mcp_servers"][0]["name"], "search");
        assert_eq!(exported["tags"].as_array().unwrap().len(), 2);
        assert!(
            exported["observations"]
                .as_array()
                .unwrap()
                .iter()
                .any(|o| o["content_base64"].is_string())
        );

        cmd_delete::run(&global, &cmd_delete::CmdArgs { id: 1 })
            .with_context(|| "Failed to run cmd_delete")?;

        let gc_args = cmd_gc::CmdArgs { dry_run: false };
        cmd_gc::run(&global, &gc_args).with_context(|| "Failed to run cmd_gc")?;

        // What the second snapshot references must survive the collection.
        cmd_verify::run(&global, &cmd_verify::CmdArgs {})
            .with_context(|| "Verification after gc failed")?;

        let repo = Repo::open(&repo_path, RepoConfig::default())?;
        assert!(repo.get_snapshot(1).is_err());
        assert!(repo.get_snapshot(2).is_ok());

        Ok(())
    }

    #[test]
    fn test_unknown_placeholder_in_catalog_is_fatal() -> Result<()> {
        let tmp = tempdir().unwrap();
        let tmp_path = tmp.path();

        let catalog_path = tmp_path.join("locations.yaml");
        std::fs::write(
            &catalog_path,
            "locations:\n  - id: broken\n    category: settings\n    template: \"$NOPE/file\"\n",
        )?;

        let repo_path = tmp_path.join("repo");
        let global = global_args(&repo_path, Some(&catalog_path));
        set_global_opts_with_args(&global);

        cmd_init::run(&global, &cmd_init::CmdArgs {})?;
        assert!(cmd_snapshot::run(&global, &snapshot_args()).is_err());

        let repo = Repo::open(&repo_path, RepoConfig::default())?;
        assert!(repo.latest_snapshot()?.is_none());

        Ok(())
    }

    #[test]
    fn test_tag_parsing_helper() {
        let tags = commands::parse_tags(Some("a,b"));
        assert_eq!(tags.len(), 2);
    }
}
