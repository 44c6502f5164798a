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

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use urraca::archiver::{Archiver, SnapshotOptions};
use urraca::commands::GlobalArgs;
use urraca::global::{CancelToken, Trigger};
use urraca::locations::{Category, LocationOptions, ResolvedLocation};
use urraca::repository::repo::{Repo, RepoConfig};
use urraca::repository::snapshot::SnapshotRecord;

/// Initializes a repository in `root` and opens it.
pub fn init_repo(root: &Path) -> Arc<Repo> {
    Repo::init(root).unwrap();
    Repo::open(root, RepoConfig::default()).unwrap()
}

pub fn location(id: &str, category: Category, path: &Path) -> ResolvedLocation {
    ResolvedLocation {
        id: id.to_string(),
        category,
        path: path.to_path_buf(),
        options: LocationOptions::default(),
    }
}

pub fn log_location(id: &str, path: &Path, pattern: &str) -> ResolvedLocation {
    ResolvedLocation {
        id: id.to_string(),
        category: Category::Logs,
        path: path.to_path_buf(),
        options: LocationOptions {
            content_type: None,
            enumerate_logs: true,
            log_pattern: Some(pattern.to_string()),
        },
    }
}

/// Captures a snapshot of the given locations with default options.
pub fn take_snapshot(repo: &Arc<Repo>, locations: &[ResolvedLocation]) -> SnapshotRecord {
    take_snapshot_with(repo, locations, SnapshotOptions::default())
}

pub fn take_snapshot_with(
    repo: &Arc<Repo>,
    locations: &[ResolvedLocation],
    options: SnapshotOptions,
) -> SnapshotRecord {
    Archiver::new(repo.clone(), locations.to_vec(), PathBuf::from("/work"), options)
        .snapshot(&CancelToken::new())
        .unwrap()
}

pub fn tagged_options(tags: &[&str], notes: Option<&str>) -> SnapshotOptions {
    SnapshotOptions {
        trigger: Trigger::Manual,
        originator: Some("tests".to_string()),
        notes: notes.map(str::to_string),
        tags: tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
    }
}

/// Global CLI arguments pointing at a test repository, quiet.
pub fn global_args(repo: &Path, locations: Option<&Path>) -> GlobalArgs {
    GlobalArgs {
        repo: repo.to_path_buf(),
        locations: locations.map(Path::to_path_buf),
        quiet: true,
        verbosity: None,
    }
}

/// Writes a location catalog that captures a synthetic Claude tree laid out
/// under `claude_root`: a top-level JSON, user settings, memory, agents and
/// commands directories.
pub fn write_catalog(catalog_path: &Path, claude_root: &Path) {
    let yaml = format!(
        r#"
locations:
  - id: user_claude_json
    category: mcp_config
    template: "{root}/.claude.json"
  - id: user_settings
    category: settings
    template: "{root}/.claude/settings.json"
  - id: user_memory
    category: memory
    template: "{root}/.claude/CLAUDE.md"
  - id: user_agents
    category: agents
    template: "{root}/.claude/agents"
  - id: user_commands
    category: commands
    template: "{root}/.claude/commands"
"#,
        root = claude_root.display()
    );
    std::fs::write(catalog_path, yaml).unwrap();
}

/// Populates the synthetic Claude tree the catalog above points at.
pub fn write_claude_tree(claude_root: &Path) {
    let dot_claude = claude_root.join(".claude");
    std::fs::create_dir_all(dot_claude.join("agents")).unwrap();
    std::fs::create_dir_all(dot_claude.join("commands")).unwrap();

    std::fs::write(
        claude_root.join(".claude.json"),
        br#"{"mcpServers": {"fs": {"command": "npx", "args": ["-y", "server-fs"]}}}"#,
    )
    .unwrap();
    std::fs::write(dot_claude.join("settings.json"), br#"{"theme": "dark"}"#).unwrap();
    std::fs::write(dot_claude.join("CLAUDE.md"), b"# User memory\n").unwrap();
    std::fs::write(dot_claude.join("agents").join("reviewer.md"), b"You review code.\n").unwrap();
    std::fs::write(dot_claude.join("commands").join("deploy.md"), b"Deploy the app.\n").unwrap();
}
