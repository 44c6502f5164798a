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

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::commands::open_repo;
use crate::global::ChangeKind;
use crate::repository::repo::Include;
use crate::ui;
use crate::utils;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Show the details of one snapshot")]
pub struct CmdArgs {
    /// Snapshot id
    #[clap(value_parser)]
    pub id: i64,

    /// List every observed path
    #[clap(long, default_value_t = false)]
    pub observations: bool,

    /// Skip the change list
    #[clap(long, default_value_t = false)]
    pub no_changes: bool,

    /// Skip the entity summary
    #[clap(long, default_value_t = false)]
    pub no_entities: bool,
}

pub fn run(global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;
    let detail = repo.get_snapshot_detail(
        args.id,
        &Include {
            observations: args.observations,
            changes: !args.no_changes,
            entities: !args.no_entities,
        },
    )?;
    let snapshot = &detail.snapshot;

    ui::cli::log!("{} {}", "Snapshot".bold(), snapshot.id.to_string().bold().green());
    ui::cli::log!("Time:        {}", utils::utc_to_local_format(&snapshot.created_at));
    ui::cli::log!("Trigger:     {}", snapshot.trigger);
    if let Some(originator) = &snapshot.originator {
        ui::cli::log!("Originator:  {originator}");
    }
    ui::cli::log!(
        "Host:        {} ({} {})",
        snapshot.hostname,
        snapshot.os_kind,
        snapshot.os_version
    );
    ui::cli::log!("User:        {}", snapshot.username);
    ui::cli::log!("Working dir: {}", snapshot.working_dir);
    ui::cli::log!("Fingerprint: {}", snapshot.fingerprint);
    match snapshot.parent_id {
        Some(parent_id) => ui::cli::log!("Parent:      {parent_id}"),
        None => ui::cli::log!("Parent:      {} ({})", "none", "baseline".cyan()),
    }
    ui::cli::log!(
        "Contents:    {} files, {} directories, {} from {} locations",
        snapshot.num_files,
        snapshot.num_dirs,
        utils::format_size(snapshot.total_bytes, 3),
        snapshot.num_locations
    );
    ui::cli::log!(
        "Capture cap: {}",
        utils::format_size(snapshot.content_cap_bytes, 0)
    );
    if snapshot.num_errors > 0 {
        ui::cli::warning!(
            "{} absorbed during the scan",
            utils::format_count(snapshot.num_errors as usize, "error", "errors")
        );
    }
    if let Some(notes) = &snapshot.notes {
        ui::cli::log!("Notes:       {notes}");
    }
    if !detail.tags.is_empty() {
        let names: Vec<&str> = detail.tags.iter().map(|tag| tag.name.as_str()).collect();
        ui::cli::log!("Tags:        {}", names.join(", "));
    }

    if !detail.annotations.is_empty() {
        ui::cli::log!();
        ui::cli::log!("{}", "Annotations".bold());
        for annotation in &detail.annotations {
            let by = annotation.created_by.as_deref().unwrap_or("-");
            ui::cli::log!("  [{}] ({}) {}", annotation.id, by, annotation.text);
        }
    }

    if let Some(changes) = &detail.changes {
        ui::cli::log!();
        if changes.is_empty() {
            ui::cli::log!("No changes from the previous snapshot");
        } else {
            ui::cli::log!("{}", "Changes from the previous snapshot".bold());
            for change in changes {
                let marker = match change.kind {
                    ChangeKind::Added => "+".green(),
                    ChangeKind::Removed => "-".red(),
                    ChangeKind::Modified => "~".yellow(),
                };
                match &change.transition {
                    Some(transition) => {
                        ui::cli::log!("  {marker} {} ({transition})", change.path)
                    }
                    None => ui::cli::log!("  {marker} {}", change.path),
                }
            }
        }
    }

    if let Some(entities) = &detail.entities {
        ui::cli::log!();
        ui::cli::log!("{}", "Entities".bold());
        ui::cli::log!(
            "  {}",
            utils::format_count(entities.mcp_servers.len(), "MCP server", "MCP servers")
        );
        for server in &entities.mcp_servers {
            let state = if server.enabled { "" } else { " (disabled)" };
            ui::cli::log!("    {} -> {}{state}", server.name, server.command);
        }
        ui::cli::log!(
            "  {}",
            utils::format_count(entities.subagents.len(), "subagent", "subagents")
        );
        for subagent in &entities.subagents {
            ui::cli::log!("    {}", subagent.name);
        }
        ui::cli::log!(
            "  {}",
            utils::format_count(
                entities.slash_commands.len(),
                "slash command",
                "slash commands"
            )
        );
        for command in &entities.slash_commands {
            ui::cli::log!("    /{}", command.name);
        }
        ui::cli::log!(
            "  {}",
            utils::format_count(entities.memories.len(), "memory file", "memory files")
        );
        for memory in &entities.memories {
            ui::cli::log!("    {} ({})", memory.scope, memory.source_path);
        }
    }

    if let Some(observations) = &detail.observations {
        ui::cli::log!();
        ui::cli::log!("{}", "Observations".bold());
        for observation in observations {
            ui::cli::log!(
                "  [{}] {:<9} {} ({})",
                observation.location_id,
                observation.kind.to_string(),
                observation.path,
                utils::format_size(observation.size, 1)
            );
        }
    }

    Ok(())
}
