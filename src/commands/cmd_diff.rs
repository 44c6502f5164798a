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
use colored::{ColoredString, Colorize};

use crate::commands::open_repo;
use crate::entities::differ::EntityDelta;
use crate::global::ChangeKind;
use crate::ui;
use crate::utils;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Compare two snapshots")]
pub struct CmdArgs {
    /// The older snapshot id
    #[clap(value_parser)]
    pub from: i64,

    /// The newer snapshot id
    #[clap(value_parser)]
    pub to: i64,

    /// Skip path-level changes
    #[clap(long, default_value_t = false)]
    pub entities_only: bool,

    /// Skip entity deltas
    #[clap(long, default_value_t = false)]
    pub paths_only: bool,
}

fn marker(kind: ChangeKind) -> ColoredString {
    match kind {
        ChangeKind::Added => "+".green(),
        ChangeKind::Removed => "-".red(),
        ChangeKind::Modified => "~".yellow(),
    }
}

fn print_deltas<T>(label: &str, deltas: &[EntityDelta<T>]) {
    if deltas.is_empty() {
        return;
    }
    ui::cli::log!("  {}", label.bold());
    for delta in deltas {
        ui::cli::log!("    {} {}", marker(delta.kind), delta.name);
    }
}

pub fn run(global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;
    let comparison = repo.compare_snapshots(args.from, args.to)?;

    ui::cli::log!(
        "{} snapshot {} ({}) -> snapshot {} ({})",
        "Comparing".bold(),
        comparison.from.id,
        utils::utc_to_local_format(&comparison.from.created_at),
        comparison.to.id,
        utils::utc_to_local_format(&comparison.to.created_at),
    );

    if !args.entities_only {
        ui::cli::log!();
        if comparison.path_changes.is_empty() {
            ui::cli::log!("No path-level changes");
        } else {
            ui::cli::log!("{}", "Path changes".bold());
            for change in &comparison.path_changes {
                let delta = if change.size_delta >= 0 {
                    format!("+{}", change.size_delta)
                } else {
                    change.size_delta.to_string()
                };
                match &change.transition {
                    Some(transition) => ui::cli::log!(
                        "  {} {} ({transition}, {delta} B)",
                        marker(change.kind),
                        change.path
                    ),
                    None => {
                        ui::cli::log!("  {} {} ({delta} B)", marker(change.kind), change.path)
                    }
                }
            }
        }
    }

    if !args.paths_only {
        let deltas = &comparison.entity_deltas;
        ui::cli::log!();
        if deltas.is_empty() {
            ui::cli::log!("No entity changes");
        } else {
            ui::cli::log!("{}", "Entity changes".bold());
            print_deltas("MCP servers", &deltas.mcp_servers);
            print_deltas("Subagents", &deltas.subagents);
            print_deltas("Slash commands", &deltas.slash_commands);
            print_deltas("Memory", &deltas.memories);

            let total = &deltas.summary.total;
            ui::cli::log!();
            ui::cli::log!(
                "{} added, {} removed, {} modified",
                total.added.to_string().green(),
                total.removed.to_string().red(),
                total.modified.to_string().yellow(),
            );
        }
    }

    Ok(())
}
