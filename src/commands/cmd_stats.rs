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
use crate::ui;
use crate::utils;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Display stats about the repository and its contents")]
pub struct CmdArgs {}

pub fn run(global_args: &GlobalArgs, _args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;
    let stats = repo.stats()?;
    let health = repo.health()?;

    ui::cli::log!("Snapshots:");
    ui::cli::log!(
        "\t{}",
        utils::format_count(stats.num_snapshots as usize, "snapshot", "snapshots")
    );
    ui::cli::log!(
        "\t{}",
        utils::format_count(stats.num_observations as usize, "observation", "observations")
    );
    ui::cli::log!();
    ui::cli::log!("Content store:");
    ui::cli::log!(
        "\t{}",
        utils::format_count(stats.content.num_blobs as usize, "blob", "blobs")
    );
    ui::cli::log!(
        "\t{}",
        utils::format_count(stats.content.total_refs as usize, "reference", "references")
    );
    ui::cli::log!(
        "\tStored:     {:>12}",
        utils::format_size(stats.content.stored_bytes, 3)
    );
    ui::cli::log!(
        "\tReferenced: {:>12}",
        utils::format_size(stats.content.referenced_bytes, 3)
    );
    ui::cli::log!("\tDedup ratio: {:.2}x", stats.content.dedup_ratio());
    ui::cli::log!();
    ui::cli::log!(
        "Database size: {}",
        utils::format_size(stats.database_bytes, 3)
    );
    ui::cli::log!();

    if health.healthy {
        ui::cli::log!("Health: {}", "ok".bold().green());
    } else {
        ui::cli::log!("Health: {}", "degraded".bold().red());
    }
    for check in &health.checks {
        let state = if check.ok {
            "ok".green().to_string()
        } else {
            "failed".red().to_string()
        };
        ui::cli::log!("\t{:<15} {} ({})", check.name, state, check.detail);
    }

    Ok(())
}
