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
use crate::repository::gc;
use crate::ui;
use crate::utils;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Reclaim unreferenced blobs")]
pub struct CmdArgs {
    /// Report what would be reclaimed without deleting anything
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,
}

pub fn run(global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;

    let plan = gc::scan(&repo)?;
    if plan.is_empty() {
        ui::cli::log!("Nothing to reclaim");
        return Ok(());
    }

    ui::cli::log!(
        "{} unreferenced ({})",
        utils::format_count(plan.len(), "blob", "blobs"),
        utils::format_size(plan.reclaimable_bytes, 1)
    );

    if args.dry_run {
        ui::cli::log!("Dry run; nothing was deleted");
        return Ok(());
    }

    let reclaimed = plan.execute(&repo)?;
    ui::cli::log!(
        "Reclaimed {}",
        utils::format_size(reclaimed, 1).bold().green()
    );

    Ok(())
}
