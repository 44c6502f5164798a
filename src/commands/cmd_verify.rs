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

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::commands::open_repo;
use crate::ui::{self, PROGRESS_REFRESH_RATE_HZ, SPINNER_TICK_CHARS, default_bar_draw_target};
use crate::utils;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Verify blob integrity and reference counts")]
pub struct CmdArgs {}

pub fn run(global_args: &GlobalArgs, _args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(default_bar_draw_target());
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} Verifying content store...")
            .unwrap()
            .tick_chars(SPINNER_TICK_CHARS),
    );
    spinner.enable_steady_tick(Duration::from_millis(
        (1000.0_f32 / PROGRESS_REFRESH_RATE_HZ as f32) as u64,
    ));

    let report = repo.verify_content();
    spinner.finish_and_clear();
    let report = report?;

    ui::cli::log!(
        "Checked {}",
        utils::format_count(report.num_checked as usize, "blob", "blobs")
    );

    for hash in &report.corrupted {
        ui::cli::error!("Blob {} is corrupted (hash mismatch)", hash);
    }
    for (hash, stored, actual) in &report.refcount_mismatches {
        ui::cli::error!(
            "Blob {} has refcount {} but {} live references",
            hash,
            stored,
            actual
        );
    }

    if report.is_clean() {
        ui::cli::log!("{}", "No problems found".bold().green());
        Ok(())
    } else {
        bail!(
            "Verification failed: {} corrupted, {} refcount mismatches",
            report.corrupted.len(),
            report.refcount_mismatches.len()
        );
    }
}
