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

use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::archiver::{Archiver, SnapshotOptions};
use crate::commands::{open_repo, parse_tags, resolve_locations};
use crate::global::{self, Trigger, defaults::SHORT_FINGERPRINT_LEN};
use crate::scanner::Scanner;
use crate::ui::{self, PROGRESS_REFRESH_RATE_HZ, SPINNER_TICK_CHARS, default_bar_draw_target};
use crate::utils::{self, format_size};

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Capture a new snapshot of the Claude configuration")]
pub struct CmdArgs {
    /// What triggered this snapshot
    #[clap(long, value_enum, default_value_t = Trigger::Manual)]
    pub trigger: Trigger,

    /// Who or what initiated the capture
    #[clap(long, value_parser)]
    pub originator: Option<String>,

    /// Freeform notes attached to the snapshot
    #[clap(long, value_parser)]
    pub notes: Option<String>,

    /// Tags: tag[,tag,...]
    #[clap(long = "tags", value_parser)]
    pub tags_str: Option<String>,

    /// Scan and report without writing anything
    #[clap(long, default_value_t = false)]
    pub dry_run: bool,
}

pub fn run(global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let start = Instant::now();

    let (locations, working_dir) = resolve_locations(global_args)?;
    ui::cli::verbose_1!(
        "Resolved {}",
        utils::format_count(locations.len(), "location", "locations")
    );

    if args.dry_run {
        return dry_run(&locations);
    }

    let repo = open_repo(global_args)?;
    let options = SnapshotOptions {
        trigger: args.trigger,
        originator: args.originator.clone(),
        notes: args.notes.clone(),
        tags: parse_tags(args.tags_str.as_deref()),
    };
    let archiver = Archiver::new(repo.clone(), locations, working_dir, options);

    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(default_bar_draw_target());
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} Capturing snapshot...")
            .unwrap()
            .tick_chars(SPINNER_TICK_CHARS),
    );
    spinner.enable_steady_tick(Duration::from_millis(
        (1000.0_f32 / PROGRESS_REFRESH_RATE_HZ as f32) as u64,
    ));

    let snapshot = archiver.snapshot(&global::cancel_token());
    spinner.finish_and_clear();
    let snapshot = snapshot?;

    ui::cli::log!(
        "New snapshot {} ({})",
        snapshot.id.to_string().bold().green(),
        snapshot.fingerprint.to_short_hex(SHORT_FINGERPRINT_LEN)
    );
    ui::cli::log!(
        "{} files, {} directories, {} across {} locations",
        snapshot.num_files,
        snapshot.num_dirs,
        format_size(snapshot.total_bytes, 3),
        snapshot.num_locations,
    );

    if snapshot.baseline {
        ui::cli::log!("This is the {} snapshot of this repository", "baseline".bold());
    } else if snapshot.changed {
        let changes = repo.changes(snapshot.id)?;
        ui::cli::log!(
            "{} since the previous snapshot",
            utils::format_count(changes.len(), "path changed", "paths changed")
                .bold()
                .yellow()
        );
    } else {
        ui::cli::log!("No changes since the previous snapshot");
    }

    if snapshot.num_errors > 0 {
        ui::cli::warning!(
            "{} absorbed during the scan (see snapshot annotations)",
            utils::format_count(snapshot.num_errors as usize, "error", "errors")
        );
    }

    ui::cli::log!(
        "Finished in {}",
        utils::pretty_print_duration(start.elapsed())
    );

    Ok(())
}

fn dry_run(locations: &[crate::locations::ResolvedLocation]) -> Result<()> {
    let report = Scanner::new().scan(locations, &global::cancel_token())?;

    ui::cli::log!("{}", "Dry run; nothing was written".bold());
    ui::cli::log!(
        "Would capture {} files, {} directories, {}",
        report.num_files,
        report.num_dirs,
        format_size(report.total_bytes, 3)
    );
    for observation in &report.observations {
        ui::cli::verbose_1!(
            "  [{}] {} {}",
            observation.location_id,
            observation.kind,
            observation.path.display()
        );
    }
    if report.error_count > 0 {
        ui::cli::warning!(
            "{} would be absorbed",
            utils::format_count(report.error_count as usize, "error", "errors")
        );
    }

    Ok(())
}
