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

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;

use crate::commands::open_repo;
use crate::global::{Trigger, defaults};
use crate::repository::snapshot::{Page, SnapshotFilter, SnapshotSort};
use crate::ui::{
    self,
    table::{Alignment, Table},
};
use crate::utils;

use super::{GlobalArgs, parse_tags};

#[derive(Args, Debug)]
#[clap(about = "List snapshots")]
pub struct CmdArgs {
    /// Filter by trigger kind
    #[clap(long, value_enum)]
    pub trigger: Option<Trigger>,

    /// Filter by originator
    #[clap(long, value_parser)]
    pub originator: Option<String>,

    /// Filter by OS kind (linux, macos, windows)
    #[clap(long, value_parser)]
    pub os: Option<String>,

    /// Only baseline snapshots
    #[clap(long, default_value_t = false)]
    pub baseline: bool,

    /// Only snapshots with changes
    #[clap(long, default_value_t = false)]
    pub changed: bool,

    /// Snapshots carrying any of these tags: tag[,tag,...]
    #[clap(long = "tags", value_parser)]
    pub tags_any: Option<String>,

    /// Snapshots carrying all of these tags: tag[,tag,...]
    #[clap(long = "require-tags", value_parser)]
    pub tags_all: Option<String>,

    /// Only snapshots created at or after this time (RFC 3339)
    #[clap(long, value_parser)]
    pub since: Option<String>,

    /// Only snapshots created at or before this time (RFC 3339)
    #[clap(long, value_parser)]
    pub until: Option<String>,

    /// Free-text search over notes
    #[clap(long, value_parser)]
    pub search: Option<String>,

    /// Oldest first instead of newest first
    #[clap(long, default_value_t = false)]
    pub oldest_first: bool,

    /// Maximum number of rows
    #[clap(long, default_value_t = defaults::DEFAULT_LIST_LIMIT)]
    pub limit: usize,

    /// Number of rows to skip
    #[clap(long, default_value_t = 0)]
    pub offset: usize,
}

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .with_context(|| format!("Invalid time '{text}' (expected RFC 3339)"))
}

pub fn run(global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;

    let filter = SnapshotFilter {
        trigger: args.trigger,
        originator: args.originator.clone(),
        os_kind: args.os.clone(),
        baseline: args.baseline.then_some(true),
        changed: args.changed.then_some(true),
        tags_any: parse_tags(args.tags_any.as_deref()).into_iter().collect(),
        tags_all: parse_tags(args.tags_all.as_deref()).into_iter().collect(),
        created_after: args.since.as_deref().map(parse_time).transpose()?,
        created_before: args.until.as_deref().map(parse_time).transpose()?,
        search: args.search.clone(),
    };
    let sort = if args.oldest_first {
        SnapshotSort::CreatedAsc
    } else {
        SnapshotSort::CreatedDesc
    };
    let page = Page {
        limit: args.limit,
        offset: args.offset,
    };

    let snapshots = repo.list_snapshots(&filter, sort, &page)?;
    if snapshots.is_empty() {
        ui::cli::log!("No snapshots found");
        return Ok(());
    }

    let mut table = Table::new_with_alignments(vec![
        Alignment::Right,
        Alignment::Left,
        Alignment::Left,
        Alignment::Right,
        Alignment::Right,
        Alignment::Left,
        Alignment::Left,
        Alignment::Left,
    ]);
    table.set_headers(vec![
        "ID".bold().to_string(),
        "Time".bold().to_string(),
        "Trigger".bold().to_string(),
        "Files".bold().to_string(),
        "Size".bold().to_string(),
        "Changes".bold().to_string(),
        "Tags".bold().to_string(),
        "Notes".bold().to_string(),
    ]);

    for snapshot in &snapshots {
        let changes = if snapshot.baseline {
            "baseline".cyan().to_string()
        } else if snapshot.changed {
            "changed".yellow().to_string()
        } else {
            "-".to_string()
        };

        let tags: Vec<String> = repo
            .get_snapshot_detail(snapshot.id, &Default::default())?
            .tags
            .into_iter()
            .map(|tag| tag.name)
            .collect();

        table.add_row(vec![
            snapshot.id.to_string(),
            utils::utc_to_local_format(&snapshot.created_at),
            snapshot.trigger.to_string(),
            snapshot.num_files.to_string(),
            utils::format_size(snapshot.total_bytes, 1),
            changes,
            tags.join(","),
            utils::ellipsize(snapshot.notes.as_deref().unwrap_or(""), 40),
        ]);
    }

    ui::cli::log!("{}", table.render());
    ui::cli::log!();
    ui::cli::log!(
        "{}",
        utils::format_count(snapshots.len(), "snapshot", "snapshots")
    );

    Ok(())
}
