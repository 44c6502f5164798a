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

use crate::commands::{open_repo, parse_tags};
use crate::ui;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Amend the tags and annotations of a snapshot")]
pub struct CmdArgs {
    /// Snapshot id
    #[clap(value_parser)]
    pub id: i64,

    /// Tags to add: tag[,tag,...]
    #[clap(long, value_parser)]
    pub add: Option<String>,

    /// Tags to remove: tag[,tag,...]
    #[clap(long, value_parser)]
    pub remove: Option<String>,

    /// Attach an annotation
    #[clap(long, value_parser)]
    pub annotate: Option<String>,

    /// Remove an annotation by its id
    #[clap(long, value_parser)]
    pub remove_annotation: Option<i64>,

    /// Who is making this amendment
    #[clap(long, value_parser)]
    pub by: Option<String>,
}

pub fn run(global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;
    let created_by = args.by.as_deref();

    for tag in parse_tags(args.add.as_deref()) {
        if repo.add_tag(args.id, &tag, created_by)? {
            ui::cli::log!("Tagged snapshot {} with '{}'", args.id, tag);
        } else {
            ui::cli::verbose_1!("Snapshot {} already has tag '{}'", args.id, tag);
        }
    }

    for tag in parse_tags(args.remove.as_deref()) {
        if repo.remove_tag(args.id, &tag)? {
            ui::cli::log!("Removed tag '{}' from snapshot {}", tag, args.id);
        } else {
            ui::cli::warning!("Snapshot {} has no tag '{}'", args.id, tag);
        }
    }

    if let Some(text) = &args.annotate {
        let annotation_id = repo.add_annotation(args.id, text, created_by)?;
        ui::cli::log!("Added annotation {} to snapshot {}", annotation_id, args.id);
    }

    if let Some(annotation_id) = args.remove_annotation {
        if repo.remove_annotation(annotation_id)? {
            ui::cli::log!("Removed annotation {annotation_id}");
        } else {
            ui::cli::warning!("No annotation with id {annotation_id}");
        }
    }

    Ok(())
}
