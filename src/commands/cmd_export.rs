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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::commands::open_repo;
use crate::export;
use crate::ui;
use crate::utils;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Export a snapshot as a structured JSON document")]
pub struct CmdArgs {
    /// Snapshot id
    #[clap(value_parser)]
    pub id: i64,

    /// Write to this file instead of stdout
    #[clap(short, long, value_parser)]
    pub output: Option<PathBuf>,

    /// Embed the captured file contents (base64)
    #[clap(long, default_value_t = false)]
    pub include_content: bool,
}

pub fn run(global_args: &GlobalArgs, args: &CmdArgs) -> Result<()> {
    let repo = open_repo(global_args)?;

    let document = export::export_snapshot(&repo, args.id, args.include_content)?;
    let json = export::to_json(&document)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Could not write export to {}", path.display()))?;
            ui::cli::log!(
                "Exported snapshot {} to {} ({})",
                args.id,
                path.display(),
                utils::format_size(json.len() as u64, 1)
            );
        }
        None => {
            // The document itself goes to stdout even in quiet mode; that is
            // the command's output, not chatter.
            println!("{json}");
        }
    }

    Ok(())
}
