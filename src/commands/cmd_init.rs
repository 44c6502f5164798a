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

use crate::global::defaults::SHORT_FINGERPRINT_LEN;
use crate::hashing::ContentHash;
use crate::repository::repo::{Repo, RepoConfig};
use crate::ui;

use super::GlobalArgs;

#[derive(Args, Debug)]
#[clap(about = "Initialize a new repository")]
pub struct CmdArgs {}

pub fn run(global_args: &GlobalArgs, _args: &CmdArgs) -> Result<()> {
    ui::cli::log!(
        "Initializing a new repository in '{}'",
        global_args.repo.display()
    );
    Repo::init(&global_args.repo)?;

    let repo = Repo::open(&global_args.repo, RepoConfig::default())?;
    let repo_id = repo.repo_id()?;
    let short_id = ContentHash::from_hex(&repo_id)
        .map(|hash| hash.to_short_hex(SHORT_FINGERPRINT_LEN))
        .unwrap_or(repo_id);
    ui::cli::log!("Created repo with id {short_id}");

    Ok(())
}
