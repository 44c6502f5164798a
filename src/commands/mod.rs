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

pub mod cmd_delete;
pub mod cmd_diff;
pub mod cmd_export;
pub mod cmd_gc;
pub mod cmd_init;
pub mod cmd_list;
pub mod cmd_show;
pub mod cmd_snapshot;
pub mod cmd_stats;
pub mod cmd_tag;
pub mod cmd_verify;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::locations::{Environment, LocationConfig, PathResolver, ResolvedLocation};
use crate::repository::repo::{Repo, RepoConfig};

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the repository directory
    #[clap(short = 'r', long, value_parser)]
    pub repo: PathBuf,

    /// Alternative location catalog (YAML). Defaults to the builtin catalog
    /// of well-known Claude configuration locations.
    #[clap(long, value_parser)]
    pub locations: Option<PathBuf>,

    /// Suppress informational output
    #[clap(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Verbosity level
    #[clap(short, long)]
    pub verbosity: Option<u32>,
}

/// Parses a comma-separated tag list, dropping empty entries.
pub fn parse_tags(tags_str: Option<&str>) -> BTreeSet<String> {
    match tags_str {
        None => BTreeSet::new(),
        Some(tags_str) => tags_str
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

pub(crate) fn open_repo(global_args: &GlobalArgs) -> Result<Arc<Repo>> {
    Repo::open(&global_args.repo, RepoConfig::default())
}

pub(crate) fn load_location_config(global_args: &GlobalArgs) -> Result<LocationConfig> {
    match &global_args.locations {
        Some(path) => LocationConfig::load(path),
        None => Ok(LocationConfig::builtin()),
    }
}

/// Resolves the location catalog against the live environment. Returns the
/// resolved locations and the working directory they were resolved under.
pub(crate) fn resolve_locations(
    global_args: &GlobalArgs,
) -> Result<(Vec<ResolvedLocation>, PathBuf)> {
    let config = load_location_config(global_args)?;
    let working_dir = std::env::current_dir()?;
    let env = Environment::capture(working_dir.clone());
    let resolved = PathResolver::new(config, env).resolve()?;
    Ok((resolved, working_dir))
}
