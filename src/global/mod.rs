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

pub mod defaults;

use std::sync::{
    Arc, LazyLock,
    atomic::{AtomicBool, Ordering},
};

use anyhow::{Result, bail};
use clap::ValueEnum;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::commands::GlobalArgs;

/// What caused a snapshot to be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Manual,
    Scheduled,
    Auto,
    Api,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Scheduled => "scheduled",
            Trigger::Auto => "auto",
            Trigger::Api => "api",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(Trigger::Manual),
            "scheduled" => Ok(Trigger::Scheduled),
            "auto" => Ok(Trigger::Auto),
            "api" => Ok(Trigger::Api),
            other => bail!("Unknown trigger kind '{other}'"),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Trigger {
    fn default() -> Self {
        Trigger::Manual
    }
}

/// What was found at an observed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathKind {
    File,
    Directory,
    Absent,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathKind::File => "file",
            PathKind::Directory => "directory",
            PathKind::Absent => "absent",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(PathKind::File),
            "directory" => Ok(PathKind::Directory),
            "absent" => Ok(PathKind::Absent),
            other => bail!("Unknown path kind '{other}'"),
        }
    }
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of difference between two snapshots, shared by the path-level change
/// detector and the entity differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "added" => Ok(ChangeKind::Added),
            "removed" => Ok(ChangeKind::Removed),
            "modified" => Ok(ChangeKind::Modified),
            other => bail!("Unknown change kind '{other}'"),
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Host platform, used to filter location records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Linux,
    Macos,
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else {
            Platform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Macos => "macos",
            Platform::Windows => "windows",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cooperative cancellation token. The snapshot pipeline checks it at its
/// suspension points and aborts cleanly without committing anything.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Bails with a cancellation error if the token has been tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            bail!("Operation cancelled");
        }
        Ok(())
    }
}

static CANCEL_TOKEN: LazyLock<CancelToken> = LazyLock::new(CancelToken::new);

/// The process-wide cancellation token, tripped by the Ctrl-C handler.
pub fn cancel_token() -> CancelToken {
    CANCEL_TOKEN.clone()
}

#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub quiet: bool,
    pub verbosity: u32,
}

impl Default for GlobalOpts {
    fn default() -> Self {
        Self {
            quiet: false,
            verbosity: defaults::DEFAULT_VERBOSITY,
        }
    }
}

static GLOBAL_OPTS: RwLock<GlobalOpts> = RwLock::new(GlobalOpts {
    quiet: false,
    verbosity: defaults::DEFAULT_VERBOSITY,
});

/// Installs the display options parsed from the command line.
pub fn set_global_opts_with_args(args: &GlobalArgs) {
    let mut opts = GLOBAL_OPTS.write();
    opts.quiet = args.quiet;
    opts.verbosity = args.verbosity.unwrap_or(defaults::DEFAULT_VERBOSITY);
}

pub fn global_opts() -> GlobalOpts {
    GLOBAL_OPTS.read().clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_text_round_trips() {
        for trigger in [Trigger::Manual, Trigger::Scheduled, Trigger::Auto, Trigger::Api] {
            assert_eq!(Trigger::parse(trigger.as_str()).unwrap(), trigger);
        }
        for kind in [PathKind::File, PathKind::Directory, PathKind::Absent] {
            assert_eq!(PathKind::parse(kind.as_str()).unwrap(), kind);
        }
        for kind in [ChangeKind::Added, ChangeKind::Removed, ChangeKind::Modified] {
            assert_eq!(ChangeKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.check().is_err());
    }
}
