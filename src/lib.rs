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

//! urraca captures versioned snapshots of the Claude toolchain's
//! configuration: well-known settings files, MCP server definitions,
//! subagents, slash commands and memory files, stored deduplicated in an
//! embedded database and diffable at both the path and the entity level.

pub mod archiver;
pub mod changes;
pub mod commands;
pub mod entities;
pub mod export;
pub mod global;
pub mod hashing;
pub mod locations;
pub mod repository;
pub mod scanner;
pub mod ui;
pub mod utils;
