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

//! Typed domain records extracted from scanned configuration files.
//!
//! Entity records are fully denormalized per snapshot: everything needed to
//! answer "what did snapshot S contain" lives in the records of S.

pub mod differ;
pub mod parser;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::hashing::ContentHash;

/// Discriminant for the four entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    McpServer,
    Subagent,
    SlashCommand,
    Memory,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::McpServer => "mcp_server",
            EntityKind::Subagent => "subagent",
            EntityKind::SlashCommand => "slash_command",
            EntityKind::Memory => "memory",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which configuration layer a memory file belongs to. Derived from the
/// originating logical location id, never from the path string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    User,
    Project,
    Enterprise,
}

impl MemoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryScope::User => "user",
            MemoryScope::Project => "project",
            MemoryScope::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(MemoryScope::User),
            "project" => Ok(MemoryScope::Project),
            "enterprise" => Ok(MemoryScope::Enterprise),
            other => bail!("Unknown memory scope '{other}'"),
        }
    }

    /// Infers the scope from a logical location id (`user_memory`,
    /// `project_memory`, `enterprise_memory`, ...).
    pub fn from_location_id(location_id: &str) -> Option<Self> {
        if location_id.starts_with("user") {
            Some(MemoryScope::User)
        } else if location_id.starts_with("project") {
            Some(MemoryScope::Project)
        } else if location_id.starts_with("enterprise") {
            Some(MemoryScope::Enterprise)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One MCP server definition. `args` is order-sensitive; `env` is an ordered
/// sequence of pairs, not a map, so order and duplicates survive storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerRecord {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub enabled: bool,
    pub source_path: String,
}

impl McpServerRecord {
    /// Equality per the differ contract: the source path is provenance, not
    /// payload.
    pub fn same_payload(&self, other: &Self) -> bool {
        self.command == other.command
            && self.args == other.args
            && self.env == other.env
            && self.enabled == other.enabled
    }
}

/// A subagent definition file. The body lives in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubagentRecord {
    pub name: String,
    pub content_hash: ContentHash,
    pub source_path: String,
}

impl SubagentRecord {
    pub fn same_payload(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

/// A slash command definition file. The body lives in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashCommandRecord {
    pub name: String,
    pub content_hash: ContentHash,
    pub source_path: String,
}

impl SlashCommandRecord {
    pub fn same_payload(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

/// A memory (CLAUDE.md) file at one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub scope: MemoryScope,
    pub content_hash: ContentHash,
    pub source_path: String,
}

impl MemoryRecord {
    pub fn same_payload(&self, other: &Self) -> bool {
        self.content_hash == other.content_hash
    }
}

/// All entities of one snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntitySet {
    pub mcp_servers: Vec<McpServerRecord>,
    pub subagents: Vec<SubagentRecord>,
    pub slash_commands: Vec<SlashCommandRecord>,
    pub memories: Vec<MemoryRecord>,
}

impl EntitySet {
    pub fn is_empty(&self) -> bool {
        self.mcp_servers.is_empty()
            && self.subagents.is_empty()
            && self.slash_commands.is_empty()
            && self.memories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mcp_servers.len()
            + self.subagents.len()
            + self.slash_commands.len()
            + self.memories.len()
    }
}
