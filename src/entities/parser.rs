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

//! Extraction of typed entities from scanned file content.
//!
//! Parsing is forgiving by contract: a malformed source produces zero
//! records and a structured annotation on the snapshot, never an aborted
//! capture. Malformed MCP sub-entries are skipped individually so their
//! siblings still parse.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::entities::{
    EntitySet, McpServerRecord, MemoryRecord, MemoryScope, SlashCommandRecord, SubagentRecord,
};
use crate::global::PathKind;
use crate::locations::Category;
use crate::scanner::ObservationDraft;

/// Everything the parser got out of one scan: the entity records plus the
/// snapshot-scoped annotations describing what could not be parsed.
#[derive(Debug, Default)]
pub struct ParsedEntities {
    pub set: EntitySet,
    pub annotations: Vec<String>,
}

/// Parses all entity kinds from the observation drafts of one scan.
pub fn parse_entities(drafts: &[ObservationDraft]) -> ParsedEntities {
    let mut parsed = ParsedEntities::default();
    let mut seen_subagents = BTreeSet::new();
    let mut seen_commands = BTreeSet::new();
    let mut seen_scopes = BTreeSet::new();

    for draft in drafts {
        if draft.kind != PathKind::File {
            continue;
        }

        match draft.category {
            Category::McpConfig => parse_mcp_config(draft, &mut parsed),
            Category::Agents => {
                if let Some(record) = content_entity(draft, &mut parsed) {
                    let (name, content_hash, source_path) = record;
                    if seen_subagents.insert(name.clone()) {
                        parsed.set.subagents.push(SubagentRecord {
                            name,
                            content_hash,
                            source_path,
                        });
                    } else {
                        parsed.annotations.push(format!(
                            "duplicate subagent '{}' from {} ignored",
                            name_of(draft),
                            draft.path.display()
                        ));
                    }
                }
            }
            Category::Commands => {
                if let Some(record) = content_entity(draft, &mut parsed) {
                    let (name, content_hash, source_path) = record;
                    if seen_commands.insert(name.clone()) {
                        parsed.set.slash_commands.push(SlashCommandRecord {
                            name,
                            content_hash,
                            source_path,
                        });
                    } else {
                        parsed.annotations.push(format!(
                            "duplicate slash command '{}' from {} ignored",
                            name_of(draft),
                            draft.path.display()
                        ));
                    }
                }
            }
            Category::Memory => parse_memory(draft, &mut seen_scopes, &mut parsed),
            Category::Settings | Category::Logs => {}
        }
    }

    sort_entities(&mut parsed.set);
    parsed
}

fn sort_entities(set: &mut EntitySet) {
    set.mcp_servers.sort_by(|a, b| a.name.cmp(&b.name));
    set.subagents.sort_by(|a, b| a.name.cmp(&b.name));
    set.slash_commands.sort_by(|a, b| a.name.cmp(&b.name));
    set.memories.sort_by(|a, b| a.scope.cmp(&b.scope));
}

fn name_of(draft: &ObservationDraft) -> String {
    draft
        .path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Markdown-backed entities (subagents, slash commands): name is the file
/// stem, the body is the whole file.
fn content_entity(
    draft: &ObservationDraft,
    parsed: &mut ParsedEntities,
) -> Option<(String, crate::hashing::ContentHash, String)> {
    if draft.path.extension().is_none_or(|ext| ext != "md") {
        return None;
    }

    let name = name_of(draft);
    if name.is_empty() {
        return None;
    }

    let Some(content_hash) = draft.content_hash else {
        parsed.annotations.push(format!(
            "entity source {} could not be read; no record produced",
            draft.path.display()
        ));
        return None;
    };

    if !draft.has_content() {
        // The body was not captured (cap exceeded); without a stored blob
        // the record would reference nothing.
        parsed.annotations.push(format!(
            "entity source {} exceeds the capture cap; no record produced",
            draft.path.display()
        ));
        return None;
    }

    Some((name, content_hash, draft.path.display().to_string()))
}

fn parse_memory(
    draft: &ObservationDraft,
    seen_scopes: &mut BTreeSet<MemoryScope>,
    parsed: &mut ParsedEntities,
) {
    let Some(scope) = MemoryScope::from_location_id(&draft.location_id) else {
        parsed.annotations.push(format!(
            "memory location '{}' has no recognizable scope; {} skipped",
            draft.location_id,
            draft.path.display()
        ));
        return;
    };

    let Some(content_hash) = draft.content_hash else {
        parsed.annotations.push(format!(
            "memory file {} could not be read; no record produced",
            draft.path.display()
        ));
        return;
    };

    if !draft.has_content() {
        parsed.annotations.push(format!(
            "memory file {} exceeds the capture cap; no record produced",
            draft.path.display()
        ));
        return;
    }

    if !seen_scopes.insert(scope) {
        parsed.annotations.push(format!(
            "duplicate {scope} memory from {} ignored",
            draft.path.display()
        ));
        return;
    }

    parsed.set.memories.push(MemoryRecord {
        scope,
        content_hash,
        source_path: draft.path.display().to_string(),
    });
}

/// Parses `mcpServers` out of a top-level Claude JSON document.
fn parse_mcp_config(draft: &ObservationDraft, parsed: &mut ParsedEntities) {
    let source = draft.path.display().to_string();

    let Some(content) = &draft.content else {
        if draft.content_hash.is_some() {
            parsed.annotations.push(format!(
                "MCP config {source} exceeds the capture cap; no records produced"
            ));
        } else {
            parsed
                .annotations
                .push(format!("MCP config {source} could not be read; no records produced"));
        }
        return;
    };

    let root: Value = match serde_json::from_slice(content) {
        Ok(value) => value,
        Err(e) => {
            parsed
                .annotations
                .push(format!("MCP config {source} is not valid JSON: {e}"));
            return;
        }
    };

    let Value::Object(root) = root else {
        parsed
            .annotations
            .push(format!("MCP config {source} is not a JSON object"));
        return;
    };

    let Some(servers) = root.get("mcpServers") else {
        // A document without an mcpServers section simply defines none.
        return;
    };

    let Value::Object(servers) = servers else {
        parsed.annotations.push(format!(
            "MCP config {source}: 'mcpServers' is not an object; no records produced"
        ));
        return;
    };

    let mut seen_names = BTreeSet::new();
    for (name, config) in servers {
        match parse_mcp_server(name, config, &source) {
            Ok(record) => {
                if seen_names.insert(record.name.clone()) {
                    parsed.set.mcp_servers.push(record);
                }
            }
            Err(reason) => {
                parsed
                    .annotations
                    .push(format!("MCP config {source}: server '{name}' skipped: {reason}"));
            }
        }
    }
}

/// Parses one `(name, config)` pair. Returns a human-readable reason when
/// the entry is malformed; siblings are unaffected.
fn parse_mcp_server(name: &str, config: &Value, source: &str) -> Result<McpServerRecord, String> {
    let Value::Object(config) = config else {
        return Err("config is not an object".to_string());
    };

    let command = match config.get("command") {
        Some(Value::String(command)) => command.clone(),
        Some(_) => return Err("'command' is not a string".to_string()),
        None => return Err("'command' is missing".to_string()),
    };

    let args = match config.get("args") {
        None => Vec::new(),
        Some(Value::Array(values)) => {
            let mut args = Vec::with_capacity(values.len());
            for value in values {
                match value {
                    Value::String(s) => args.push(s.clone()),
                    _ => return Err("'args' contains a non-string element".to_string()),
                }
            }
            args
        }
        Some(_) => return Err("'args' is not a sequence".to_string()),
    };

    // env keeps the document's pair order (serde_json preserve_order).
    let env = match config.get("env") {
        None => Vec::new(),
        Some(Value::Object(map)) => {
            let mut env = Vec::with_capacity(map.len());
            for (key, value) in map {
                match value {
                    Value::String(s) => env.push((key.clone(), s.clone())),
                    _ => return Err(format!("env variable '{key}' is not a string")),
                }
            }
            env
        }
        Some(_) => return Err("'env' is not an object".to_string()),
    };

    let enabled = match config.get("enabled") {
        None => true,
        Some(Value::Bool(enabled)) => *enabled,
        Some(_) => return Err("'enabled' is not a boolean".to_string()),
    };

    Ok(McpServerRecord {
        name: name.to_string(),
        command,
        args,
        env,
        enabled,
        source_path: source.to_string(),
    })
}
