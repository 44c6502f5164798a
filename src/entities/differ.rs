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

//! Semantic deltas between the entity sets of two snapshots.
//!
//! Deltas carry full pre/post images: added and removed entries have one
//! side populated, modified entries both. Within each kind the output is
//! sorted by entity name (by scope for memory).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entities::{
    EntitySet, McpServerRecord, MemoryRecord, SlashCommandRecord, SubagentRecord,
};
use crate::global::ChangeKind;

/// One entity-level difference with its pre/post images.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDelta<T> {
    pub name: String,
    pub kind: ChangeKind,
    pub before: Option<T>,
    pub after: Option<T>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaCounts {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl DeltaCounts {
    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }

    fn tally<T>(deltas: &[EntityDelta<T>]) -> Self {
        let mut counts = DeltaCounts::default();
        for delta in deltas {
            match delta.kind {
                ChangeKind::Added => counts.added += 1,
                ChangeKind::Removed => counts.removed += 1,
                ChangeKind::Modified => counts.modified += 1,
            }
        }
        counts
    }

    fn add(&mut self, other: &DeltaCounts) {
        self.added += other.added;
        self.removed += other.removed;
        self.modified += other.modified;
    }
}

/// Adds/removes/modifies per entity kind, plus the overall total.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub mcp_servers: DeltaCounts,
    pub subagents: DeltaCounts,
    pub slash_commands: DeltaCounts,
    pub memories: DeltaCounts,
    pub total: DeltaCounts,
}

/// The full semantic delta bundle between two snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityDeltas {
    pub mcp_servers: Vec<EntityDelta<McpServerRecord>>,
    pub subagents: Vec<EntityDelta<SubagentRecord>>,
    pub slash_commands: Vec<EntityDelta<SlashCommandRecord>>,
    pub memories: Vec<EntityDelta<MemoryRecord>>,
    pub summary: DeltaSummary,
}

impl EntityDeltas {
    pub fn is_empty(&self) -> bool {
        self.summary.total.total() == 0
    }
}

/// Computes the entity deltas between two snapshots' entity sets.
pub fn diff_entities(from: &EntitySet, to: &EntitySet) -> EntityDeltas {
    let mcp_servers = diff_kind(
        &from.mcp_servers,
        &to.mcp_servers,
        |record| record.name.clone(),
        McpServerRecord::same_payload,
    );
    let subagents = diff_kind(
        &from.subagents,
        &to.subagents,
        |record| record.name.clone(),
        SubagentRecord::same_payload,
    );
    let slash_commands = diff_kind(
        &from.slash_commands,
        &to.slash_commands,
        |record| record.name.clone(),
        SlashCommandRecord::same_payload,
    );
    let memories = diff_kind(
        &from.memories,
        &to.memories,
        |record| record.scope.as_str().to_string(),
        MemoryRecord::same_payload,
    );

    let mut summary = DeltaSummary {
        mcp_servers: DeltaCounts::tally(&mcp_servers),
        subagents: DeltaCounts::tally(&subagents),
        slash_commands: DeltaCounts::tally(&slash_commands),
        memories: DeltaCounts::tally(&memories),
        total: DeltaCounts::default(),
    };
    summary.total.add(&summary.mcp_servers);
    summary.total.add(&summary.subagents);
    summary.total.add(&summary.slash_commands);
    summary.total.add(&summary.memories);

    EntityDeltas {
        mcp_servers,
        subagents,
        slash_commands,
        memories,
        summary,
    }
}

/// Name-indexed diff of one entity kind. `BTreeMap` keys give the sorted
/// output order for free.
fn diff_kind<T, N, E>(from: &[T], to: &[T], name_of: N, same_payload: E) -> Vec<EntityDelta<T>>
where
    T: Clone,
    N: Fn(&T) -> String,
    E: Fn(&T, &T) -> bool,
{
    let before: BTreeMap<String, &T> = from.iter().map(|r| (name_of(r), r)).collect();
    let after: BTreeMap<String, &T> = to.iter().map(|r| (name_of(r), r)).collect();

    let mut deltas = Vec::new();
    let mut names: Vec<&String> = before.keys().chain(after.keys()).collect();
    names.sort();
    names.dedup();

    for name in names {
        match (before.get(name), after.get(name)) {
            (Some(old), Some(new)) => {
                if !same_payload(old, new) {
                    deltas.push(EntityDelta {
                        name: name.clone(),
                        kind: ChangeKind::Modified,
                        before: Some((*old).clone()),
                        after: Some((*new).clone()),
                    });
                }
            }
            (Some(old), None) => deltas.push(EntityDelta {
                name: name.clone(),
                kind: ChangeKind::Removed,
                before: Some((*old).clone()),
                after: None,
            }),
            (None, Some(new)) => deltas.push(EntityDelta {
                name: name.clone(),
                kind: ChangeKind::Added,
                before: None,
                after: Some((*new).clone()),
            }),
            (None, None) => unreachable!("name came from one of the two maps"),
        }
    }

    deltas
}
