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

//! Persistence of entity records, denormalized per snapshot.
//!
//! MCP servers are fixed-shape and stored inline; argv and env serialize to
//! canonical JSON arrays so order (and duplicate env keys) survive storage.
//! Content-backed entities keep only the content hash and hold one blob
//! reference each, taken inside the owning snapshot's transaction.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::entities::{
    EntitySet, McpServerRecord, MemoryRecord, MemoryScope, SlashCommandRecord, SubagentRecord,
};
use crate::hashing::ContentHash;
use crate::repository::content::ContentStore;

/// Inserts all entity records of one snapshot. Content-backed records add a
/// reference to the blob already stored by the file's observation.
pub(crate) fn insert_entities(
    conn: &Connection,
    snapshot_id: i64,
    set: &EntitySet,
    content: &ContentStore,
) -> Result<()> {
    for server in &set.mcp_servers {
        conn.execute(
            "INSERT INTO mcp_servers (snapshot_id, name, command, args, env, enabled, source_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot_id,
                server.name,
                server.command,
                serde_json::to_string(&server.args)?,
                serde_json::to_string(&server.env)?,
                server.enabled,
                server.source_path,
            ],
        )?;
    }

    for subagent in &set.subagents {
        content
            .incref(conn, &subagent.content_hash)
            .with_context(|| format!("Subagent '{}' references a missing blob", subagent.name))?;
        conn.execute(
            "INSERT INTO subagents (snapshot_id, name, content_hash, source_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot_id,
                subagent.name,
                subagent.content_hash.to_hex(),
                subagent.source_path,
            ],
        )?;
    }

    for command in &set.slash_commands {
        content
            .incref(conn, &command.content_hash)
            .with_context(|| format!("Slash command '{}' references a missing blob", command.name))?;
        conn.execute(
            "INSERT INTO slash_commands (snapshot_id, name, content_hash, source_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot_id,
                command.name,
                command.content_hash.to_hex(),
                command.source_path,
            ],
        )?;
    }

    for memory in &set.memories {
        content
            .incref(conn, &memory.content_hash)
            .with_context(|| format!("{} memory references a missing blob", memory.scope))?;
        conn.execute(
            "INSERT INTO memories (snapshot_id, scope, content_hash, source_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot_id,
                memory.scope.as_str(),
                memory.content_hash.to_hex(),
                memory.source_path,
            ],
        )?;
    }

    Ok(())
}

/// Loads all entity records of a snapshot. Querying entities of snapshot S
/// never touches any other snapshot.
pub(crate) fn load_entities(conn: &Connection, snapshot_id: i64) -> Result<EntitySet> {
    let mut set = EntitySet::default();

    let mut stmt = conn.prepare(
        "SELECT name, command, args, env, enabled, source_path
         FROM mcp_servers WHERE snapshot_id = ?1 ORDER BY name",
    )?;
    let rows = stmt.query_map([snapshot_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, bool>(4)?,
            row.get::<_, String>(5)?,
        ))
    })?;
    for row in rows {
        let (name, command, args, env, enabled, source_path) = row?;
        set.mcp_servers.push(McpServerRecord {
            name,
            command,
            args: serde_json::from_str(&args)?,
            env: serde_json::from_str(&env)?,
            enabled,
            source_path,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT name, content_hash, source_path
         FROM subagents WHERE snapshot_id = ?1 ORDER BY name",
    )?;
    let rows = stmt.query_map([snapshot_id], content_entity_row)?;
    for row in rows {
        let (name, content_hash, source_path) = row?;
        set.subagents.push(SubagentRecord {
            name,
            content_hash: ContentHash::from_hex(&content_hash)?,
            source_path,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT name, content_hash, source_path
         FROM slash_commands WHERE snapshot_id = ?1 ORDER BY name",
    )?;
    let rows = stmt.query_map([snapshot_id], content_entity_row)?;
    for row in rows {
        let (name, content_hash, source_path) = row?;
        set.slash_commands.push(SlashCommandRecord {
            name,
            content_hash: ContentHash::from_hex(&content_hash)?,
            source_path,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT scope, content_hash, source_path
         FROM memories WHERE snapshot_id = ?1 ORDER BY scope",
    )?;
    let rows = stmt.query_map([snapshot_id], content_entity_row)?;
    for row in rows {
        let (scope, content_hash, source_path) = row?;
        set.memories.push(MemoryRecord {
            scope: MemoryScope::parse(&scope)?,
            content_hash: ContentHash::from_hex(&content_hash)?,
            source_path,
        });
    }

    Ok(set)
}

fn content_entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Content hashes referenced by a snapshot's entity records, one entry per
/// reference. Used when deleting a snapshot to release exactly the
/// references it took.
pub(crate) fn entity_blob_refs(conn: &Connection, snapshot_id: i64) -> Result<Vec<ContentHash>> {
    let mut hashes = Vec::new();

    for table in ["subagents", "slash_commands", "memories"] {
        let mut stmt = conn.prepare(&format!(
            "SELECT content_hash FROM {table} WHERE snapshot_id = ?1"
        ))?;
        let rows = stmt.query_map([snapshot_id], |row| row.get::<_, String>(0))?;
        for row in rows {
            hashes.push(ContentHash::from_hex(&row?)?);
        }
    }

    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use tempfile::tempdir;

    use super::*;
    use crate::repository::schema;

    fn setup() -> (tempfile::TempDir, Connection, ContentStore) {
        let tmp = tempdir().unwrap();
        let conn = Connection::open_in_memory().unwrap();
        schema::configure_connection(&conn).unwrap();
        schema::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO snapshots (created_at, trigger_kind, os_kind, os_version, hostname,
             username, working_dir, num_files, num_dirs, total_bytes, num_locations,
             num_errors, content_cap_bytes, fingerprint, baseline, changed)
             VALUES (0, 'manual', 'linux', 'v', 'h', 'u', '/', 0, 0, 0, 0, 0, 0, 'f', 1, 0)",
            [],
        )
        .unwrap();
        let store = ContentStore::new(tmp.path().join("blobs"), 1024);
        (tmp, conn, store)
    }

    #[test]
    fn test_mcp_round_trip_preserves_order() {
        let (_tmp, conn, store) = setup();
        let set = EntitySet {
            mcp_servers: vec![McpServerRecord {
                name: "search".to_string(),
                command: "python".to_string(),
                args: vec!["-m".to_string(), "s".to_string()],
                env: vec![
                    ("Z".to_string(), "1".to_string()),
                    ("A".to_string(), "2".to_string()),
                    ("Z".to_string(), "3".to_string()), // duplicate key preserved
                ],
                enabled: false,
                source_path: "/c.json".to_string(),
            }],
            ..Default::default()
        };

        insert_entities(&conn, 1, &set, &store).unwrap();
        let loaded = load_entities(&conn, 1).unwrap();

        assert_eq!(loaded.mcp_servers.len(), 1);
        let server = &loaded.mcp_servers[0];
        assert_eq!(server.args, vec!["-m", "s"]);
        assert_eq!(
            server.env,
            vec![
                ("Z".to_string(), "1".to_string()),
                ("A".to_string(), "2".to_string()),
                ("Z".to_string(), "3".to_string()),
            ]
        );
        assert!(!server.enabled);
    }

    #[test]
    fn test_content_backed_records_take_blob_references() {
        let (_tmp, conn, store) = setup();
        let body = b"agent body";
        let hash = store.put(&conn, body).unwrap().hash;
        assert_eq!(store.refcount(&conn, &hash).unwrap(), Some(1));

        let set = EntitySet {
            subagents: vec![SubagentRecord {
                name: "reviewer".to_string(),
                content_hash: hash,
                source_path: "/agents/reviewer.md".to_string(),
            }],
            ..Default::default()
        };
        insert_entities(&conn, 1, &set, &store).unwrap();

        assert_eq!(store.refcount(&conn, &hash).unwrap(), Some(2));
        assert_eq!(entity_blob_refs(&conn, 1).unwrap(), vec![hash]);

        let loaded = load_entities(&conn, 1).unwrap();
        assert_eq!(loaded.subagents[0].content_hash, hash);
    }

    #[test]
    fn test_entity_referencing_missing_blob_fails() {
        let (_tmp, conn, store) = setup();
        let set = EntitySet {
            memories: vec![MemoryRecord {
                scope: MemoryScope::User,
                content_hash: ContentHash::from_content(b"never stored"),
                source_path: "/CLAUDE.md".to_string(),
            }],
            ..Default::default()
        };

        assert!(insert_entities(&conn, 1, &set, &store).is_err());
    }

    #[test]
    fn test_duplicate_entity_name_violates_identity() {
        let (_tmp, conn, store) = setup();
        let hash = store.put(&conn, b"x").unwrap().hash;

        let record = SlashCommandRecord {
            name: "deploy".to_string(),
            content_hash: hash,
            source_path: "/commands/deploy.md".to_string(),
        };
        let set = EntitySet {
            slash_commands: vec![record.clone(), record],
            ..Default::default()
        };

        // (snapshot, kind, name) is unique; the second insert violates it.
        assert!(insert_entities(&conn, 1, &set, &store).is_err());
    }
}
