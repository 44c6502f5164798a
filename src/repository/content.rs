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

//! Content-addressed, deduplicating blob storage.
//!
//! Blobs are keyed by SHA-256 and reference counted. Small blobs live inline
//! in the database; blobs above the inline limit are written to a fan-out
//! directory next to the database file, keyed by hash. Reference counts are
//! mutated inside the same transaction that persists the referring record,
//! so they are exact at every commit point.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::global::defaults;
use crate::hashing::ContentHash;

/// Outcome of a `put`. The writer tracks `external_file` so a rolled-back
/// transaction can remove files created out-of-band.
#[derive(Debug)]
pub struct PutResult {
    pub hash: ContentHash,
    pub new_blob: bool,
    pub external_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ContentStats {
    /// Number of distinct blobs.
    pub num_blobs: u64,
    /// Sum of reference counts over all blobs.
    pub total_refs: u64,
    /// Bytes stored once, after deduplication.
    pub stored_bytes: u64,
    /// Bytes as referenced (size times refcount).
    pub referenced_bytes: u64,
}

impl ContentStats {
    /// How much storing every reference separately would have cost, relative
    /// to what is actually stored. 1.0 means no dedup benefit.
    pub fn dedup_ratio(&self) -> f64 {
        if self.stored_bytes == 0 {
            1.0
        } else {
            self.referenced_bytes as f64 / self.stored_bytes as f64
        }
    }
}

pub struct ContentStore {
    blobs_path: PathBuf,
    inline_limit: u64,
}

impl ContentStore {
    pub fn new(blobs_path: PathBuf, inline_limit: u64) -> Self {
        Self {
            blobs_path,
            inline_limit,
        }
    }

    pub fn blobs_path(&self) -> &Path {
        &self.blobs_path
    }

    /// Path of an externally stored blob: `blobs/<2 hex chars>/<hash>`.
    pub fn external_path(&self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        self.blobs_path
            .join(&hex[..defaults::BLOBS_DIR_FANOUT])
            .join(hex)
    }

    /// Stores a byte sequence, deduplicating by hash. Idempotent: a blob that
    /// already exists gets its reference count bumped and no bytes are
    /// written. The empty sequence is a valid blob.
    pub fn put(&self, conn: &Connection, data: &[u8]) -> Result<PutResult> {
        let hash = ContentHash::from_content(data);
        let hex = hash.to_hex();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT refcount FROM blobs WHERE hash = ?1",
                [&hex],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            conn.execute(
                "UPDATE blobs SET refcount = refcount + 1 WHERE hash = ?1",
                [&hex],
            )?;
            return Ok(PutResult {
                hash,
                new_blob: false,
                external_file: None,
            });
        }

        let external = data.len() as u64 > self.inline_limit;
        let external_file = if external {
            let path = self.external_path(&hash);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create blob directory {}", parent.display()))?;
            }
            std::fs::write(&path, data)
                .with_context(|| format!("Could not write blob file {}", path.display()))?;
            Some(path)
        } else {
            None
        };

        conn.execute(
            "INSERT INTO blobs (hash, size, refcount, external, data)
             VALUES (?1, ?2, 1, ?3, ?4)",
            params![
                hex,
                data.len() as i64,
                external,
                if external { None } else { Some(data) },
            ],
        )?;

        Ok(PutResult {
            hash,
            new_blob: true,
            external_file,
        })
    }

    /// Adds one reference to an existing blob. Entity records that share a
    /// file's content with its observation use this instead of re-putting
    /// the bytes.
    pub fn incref(&self, conn: &Connection, hash: &ContentHash) -> Result<()> {
        let updated = conn.execute(
            "UPDATE blobs SET refcount = refcount + 1 WHERE hash = ?1",
            [hash.to_hex()],
        )?;
        if updated == 0 {
            bail!("Cannot reference unknown blob {hash}");
        }
        Ok(())
    }

    /// Drops one reference. A blob that reaches zero references becomes
    /// garbage; collection is deferred to `gc`.
    pub fn release(&self, conn: &Connection, hash: &ContentHash) -> Result<()> {
        let updated = conn.execute(
            "UPDATE blobs SET refcount = refcount - 1 WHERE hash = ?1 AND refcount > 0",
            [hash.to_hex()],
        )?;
        if updated == 0 {
            match self.refcount(conn, hash)? {
                Some(_) => bail!("Reference count underflow for blob {hash}"),
                None => bail!("Cannot release unknown blob {hash}"),
            }
        }
        Ok(())
    }

    /// Loads the bytes of a blob. With `verify`, the bytes are re-hashed and
    /// a mismatch is a fatal integrity error.
    pub fn get(&self, conn: &Connection, hash: &ContentHash, verify: bool) -> Result<Vec<u8>> {
        let row: Option<(bool, Option<Vec<u8>>)> = conn
            .query_row(
                "SELECT external, data FROM blobs WHERE hash = ?1",
                [hash.to_hex()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((external, data)) = row else {
            bail!("No blob with hash {hash} exists");
        };

        let data = if external {
            let path = self.external_path(hash);
            std::fs::read(&path)
                .with_context(|| format!("Could not read blob file {}", path.display()))?
        } else {
            data.unwrap_or_default()
        };

        if verify {
            let actual = ContentHash::from_content(&data);
            if actual != *hash {
                bail!("Blob integrity error: stored bytes of {hash} hash to {actual}");
            }
        }

        Ok(data)
    }

    pub fn refcount(&self, conn: &Connection, hash: &ContentHash) -> Result<Option<i64>> {
        let refcount = conn
            .query_row(
                "SELECT refcount FROM blobs WHERE hash = ?1",
                [hash.to_hex()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(refcount)
    }

    pub fn stats(&self, conn: &Connection) -> Result<ContentStats> {
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(refcount), 0),
                    COALESCE(SUM(size), 0),
                    COALESCE(SUM(size * refcount), 0)
             FROM blobs",
            [],
            |row| {
                Ok(ContentStats {
                    num_blobs: row.get::<_, i64>(0)? as u64,
                    total_refs: row.get::<_, i64>(1)? as u64,
                    stored_bytes: row.get::<_, i64>(2)? as u64,
                    referenced_bytes: row.get::<_, i64>(3)? as u64,
                })
            },
        )?;
        Ok(stats)
    }

    /// All blobs currently stored, for verification sweeps.
    pub fn list_hashes(&self, conn: &Connection) -> Result<Vec<ContentHash>> {
        let mut stmt = conn.prepare("SELECT hash FROM blobs ORDER BY hash")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut hashes = Vec::new();
        for row in rows {
            hashes.push(ContentHash::from_hex(&row?)?);
        }
        Ok(hashes)
    }
}
