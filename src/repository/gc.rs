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

//! Garbage collection of unreferenced blobs.
//!
//! Deleting a snapshot only releases references; blobs that reach zero stay
//! behind as garbage until a collection pass reclaims them. The pass is
//! split into a scan that produces a plan and an execute step that consumes
//! it, so callers can inspect (or dry-run) what would be reclaimed.

use anyhow::Result;

use crate::hashing::ContentHash;
use crate::repository::repo::Repo;
use crate::ui;

#[derive(Debug, Clone)]
pub struct GarbageBlob {
    pub hash: ContentHash,
    pub size: u64,
    pub external: bool,
}

/// The cleanup plan. Executing it consumes the plan so a stale plan cannot
/// be applied twice.
pub struct Plan {
    pub garbage: Vec<GarbageBlob>,
    pub reclaimable_bytes: u64,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.garbage.is_empty()
    }

    pub fn len(&self) -> usize {
        self.garbage.len()
    }

    /// Deletes the garbage blobs. Rows go first, in one transaction; the
    /// external files of successfully deleted rows are removed afterwards.
    /// Returns the number of bytes reclaimed.
    pub fn execute(self, repo: &Repo) -> Result<u64> {
        let _writer = repo.writer_lock();

        let mut reclaimed = 0u64;
        let mut deleted_external = Vec::new();
        {
            let mut conn = repo.conn();
            let tx = conn.transaction()?;
            for blob in &self.garbage {
                // Guard on refcount again: a snapshot written between scan
                // and execute may have revived the blob.
                let deleted = tx.execute(
                    "DELETE FROM blobs WHERE hash = ?1 AND refcount = 0",
                    [blob.hash.to_hex()],
                )?;
                if deleted > 0 {
                    reclaimed += blob.size;
                    if blob.external {
                        deleted_external.push(blob.hash);
                    }
                }
            }
            tx.commit()?;
        }

        for hash in deleted_external {
            let path = repo.content().external_path(&hash);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    ui::cli::warning!("Could not remove blob file {}: {}", path.display(), e);
                }
            }
        }

        Ok(reclaimed)
    }
}

/// Scan the repository and make a plan of what needs to be cleaned.
pub fn scan(repo: &Repo) -> Result<Plan> {
    let conn = repo.conn();
    let mut stmt =
        conn.prepare("SELECT hash, size, external FROM blobs WHERE refcount = 0 ORDER BY hash")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, bool>(2)?,
        ))
    })?;

    let mut garbage = Vec::new();
    let mut reclaimable_bytes = 0u64;
    for row in rows {
        let (hash, size, external) = row?;
        reclaimable_bytes += size as u64;
        garbage.push(GarbageBlob {
            hash: ContentHash::from_hex(&hash)?,
            size: size as u64,
            external,
        });
    }

    Ok(Plan {
        garbage,
        reclaimable_bytes,
    })
}
