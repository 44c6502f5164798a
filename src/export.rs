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

//! Structured snapshot export.
//!
//! The export document is self-contained JSON: the snapshot row, all
//! observations, entity records, tags and annotations, and optionally the
//! captured file bytes (base64, since JSON has no byte strings).

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::entities::EntitySet;
use crate::repository::repo::{Include, Repo};
use crate::repository::snapshot::{AnnotationRow, ObservationRow, SnapshotRecord, TagRow};

#[derive(Debug, Serialize)]
pub struct ExportObservation {
    #[serde(flatten)]
    pub observation: ObservationRow,

    /// Captured bytes, base64-encoded. Only present when the export was
    /// asked to embed content and the observation holds a blob reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub format_version: u32,
    pub snapshot: SnapshotRecord,
    pub observations: Vec<ExportObservation>,
    pub entities: EntitySet,
    pub tags: Vec<TagRow>,
    pub annotations: Vec<AnnotationRow>,
}

pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Builds the export document for one snapshot. With `include_content`,
/// captured file bytes are embedded (hash-verified on read).
pub fn export_snapshot(repo: &Repo, id: i64, include_content: bool) -> Result<ExportDocument> {
    let detail = repo.get_snapshot_detail(
        id,
        &Include {
            observations: true,
            changes: false,
            entities: true,
        },
    )?;

    let mut observations = Vec::new();
    for observation in detail.observations.unwrap_or_default() {
        let content_base64 = if include_content && observation.has_content {
            match observation.content_hash {
                Some(hash) => Some(BASE64.encode(repo.blob(&hash)?)),
                None => None,
            }
        } else {
            None
        };
        observations.push(ExportObservation {
            observation,
            content_base64,
        });
    }

    Ok(ExportDocument {
        format_version: EXPORT_FORMAT_VERSION,
        snapshot: detail.snapshot,
        observations,
        entities: detail.entities.unwrap_or_default(),
        tags: detail.tags,
        annotations: detail.annotations,
    })
}

/// Serializes an export document as pretty JSON.
pub fn to_json(document: &ExportDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(document)?)
}
